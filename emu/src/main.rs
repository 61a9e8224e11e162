use std::fs::File;
use std::io::BufRead;

use bkemu::device::{DeviceMap, Devices};
use bkemu::model::{Status, Vm};
use color_print::cprintln;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about = "Virtual machine for the BK16 architecture", help_template = HELP_TEMPLATE)]
struct Args {
    /// Program base name: every `BASE.obj.bin.N` segment is loaded in order
    #[clap(default_value = "main")]
    image: String,

    /// YAML file binding device slots 1-3 to files
    #[clap(short, long)]
    devices: Option<String>,

    /// Bootstrap the image but do not run it
    #[clap(long)]
    load_only: bool,

    /// Execute one instruction per line of input, printing the registers
    #[clap(long)]
    step: bool,
}

fn main() {
    use clap::Parser;

    let args = Args::parse();
    println!("BK16 Virtual Machine");

    let mut devices = Devices::stdio();
    if let Some(path) = &args.devices {
        let map = File::open(path)
            .map_err(|e| e.to_string())
            .and_then(|f| serde_yaml::from_reader::<_, DeviceMap>(f).map_err(|e| e.to_string()));
        match map {
            Ok(map) => {
                if let Err(e) = map.apply(&mut devices) {
                    exit_with(format!("failed to bind devices from `{path}`: {e}"));
                }
            }
            Err(e) => exit_with(format!("failed to read device map `{path}`: {e}")),
        }
    }

    let mut vm = match Vm::new(devices) {
        Ok(vm) => vm,
        Err(e) => exit_with(e.to_string()),
    };

    let segments = match find_segments(&args.image) {
        Ok(paths) if paths.is_empty() => {
            exit_with(format!("no object segments match `{}.obj.bin.*`", args.image))
        }
        Ok(paths) => paths,
        Err(e) => exit_with(e),
    };

    let mut streams = Vec::new();
    for path in &segments {
        println!("  < {path}");
        match File::open(path) {
            Ok(f) => streams.push(f),
            Err(e) => exit_with(format!("failed to open `{path}`: {e}")),
        }
    }

    if let Err(fault) = vm.load(streams) {
        exit_with(format!("bootstrap fault: {fault}"));
    }

    if args.load_only {
        return;
    }

    println!("[RUN]");
    if args.step {
        step_run(&mut vm);
    } else if let Err(fault) = vm.run() {
        exit_with(format!("execution fault: {fault}"));
    }
}

/// Debug run: one instruction per line of standard input. Note that a
/// program reading device 0 competes with the pacing input.
fn step_run(vm: &mut Vm) {
    let stdin = std::io::stdin();
    vm.start();
    while vm.status() == Status::Running {
        if let Err(fault) = vm.step() {
            exit_with(format!("execution fault: {fault}"));
        }
        println!("pc 0x{:04X}  acc {}", vm.pc(), vm.acc());
        let mut pause = String::new();
        if stdin.lock().read_line(&mut pause).unwrap_or(0) == 0 {
            break;
        }
    }
}

/// Object segment files for a program, ordered by their numeric suffix.
fn find_segments(base: &str) -> Result<Vec<String>, String> {
    let pattern = format!("{base}.obj.bin.*");
    let mut found: Vec<(usize, String)> = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| e.to_string())? {
        let path = entry.map_err(|e| e.to_string())?;
        let path = path.to_string_lossy().into_owned();
        if let Some(n) = path.rsplit('.').next().and_then(|s| s.parse().ok()) {
            found.push((n, path));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

fn exit_with(message: String) -> ! {
    cprintln!("<red,bold>error</>: {}", message);
    std::process::exit(1);
}
