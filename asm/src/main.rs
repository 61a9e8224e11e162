use bkasm::{assembler::Assembler, error::Error, output, parser};
use color_print::cprintln;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about = "Assembler for the BK16 architecture", help_template = HELP_TEMPLATE)]
struct Args {
    /// Input source file
    #[clap(default_value = "main.asm")]
    input: String,

    /// Skip the human-readable listing file
    #[clap(long)]
    no_list: bool,

    /// Skip the label table dump file
    #[clap(long)]
    no_labels: bool,
}

fn main() {
    use clap::Parser;

    let args = Args::parse();
    println!("BK16 Assembler");

    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => exit_with(&[], Error::FileRead(args.input.clone(), e)),
    };
    let raw_lines: Vec<&str> = source.lines().collect();

    println!("1. Preprocess and collect labels");
    println!("  < {}", args.input);
    let lines = match parser::preprocess(&source) {
        Ok(lines) => lines,
        Err(e) => exit_with(&raw_lines, e),
    };

    println!("2. Resolve labels and generate object blocks");
    let mut asm = Assembler::new(lines);
    if let Err(e) = asm.assemble() {
        exit_with(&raw_lines, e);
    }

    let base = output::base_name(&args.input);
    if let Err(e) = output::write_objects(&base, asm.blocks()) {
        exit_with(&raw_lines, e);
    }
    for (n, block) in asm.blocks().iter().enumerate() {
        println!(
            "  > {base}.obj.bin.{n} (start {:04X}, {} bytes)",
            block.start,
            block.data.len()
        );
    }

    if !args.no_list {
        println!("  > {base}.lst");
        if let Err(e) = output::write_listing(&base, asm.listing()) {
            exit_with(&raw_lines, e);
        }
    }
    if !args.no_labels {
        println!("  > {base}.asm.labels");
        if let Err(e) = output::write_labels(&base, asm.labels()) {
            exit_with(&raw_lines, e);
        }
    }
}

/// Print a colored diagnostic with the offending source line and abort.
fn exit_with(raw_lines: &[&str], err: Error) -> ! {
    cprintln!("<red,bold>error</>: {}", err);
    if let Some(number) = err.line() {
        cprintln!("      <blue>|</>");
        cprintln!(
            " <blue>{:>4} |</> {}",
            number,
            raw_lines.get(number - 1).unwrap_or(&"")
        );
        cprintln!("      <blue>|</>");
    }
    std::process::exit(1);
}
