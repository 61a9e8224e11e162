use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use arch::obj::Block;

use crate::assembler::ListEntry;
use crate::error::Error;
use crate::label::Labels;

/// Base output path for a source file: the extension is dropped, so
/// `prog.s` produces `prog.obj.N`, `prog.lst` and `prog.asm.labels`.
pub fn base_name(input: &str) -> String {
    match input.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => input.to_string(),
    }
}

/// Write every block as a numbered pair of sibling files: `BASE.obj.N`
/// (text form) and `BASE.obj.bin.N` (raw binary form). Stale object files
/// from a previous run are removed first.
pub fn write_objects(base: &str, blocks: &[Block]) -> Result<(), Error> {
    let pattern = format!("{base}.obj.*");
    if let Ok(stale) = glob::glob(&pattern) {
        for path in stale.flatten() {
            let _ = std::fs::remove_file(path);
        }
    }

    for (n, block) in blocks.iter().enumerate() {
        let text_path = format!("{base}.obj.{n}");
        let mut text = create(&text_path)?;
        block
            .write_text(&mut text)
            .map_err(|e| Error::FileWrite(text_path.clone(), e))?;

        let bin_path = format!("{base}.obj.bin.{n}");
        let mut bin = create(&bin_path)?;
        block
            .write_bin(&mut bin)
            .map_err(|e| Error::FileWrite(bin_path.clone(), e))?;
    }
    Ok(())
}

/// Human-readable listing: ADDRESS / OBJECT / LINE / SOURCE columns.
pub fn write_listing(base: &str, entries: &[ListEntry]) -> Result<(), Error> {
    let path = format!("{base}.lst");
    let mut f = create(&path)?;
    let wrap = |e| Error::FileWrite(path.clone(), e);

    writeln!(f, "{path} LIST FILE").map_err(wrap)?;
    writeln!(f, "{}-----------", "-".repeat(path.len())).map_err(wrap)?;
    writeln!(f, "ADDRESS   OBJECT    LINE   SOURCE").map_err(wrap)?;
    for e in entries {
        let addr = match e.address {
            Some(a) => format!("{a:04X}"),
            None => "    ".to_string(),
        };
        let object = match e.object {
            Some(o) => format!("{o:6X}"),
            None => "      ".to_string(),
        };
        let comment = if e.comment.is_empty() {
            String::new()
        } else {
            format!("; {}", e.comment)
        };
        writeln!(f, "   {addr}   {object}    {:4}   {} {comment}", e.line, e.source)
            .map_err(wrap)?;
    }
    Ok(())
}

/// Label table dump in definition order.
pub fn write_labels(base: &str, labels: &Labels) -> Result<(), Error> {
    let path = format!("{base}.asm.labels");
    let mut f = create(&path)?;
    let wrap = |e| Error::FileWrite(path.clone(), e);

    writeln!(f, "{path} LABEL TABLE FILE").map_err(wrap)?;
    writeln!(f, "{}-----------------", "-".repeat(path.len())).map_err(wrap)?;
    writeln!(f, "LABEL           VALUE").map_err(wrap)?;
    for (name, addr) in labels.iter() {
        writeln!(f, "{name:<15}  {addr:04X}").map_err(wrap)?;
    }
    Ok(())
}

fn create(path: &str) -> Result<BufWriter<File>, Error> {
    File::create(Path::new(path))
        .map(BufWriter::new)
        .map_err(|e| Error::FileWrite(path.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_extension() {
        assert_eq!(base_name("prog.s"), "prog");
        assert_eq!(base_name("dir/prog.asm"), "dir/prog");
        assert_eq!(base_name("prog"), "prog");
    }

    #[test]
    fn object_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("prog").to_string_lossy().into_owned();
        let blocks = vec![
            Block {
                start: 0x100,
                data: vec![0x80, 0x0A, 0xBF],
            },
            Block {
                start: 0x22,
                data: vec![0x01, 0x00],
            },
        ];
        write_objects(&base, &blocks).unwrap();

        let bin = std::fs::read(format!("{base}.obj.bin.0")).unwrap();
        assert_eq!(bin[..3], [0x01, 0x00, 0x03]);
        let text = std::fs::read_to_string(format!("{base}.obj.1")).unwrap();
        assert!(text.starts_with("00 22 02 01 00 "));

        // A rerun with fewer blocks clears the stale numbered files, but
        // only the `BASE.obj.*` family; sibling files are left alone.
        let bystander = format!("{base}.object");
        std::fs::write(&bystander, b"keep").unwrap();
        write_objects(&base, &blocks[..1]).unwrap();
        assert!(!Path::new(&format!("{base}.obj.bin.1")).exists());
        assert!(Path::new(&bystander).exists());
    }
}
