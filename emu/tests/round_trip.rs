use std::io::Cursor;

use arch::obj::Block;
use bkasm::assembler::Assembler;
use bkasm::parser::preprocess;
use bkemu::device::Devices;
use bkemu::loader;
use bkemu::model::{Status, Vm};

fn assemble(src: &str) -> Vec<Block> {
    let mut asm = Assembler::new(preprocess(src).unwrap());
    asm.assemble().unwrap();
    asm.blocks().to_vec()
}

fn segments(blocks: &[Block]) -> Vec<Cursor<Vec<u8>>> {
    blocks
        .iter()
        .map(|b| {
            let mut buf = Vec::new();
            b.write_bin(&mut buf).unwrap();
            Cursor::new(buf)
        })
        .collect()
}

/// The embedded loader image is exactly what the assembler produces from
/// the loader's own source.
#[test]
fn loader_image_matches_its_source() {
    let blocks = assemble(loader::SOURCE);
    let mut image = Vec::new();
    for b in &blocks {
        b.write_bin(&mut image).unwrap();
    }
    assert_eq!(image, loader::IMAGE);
}

/// Bootstrapping assembled blocks through the resident loader places every
/// byte at the address the assembler computed for it.
#[test]
fn assembled_bytes_land_where_computed() {
    let src = "\
@ /100
START LD /0A
MM BUF
JP DONE
BUF $ 1
DONE OS 15
# START
";
    let blocks = assemble(src);
    let mut vm = Vm::new(Devices::empty()).unwrap();
    vm.load(segments(&blocks)).unwrap();

    for block in &blocks {
        for (i, &byte) in block.data.iter().enumerate() {
            assert_eq!(vm.peek(block.start + i as u16), byte);
        }
    }
    // Entry vector populated mid-bootstrap by the program's own `#` block.
    assert_eq!(vm.peek(0x0022), 0x01);
    assert_eq!(vm.peek(0x0023), 0x00);

    vm.run().unwrap();
    assert_eq!(vm.status(), Status::Halted);
    assert_eq!(vm.acc(), 10);
    // MM BUF stored the accumulator where the assembler put BUF.
    assert_eq!(vm.peek(0x0106), 10);
}

/// A run longer than one block loads across segment boundaries with
/// contiguous addresses.
#[test]
fn multi_segment_program_loads_contiguously() {
    let src = "@ /200\n$ 300\nK 99\nDONE OS 15\n# DONE\n";
    let blocks = assemble(src);
    assert_eq!(blocks.len(), 3); // 255 + 47 + entry vector
    assert_eq!(blocks[1].start, 0x2FF);

    let mut vm = Vm::new(Devices::empty()).unwrap();
    vm.load(segments(&blocks)).unwrap();
    assert_eq!(vm.peek(0x02FE), 0); // inside the zero fill
    assert_eq!(vm.peek(0x032C), 99); // K marker after 300 reserved bytes
    assert_eq!(vm.peek(0x032D), 0xBF); // OS 15

    vm.run().unwrap();
    assert_eq!(vm.status(), Status::Halted);
}

/// Floor division end to end: LD -7 then / 2 leaves -4, not -3.
#[test]
fn division_truncates_toward_negative_infinity() {
    let src = "@ /100\nSTART LD -7\n/ 2\nOS 15\n# START\n";
    let mut vm = Vm::new(Devices::empty()).unwrap();
    vm.load(segments(&assemble(src))).unwrap();
    vm.run().unwrap();
    assert_eq!(vm.acc(), -4);
}

/// Indirect mode is armed by CN 2 and consumed by exactly one
/// memory-referencing instruction.
#[test]
fn indirect_mode_is_single_shot_end_to_end() {
    // PTR holds a big-endian pointer to VAL. The first LD goes through the
    // pointer; the second, identical LD is direct again and sees only the
    // low byte of its operand field.
    let src = "\
@ /100
START CN 2
LD PTR
MM OUT1
LD PTR
MM OUT2
OS 15
PTR K 1
K 14
OUT1 $ 1
OUT2 $ 1
VAL K 42
# START
";
    let blocks = assemble(src);
    let mut vm = Vm::new(Devices::empty()).unwrap();
    vm.load(segments(&blocks)).unwrap();
    vm.run().unwrap();

    // PTR sits at 0x10A holding 0x010E, where VAL = 42 lives.
    assert_eq!(vm.peek(0x010A), 0x01);
    assert_eq!(vm.peek(0x010B), 0x0E);
    assert_eq!(vm.peek(0x010C), 42); // indirect load saw memory
    assert_eq!(vm.peek(0x010D), 0x0A); // direct load saw its operand's low byte
}
