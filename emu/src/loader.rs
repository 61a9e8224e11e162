//! Resident bootstrap loader.
//!
//! The machine never parses program object files natively: it executes this
//! small relocation program against device slot 1, which reads a block's
//! start address and length, then copies the payload into memory through an
//! incrementing destination pointer. The image is fixed; [`SOURCE`] is the
//! program it was assembled from.

/// Assembly source of the resident loader. Kept next to the image so the
/// two can be checked against each other.
pub const SOURCE: &str = "\
; BK16 resident loader: copies one object segment from device 1 into memory.
@ 0
IO 1            ; block start address, high byte
MM DSTH
IO 1            ; block start address, low byte
MM DSTL
IO 1            ; payload length
MM CNT
LOOP CN 2
LD PCNT         ; remaining byte count
JZ DONE
- 1
MM CNT
IO 1            ; next payload byte
CN 2
MM DSTH         ; store through the destination pointer
CN 2
LD PDSTL        ; bump the 16-bit destination pointer
+ 1
MM DSTL
JZ CARRY
JP LOOP
@ 36            ; leave 0x0021-0x0023 free for the entry vector
CARRY CN 2
LD PDSTH
+ 1
MM DSTH
JP LOOP
DONE OS 15      ; segment finished, hand control back
DSTH $ 1
DSTL $ 1
CNT $ 1
PCNT K 0
K 48            ; -> CNT
PDSTL K 0
K 47            ; -> DSTL
PDSTH K 0
K 46            ; -> DSTH
";

/// The loader in binary object-block form, placed into bank 0 at machine
/// construction. Two blocks so that the entry-vector slot at 0x0022-0x0023
/// stays untouched and may be populated mid-bootstrap.
pub const IMAGE: &[u8] = &[
    // block 0: start 0x0000, 33 bytes, checksum 0xDF
    0x00, 0x00, 0x21, //
    0xC1, 0x90, 0x2E, 0xC1, 0x90, 0x2F, 0xC1, 0x90, 0x30, //
    0x32, 0x80, 0x31, 0x10, 0x2D, 0x50, 0x01, 0x90, 0x30, //
    0xC1, 0x32, 0x90, 0x2E, 0x32, 0x80, 0x33, 0x40, 0x01, //
    0x90, 0x2F, 0x10, 0x24, 0x00, 0x09, //
    0xDF, //
    // block 1: start 0x0024, 19 bytes, checksum 0x00
    0x00, 0x24, 0x13, //
    0x32, 0x80, 0x35, 0x40, 0x01, 0x90, 0x2E, 0x00, 0x09, 0xBF, //
    0x00, 0x00, 0x00, //
    0x00, 0x30, 0x00, 0x2F, 0x00, 0x2E, //
    0x00,
];
