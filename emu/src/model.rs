use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arch::obj::Block;
use arch::op::Op;
use color_print::cprintln;

use crate::device::Devices;
use crate::error::Fault;
use crate::loader;

pub const BANKS: usize = 16;
pub const BANK_SIZE: usize = 4096;

/// Fixed location of the resident program's entry-point vector.
pub const ENTRY_VECTOR: u16 = 0x0022;

/// Writes below this boundary outside of bootstrap draw a warning.
pub const RESERVED_TOP: u16 = 0x0100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Running,
    Halted,
}

/// The machine: banked memory, registers and the fetch/decode/execute loop.
/// Exclusively owned; the loop is strictly sequential.
pub struct Vm {
    mem: Vec<[u8; BANK_SIZE]>,
    ir: u16,
    pc: u16,
    acc: i8,
    bank: u8,
    indirect: bool,
    status: Status,
    devices: Devices,
    cancel: Arc<AtomicBool>,
}

impl Vm {
    /// Construct with empty memory and the resident loader placed in bank 0.
    pub fn new(devices: Devices) -> Result<Self, Fault> {
        let mut vm = Vm {
            mem: vec![[0; BANK_SIZE]; BANKS],
            ir: 0,
            pc: 0,
            acc: 0,
            bank: 0,
            indirect: false,
            status: Status::Idle,
            devices,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let mut image = loader::IMAGE;
        while let Some(block) = Block::read_bin(&mut image).map_err(Fault::BadLoaderImage)? {
            vm.poke_run(block.start, &block.data);
        }
        Ok(vm)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn acc(&self) -> i8 {
        self.acc
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Memory byte at a full 16-bit address (bank in the top nibble).
    pub fn peek(&self, addr: u16) -> u8 {
        self.read_byte((addr >> 12) as u8, addr & 0x0FFF)
    }

    /// Flag polled by the halt-and-spin control operation. Raising it is the
    /// only way to leave that spin short of killing the process.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Bootstrap object segments through the resident loader: each stream is
    /// bound to device slot 1 and the loader machine code runs against it
    /// until it signals completion with an OS halt call.
    pub fn load<R: Read + 'static>(
        &mut self,
        segments: impl IntoIterator<Item = R>,
    ) -> Result<(), Fault> {
        for segment in segments {
            self.devices.bind_input(1, Box::new(segment));
            self.pc = 0;
            self.bank = 0;
            self.status = Status::Loading;
            let result = self.run_loop(Status::Loading);
            self.devices.unbind_input(1);
            result?;
        }
        Ok(())
    }

    /// Position the machine at the resident program's entry point, ready
    /// for stepwise execution.
    pub fn start(&mut self) {
        self.pc = self.read_word(0, ENTRY_VECTOR);
        self.bank = 0;
        self.status = Status::Running;
    }

    /// Execute the resident program from its entry vector until halted.
    pub fn run(&mut self) -> Result<(), Fault> {
        self.start();
        self.run_loop(Status::Running)
    }

    fn run_loop(&mut self, active: Status) -> Result<(), Fault> {
        while self.status == active {
            if let Err(fault) = self.step() {
                self.status = Status::Halted;
                return Err(fault);
            }
        }
        Ok(())
    }

    pub fn step(&mut self) -> Result<(), Fault> {
        let op = self.fetch()?;
        self.execute(op)
    }

    /// The high nibble at (bank, pc) selects the operation and with it the
    /// instruction width. One-byte forms occupy the high byte of the
    /// instruction register; two-byte forms are big-endian.
    fn fetch(&mut self) -> Result<Op, Fault> {
        let byte = self.read_byte(self.bank, self.pc);
        let op = Op::try_from(byte >> 4).map_err(|_| Fault::BadInstruction(self.bank, self.pc))?;
        self.ir = match op.width() {
            1 => (byte as u16) << 8,
            _ => u16::from_be_bytes([byte, self.read_byte(self.bank, self.pc.wrapping_add(1))]),
        };
        self.pc = self.pc.wrapping_add(op.width());
        Ok(op)
    }

    fn execute(&mut self, op: Op) -> Result<(), Fault> {
        let operand = self.ir & 0x0FFF;
        let sub = ((self.ir >> 8) & 0xF) as u8;
        match op {
            Op::JP => self.jump(operand),
            Op::JZ => {
                if self.acc == 0 {
                    self.jump(operand);
                }
            }
            Op::JN => {
                if self.acc < 0 {
                    self.jump(operand);
                }
            }
            Op::CN => self.control(sub),
            Op::ADD => {
                let v = self.value(operand);
                self.acc = self.acc.wrapping_add(v);
            }
            Op::SUB => {
                let v = self.value(operand);
                self.acc = self.acc.wrapping_sub(v);
            }
            Op::MUL => {
                let v = self.value(operand);
                self.acc = self.acc.wrapping_mul(v);
            }
            Op::DIV => {
                let v = self.value(operand);
                if v == 0 {
                    return Err(Fault::DivideByZero(self.bank, self.pc));
                }
                self.acc = floor_div(self.acc as i32, v as i32) as i8;
            }
            Op::LD => self.acc = self.value(operand),
            Op::MM => self.store(operand),
            Op::SC => {
                // Single-slot linkage: the return address lives at the head
                // of the callee. Re-entrant calls overwrite it.
                let ret = self.pc;
                self.write_byte(self.bank, operand, (ret >> 8) as u8);
                self.write_byte(self.bank, operand.wrapping_add(1), ret as u8);
                self.pc = operand.wrapping_add(2);
            }
            Op::OS => self.os_call(sub),
            Op::IO => self.io(sub)?,
        }
        Ok(())
    }

    /// Jump-target resolution. An indirect jump follows a big-endian pointer
    /// and may switch banks.
    fn jump(&mut self, operand: u16) {
        if self.indirect {
            let ptr = self.read_word(self.bank, operand);
            self.pc = ptr & 0x0FFF;
            self.bank = (ptr >> 12) as u8;
        } else {
            self.pc = operand;
        }
        self.indirect = false;
    }

    /// Value-operand resolution: the 12-bit field itself (truncated to a
    /// byte) when direct, the byte behind a two-byte pointer when indirect
    /// mode is armed. The flag is single-use.
    fn value(&mut self, operand: u16) -> i8 {
        let v = if self.indirect {
            let ptr = self.read_word(self.bank, operand);
            self.read_byte(self.bank, ptr & 0x0FFF) as i8
        } else {
            operand as u8 as i8
        };
        self.indirect = false;
        v
    }

    fn store(&mut self, operand: u16) {
        let (bank, offset) = if self.indirect {
            let ptr = self.read_word(self.bank, operand);
            ((ptr >> 12) as u8, ptr & 0x0FFF)
        } else {
            (self.bank, operand)
        };
        self.indirect = false;
        let full = (bank as u16) << 12 | offset;
        if full < RESERVED_TOP && self.status != Status::Loading {
            cprintln!(
                "<yellow,bold>warning</>: write to reserved address 0x{:04X}",
                full
            );
        }
        self.write_byte(bank, offset, self.acc as u8);
    }

    fn control(&mut self, sub: u8) {
        match sub {
            // Halt-and-spin: process-level interruption is the only exit,
            // short of the cancel flag used by embedders.
            0 => {
                cprintln!("<yellow,bold>warning</>: machine halted, interrupt the process to stop");
                while !self.cancel.load(Ordering::Relaxed) {
                    std::hint::spin_loop();
                }
                self.status = Status::Halted;
            }
            // Return from interrupt: stub.
            1 => {}
            2 => self.indirect = true,
            _ => cprintln!(
                "<yellow,bold>warning</>: unknown control operation {} at 0x{:01X}{:03X}",
                sub,
                self.bank,
                self.pc
            ),
        }
    }

    fn os_call(&mut self, sub: u8) {
        match sub {
            0x0 => {
                let signed = self.acc;
                let unsigned = self.acc as u8;
                println!("-- Current VM State");
                println!(
                    "ACC => {:#04x} | {:4} | {:#04x} | {:3}",
                    signed, signed, unsigned, unsigned
                );
                println!("CI  => {:#06x} | {:5}", self.pc, self.pc);
            }
            0xF => {
                // A loading machine returns to idle; a running one halts.
                self.status = match self.status {
                    Status::Loading => Status::Idle,
                    _ => Status::Halted,
                };
            }
            _ => cprintln!(
                "<yellow,bold>warning</>: OS call {:X} not implemented, skipping",
                sub
            ),
        }
    }

    fn io(&mut self, sub: u8) -> Result<(), Fault> {
        let slot = (sub & 0b11) as usize;
        match sub >> 2 {
            0b00 => match self.devices.read(slot)? {
                Some(byte) => self.acc = byte as i8,
                // End of stream is a no-op read; the loader relies on this
                // at the tail of a segment.
                None => cprintln!("<yellow,bold>warning</>: end of stream on device {}", slot),
            },
            0b01 => self.devices.write(slot, self.acc as u8)?,
            // Interrupt enable/disable: stubs.
            _ => {}
        }
        Ok(())
    }

    fn read_byte(&self, bank: u8, offset: u16) -> u8 {
        self.mem[(bank & 0xF) as usize][(offset & 0xFFF) as usize]
    }

    fn read_word(&self, bank: u8, offset: u16) -> u16 {
        u16::from_be_bytes([
            self.read_byte(bank, offset),
            self.read_byte(bank, offset.wrapping_add(1)),
        ])
    }

    fn write_byte(&mut self, bank: u8, offset: u16, value: u8) {
        self.mem[(bank & 0xF) as usize][(offset & 0xFFF) as usize] = value;
    }

    fn poke_run(&mut self, start: u16, bytes: &[u8]) {
        let mut addr = start;
        for &b in bytes {
            self.write_byte((addr >> 12) as u8, addr & 0x0FFF, b);
            addr = addr.wrapping_add(1);
        }
    }
}

/// Division truncating toward negative infinity.
fn floor_div(a: i32, b: i32) -> i32 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}
