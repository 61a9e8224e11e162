use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumString};

/// BK16 operations. The discriminant is the opcode nibble; 0xD-0xF are
/// unassigned and fail conversion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, EnumString, Display,
)]
#[repr(u8)]
pub enum Op {
    JP = 0x0,
    JZ = 0x1,
    JN = 0x2,
    CN = 0x3,
    #[strum(serialize = "+")]
    ADD = 0x4,
    #[strum(serialize = "-")]
    SUB = 0x5,
    #[strum(serialize = "*")]
    MUL = 0x6,
    #[strum(serialize = "/")]
    DIV = 0x7,
    LD = 0x8,
    MM = 0x9,
    SC = 0xA,
    OS = 0xB,
    IO = 0xC,
}

impl Op {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    /// Encoded width in bytes. CN, OS and IO pack their operand into the
    /// second nibble; everything else carries a 12-bit operand field.
    pub fn width(self) -> u16 {
        match self {
            Op::CN | Op::OS | Op::IO => 1,
            _ => 2,
        }
    }

    /// Encode with the operand masked to the field width. Two-byte forms are
    /// emitted big-endian.
    pub fn encode(self, operand: i32) -> Vec<u8> {
        let opcode = u8::from(self);
        match self.width() {
            1 => vec![opcode << 4 | (operand as u8 & 0x0F)],
            _ => {
                let word = (opcode as u16) << 12 | (operand as u16 & 0x0FFF);
                word.to_be_bytes().to_vec()
            }
        }
    }
}
