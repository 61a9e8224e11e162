use thiserror::Error;

/// Fatal execution faults. Each one halts the machine; non-fatal conditions
/// are logged as warnings and execution continues.
#[derive(Error, Debug)]
pub enum Fault {
    #[error("bad instruction at address 0x{0:01X}{1:03X}")]
    BadInstruction(u8, u16),

    #[error("device {0} is absent")]
    DeviceAbsent(usize),

    #[error("division by zero at address 0x{0:01X}{1:03X}")]
    DivideByZero(u8, u16),

    #[error("i/o failure on device {0}")]
    DeviceIo(usize, #[source] std::io::Error),

    #[error("bad resident loader image")]
    BadLoaderImage(#[source] std::io::Error),
}
