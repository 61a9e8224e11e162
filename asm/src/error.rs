use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("line {0}: unknown operation `{1}`")]
    UnknownOperation(usize, String),

    #[error("line {0}: label `{1}` already defined")]
    DuplicateLabel(usize, String),

    #[error("line {0}: undefined label `{1}`")]
    UndefinedLabel(usize, String),

    #[error("line {0}: operation `{1}` must have an operand")]
    MissingOperand(usize, String),

    #[error("line {0}: operation `{1}` in label position")]
    OperationAsLabel(usize, String),

    #[error("line {0}: `{1}` operand must be an integer")]
    OperandNotInteger(usize, String),

    #[error("line {0}: operand {1} out of range for `{2}`")]
    OperandRange(usize, i32, String),

    #[error("line {0}: cannot parse operand `{1}`")]
    BadOperand(usize, String),

    #[error("line {0}: too many tokens")]
    TooManyTokens(usize),

    #[error("line {0}: non-ASCII character in source")]
    NonAscii(usize),

    #[error("failed to read `{0}`")]
    FileRead(String, #[source] std::io::Error),

    #[error("failed to write `{0}`")]
    FileWrite(String, #[source] std::io::Error),
}

impl Error {
    /// Source line the error refers to, when there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::UnknownOperation(n, _)
            | Error::DuplicateLabel(n, _)
            | Error::UndefinedLabel(n, _)
            | Error::MissingOperand(n, _)
            | Error::OperationAsLabel(n, _)
            | Error::OperandNotInteger(n, _)
            | Error::OperandRange(n, _, _)
            | Error::BadOperand(n, _)
            | Error::TooManyTokens(n)
            | Error::NonAscii(n) => Some(*n),
            Error::FileRead(..) | Error::FileWrite(..) => None,
        }
    }
}
