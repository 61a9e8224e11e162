pub mod assembler;
pub mod error;
pub mod label;
pub mod output;
pub mod parser;
