pub mod obj;
pub mod op;
