//! Top-level command families.

pub mod shell;
pub mod tools;
