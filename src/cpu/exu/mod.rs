//! Execution units split by ISA modules
pub mod rv32i;
pub mod rv32m;
