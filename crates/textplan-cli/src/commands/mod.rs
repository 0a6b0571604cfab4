pub mod check;
pub mod compile;
pub mod decompile;
pub mod dump;
pub mod input;
pub mod run_common;
