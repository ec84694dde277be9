pub mod cfg;
pub mod check;
pub mod config;
pub mod global;
pub mod infer;
