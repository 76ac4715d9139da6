pub mod classify;
pub mod config;
pub mod extract;
pub mod value;
