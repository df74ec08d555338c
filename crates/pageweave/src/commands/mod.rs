//! CLI command implementations

pub mod check;
pub mod dev;
pub mod render;
pub mod resolve;
