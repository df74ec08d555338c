//! `pageweave.toml` configuration

pub mod consts;
mod model;

pub use model::*;
