#![doc = include_str!("../README.md")]

pub mod core;
pub mod error;
pub mod fmt;
pub mod io;
pub mod prelude;
pub mod quantity;
pub mod scenario;
pub mod simulation;
pub mod tables;

pub use crate::error::{Error, Result};
