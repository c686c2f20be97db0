pub mod attitude;
pub mod config;
pub mod control;
pub mod dynamics;
pub mod error;
pub mod scene;
pub mod sim;

pub use error::{Error, Result};
