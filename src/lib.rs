//! Crate root.

pub mod chain;
pub mod config;
pub mod crypto;
pub mod emission;
pub mod error;
pub mod mempool;
pub mod plot;
pub mod proof;
pub mod transaction;

pub use error::{Result, ShadowyError};
