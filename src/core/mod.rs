//! # Core Module
//!
//! Fundamental types shared by every subsystem of the streaming engine.
//!
//! ## Key Components
//! - `StreamError`: the crate-wide error enum
//! - `Result`: alias over `std::result::Result<T, StreamError>`

pub mod error;

pub use error::{Result, StreamError};
