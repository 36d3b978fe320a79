//! # Voyara Core
//!
//! Core types and error definitions for the Voyara travel platform.
//! This crate provides the foundational pieces shared by the cache,
//! configuration and command-line layers.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
