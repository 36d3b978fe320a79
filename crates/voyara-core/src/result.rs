//! Result type aliases for Voyara.

use crate::VoyaraError;

/// A specialized `Result` type for Voyara operations.
pub type VoyaraResult<T> = Result<T, VoyaraError>;
