//! View layer error types

use thiserror::Error;

/// Page rendering errors
#[derive(Debug, Error)]
pub enum ViewError {
    /// A bundled template failed to parse
    #[error("Template load error: {0}")]
    Load(String),

    /// Template rendering error, with the full cause chain flattened in
    #[error("Template error: {0}")]
    Template(String),
}
