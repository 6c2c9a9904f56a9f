//! Error handling foundation for lucy.
//!
//! Crates define their own error enums and carry them inside a rootcause
//! `Report`. This module only provides the shared `Result` alias.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
