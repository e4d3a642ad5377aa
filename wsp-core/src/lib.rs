//! Foundation crate for the `wsp` workspace provisioner.
//!
//! Holds the pieces every other crate leans on: the shared error type,
//! output macros, the on-disk layout under the user's config directory,
//! input validation, workspace metadata and process streaming.

pub mod command_stream;
pub mod error;
pub mod output_macros;
pub mod user_paths;
pub mod validation;
pub mod workspace;

pub use error::{Result, WspError};
