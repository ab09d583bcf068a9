// This module gathers the infrastructure shared by every layer of mlgen: the error taxonomy
// (CodegenError and the CodegenResult alias) and the arena-based generation session that
// interns names and records statistics for one pass. Nothing here knows about targets
// or output languages.

//! Core mlgen infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - One `thiserror` enum for every failure of a generation pass
//!
//! ## Session Management (`session`)
//! - Arena-based string interning using `bumpalo`
//! - Generation statistics

pub mod error;
pub mod session;

pub use error::{CodegenError, CodegenResult};
pub use session::{GenerationSession, SessionStats};
