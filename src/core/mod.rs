//! Core types for the authorization library
//!
//! This module provides the fundamental types used throughout the library:
//! - `ToolCall` - A candidate action proposed by the agent
//! - `GuardError` / `ShellParseError` - Error types

pub mod call;
pub mod error;

pub use call::ToolCall;
pub use error::{GuardError, GuardResult, ShellParseError};
