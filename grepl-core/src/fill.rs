//! # Message Filling
//!
//! A filler populates one empty `DynamicMessage` at a time. Message types are only known
//! once a schema has been resolved, so every filler works through `prost-reflect`
//! descriptors instead of generated types.
//!
//! Two implementations are provided:
//!
//! * **[`InteractiveFiller`]**: asks a [`Prompt`] for every field, recursing into nested
//!   messages, looping over repeated and map fields, and asking the user to pick oneof
//!   alternatives and enum values.
//! * **[`JsonFiller`]**: reads one JSON document per message from any reader.
//!
//! ## Outcomes
//!
//! Stopping early is not an error. [`Fill::fill`] resolves to a [`FillOutcome`], so a
//! user who ran out of input or cancelled a prompt can never be mistaken for a failure:
//!
//! * [`FillOutcome::Complete`]: every field was visited.
//! * [`FillOutcome::EndOfInput`]: the input source has nothing more to give.
//! * [`FillOutcome::Aborted`]: the user cancelled, the message holds whatever was set so far.
pub mod cycle;
mod convert;
mod interactive;
mod json;

pub use convert::{ConvertError, decode_escaped_bytes};
pub use interactive::{DIG_DOWN, FINISH, FillOptions, InteractiveFiller};
pub use json::JsonFiller;

use prost_reflect::DynamicMessage;
use std::path::PathBuf;

/// How a fill finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Complete,
    EndOfInput,
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum FillError {
    #[error("Invalid value for field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConvertError,
    },
    #[error("Failed to read bytes for field '{field}' from '{}': {source}", path.display())]
    ReadFile {
        field: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{choice}' is not one of the options for '{field}'")]
    UnknownChoice { field: String, choice: String },
    #[error("Input does not match message '{message}': {source}")]
    InvalidDocument {
        message: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Populates a single message value.
pub trait Fill {
    fn fill(&mut self, message: &mut DynamicMessage) -> Result<FillOutcome, FillError>;
}

/// Control outcomes of a [`Prompt`] read. `Io` is the only real failure.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("end of input")]
    EndOfInput,
    #[error("aborted")]
    Aborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the filler is asking for when it reads a primitive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPrompt {
    /// `ancestor::path::field (type)`
    pub label: String,
    /// Cosmetic cursor, advanced every time a nested message is completed.
    pub color: usize,
    /// Set when an empty answer ends a repeated loop.
    pub repeated: bool,
}

/// The input/selection capability a filler reads from.
///
/// Implementations map "no more input" (e.g. Ctrl-D) to [`PromptError::EndOfInput`] and
/// user cancellation (e.g. Ctrl-C) to [`PromptError::Aborted`].
pub trait Prompt {
    fn input(&mut self, prompt: &FieldPrompt) -> Result<String, PromptError>;

    /// Returns one of `options`.
    fn select(&mut self, message: &str, options: &[String]) -> Result<String, PromptError>;
}

impl<P: Prompt + ?Sized> Prompt for Box<P> {
    fn input(&mut self, prompt: &FieldPrompt) -> Result<String, PromptError> {
        (**self).input(prompt)
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<String, PromptError> {
        (**self).select(message, options)
    }
}

impl<F: Fill + ?Sized> Fill for Box<F> {
    fn fill(&mut self, message: &mut DynamicMessage) -> Result<FillOutcome, FillError> {
        (**self).fill(message)
    }
}
