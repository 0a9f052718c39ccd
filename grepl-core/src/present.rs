//! # Presentation
//!
//! Turns response messages into text for the output sink.
use prost_reflect::{DynamicMessage, SerializeOptions};

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("Failed to map response to JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Response is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Formats one response message.
pub trait Presenter {
    fn format(&self, message: &DynamicMessage) -> Result<String, PresentError>;
}

/// Renders messages as pretty-printed, canonical protobuf JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonPresenter {
    emit_defaults: bool,
}

impl JsonPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print fields that hold their default value.
    pub fn emit_defaults(mut self, emit_defaults: bool) -> Self {
        self.emit_defaults = emit_defaults;
        self
    }
}

impl Presenter for JsonPresenter {
    fn format(&self, message: &DynamicMessage) -> Result<String, PresentError> {
        let options = SerializeOptions::new().skip_default_fields(!self.emit_defaults);
        let mut serializer = serde_json::Serializer::pretty(Vec::new());
        message.serialize_with_options(&mut serializer, &options)?;
        Ok(String::from_utf8(serializer.into_inner())?)
    }
}
