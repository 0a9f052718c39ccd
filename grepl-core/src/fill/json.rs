//! # JSON Filler
//!
//! Machine input: each call to [`Fill::fill`] consumes the next JSON document from the
//! reader (documents may be separated by any whitespace) and maps it onto the message with
//! `prost-reflect`'s serde support. An exhausted reader is [`FillOutcome::EndOfInput`].
use super::{Fill, FillError, FillOutcome};
use prost_reflect::{DynamicMessage, ReflectMessage};
use serde_json::{Deserializer, Value, de::IoRead};
use std::io::Read;

pub struct JsonFiller<R: Read> {
    documents: serde_json::StreamDeserializer<'static, IoRead<R>, Value>,
}

impl<R: Read> JsonFiller<R> {
    pub fn new(reader: R) -> Self {
        Self {
            documents: Deserializer::from_reader(reader).into_iter(),
        }
    }
}

impl<R: Read> Fill for JsonFiller<R> {
    fn fill(&mut self, message: &mut DynamicMessage) -> Result<FillOutcome, FillError> {
        let descriptor = message.descriptor();
        let invalid = |source| FillError::InvalidDocument {
            message: descriptor.full_name().to_string(),
            source,
        };

        let Some(document) = self.documents.next() else {
            return Ok(FillOutcome::EndOfInput);
        };
        let document = document.map_err(invalid)?;

        *message = DynamicMessage::deserialize(descriptor.clone(), document).map_err(invalid)?;
        Ok(FillOutcome::Complete)
    }
}
