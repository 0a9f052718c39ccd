//! # Interactive Filler
//!
//! Builds a message by asking a [`Prompt`] for every field, in declaration order.
//!
//! * **Repeated fields** loop over the single-field logic until the input ends. An empty
//!   answer right after a non-empty one ends the loop; a second empty answer in a row is a
//!   plain default value, so that closing an inner loop does not also close the outer one.
//! * **Map fields** loop like a repeated message of key/value entries.
//! * **Oneofs** ask which alternative to fill the first time one of their fields comes up,
//!   and skip the remaining alternatives of the same message instance.
//! * **Enums** ask for a value name and store its number.
//! * **Messages** recurse into a fresh instance. When the field is circulated (see
//!   [`super::cycle`]) the user first chooses between digging down and finishing.
use super::{
    ConvertError, Fill, FillError, FillOutcome, FieldPrompt, Prompt, PromptError,
    convert::{convert_scalar, decode_escaped_bytes, into_map_key, type_name},
    cycle::CycleDetector,
};
use prost::bytes::Bytes;
use prost_reflect::{
    DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, OneofDescriptor, ReflectMessage, Value,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

pub const DIG_DOWN: &str = "dig down";
pub const FINISH: &str = "finish";

#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    /// Treat the (unescaped) input of byte fields as a path and read the file content.
    pub bytes_from_file: bool,
}

/// A [`Fill`] implementation driven by a [`Prompt`].
#[derive(Debug)]
pub struct InteractiveFiller<P> {
    prompt: P,
    options: FillOptions,
}

impl<P: Prompt> InteractiveFiller<P> {
    pub fn new(prompt: P) -> Self {
        Self::with_options(prompt, FillOptions::default())
    }

    pub fn with_options(prompt: P, options: FillOptions) -> Self {
        Self { prompt, options }
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn into_prompt(self) -> P {
        self.prompt
    }
}

impl<P: Prompt> Fill for InteractiveFiller<P> {
    fn fill(&mut self, message: &mut DynamicMessage) -> Result<FillOutcome, FillError> {
        let mut session = FillSession::new(&mut self.prompt, &self.options);

        match session.fill_message(message) {
            Ok(()) => Ok(FillOutcome::Complete),
            Err(Stop::EndOfInput) => Ok(FillOutcome::EndOfInput),
            Err(Stop::Aborted) => Ok(FillOutcome::Aborted),
            Err(Stop::Failed(err)) => Err(err),
        }
    }
}

/// Why the current message or loop stopped before its last field.
#[derive(Debug)]
enum Stop {
    EndOfInput,
    Aborted,
    Failed(FillError),
}

impl From<PromptError> for Stop {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::EndOfInput => Stop::EndOfInput,
            PromptError::Aborted => Stop::Aborted,
            PromptError::Io(err) => Stop::Failed(FillError::Io(err)),
        }
    }
}

impl From<FillError> for Stop {
    fn from(err: FillError) -> Self {
        Stop::Failed(err)
    }
}

/// Per-message state, snapshotted before descending into a nested message and restored
/// afterwards so that sibling subtrees never see each other's choices.
#[derive(Debug, Clone, Default)]
struct Scope {
    ancestors: Vec<String>,
    color: usize,
    resolved_oneofs: HashSet<String>,
    in_repeated: bool,
}

/// State of one top-level fill.
struct FillSession<'a, P> {
    prompt: &'a mut P,
    options: &'a FillOptions,
    scope: Scope,
    cycles: CycleDetector,
    /// The previous answer was an empty token that ended a loop.
    terminated: bool,
}

impl<'a, P: Prompt> FillSession<'a, P> {
    fn new(prompt: &'a mut P, options: &'a FillOptions) -> Self {
        Self {
            prompt,
            options,
            scope: Scope::default(),
            cycles: CycleDetector::new(),
            terminated: false,
        }
    }

    fn fill_message(&mut self, message: &mut DynamicMessage) -> Result<(), Stop> {
        let descriptor = message.descriptor();

        for field in descriptor.fields() {
            match field.containing_oneof().filter(|o| !o.is_synthetic()) {
                Some(oneof) if self.scope.resolved_oneofs.contains(oneof.full_name()) => {}
                Some(oneof) => {
                    let chosen = self.select_oneof(&oneof)?;
                    self.fill_field(message, &chosen)?;
                }
                None => self.fill_field(message, &field)?,
            }
        }

        Ok(())
    }

    fn fill_field(
        &mut self,
        message: &mut DynamicMessage,
        field: &FieldDescriptor,
    ) -> Result<(), Stop> {
        if field.is_map() {
            return self.fill_map(message, field);
        }
        if field.is_list() {
            return self.fill_repeated(message, field);
        }

        match field.kind() {
            Kind::Message(descriptor) => {
                if !self.dig_down(field)? {
                    return Ok(());
                }
                let mut child = DynamicMessage::new(descriptor);
                let result = self.descend(field, false, &mut child);
                message.set_field(field, Value::Message(child));
                result
            }
            Kind::Enum(descriptor) => {
                let value = self.select_enum(field, &descriptor)?;
                message.set_field(field, value);
                Ok(())
            }
            kind => {
                let value = self.read_scalar(field, &kind, false)?;
                message.set_field(field, value);
                Ok(())
            }
        }
    }

    fn fill_repeated(
        &mut self,
        message: &mut DynamicMessage,
        field: &FieldDescriptor,
    ) -> Result<(), Stop> {
        let mut items = Vec::new();

        let result = loop {
            match self.read_element(field, &mut items) {
                Ok(true) => {}
                Ok(false) | Err(Stop::EndOfInput) => break Ok(()),
                Err(stop) => break Err(stop),
            }
        };

        if !items.is_empty() {
            message.set_field(field, Value::List(items));
        }
        result
    }

    /// Reads one element of a repeated field into `items`. Returns `false` when the user
    /// chose to finish a circulated message loop.
    fn read_element(
        &mut self,
        field: &FieldDescriptor,
        items: &mut Vec<Value>,
    ) -> Result<bool, Stop> {
        match field.kind() {
            Kind::Message(descriptor) => {
                if !self.dig_down(field)? {
                    return Ok(false);
                }
                let mut child = DynamicMessage::new(descriptor);
                match self.descend(field, true, &mut child) {
                    Ok(()) => items.push(Value::Message(child)),
                    Err(Stop::Aborted) => {
                        items.push(Value::Message(child));
                        return Err(Stop::Aborted);
                    }
                    Err(stop) => return Err(stop),
                }
            }
            Kind::Enum(descriptor) => items.push(self.select_enum(field, &descriptor)?),
            kind => items.push(self.read_scalar(field, &kind, true)?),
        }
        Ok(true)
    }

    fn fill_map(&mut self, message: &mut DynamicMessage, field: &FieldDescriptor) -> Result<(), Stop> {
        let Kind::Message(entry) = field.kind() else {
            return Ok(());
        };
        let key_field = entry.map_entry_key_field();
        let value_field = entry.map_entry_value_field();
        let mut map = HashMap::new();

        let result = loop {
            let mut item = DynamicMessage::new(entry.clone());
            match self.descend(field, true, &mut item) {
                Ok(()) => {}
                Err(Stop::EndOfInput) => break Ok(()),
                Err(stop) => break Err(stop),
            }

            if let Some(key) = into_map_key(item.get_field(&key_field).into_owned()) {
                map.insert(key, item.get_field(&value_field).into_owned());
            }
        };

        if !map.is_empty() {
            message.set_field(field, Value::Map(map));
        }
        result
    }

    fn descend(
        &mut self,
        field: &FieldDescriptor,
        repeated: bool,
        child: &mut DynamicMessage,
    ) -> Result<(), Stop> {
        let saved = self.scope.clone();
        self.scope.ancestors.push(field.name().to_string());
        self.scope.resolved_oneofs.clear();
        self.scope.in_repeated = repeated;

        let result = self.fill_message(child);

        self.scope = saved;
        self.scope.color = self.scope.color.wrapping_add(1);
        result
    }

    /// Asks whether to recurse into a circulated message field. Non circulated fields are
    /// always dug into.
    fn dig_down(&mut self, field: &FieldDescriptor) -> Result<bool, Stop> {
        let Some(chain) = self.cycles.cycle_of(field) else {
            return Ok(true);
        };

        let message = format!(
            "circulated field was found: {} ({}). dig down or finish?",
            field.name(),
            chain.join(" -> ")
        );
        let choice = self
            .prompt
            .select(&message, &[DIG_DOWN.to_string(), FINISH.to_string()])?;

        Ok(choice == DIG_DOWN)
    }

    fn select_oneof(&mut self, oneof: &OneofDescriptor) -> Result<FieldDescriptor, Stop> {
        let options: Vec<String> = oneof.fields().map(|f| f.name().to_string()).collect();
        let choice = self.prompt.select(oneof.name(), &options)?;

        let field = oneof
            .fields()
            .find(|f| f.name() == choice)
            .ok_or_else(|| FillError::UnknownChoice {
                field: oneof.full_name().to_string(),
                choice,
            })?;

        self.scope
            .resolved_oneofs
            .insert(oneof.full_name().to_string());
        Ok(field)
    }

    fn select_enum(
        &mut self,
        field: &FieldDescriptor,
        descriptor: &EnumDescriptor,
    ) -> Result<Value, Stop> {
        let label = self.label(field);
        let options: Vec<String> = descriptor.values().map(|v| v.name().to_string()).collect();
        let choice = self.prompt.select(&label, &options)?;

        let value = descriptor
            .get_value_by_name(&choice)
            .ok_or_else(|| FillError::UnknownChoice {
                field: field.full_name().to_string(),
                choice,
            })?;

        Ok(Value::EnumNumber(value.number()))
    }

    fn read_scalar(
        &mut self,
        field: &FieldDescriptor,
        kind: &Kind,
        repeated: bool,
    ) -> Result<Value, Stop> {
        let prompt = FieldPrompt {
            label: self.label(field),
            color: self.scope.color,
            repeated: repeated || self.scope.in_repeated,
        };
        let token = self.prompt.input(&prompt)?;

        if token.is_empty() && prompt.repeated && !self.terminated {
            self.terminated = true;
            return Err(Stop::EndOfInput);
        }
        self.terminated = false;

        if matches!(kind, Kind::Bytes) && self.options.bytes_from_file && !token.is_empty() {
            return self.read_file(field, &token);
        }

        convert_scalar(kind, &token).map_err(|source| conversion(field, source))
    }

    fn read_file(&self, field: &FieldDescriptor, token: &str) -> Result<Value, Stop> {
        let decoded = decode_escaped_bytes(token).map_err(|source| conversion(field, source))?;
        let path = PathBuf::from(String::from_utf8_lossy(&decoded).into_owned());

        let content = std::fs::read(&path).map_err(|source| FillError::ReadFile {
            field: field.full_name().to_string(),
            path,
            source,
        })?;

        Ok(Value::Bytes(Bytes::from(content)))
    }

    fn label(&self, field: &FieldDescriptor) -> String {
        let mut label = String::new();
        if field.is_list() {
            label.push_str("<repeated> ");
        }
        for ancestor in &self.scope.ancestors {
            label.push_str(ancestor);
            label.push_str("::");
        }
        label.push_str(field.name());
        label.push_str(&format!(" ({})", type_name(&field.kind())));
        label
    }
}

fn conversion(field: &FieldDescriptor, source: ConvertError) -> Stop {
    Stop::Failed(FillError::Conversion {
        field: field.full_name().to_string(),
        source,
    })
}
