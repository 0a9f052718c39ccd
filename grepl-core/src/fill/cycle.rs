//! # Cycle Detection
//!
//! Message types can refer to each other through message-typed fields (`A { B b }`,
//! `B { A a }`), so blindly recursing into every nested message would never end. Before
//! descending into a message field, the filler asks the [`CycleDetector`] whether the
//! field is *circulated*.
//!
//! The walk is a depth-first search starting at the candidate field. It marks a type when
//! it enters it and unmarks it when it leaves, using a visited set that belongs to the
//! current walk only. A field that leads back to a type already on the path gets the chain
//! of fields since that type's first occurrence recorded under its own fully qualified
//! name. A field is circulated when such a chain exists for it, so two fields of the same
//! type can be classified differently (`Outer { Inner i }`, `Inner { Inner next }`: only
//! `next` is circulated).
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    /// Field name -> chain of field names leading from a type back to itself through it.
    cycles: HashMap<String, Vec<String>>,
    /// Fields a walk has already started from.
    walked: HashSet<String>,
}

impl CycleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chain of field names that leads from the type of `field` back to itself,
    /// or `None` when the field is not message-typed or not circulated.
    pub fn cycle_of(&mut self, field: &FieldDescriptor) -> Option<&[String]> {
        let Kind::Message(message) = field.kind() else {
            return None;
        };

        if self.walked.insert(field.full_name().to_string()) {
            let mut walk = Walk::default();
            walk.enter(field, &message);
            walk.visit(&message, &mut self.cycles);
        }

        self.cycles.get(field.full_name()).map(Vec::as_slice)
    }

    pub fn is_circulated(&mut self, field: &FieldDescriptor) -> bool {
        self.cycle_of(field).is_some()
    }
}

#[derive(Default)]
struct Walk {
    visited: HashSet<String>,
    /// Fields producing the current path.
    fields: Vec<String>,
    /// Type entered by each field of `fields`.
    types: Vec<String>,
}

impl Walk {
    fn enter(&mut self, field: &FieldDescriptor, message: &MessageDescriptor) {
        self.visited.insert(message.full_name().to_string());
        self.fields.push(field.name().to_string());
        self.types.push(message.full_name().to_string());
    }

    fn leave(&mut self) {
        self.fields.pop();
        if let Some(name) = self.types.pop() {
            self.visited.remove(&name);
        }
    }

    fn visit(&mut self, message: &MessageDescriptor, cycles: &mut HashMap<String, Vec<String>>) {
        for field in message.fields() {
            let Kind::Message(child) = field.kind() else {
                continue;
            };

            if self.visited.contains(child.full_name()) {
                if let Some(start) = self.types.iter().position(|t| t == child.full_name()) {
                    let mut chain = self.fields[start..].to_vec();
                    chain.push(field.name().to_string());
                    cycles.entry(field.full_name().to_string()).or_insert(chain);
                }
                continue;
            }

            self.enter(&field, &child);
            self.visit(&child, cycles);
            self.leave();
        }
    }
}
