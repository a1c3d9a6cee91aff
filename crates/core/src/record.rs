// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, fixed-schema field map for stage arguments and outputs.
//!
//! A [`Record`] is decoded from one metadata document (`args`, `outs`, one
//! element of `chunk_defs` or `chunk_outs`). Its field set is frozen at
//! construction: stage code may overwrite values but never add fields, so a
//! typo in an output name fails loudly instead of silently dropping data.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors constructing or mutating a [`Record`]
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has an unexpected type: {source}")]
    FieldType {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fixed set of named JSON values, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Build a record from a decoded document.
    ///
    /// `null` decodes to an empty record (stages without outputs); any other
    /// non-object is rejected.
    pub fn from_document(document: Value) -> Result<Self, RecordError> {
        match document {
            Value::Object(map) => Ok(Self { fields: map.into_iter().collect() }),
            Value::Null => Ok(Self::default()),
            other => Err(RecordError::NotAnObject(json_kind(&other))),
        }
    }

    /// Check the field set against a declared schema.
    ///
    /// Unknown fields are reported before missing ones, in document order.
    pub fn with_schema(self, expected: &[&str]) -> Result<Self, RecordError> {
        if let Some(unknown) = self.fields.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(RecordError::UnknownField(unknown.clone()));
        }
        if let Some(missing) = expected.iter().find(|name| !self.fields.contains_key(**name)) {
            return Err(RecordError::MissingField((*missing).to_string()));
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Value of a field, if the record has it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Deserialize a field into a concrete type.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, RecordError> {
        let value = self.get(name).ok_or_else(|| RecordError::MissingField(name.to_string()))?;
        T::deserialize(value)
            .map_err(|source| RecordError::FieldType { field: name.to_string(), source })
    }

    /// Overwrite an existing field. Adding fields is rejected.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(RecordError::UnknownField(name.to_string())),
        }
    }

    /// Serialize a value into an existing field.
    pub fn set_as<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), RecordError> {
        let value = serde_json::to_value(value)?;
        self.set(name, value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self { fields })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("{..}"),
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
