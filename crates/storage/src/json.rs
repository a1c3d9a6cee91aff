// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON encoding for metadata documents.
//!
//! Documents are indented with four spaces. Non-finite floats have no JSON
//! representation and are written as `null` at any depth; serde_json's
//! serializer already does this for `f64` fields and `Value` cannot hold them.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;

const INDENT: &[u8] = b"    ";

/// Serialize `value` as 4-space indented JSON.
pub fn to_pretty_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8
    String::from_utf8(buf).map_err(|e| serde::ser::Error::custom(e.to_string()))
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
