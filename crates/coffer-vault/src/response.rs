// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON response envelope for vault results.
//!
//! Success: `{"success": true, ...fields}`. Failure: `{"success": false, "error": "..."}`.

use coffer_core::VaultError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Render a manager result as a flat JSON object with a `success` flag.
pub fn envelope<T: Serialize>(result: &Result<T, VaultError>) -> Value {
    match result {
        Ok(payload) => match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => {
                let mut out = Map::with_capacity(fields.len() + 1);
                out.insert("success".to_string(), Value::Bool(true));
                out.extend(fields);
                Value::Object(out)
            }
            Ok(other) => {
                let mut out = Map::new();
                out.insert("success".to_string(), Value::Bool(true));
                out.insert("result".to_string(), other);
                Value::Object(out)
            }
            Err(_) => failure(&VaultError::Failed),
        },
        Err(err) => failure(err),
    }
}

fn failure(err: &VaultError) -> Value {
    serde_json::json!({
        "success": false,
        "error": err.to_string(),
    })
}
