use painel_core::{CoreError, FetchOutcome, Record};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

const MESSAGE_KEYS: &[&str] = &["message", "mensagem", "erro", "error"];
const MAX_ERROR_BODY_LEN: usize = 200;

pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    MESSAGE_KEYS.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(ToOwned::to_owned)
    })
}

pub fn decode_collection(body: &[u8]) -> FetchOutcome {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(error) => {
            return FetchOutcome::Malformed(format!(
                "collection body is not valid JSON ({error}): {}",
                truncate_for_error(&String::from_utf8_lossy(body))
            ))
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return FetchOutcome::Malformed(
                    "collection body was an object without a `data` array".to_owned(),
                )
            }
        },
        other => {
            return FetchOutcome::Malformed(format!(
                "collection body was a JSON {} instead of an array",
                json_kind(&other)
            ))
        }
    };

    let total = items.len();
    let records = items
        .into_iter()
        .filter_map(Record::from_value)
        .collect::<Vec<_>>();
    if records.len() != total {
        warn!(
            skipped = total - records.len(),
            "collection contained non-object items; skipping them"
        );
    }
    FetchOutcome::Records(records)
}

pub fn decode_list<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<Vec<T>, CoreError> {
    let value = decode_body(body)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CoreError::MalformedResponse(format!(
                    "{what} response did not contain a list"
                )))
            }
        },
        Value::Null => Vec::new(),
        other => {
            return Err(CoreError::MalformedResponse(format!(
                "{what} response was a JSON {}",
                json_kind(&other)
            )))
        }
    };

    serde_json::from_value(Value::Array(items)).map_err(|error| {
        CoreError::MalformedResponse(format!("failed to decode {what} response: {error}"))
    })
}

pub fn decode_body(body: &[u8]) -> Result<Value, CoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|error| {
        CoreError::MalformedResponse(format!(
            "response body is not valid JSON ({error}): {}",
            truncate_for_error(&String::from_utf8_lossy(body))
        ))
    })
}

// Write endpoints are not required to answer with JSON; plain text is kept as a string.
pub fn decode_write_body(body: &[u8]) -> Value {
    match decode_body(body) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(body).trim().to_owned()),
    }
}

pub fn truncate_for_error(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_LEN {
        body.to_owned()
    } else {
        format!(
            "{}...",
            body.chars().take(MAX_ERROR_BODY_LEN).collect::<String>()
        )
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
