use reqwest::header::{HeaderMap, CONTENT_TYPE};

use crate::{translate::APPLICATION_JSON, ClientError, Result};

/// Response body after content-type driven decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// Declared JSON with an empty payload.
    Empty,
    /// Parsed JSON. Numbers keep their exact literal text.
    Json(serde_json::Value),
    /// Anything not declared as JSON, left to the caller.
    Raw(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(_) => false,
            Self::Raw(bytes) => bytes.is_empty(),
        }
    }
}

/// Whether the headers declare a JSON payload.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains(APPLICATION_JSON))
}

/// Decodes `bytes` according to the response `Content-Type`.
pub fn decode_body(bytes: &[u8], headers: &HeaderMap) -> Result<ResponseBody> {
    if !is_json(headers) {
        return Ok(ResponseBody::Raw(bytes.to_vec()));
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponseBody::Empty);
    }

    serde_json::from_slice(bytes)
        .map(ResponseBody::Json)
        .map_err(|err| {
            ClientError::Decode(format!(
                "invalid JSON response body: {err}; body: {}",
                String::from_utf8_lossy(bytes)
            ))
        })
}
