use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CallableError;

// -- JWT Claims --

/// JWT claims shared by the callable middleware and any token issuer that
/// signs with the same secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Callable envelope --

/// Body of a callable invocation: the payload always travels under `data`.
#[derive(Debug, Deserialize)]
pub struct CallableRequest<T> {
    pub data: T,
}

/// Successful callable response: the handler's value goes under `result`.
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

impl<T> CallableResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

/// Failed callable response: `{ "error": { "status": ..., "message": ... } }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallableErrorResponse {
    pub error: CallableErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallableErrorBody {
    pub status: String,
    pub message: String,
}

impl From<&CallableError> for CallableErrorResponse {
    fn from(err: &CallableError) -> Self {
        Self {
            error: CallableErrorBody {
                status: err.code.status().to_string(),
                message: err.message.clone(),
            },
        }
    }
}

// -- Advisories --

/// Payload of `sendAdvisory`. Unknown fields are ignored.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SendAdvisoryRequest {
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub message: Option<String>,
}

/// `null`, `false` and `0` count as no message; any other non-string is an error.
fn falsy_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(D::Error::custom(format!(
            "message must be a string, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAdvisoryResponse {
    pub success: bool,
}

impl SendAdvisoryResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
