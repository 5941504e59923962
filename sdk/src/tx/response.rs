//! Response interpretation: status and body in, success or typed failure out.
//!
//! Only `200 OK` counts as success. Anything else is a rejection whose
//! message comes from the structured error body, or from a fixed
//! placeholder when that body is missing or unreadable. A body that cannot
//! be read never escapes as a decode error on the failure path.

use serde::de::DeserializeOwned;

use super::error::TxError;
use crate::transport::RestResponse;
use crate::types::HttpResponseErr;

/// Message used when a rejection carries no readable error body.
pub const UNPARSABLE_SERVER_ERROR: &str = "(failed to parse the server's error message)";

/// Extracts the server's error message from a rejection body.
pub fn server_error_message(body: Option<&[u8]>) -> String {
    let Some(body) = body else {
        tracing::error!("server rejected the request without an error body");
        return UNPARSABLE_SERVER_ERROR.to_string();
    };
    match serde_json::from_slice::<HttpResponseErr>(body) {
        Ok(err) => err.message,
        Err(e) => {
            tracing::error!("failed to parse the server's error message, due to {}", e);
            UNPARSABLE_SERVER_ERROR.to_string()
        }
    }
}

/// Succeeds on `200 OK`, otherwise returns [`TxError::ServerRejected`].
pub fn ensure_ok(response: &RestResponse) -> Result<(), TxError> {
    if response.status == reqwest::StatusCode::OK {
        return Ok(());
    }
    Err(TxError::ServerRejected {
        status: response.status,
        message: server_error_message(response.body_bytes()),
    })
}

/// Query path: checks the status, then decodes the body into `T`.
///
/// A body that does not decode is a [`TxError::Decode`], distinct from a
/// rejection: the server said yes but spoke a shape we do not understand.
pub fn decode_body<T: DeserializeOwned>(response: &RestResponse) -> Result<T, TxError> {
    ensure_ok(response)?;
    let body = response.body_bytes().unwrap_or_default();
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!("failed to decode json response, due to {}", e);
        TxError::Decode(e.to_string())
    })
}
