use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::warn;

use crate::core::error::{ErrorInfo, NO_ERROR};

const RESERVED: [&str; 4] = ["message", "errorCode", "errorDescription", "state"];

/// Result of a successful protected request.
///
/// Serializes flat, with the provider's claims alongside the envelope fields:
///
/// ```json
/// { "message": { "errorCode": 0, "errorDescription": "" }, "errorCode": 0,
///   "errorDescription": "", "sub": "5485", "name": "N" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope {
    pub message: ErrorInfo,
    pub error_code: u16,
    pub error_description: &'static str,
    /// `state` echoed by the provider on logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Claims returned by the provider, verbatim.
    #[serde(flatten)]
    pub claims: Map<String, Json>,
}

impl SuccessEnvelope {
    /// Wrap provider claims. Claims that would shadow an envelope field are dropped.
    pub fn new(mut claims: Map<String, Json>) -> Self {
        for key in RESERVED {
            if claims.remove(key).is_some() {
                warn!("dropping provider claim '{key}' which collides with the response envelope");
            }
        }

        Self {
            message: NO_ERROR,
            error_code: NO_ERROR.error_code,
            error_description: NO_ERROR.error_description,
            state: None,
            claims,
        }
    }

    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }

    pub fn claim(&self, name: &str) -> Option<&Json> {
        self.claims.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Json::as_str)
    }
}
