use serde::{Serialize, Serializer};

/// Machine-readable code and human description of an outcome.
///
/// This is the shape every taxonomy member takes on the wire, and the shape of
/// the `message` field of a [SuccessEnvelope](crate::client::response::SuccessEnvelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub error_code: u16,
    pub error_description: &'static str,
}

/// Success marker carried by response envelopes.
pub const NO_ERROR: ErrorInfo = ErrorInfo {
    error_code: 0,
    error_description: "",
};

/// The closed set of failures surfaced by the session core.
///
/// Members are compared by identity (or [Error::code]), never by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request to the identity provider failed.
    #[error("the request to the identity provider failed")]
    FailedRequest,

    /// The access token is missing, malformed, or rejected by the provider.
    #[error("the access token is missing, malformed, or was rejected")]
    InvalidToken,

    /// The identity token is missing or could not be decoded.
    #[error("the identity token is missing or could not be decoded")]
    InvalidIdToken,

    /// Logout requires an identity token to use as `id_token_hint`.
    #[error("the identity token required as logout hint is missing")]
    InvalidIdTokenHint,

    /// Logout requires a post-logout redirect URI.
    #[error("the post-logout redirect URI is missing")]
    InvalidPostLogoutRedirectUri,

    /// The `production` flag was not a boolean.
    #[error("the production flag must be a boolean")]
    InvalidProduction,

    /// The userinfo response did not carry a subject.
    #[error("the userinfo response did not contain a subject")]
    InvalidSub,

    /// The logout response did not land on the expected endpoint.
    #[error("the logout response URL does not match the logout endpoint")]
    InvalidUrlLogout,

    /// A session parameter was supplied with the wrong type.
    #[error("a session parameter has an invalid type")]
    InvalidParameter,
}

impl Error {
    pub const fn code(&self) -> u16 {
        match self {
            Error::FailedRequest => 1,
            Error::InvalidToken => 2,
            Error::InvalidIdToken => 3,
            Error::InvalidIdTokenHint => 4,
            Error::InvalidPostLogoutRedirectUri => 5,
            Error::InvalidProduction => 6,
            Error::InvalidSub => 7,
            Error::InvalidUrlLogout => 8,
            Error::InvalidParameter => 9,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Error::FailedRequest => "The request to the identity provider failed",
            Error::InvalidToken => "Invalid access token",
            Error::InvalidIdToken => "Invalid identity token",
            Error::InvalidIdTokenHint => "Invalid id_token_hint",
            Error::InvalidPostLogoutRedirectUri => "Invalid post_logout_redirect_uri",
            Error::InvalidProduction => "Invalid production flag, expected a boolean",
            Error::InvalidSub => "Invalid sub in userinfo response",
            Error::InvalidUrlLogout => "Logout response URL does not match the logout endpoint",
            Error::InvalidParameter => "Invalid session parameter",
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            error_code: self.code(),
            error_description: self.description(),
        }
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.info().serialize(serializer)
    }
}
