use anyhow::Error;
use serde_json::Value as Json;

use crate::core::object::TypedParameter;

/// Declares a string-valued session parameter stored under `$key`.
macro_rules! string_parameter {
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl TypedParameter for $name {
            const KEY: &'static str = $key;
        }

        impl TryFrom<Json> for $name {
            type Error = Error;

            fn try_from(value: Json) -> Result<Self, Self::Error> {
                Ok(Self(serde_json::from_value(value)?))
            }
        }

        impl From<$name> for Json {
            fn from(value: $name) -> Self {
                Json::String(value.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_parameter!(
    /// Redirect URI registered for the authorization code flow.
    RedirectUri,
    "redirectUri"
);
string_parameter!(ClientId, "clientId");
string_parameter!(ClientSecret, "clientSecret");
string_parameter!(
    /// Authorization code returned by the provider.
    Code,
    "code"
);
string_parameter!(
    /// Opaque bearer token presented to the userinfo endpoint.
    AccessToken,
    "accessToken"
);
string_parameter!(
    /// Compact-serialized identity token (JWT).
    IdToken,
    "idToken"
);
string_parameter!(RefreshToken, "refreshToken");
string_parameter!(TokenType, "tokenType");
string_parameter!(ExpiresIn, "expiresIn");
string_parameter!(
    /// URL-encoded, space-separated scope list, e.g. `personal_info%20email`.
    Scope,
    "scope"
);
string_parameter!(
    /// Where the provider sends the user agent after logout.
    PostLogoutRedirectUri,
    "postLogoutRedirectUri"
);
string_parameter!(
    /// Opaque value echoed back by the provider on logout.
    State,
    "state"
);

/// Selects the production provider instead of the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production(pub bool);

impl TypedParameter for Production {
    const KEY: &'static str = "production";
}

impl TryFrom<Json> for Production {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            Json::Bool(b) => Ok(Self(b)),
            other => anyhow::bail!("expected a boolean, found {other}"),
        }
    }
}

impl From<Production> for Json {
    fn from(value: Production) -> Self {
        Json::Bool(value.0)
    }
}
