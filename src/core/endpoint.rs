//! Environment-dependent endpoint and transport-security selection.
//!
//! Sandbox traffic is pinned to a known test certificate, with public-key pinning on iOS.
//! Production traffic disables client-side pinning and relies on standard CA trust. This
//! asymmetry is an environment policy and must not be changed without a change in
//! requirements.

use anyhow::{Context, Result};
use serde::{ser::SerializeMap, Serialize, Serializer};
use tracing::debug;
use url::Url;

use crate::{config::Config, core::session::Session};

const USERINFO_PATH: &str = "oidc/v1/userinfo";
const LOGOUT_PATH: &str = "oidc/v1/logout";

/// Mobile platform the session core runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Other,
}

impl Platform {
    /// The platform this crate was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Other
        }
    }
}

/// Certificate pinning configuration.
///
/// Serializes as `false` or `{ "certs": [...] }`, the shape native pinning bridges expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SslPinning {
    Disabled,
    /// Names of the bundled certificates the connection must present.
    Certs(Vec<String>),
}

impl Serialize for SslPinning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SslPinning::Disabled => serializer.serialize_bool(false),
            SslPinning::Certs(certs) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("certs", certs)?;
                map.end()
            }
        }
    }
}

/// Transport-security settings passed to the [PinnedHttpClient](crate::core::util::PinnedHttpClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    pub disable_all_security: bool,
    pub pk_pinning: bool,
    pub ssl_pinning: SslPinning,
}

impl SecurityProfile {
    /// Certificate pinning, plus public-key pinning where the platform supports it.
    pub fn pinned(certs: Vec<String>, platform: Platform) -> Self {
        Self {
            disable_all_security: false,
            pk_pinning: platform == Platform::Ios,
            ssl_pinning: SslPinning::Certs(certs),
        }
    }

    /// No client-side pinning.
    pub fn unpinned() -> Self {
        Self {
            disable_all_security: true,
            pk_pinning: false,
            ssl_pinning: SslPinning::Disabled,
        }
    }
}

/// A provider URL together with the security profile it must be requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub url: Url,
    pub security: SecurityProfile,
}

/// Picks the sandbox or production provider for a session.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    config: Config,
    platform: Platform,
}

impl EndpointResolver {
    pub fn new(config: Config, platform: Platform) -> Self {
        Self { config, platform }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn security(&self, production: bool) -> SecurityProfile {
        if production {
            SecurityProfile::unpinned()
        } else {
            SecurityProfile::pinned(self.config.certificates.clone(), self.platform)
        }
    }

    fn resolve(&self, production: bool, path: &str) -> Result<ResolvedEndpoint> {
        let base = if production {
            &self.config.production
        } else {
            &self.config.sandbox
        };

        let url = base
            .join(path)
            .with_context(|| format!("unable to join '{path}' to provider base url"))?;

        debug!(production, "resolved provider endpoint {url}");

        Ok(ResolvedEndpoint {
            url,
            security: self.security(production),
        })
    }

    /// The userinfo endpoint.
    pub fn userinfo(&self, production: bool) -> Result<ResolvedEndpoint> {
        self.resolve(production, USERINFO_PATH)
    }

    /// The logout endpoint for `session`, including its `id_token_hint`,
    /// `post_logout_redirect_uri`, and (when set) `state` query parameters.
    pub fn logout(&self, session: &Session) -> Result<ResolvedEndpoint> {
        let mut endpoint = self.resolve(session.production, LOGOUT_PATH)?;

        {
            let mut query = endpoint.url.query_pairs_mut();
            query
                .append_pair("id_token_hint", &session.id_token)
                .append_pair("post_logout_redirect_uri", &session.post_logout_redirect_uri);
            if !session.state.is_empty() {
                query.append_pair("state", &session.state);
            }
        }

        Ok(endpoint)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn resolver(platform: Platform) -> EndpointResolver {
        EndpointResolver::new(Config::default(), platform)
    }

    #[test]
    fn sandbox_is_pinned() {
        let endpoint = resolver(Platform::Android).userinfo(false).unwrap();
        assert_eq!(
            endpoint.url.as_str(),
            "https://auth-testing.iduruguay.gub.uy/oidc/v1/userinfo"
        );
        assert_eq!(
            serde_json::to_value(&endpoint.security).unwrap(),
            json!({
                "disableAllSecurity": false,
                "pkPinning": false,
                "sslPinning": { "certs": ["certificate"] },
            })
        );
    }

    #[test]
    fn public_key_pinning_only_on_ios() {
        assert!(resolver(Platform::Ios).security(false).pk_pinning);
        assert!(!resolver(Platform::Android).security(false).pk_pinning);
        assert!(!resolver(Platform::Other).security(false).pk_pinning);
        assert!(!resolver(Platform::Ios).security(true).pk_pinning);
    }

    #[test]
    fn production_is_unpinned() {
        let endpoint = resolver(Platform::Ios).userinfo(true).unwrap();
        assert_eq!(
            endpoint.url.as_str(),
            "https://auth.iduruguay.gub.uy/oidc/v1/userinfo"
        );
        assert_eq!(
            serde_json::to_value(&endpoint.security).unwrap(),
            json!({
                "disableAllSecurity": true,
                "pkPinning": false,
                "sslPinning": false,
            })
        );
    }

    #[test]
    fn logout_carries_hint_and_state() {
        let mut session = Session {
            id_token: "a.b.c".into(),
            post_logout_redirect_uri: "https://app.example.com/logout".into(),
            ..Default::default()
        };

        let endpoint = resolver(Platform::Other).logout(&session).unwrap();
        assert_eq!(
            endpoint.url.as_str(),
            "https://auth-testing.iduruguay.gub.uy/oidc/v1/logout\
             ?id_token_hint=a.b.c\
             &post_logout_redirect_uri=https%3A%2F%2Fapp.example.com%2Flogout"
        );

        session.state = "abc".into();
        session.production = true;
        let endpoint = resolver(Platform::Other).logout(&session).unwrap();
        assert!(endpoint
            .url
            .as_str()
            .starts_with("https://auth.iduruguay.gub.uy/oidc/v1/logout?"));
        assert!(endpoint.url.as_str().ends_with("&state=abc"));
        assert_eq!(endpoint.security, SecurityProfile::unpinned());
    }
}
