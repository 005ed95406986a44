use std::time::Duration;

use serde::Deserialize;
use url::Url;

const SANDBOX_BASE: &str = "https://auth-testing.iduruguay.gub.uy/";
const PRODUCTION_BASE: &str = "https://auth.iduruguay.gub.uy/";
const PINNED_CERTIFICATE: &str = "certificate";

/// Identity provider settings.
///
/// ```ignore
/// let config: Config = serde_json::from_value(json!({
///     "sandbox": "https://auth-testing.iduruguay.gub.uy",
///     "production": "https://auth.iduruguay.gub.uy",
///     "certificates": ["certificate"],
///     "request_timeout": { "secs": 30, "nanos": 0 }
/// }))?;
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Provider used while the session's `production` flag is unset.
    pub sandbox: BaseUrl,
    pub production: BaseUrl,
    /// Names of the certificates the sandbox connection is pinned to.
    pub certificates: Vec<String>,
    /// Upper bound on a single provider request.
    ///
    /// Unset by default, in which case a transport that never resolves holds the request
    /// lock indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sandbox: BaseUrl::from_static(SANDBOX_BASE),
            production: BaseUrl::from_static(PRODUCTION_BASE),
            certificates: vec![PINNED_CERTIFICATE.to_owned()],
            request_timeout: None,
        }
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    fn from_static(s: &'static str) -> Self {
        Url::parse(s).map(Self).expect("valid default URL")
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

impl TryFrom<&str> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        Self::try_from(url.to_owned())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.sandbox.as_str(), SANDBOX_BASE);
        assert_eq!(config.production.as_str(), PRODUCTION_BASE);
        assert_eq!(config.certificates, ["certificate"]);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = BaseUrl::try_from("https://idp.example.com/tenant").unwrap();
        assert_eq!(
            base.join("oidc/v1/userinfo").unwrap().as_str(),
            "https://idp.example.com/tenant/oidc/v1/userinfo"
        );
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config = serde_json::from_value(json!({
            "sandbox": "http://localhost:8080",
            "request_timeout": { "secs": 5, "nanos": 0 },
        }))
        .unwrap();
        assert_eq!(config.sandbox.as_str(), "http://localhost:8080/");
        assert_eq!(config.production.as_str(), PRODUCTION_BASE);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
    }
}
