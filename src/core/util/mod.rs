use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use http::{header::WWW_AUTHENTICATE, HeaderMap, Method, Request, Response};
use tracing::debug;

use super::endpoint::{SecurityProfile, SslPinning};

/// HTTP client able to honour a [SecurityProfile].
///
/// A trait is used here so to facilitate native HTTP/TLS and certificate pinning when
/// compiled for mobile applications.
#[async_trait]
pub trait PinnedHttpClient {
    /// Perform exactly one request.
    ///
    /// Implementations should follow redirects and attach the effective (post-redirect) URL
    /// of the response as an [EffectiveUri] extension, and report a rejected request
    /// (network, TLS, pinning, or an error status) as a [TransportError] carrying whatever
    /// response headers were received.
    ///
    /// A logout is only confirmed when the effective URL is the logout endpoint itself, so a
    /// provider that answers logout by redirecting, even to the post-logout redirect URI,
    /// fails it with [Error::InvalidUrlLogout](crate::core::error::Error::InvalidUrlLogout).
    async fn execute(
        &self,
        request: Request<Vec<u8>>,
        security: &SecurityProfile,
    ) -> Result<Response<Vec<u8>>, TransportError>;
}

/// The URL a response was ultimately served from, stored in the response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveUri(pub String);

/// A request rejected by the transport.
#[derive(Debug, thiserror::Error)]
#[error("pinned request failed: {cause:#}")]
pub struct TransportError {
    headers: HeaderMap,
    cause: anyhow::Error,
}

impl TransportError {
    pub fn new(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            headers: HeaderMap::new(),
            cause: cause.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// The `WWW-Authenticate` challenge of the rejected response, if any.
    pub fn www_authenticate(&self) -> Option<&str> {
        self.headers
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
    }
}

impl From<anyhow::Error> for TransportError {
    fn from(cause: anyhow::Error) -> Self {
        Self::new(cause)
    }
}

pub(crate) fn base_request() -> http::request::Builder {
    Request::builder().method(Method::GET)
}

/// [PinnedHttpClient] backed by `reqwest` with `rustls`.
///
/// Certificate pinning trusts only the named certificates, registered with
/// [ReqwestClientBuilder::with_certificate], in place of the built-in roots. Public-key
/// pinning needs the platform's own TLS stack and is refused.
///
/// Redirects are followed with `reqwest`'s default policy and the final URL is reported as
/// the [EffectiveUri].
#[derive(Debug)]
pub struct ReqwestClient {
    unpinned: reqwest::Client,
    certificates: BTreeMap<String, reqwest::Certificate>,
    pinned: Mutex<BTreeMap<Vec<String>, reqwest::Client>>,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestClientBuilder {
        ReqwestClientBuilder::default()
    }

    fn pinned_client(&self, names: &[String]) -> Result<reqwest::Client> {
        let mut cache = self.pinned.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = cache.get(names) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false);
        for name in names {
            let certificate = self
                .certificates
                .get(name)
                .with_context(|| format!("no certificate registered as '{name}'"))?;
            builder = builder.add_root_certificate(certificate.clone());
        }
        let client = builder
            .build()
            .context("unable to build pinned http_client")?;

        cache.insert(names.to_vec(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PinnedHttpClient for ReqwestClient {
    async fn execute(
        &self,
        request: Request<Vec<u8>>,
        security: &SecurityProfile,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        if security.pk_pinning {
            return Err(anyhow!("public key pinning requires a platform transport").into());
        }

        let client = match &security.ssl_pinning {
            SslPinning::Certs(names) if !security.disable_all_security => {
                self.pinned_client(names)?
            }
            _ => self.unpinned.clone(),
        };

        let response = client
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let status = response.status();
        let effective_uri = EffectiveUri(response.url().to_string());
        let headers = response.headers().clone();

        if !status.is_success() {
            debug!("provider rejected request with status {status}");
            let cause = anyhow!("request was unsuccessful (status: {status})");
            return Err(TransportError::new(cause).with_headers(headers));
        }

        let mut builder = Response::builder()
            .status(status)
            .version(response.version());

        builder
            .extensions_mut()
            .context("unable to set extensions")?
            .insert(effective_uri);

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(headers);

        Ok(builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")?)
    }
}

/// Builder struct for [ReqwestClient].
#[derive(Debug, Default)]
pub struct ReqwestClientBuilder {
    certificates: BTreeMap<String, Vec<u8>>,
}

impl ReqwestClientBuilder {
    /// Register a DER-encoded certificate under the name used in [SslPinning::Certs].
    pub fn with_certificate(mut self, name: impl Into<String>, der: Vec<u8>) -> Self {
        self.certificates.insert(name.into(), der);
        self
    }

    pub fn build(self) -> Result<ReqwestClient> {
        let unpinned = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")?;

        let certificates = self
            .certificates
            .into_iter()
            .map(|(name, der)| {
                reqwest::Certificate::from_der(&der)
                    .with_context(|| format!("certificate '{name}' is not valid DER"))
                    .map(|certificate| (name, certificate))
            })
            .collect::<Result<_>>()?;

        Ok(ReqwestClient {
            unpinned,
            certificates,
            pinned: Mutex::new(BTreeMap::new()),
        })
    }
}
