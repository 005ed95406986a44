use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Request, Response, StatusCode,
};
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use crate::{
    config::Config,
    core::{
        endpoint::{EndpointResolver, Platform, SecurityProfile},
        error::Error,
        jwt::extract_subject,
        session::{Session, SessionStore, SessionUpdate},
        util::{base_request, EffectiveUri, PinnedHttpClient, TransportError},
    },
};

use response::SuccessEnvelope;

pub mod response;

const USERINFO_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";
const USERINFO_ACCEPT: &str = "application/json";

/// Executes protected requests against the identity provider on behalf of a session.
///
/// `get_user_info` and `logout` are serialized by the
/// [RequestLock](crate::core::session::lock::RequestLock) of the session store, shared by
/// clones and by every client built on the same store: at most one of them validates,
/// requests, or interprets at any time. The session store itself is not covered by the
/// lock.
///
/// Unless a [request timeout](Config::request_timeout) is configured, a transport that
/// never resolves holds the lock indefinitely and blocks every later protected request.
#[derive(Clone)]
pub struct Client {
    http: Arc<dyn PinnedHttpClient + Send + Sync>,
    session: Arc<SessionStore>,
    resolver: EndpointResolver,
}

impl Client {
    /// Build a new client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// See [SessionStore::set_parameters].
    pub fn set_parameters(&self, update: SessionUpdate) -> Result<(), Error> {
        self.session.set_parameters(update)
    }

    pub fn get_parameters(&self) -> Session {
        self.session.get_parameters()
    }

    pub fn reset_parameters(&self) {
        self.session.reset_parameters()
    }

    /// Number of protected requests that have entered the session's lock so far.
    pub fn lock_acquisitions(&self) -> u64 {
        self.session.request_lock().acquisitions()
    }

    /// Fetch the claims of the authenticated user.
    ///
    /// The provider's `sub` must equal the subject of the stored identity token; every
    /// claim the provider returns is passed through in the envelope. The session is left
    /// unchanged.
    ///
    /// ## Errors
    /// - [Error::InvalidToken] if there is no access token, the provider reports
    ///   `invalid_token`, or the subjects differ.
    /// - [Error::InvalidIdToken] if there is no decodable identity token.
    /// - [Error::InvalidSub] if the response has no subject.
    /// - [Error::FailedRequest] for any other failure.
    pub async fn get_user_info(&self) -> Result<SuccessEnvelope, Error> {
        let _guard = self.session.request_lock().acquire().await;
        let session = self.session.get_parameters();

        if session.access_token.is_empty() {
            debug!("userinfo: no access token");
            return Err(Error::InvalidToken);
        }
        if session.id_token.is_empty() {
            debug!("userinfo: no identity token");
            return Err(Error::InvalidIdToken);
        }
        let subject = extract_subject(self.session.decoder(), &session.id_token)?;

        let endpoint = self
            .resolver
            .userinfo(session.production)
            .map_err(failed_request)?;

        let request = base_request()
            .uri(endpoint.url.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
            .header(CONTENT_TYPE, USERINFO_CONTENT_TYPE)
            .header(ACCEPT, USERINFO_ACCEPT)
            .body(Vec::new())
            .context("failed to construct userinfo request")
            .map_err(failed_request)?;

        let response = self
            .send(request, &endpoint.security)
            .await
            .map_err(|rejection| classify_rejection(&rejection))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("userinfo: provider responded with status {status}");
            return Err(Error::FailedRequest);
        }

        let claims = parse_claims(response.body()).map_err(failed_request)?;

        match claims.get("sub") {
            Some(Json::String(sub)) if !sub.is_empty() => {
                if *sub != subject {
                    warn!("userinfo: subject does not match the identity token");
                    return Err(Error::InvalidToken);
                }
            }
            _ => {
                debug!("userinfo: response has no subject");
                return Err(Error::InvalidSub);
            }
        }

        Ok(SuccessEnvelope::new(claims))
    }

    /// End the session at the provider and, once it confirms, clear the local session.
    ///
    /// The `state` query parameter of the provider's final URL, if any, is returned in the
    /// envelope.
    ///
    /// ## Errors
    /// - [Error::InvalidIdTokenHint] if there is no identity token.
    /// - [Error::InvalidPostLogoutRedirectUri] if there is no post-logout redirect URI.
    /// - [Error::InvalidUrlLogout] if the provider answered from an unexpected URL.
    /// - [Error::FailedRequest] for any other failure.
    ///
    /// The session is only cleared on success.
    pub async fn logout(&self) -> Result<SuccessEnvelope, Error> {
        let _guard = self.session.request_lock().acquire().await;
        let session = self.session.get_parameters();

        if session.id_token.is_empty() {
            debug!("logout: no identity token to use as hint");
            return Err(Error::InvalidIdTokenHint);
        }
        if session.post_logout_redirect_uri.is_empty() {
            debug!("logout: no post-logout redirect uri");
            return Err(Error::InvalidPostLogoutRedirectUri);
        }

        let endpoint = self.resolver.logout(&session).map_err(failed_request)?;

        let request = base_request()
            .uri(endpoint.url.as_str())
            .body(Vec::new())
            .context("failed to construct logout request")
            .map_err(failed_request)?;

        let response = self
            .send(request, &endpoint.security)
            .await
            .map_err(|rejection| {
                warn!("logout: {rejection}");
                Error::FailedRequest
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("logout: provider responded with status {status}");
            return Err(Error::FailedRequest);
        }

        let landed_on_endpoint = response
            .extensions()
            .get::<EffectiveUri>()
            .is_some_and(|EffectiveUri(uri)| uri == endpoint.url.as_str());
        if !landed_on_endpoint {
            warn!("logout: response url does not match the logout endpoint");
            return Err(Error::InvalidUrlLogout);
        }

        self.session.reset_parameters();

        let state = endpoint
            .url
            .query_pairs()
            .find(|(key, value)| key == "state" && !value.is_empty())
            .map(|(_, value)| value.into_owned());

        Ok(SuccessEnvelope::new(Map::new()).with_state(state))
    }

    async fn send(
        &self,
        request: Request<Vec<u8>>,
        security: &SecurityProfile,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        let call = self.http.execute(request, security);

        let Some(limit) = self.resolver.config().request_timeout else {
            return call.await;
        };

        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(anyhow!("request timed out after {limit:?}").into()))
    }
}

fn failed_request(e: anyhow::Error) -> Error {
    warn!("protected request failed: {e:#}");
    Error::FailedRequest
}

/// Map a rejected userinfo request onto the taxonomy using its `WWW-Authenticate` challenge.
fn classify_rejection(rejection: &TransportError) -> Error {
    match rejection.www_authenticate() {
        Some(challenge) if challenge.contains("invalid_token") => {
            debug!("userinfo: provider rejected the access token");
            Error::InvalidToken
        }
        _ => {
            warn!("userinfo: {rejection}");
            Error::FailedRequest
        }
    }
}

/// Parse a userinfo body. A missing body, or JSON that is not an object, yields no claims.
fn parse_claims(body: &[u8]) -> Result<Map<String, Json>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    let body: Json =
        serde_json::from_slice(body).context("userinfo response was not valid json")?;

    match body {
        Json::Object(claims) => Ok(claims),
        _ => Ok(Map::new()),
    }
}

/// Builder struct for [Client].
#[derive(Default)]
pub struct ClientBuilder {
    http: Option<Arc<dyn PinnedHttpClient + Send + Sync>>,
    session: Option<Arc<SessionStore>>,
    config: Config,
    platform: Option<Platform>,
}

impl ClientBuilder {
    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let Self {
            http,
            session,
            config,
            platform,
        } = self;

        let Some(http) = http else {
            bail!("http client is required, see `with_http_client`")
        };

        Ok(Client {
            http,
            session: session.unwrap_or_default(),
            resolver: EndpointResolver::new(config, platform.unwrap_or_else(Platform::current)),
        })
    }

    /// Set the [PinnedHttpClient] used to reach the provider.
    pub fn with_http_client(mut self, http: Arc<dyn PinnedHttpClient + Send + Sync>) -> Self {
        self.http = Some(http);
        self
    }

    /// Share an existing [SessionStore], and with it its request lock. A fresh, empty one is
    /// created otherwise.
    pub fn with_session_store(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Override the platform detected at compile time.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Bound each provider request. An elapsed request fails with [Error::FailedRequest].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }
}
