use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use self::{lock::RequestLock, parameters::*};

use super::{
    error::Error,
    jwt::{extract_subject, JwtDecoder, UnverifiedJwtDecoder},
    object::{TypedParameter, UntypedObject},
};

pub mod lock;
pub mod parameters;

const KNOWN_KEYS: [&str; 13] = [
    RedirectUri::KEY,
    ClientId::KEY,
    ClientSecret::KEY,
    Code::KEY,
    AccessToken::KEY,
    IdToken::KEY,
    RefreshToken::KEY,
    TokenType::KEY,
    ExpiresIn::KEY,
    Scope::KEY,
    Production::KEY,
    PostLogoutRedirectUri::KEY,
    State::KEY,
];

/// Credentials and settings of the active authorization session.
///
/// A fresh session has every string empty and `production` set to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: String,
    pub scope: String,
    pub production: bool,
    pub post_logout_redirect_uri: String,
    pub state: String,
}

/// A partial update of the [Session].
///
/// Only the parameters present in the update are considered, and empty strings leave the
/// current value untouched.
///
/// ```ignore
/// let update = SessionUpdate::new()
///     .with(AccessToken::from("c0ffee"))
///     .with(IdToken::from(id_token))
///     .with(Production(true));
///
/// // Or, from a loosely-typed bridge payload:
/// let update = SessionUpdate::try_from(json!({ "accessToken": "c0ffee", "production": true }))?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate(UntypedObject);

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the update, replacing any previous value for the same key.
    pub fn with<T: TypedParameter>(mut self, t: T) -> Self {
        self.0.insert(t);
        self
    }
}

impl TryFrom<Json> for SessionUpdate {
    type Error = anyhow::Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        UntypedObject::try_from(value).map(Self)
    }
}

/// Fields of a [SessionUpdate] that passed validation and will be written.
#[derive(Debug, Default)]
struct Patch {
    redirect_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    code: Option<String>,
    access_token: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<String>,
    scope: Option<String>,
    production: Option<bool>,
    post_logout_redirect_uri: Option<String>,
    state: Option<String>,
}

impl Patch {
    fn apply(self, session: &mut Session) {
        fn merge<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        merge(&mut session.redirect_uri, self.redirect_uri);
        merge(&mut session.client_id, self.client_id);
        merge(&mut session.client_secret, self.client_secret);
        merge(&mut session.code, self.code);
        merge(&mut session.access_token, self.access_token);
        merge(&mut session.id_token, self.id_token);
        merge(&mut session.refresh_token, self.refresh_token);
        merge(&mut session.token_type, self.token_type);
        merge(&mut session.expires_in, self.expires_in);
        merge(&mut session.scope, self.scope);
        merge(&mut session.production, self.production);
        merge(&mut session.post_logout_redirect_uri, self.post_logout_redirect_uri);
        merge(&mut session.state, self.state);
    }
}

/// Parse a parameter from the update, mapping a type mismatch to `invalid`.
///
/// An empty string is absent for every key, whatever the parameter's type.
fn parse<T: TypedParameter>(update: &UntypedObject, invalid: Error) -> Result<Option<T>, Error> {
    if update.is_empty_string(T::KEY) {
        return Ok(None);
    }

    match update.get::<T>() {
        None => Ok(None),
        Some(Ok(t)) => Ok(Some(t)),
        Some(Err(e)) => {
            debug!("rejecting session update: {e:#}");
            Err(invalid)
        }
    }
}

/// Parse a string parameter into its inner value.
fn parse_string<T>(
    update: &UntypedObject,
    invalid: Error,
    inner: fn(T) -> String,
) -> Result<Option<String>, Error>
where
    T: TypedParameter,
{
    Ok(parse::<T>(update, invalid)?.map(inner))
}

/// Whether `token` has the lexical shape of an opaque bearer token issued by the provider.
pub fn is_bearer_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Holder of the single active [Session] and of the [RequestLock] that serializes its
/// protected requests.
///
/// Writes are validated field by field and applied all-or-nothing. Every
/// [Client](crate::client::Client) sharing a store shares its lock, but the store's own
/// reads and writes are not covered by it: a snapshot taken while a protected request is
/// in flight may be stale by the time it completes.
#[derive(Debug)]
pub struct SessionStore {
    session: RwLock<Session>,
    decoder: Arc<dyn JwtDecoder>,
    lock: RequestLock,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// An empty session which decodes identity tokens with [UnverifiedJwtDecoder].
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(UnverifiedJwtDecoder))
    }

    pub fn with_decoder(decoder: Arc<dyn JwtDecoder>) -> Self {
        Self {
            session: RwLock::new(Session::default()),
            decoder,
            lock: RequestLock::new(),
        }
    }

    pub fn decoder(&self) -> &dyn JwtDecoder {
        self.decoder.as_ref()
    }

    pub fn request_lock(&self) -> &RequestLock {
        &self.lock
    }

    /// Merge `update` into the session.
    ///
    /// ## Errors
    /// - [Error::InvalidToken] if `accessToken` is not a bearer token.
    /// - [Error::InvalidIdToken] if `idToken` is not a decodable JWT with a subject.
    /// - [Error::InvalidProduction] if `production` is not a boolean.
    /// - [Error::InvalidParameter] if any other parameter is not a string.
    ///
    /// Nothing from `update` is written when an error is returned.
    pub fn set_parameters(&self, update: SessionUpdate) -> Result<(), Error> {
        let SessionUpdate(update) = update;

        for key in update.keys().filter(|key| !KNOWN_KEYS.contains(key)) {
            warn!("ignoring unknown session parameter '{key}'");
        }

        let access_token =
            parse_string::<AccessToken>(&update, Error::InvalidToken, |AccessToken(t)| t)?;
        if let Some(token) = &access_token {
            if !is_bearer_token(token) {
                debug!("rejecting session update: malformed access token");
                return Err(Error::InvalidToken);
            }
        }

        let id_token =
            parse_string::<IdToken>(&update, Error::InvalidIdToken, |IdToken(t)| t)?;
        if let Some(token) = &id_token {
            extract_subject(self.decoder(), token)?;
        }

        let production = parse::<Production>(&update, Error::InvalidProduction)?.map(|p| p.0);

        let invalid = Error::InvalidParameter;
        let patch = Patch {
            redirect_uri: parse_string::<RedirectUri>(&update, invalid, |RedirectUri(s)| s)?,
            client_id: parse_string::<ClientId>(&update, invalid, |ClientId(s)| s)?,
            client_secret: parse_string::<ClientSecret>(&update, invalid, |ClientSecret(s)| {
                s
            })?,
            code: parse_string::<Code>(&update, invalid, |Code(s)| s)?,
            access_token,
            id_token,
            refresh_token: parse_string::<RefreshToken>(&update, invalid, |RefreshToken(s)| {
                s
            })?,
            token_type: parse_string::<TokenType>(&update, invalid, |TokenType(s)| s)?,
            expires_in: parse_string::<ExpiresIn>(&update, invalid, |ExpiresIn(s)| s)?,
            scope: parse_string::<Scope>(&update, invalid, |Scope(s)| s)?,
            production,
            post_logout_redirect_uri: parse_string::<PostLogoutRedirectUri>(
                &update,
                invalid,
                |PostLogoutRedirectUri(s)| s,
            )?,
            state: parse_string::<State>(&update, invalid, |State(s)| s)?,
        };

        patch.apply(&mut self.write());
        debug!("session parameters updated");
        Ok(())
    }

    /// Snapshot of every session field, defaults included.
    pub fn get_parameters(&self) -> Session {
        self.read().clone()
    }

    /// Reset every field to its empty default. Idempotent.
    pub fn reset_parameters(&self) {
        *self.write() = Session::default();
        debug!("session parameters reset");
    }

    /// Alias of [SessionStore::reset_parameters].
    pub fn clear_parameters(&self) {
        self.reset_parameters()
    }

    // A panic while holding the lock cannot leave a half-applied patch, so poisoning is
    // ignored.
    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}
