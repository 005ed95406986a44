//! Subject-claim extraction from identity tokens.
//!
//! Nothing in this module verifies signatures, issuer, audience, or expiry. The identity
//! token is trusted because it was obtained from the provider's token endpoint over an
//! authenticated channel; callers must establish that before storing it in a session.

use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use serde_json::{Map, Value as Json};
use tracing::debug;

use super::error::Error;

/// Decodes the payload segment of a compact JWT without verifying it.
///
/// A trait is used here so that a platform's own JWT library can stand in for the
/// built-in decoder.
pub trait JwtDecoder: Debug + Send + Sync {
    fn decode_payload(&self, token: &str) -> Result<Map<String, Json>>;
}

/// Built-in [JwtDecoder]: base64url-decodes the payload segment and parses it as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedJwtDecoder;

impl JwtDecoder for UnverifiedJwtDecoder {
    fn decode_payload(&self, token: &str) -> Result<Map<String, Json>> {
        if token.split('.').count() != 3 {
            bail!("jwt must have exactly three segments")
        }

        let (_, payload_b64, _) = ssi::claims::jws::split_jws(token)?;

        if payload_b64.is_empty() {
            bail!("jwt payload segment is empty")
        }

        let payload_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload_b64.trim_end_matches('='))
            .context("jwt payload was not valid base64url")?;

        serde_json::from_slice(&payload_bytes).context("jwt payload was not a json object")
    }
}

/// Read the `sub` claim of an identity token.
///
/// Fails with [Error::InvalidIdToken] when the token cannot be decoded or carries no
/// non-empty string subject.
pub fn extract_subject(decoder: &dyn JwtDecoder, id_token: &str) -> Result<String, Error> {
    let claims = decoder.decode_payload(id_token).map_err(|e| {
        debug!("unable to decode identity token: {e:#}");
        Error::InvalidIdToken
    })?;

    match claims.get("sub") {
        Some(Json::String(sub)) if !sub.is_empty() => Ok(sub.clone()),
        _ => {
            debug!("identity token has no usable 'sub' claim");
            Err(Error::InvalidIdToken)
        }
    }
}
