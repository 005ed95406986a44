//! This library provides the authenticated-session core of an [OpenID Connect] relying party
//! embedded in a mobile application.
//!
//! It holds the credentials of the single active authorization session, validates them
//! before use, and executes protected calls (userinfo retrieval and logout) against the
//! identity provider under a lock that prevents overlapping use of the session.
//!
//! [OpenID Connect]: <https://openid.net/specs/openid-connect-core-1_0.html>
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use oidc_session::client::Client;
//! use oidc_session::core::session::{parameters::*, SessionUpdate};
//! use oidc_session::core::util::ReqwestClient;
//!
//! // Setup the client.
//! let http_client = ReqwestClient::builder()
//!     .with_certificate("certificate", include_bytes!("certificate.cer").to_vec())
//!     .build()?;
//! let client = Client::builder()
//!     .with_http_client(Arc::new(http_client))
//!     .build()?;
//!
//! // Store the tokens obtained from the token endpoint.
//! client.set_parameters(
//!     SessionUpdate::new()
//!         .with(AccessToken::from(token_response.access_token))
//!         .with(IdToken::from(token_response.id_token))
//!         .with(PostLogoutRedirectUri::from("uy.gub.app://logout")),
//! )?;
//!
//! // Read the user's claims.
//! let user_info = client.get_user_info().await?;
//! println!("signed in as {:?}", user_info.subject());
//!
//! // End the session at the provider; the local session is cleared on success.
//! client.logout().await?;
//! ```
//!
//! The transport can be replaced by implementing the [`PinnedHttpClient`] trait, which is
//! how platform-native TLS and public-key pinning are provided, and identity tokens can be
//! decoded by the platform's own JWT library through the [`JwtDecoder`] trait.
//!
//! [`PinnedHttpClient`]: crate::core::util::PinnedHttpClient
//! [`JwtDecoder`]: crate::core::jwt::JwtDecoder
//!
//! # Session
//!
//! The [`SessionStore`] holds a single [`Session`]. Updates are partial: a parameter is only
//! written when a non-empty value is supplied, and an update containing an invalid access
//! token, identity token, or `production` flag is rejected as a whole.
//!
//! [`SessionStore`]: crate::core::session::SessionStore
//! [`Session`]: crate::core::session::Session
//!
//! # Protected Requests
//!
//! 1. *Lock*: the [`Client`] acquires the request lock of its session store; concurrent
//!    calls on the same store wait their turn, whichever client they come from.
//! 2. *Validate*: the session is read and its required parameters checked.
//! 3. *Request*: the sandbox or production endpoint is selected from the `production`
//!    flag, with the [`SecurityProfile`] that environment requires, and one request is made.
//! 4. *Interpret*: the response is mapped to a [`SuccessEnvelope`] or to an [`Error`].
//! 5. *Unlock*: the lock is released on every path, before the result is returned.
//!
//! [`Client`]: crate::client::Client
//! [`SecurityProfile`]: crate::core::endpoint::SecurityProfile
//! [`SuccessEnvelope`]: crate::client::response::SuccessEnvelope
//! [`Error`]: crate::core::error::Error
//!
//! # Trust Boundary
//!
//! Identity tokens are decoded, never verified. Their authenticity must have been
//! established when they were issued, before they are stored in the session.

pub mod client;
pub mod config;
pub mod core;

pub use crate::core::error::Error;
