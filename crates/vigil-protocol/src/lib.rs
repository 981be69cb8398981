//! Backend API protocol for Vigil.
//!
//! This crate defines what the liveness core says to the backend and how
//! it interprets the answers:
//!
//! - **Types** ([`UserInfo`], [`LoginRequest`], [`SignupRequest`],
//!   [`RefreshTokenData`]) and the [`endpoints`] they travel to.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how bodies are turned
//!   into bytes and back.
//! - **Api** ([`Api`]): typed calls over any [`vigil_transport::HttpClient`]
//!   that classify failures into [`FetchError`]. A `403` is always a
//!   [`FetchError::Redirect`]: the caller must send the user back to login.
//!
//! ```text
//! Transport (status + bytes) → Protocol (typed result / FetchError) → Session & Liveness
//! ```

mod api;
mod codec;
mod error;
mod types;

pub use api::Api;
#[cfg(feature = "json")]
pub use api::JsonApi;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{FetchError, ProtocolError};
pub use types::{
    endpoints, LoginRequest, RefreshSession, RefreshTokenData, RefreshUserInfo,
    SignupRequest, UserInfo,
};
