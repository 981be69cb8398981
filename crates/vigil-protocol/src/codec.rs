//! Body encoding for backend requests and responses.
//!
//! [`Api`](crate::Api) is generic over [`Codec`] so the wire format is a
//! type parameter, not a hard-coded call. The backend speaks JSON, so
//! [`JsonCodec`] is the one implementation today.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ProtocolError;

/// Turns request bodies into bytes and response bytes into values.
///
/// `Send + Sync + 'static` because the codec lives inside an `Api` that
/// every background task holds a copy of.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// `ProtocolError::Encode` when the value can't be serialized.
    fn encode<T: Serialize>(&self, body: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// `ProtocolError::Decode` when the bytes are malformed or have the
    /// wrong shape (an HTML error page behind a 200, for instance).
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON bodies via `serde_json`.
///
/// ```rust
/// use vigil_protocol::{Codec, JsonCodec, LoginRequest};
///
/// let bytes = JsonCodec
///     .encode(&LoginRequest::new("token@login.com", "opaque"))
///     .unwrap();
/// let back: LoginRequest = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(back.identity, "token@login.com");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, body: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(body).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::UserInfo;

    #[test]
    fn test_decode_rejects_malformed_body() {
        let result: Result<UserInfo, _> = JsonCodec.decode(b"<html>502</html>");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let user: UserInfo = JsonCodec
            .decode(br#"{"id":"u1","email":"a@b.c","role":"admin","preferences":{}}"#)
            .unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
    }
}
