/// Errors that can occur in the transport layer.
///
/// Every variant means "no HTTP response was received". A response with
/// a bad status is not a transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request path could not be turned into a URL.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connecting or sending the request failed.
    #[error("request to {path} failed: {reason}")]
    RequestFailed { path: String, reason: String },

    /// The response body could not be read.
    #[error("reading response from {path} failed: {reason}")]
    BodyFailed { path: String, reason: String },

    /// The client was shut down or has no route for the request.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}
