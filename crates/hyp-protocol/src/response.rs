use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN};
use http::{HeaderMap, StatusCode};
use tracing::warn;

use crate::stream::StreamAdapter;

/// Absolute path a specifier resolved to.
pub const X_FILENAME: HeaderName = HeaderName::from_static("x-filename");

/// Directory of [`X_FILENAME`].
pub const X_DIRNAME: HeaderName = HeaderName::from_static("x-dirname");

/// Lets pages with any content security policy embed the response.
pub const ALLOW_CSP_FROM: HeaderName = HeaderName::from_static("allow-csp-from");

/// Response produced by a protocol handler.
///
/// The body, when present, owns whatever drive reference the handler took;
/// dropping the response releases it.
#[derive(Debug)]
pub struct ProtocolResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<StreamAdapter>,
}

impl ProtocolResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: None }
    }

    /// Bare 404: no headers, no body.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Add `Access-Control-Allow-Origin: *` and `Allow-CSP-From: *`.
    pub fn permissive(mut self) -> Self {
        self.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        self.headers.insert(ALLOW_CSP_FROM, HeaderValue::from_static("*"));
        self
    }

    /// Set a header. Values that cannot appear in a header are skipped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => warn!(header = %name, "dropping unrepresentable header value"),
        }
    }

    pub fn with_body(mut self, body: StreamAdapter) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Drain the body. Responses without a body read as empty.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self.body {
            Some(body) => body.read_to_end().await,
            None => Ok(Bytes::new()),
        }
    }
}
