use hyp_types::{ContentKey, DriveUrl, RESOLVE_SCHEME};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{ProtocolError, ProtocolResult};

/// A module resolution request:
/// `resolve://require?name=<specifier>&filename=<file>&key=<key>[&empty=1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Specifier as written in the requiring file.
    pub name: String,
    /// Absolute path of the requiring file.
    pub filename: String,
    /// Drive to resolve against. Missing or malformed keys resolve locally.
    pub key: Option<ContentKey>,
    /// Answer with headers only.
    pub empty: bool,
}

impl ResolveRequest {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { name: name.into(), filename: filename.into(), key: None, empty: false }
    }

    pub fn with_key(mut self, key: ContentKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn headers_only(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Parse a full `resolve://` URL.
    pub fn parse(url: &str) -> ProtocolResult<Self> {
        let parsed = Url::parse(url).map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
        if !parsed.scheme().eq_ignore_ascii_case(RESOLVE_SCHEME) {
            return Err(ProtocolError::InvalidRequest(format!("not a {RESOLVE_SCHEME} url: {url}")));
        }
        Self::from_query(parsed.query().unwrap_or_default())
    }

    /// Parse the query string alone.
    pub fn from_query(query: &str) -> ProtocolResult<Self> {
        let mut name = None;
        let mut filename = None;
        let mut key = None;
        let mut empty = false;
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            match k.as_ref() {
                "name" => name = Some(v.into_owned()),
                "filename" => filename = Some(v.into_owned()),
                "key" => key = ContentKey::from_hex(&v).ok(),
                "empty" => empty = !v.is_empty() && v != "0" && v != "false",
                _ => {}
            }
        }
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProtocolError::InvalidRequest("missing name".into()))?;
        let filename = filename
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ProtocolError::InvalidRequest("missing filename".into()))?;
        Ok(Self { name, filename, key, empty })
    }

    /// Render as a `resolve://` URL.
    pub fn to_url(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("name", &self.name);
        query.append_pair("filename", &self.filename);
        if let Some(key) = &self.key {
            query.append_pair("key", &key.to_hex());
        }
        if self.empty {
            query.append_pair("empty", "1");
        }
        format!("{RESOLVE_SCHEME}://require?{}", query.finish())
    }
}

/// Parse an `asset://<key>/<path>` request. Percent-escapes in the path are
/// decoded.
pub fn parse_asset_url(url: &str) -> ProtocolResult<DriveUrl> {
    let parsed = DriveUrl::parse(url).map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
    Ok(DriveUrl::new(parsed.key, decode_path(&parsed.path)))
}

/// Decode percent-escapes in a URL path. Malformed escapes are kept as is.
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}
