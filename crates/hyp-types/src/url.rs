use std::fmt;

use crate::error::TypeError;
use crate::key::ContentKey;

/// Scheme of drive-backed locations: `asset://<key>/<path>`.
pub const ASSET_SCHEME: &str = "asset";

/// Scheme of module resolution requests: `resolve://require?...`.
pub const RESOLVE_SCHEME: &str = "resolve";

/// A parsed `asset://<key>/<path>` location.
///
/// The path is always absolute within the drive. Query strings and
/// fragments are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DriveUrl {
    pub key: ContentKey,
    pub path: String,
}

impl DriveUrl {
    pub fn new(key: ContentKey, path: impl Into<String>) -> Self {
        Self { key, path: normalize_path(&path.into()) }
    }

    /// Returns `true` if `url` uses the drive scheme.
    pub fn is_drive_url(url: &str) -> bool {
        scheme_body(url).is_some()
    }

    /// Parse a drive URL.
    pub fn parse(url: &str) -> Result<Self, TypeError> {
        let body = scheme_body(url).ok_or_else(|| TypeError::InvalidUrl(url.to_string()))?;
        let body = body.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = match body.find('/') {
            Some(i) => body.split_at(i),
            None => (body, "/"),
        };
        let key = ContentKey::from_hex(host)?;
        Ok(Self::new(key, path))
    }
}

impl fmt::Display for DriveUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ASSET_SCHEME}://{}{}", self.key.to_hex(), self.path)
    }
}

fn scheme_body(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once("://")?;
    scheme.eq_ignore_ascii_case(ASSET_SCHEME).then_some(rest)
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_hex() -> String {
        "ab".repeat(32)
    }

    #[test]
    fn parse_with_path_and_query() {
        let url = DriveUrl::parse(&format!("asset://{}/app/index.html?x=1", key_hex())).unwrap();
        assert_eq!(url.key.to_hex(), key_hex());
        assert_eq!(url.path, "/app/index.html");
    }

    #[test]
    fn parse_without_path_defaults_to_root() {
        let url = DriveUrl::parse(&format!("asset://{}", key_hex())).unwrap();
        assert_eq!(url.path, "/");
    }

    #[test]
    fn parse_rejects_other_schemes_and_bad_keys() {
        assert!(DriveUrl::parse("file:///tmp/app").is_err());
        assert!(DriveUrl::parse("asset://not-a-key/x").is_err());
        assert!(!DriveUrl::is_drive_url("/tmp/app"));
        assert!(DriveUrl::is_drive_url("ASSET://whatever"));
    }

    #[test]
    fn display_roundtrips() {
        let url = DriveUrl::new(ContentKey::from_bytes([0xab; 32]), "a/b.js");
        assert_eq!(url.to_string(), format!("asset://{}/a/b.js", key_hex()));
        assert_eq!(DriveUrl::parse(&url.to_string()).unwrap(), url);
    }
}
