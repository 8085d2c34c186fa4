use std::collections::BTreeMap;

use hyp_types::TraceKey;
use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};

/// File name of the manifest inside an application directory.
pub const MANIFEST_FILE: &str = "hyperspace.json";

/// Parsed `hyperspace.json`.
///
/// ```json
/// {
///   "main": "index.html",
///   "trace": { "./lib@/index.js": "/lib/index.js" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Entry path relative to the application directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// `"<specifier>@<requestingFile>"` → resolved absolute path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trace: BTreeMap<String, String>,
}

impl ManifestDocument {
    pub fn from_slice(data: &[u8]) -> ManifestResult<Self> {
        serde_json::from_slice(data).map_err(|e| ManifestError::ManifestInvalid(e.to_string()))
    }

    /// Recorded resolution of `specifier` required from `filename`.
    pub fn trace_path(&self, specifier: &str, filename: &str) -> Option<&str> {
        self.trace
            .get(&TraceKey::new(specifier, filename).to_string())
            .map(String::as_str)
    }

    pub fn to_json_pretty(&self) -> ManifestResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::ManifestInvalid(e.to_string()))
    }
}

/// What kind of entry point an application starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A page rendered by the host.
    Html,
    /// A script run by the module loader.
    Js,
}

impl EntryType {
    /// Pages end in `.html`; everything else is a script.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".html") {
            Self::Html
        } else {
            Self::Js
        }
    }
}

/// Resolved entry point of an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub url: String,
}
