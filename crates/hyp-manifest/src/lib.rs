//! Application manifests for Hyperspace.
//!
//! An application is a directory, either on local disk or on a drive, that
//! may carry a `hyperspace.json` manifest. [`ManifestResolver`] reads it to
//! find the entry point, preloads the module trace recorded by earlier runs,
//! and can pin the whole application for offline use.

pub mod document;
pub mod error;
pub mod resolver;

pub use document::{EntryPoint, EntryType, ManifestDocument, MANIFEST_FILE};
pub use error::{ManifestError, ManifestResult};
pub use resolver::{MainOptions, ManifestDownload, ManifestResolver, PreloadResult};
