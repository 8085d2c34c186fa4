//! Foundation types for Hyperspace.
//!
//! Every other `hyp-*` crate depends on this one. It defines how drives are
//! named on the replication network and how drive-backed locations are
//! written as URLs.
//!
//! # Key Types
//!
//! - [`ContentKey`] — 32-byte public key addressing a replicated drive
//! - [`DiscoveryKey`] — key derived from a [`ContentKey`], used to find peers
//!   without revealing the content key itself
//! - [`DriveUrl`] — parsed `asset://<key>/<path>` location
//! - [`TraceKey`] — `"<specifier>@<filename>"` key of a module trace entry

pub mod error;
pub mod key;
pub mod trace;
pub mod url;

pub use error::TypeError;
pub use key::{ContentKey, DiscoveryKey, KEY_LENGTH};
pub use trace::TraceKey;
pub use url::{DriveUrl, ASSET_SCHEME, RESOLVE_SCHEME};
