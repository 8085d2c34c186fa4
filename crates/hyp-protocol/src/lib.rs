//! Virtual protocol handlers for Hyperspace.
//!
//! Two schemes expose drive content to a host:
//!
//! - `resolve://require?name=&filename=&key=` -- [`ModuleResolutionHandler`]
//!   maps a module specifier to a file and streams its source, reporting the
//!   resolved path in `X-Filename` / `X-Dirname`.
//! - `asset://<key>/<path>` -- [`AssetStreamHandler`] streams any file of a
//!   drive, with `Range` support.
//!
//! Handlers never fail: every outcome is a [`ProtocolResponse`]. Not-found
//! conditions become bare 404s. Response bodies are [`StreamAdapter`]s that
//! own the drive lease taken for the request, so the drive is checked back
//! in exactly once however the body is consumed.

pub mod asset;
pub mod endpoint;
pub mod error;
pub mod mime;
pub mod range;
pub mod request;
pub mod resolution;
pub mod resolve;
pub mod response;
pub mod scheme;
pub mod stream;

pub use asset::AssetStreamHandler;
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use mime::content_type;
pub use range::ByteRange;
pub use request::{parse_asset_url, ResolveRequest};
pub use resolution::ModuleResolutionHandler;
pub use resolve::resolve;
pub use response::{ProtocolResponse, ALLOW_CSP_FROM, X_DIRNAME, X_FILENAME};
pub use scheme::{SchemeDeclaration, SchemePrivileges, PRIVILEGED_SCHEMES};
pub use stream::{Phase, StreamAdapter};
