use std::sync::Arc;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use hyp_drive::{path, ByteStream, DriveStore, Filesystem, LocalFs, ReadRange};
use tracing::{debug, warn};

use crate::error::ProtocolResult;
use crate::request::ResolveRequest;
use crate::resolve::resolve;
use crate::response::{ProtocolResponse, X_DIRNAME, X_FILENAME};
use crate::stream::StreamAdapter;

/// Answers `resolve://require` requests.
///
/// Requests carrying a content key are resolved on that drive through a
/// lease from the [`DriveStore`]; the lease travels with the response body
/// and is released when the body ends or is dropped. Requests without a
/// usable key answer 404 unless a local filesystem is configured with
/// [`with_local`](Self::with_local).
pub struct ModuleResolutionHandler {
    store: Arc<DriveStore>,
    local: Option<LocalFs>,
}

impl ModuleResolutionHandler {
    pub fn new(store: Arc<DriveStore>) -> Self {
        Self { store, local: None }
    }

    /// Filesystem for key-less requests; `None` answers them with 404.
    pub fn with_local(mut self, local: Option<LocalFs>) -> Self {
        self.local = local;
        self
    }

    pub fn store(&self) -> &Arc<DriveStore> {
        &self.store
    }

    pub async fn handle_url(&self, url: &str) -> ProtocolResponse {
        match ResolveRequest::parse(url) {
            Ok(req) => self.handle(&req).await,
            Err(e) => {
                debug!(url, error = %e, "rejecting resolve request");
                ProtocolResponse::bad_request()
            }
        }
    }

    pub async fn handle(&self, req: &ResolveRequest) -> ProtocolResponse {
        let lease = match req.key {
            Some(key) => match self.store.lease(&key) {
                Ok(lease) => Some(lease),
                Err(e) => {
                    warn!(key = %key.short_hex(), error = %e, "drive checkout failed");
                    return ProtocolResponse::internal_error();
                }
            },
            None => None,
        };

        let fs: &dyn Filesystem = match (&lease, &self.local) {
            (Some(lease), _) => lease.handle(),
            (None, Some(local)) => local,
            (None, None) => {
                debug!(name = %req.name, "local modules disabled");
                return ProtocolResponse::not_found();
            }
        };

        let (resolved, body) = match open_module(fs, req).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return ProtocolResponse::not_found(),
            Err(e) => {
                warn!(name = %req.name, filename = %req.filename, error = %e, "resolution failed");
                return ProtocolResponse::internal_error();
            }
        };

        let mut resp = ProtocolResponse::new(StatusCode::OK).permissive();
        resp.headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        resp.set_header(X_FILENAME, &resolved);
        resp.set_header(X_DIRNAME, &path::dirname(&resolved));

        match body {
            Some(stream) => resp.with_body(StreamAdapter::new(stream).with_release(move || {
                if let Some(lease) = lease {
                    lease.release();
                }
            })),
            None => {
                if let Some(lease) = lease {
                    lease.release();
                }
                resp
            }
        }
    }
}

async fn open_module(
    fs: &dyn Filesystem,
    req: &ResolveRequest,
) -> ProtocolResult<(String, Option<ByteStream>)> {
    let resolved = resolve(fs, &req.name, &req.filename).await?;
    if req.empty {
        return Ok((resolved, None));
    }
    let stream = fs.create_read_stream(&resolved, ReadRange::FULL).await?;
    Ok((resolved, Some(stream)))
}

impl std::fmt::Debug for ModuleResolutionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolutionHandler")
            .field("local", &self.local)
            .finish()
    }
}
