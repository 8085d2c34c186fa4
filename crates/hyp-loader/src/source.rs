use std::sync::Arc;

use futures::stream::{self, StreamExt};
use hyp_drive::path;
use hyp_protocol::{ModuleResolutionHandler, ResolveRequest};
use hyp_types::ContentKey;
use tokio::runtime::Runtime;

use crate::error::{LoaderError, LoaderResult};

/// A module located by the resolution protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedModule {
    pub filename: String,
    pub dirname: String,
    pub source: String,
}

impl ResolvedModule {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        let filename = filename.into();
        Self { dirname: path::dirname(&filename), filename, source: source.into() }
    }
}

/// Blocking transport to a module resolution endpoint.
///
/// `require` is synchronous, so sources are fetched synchronously too.
pub trait ModuleSource: Send + Sync {
    /// Resolve `name` as required from `filename` and fetch its source.
    /// `Ok(None)` means the specifier does not resolve.
    fn fetch(
        &self,
        name: &str,
        filename: &str,
        host: Option<&ContentKey>,
    ) -> LoaderResult<Option<ResolvedModule>>;

    /// Fetch the file at an already resolved absolute path.
    fn read(&self, filename: &str, host: Option<&ContentKey>) -> LoaderResult<Option<ResolvedModule>> {
        self.fetch(filename, "/", host)
    }

    /// Fetch several resolved files, at most `concurrency` in flight.
    /// Results may come back in any order.
    ///
    /// The default reads one file at a time.
    fn read_many(
        &self,
        files: &[String],
        host: Option<&ContentKey>,
        _concurrency: usize,
    ) -> Vec<(String, LoaderResult<Option<ResolvedModule>>)> {
        files.iter().map(|file| (file.clone(), self.read(file, host))).collect()
    }
}

/// [`ModuleSource`] that drives a [`ModuleResolutionHandler`] in process.
///
/// Owns a small runtime to block on; do not call it from async code.
pub struct HandlerSource {
    handler: Arc<ModuleResolutionHandler>,
    runtime: Runtime,
}

impl HandlerSource {
    pub fn new(handler: Arc<ModuleResolutionHandler>) -> LoaderResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("hyp-loader")
            .enable_all()
            .build()
            .map_err(|e| LoaderError::Transport(e.to_string()))?;
        Ok(Self { handler, runtime })
    }

    pub fn handler(&self) -> &Arc<ModuleResolutionHandler> {
        &self.handler
    }

    async fn fetch_async(&self, req: ResolveRequest) -> LoaderResult<Option<ResolvedModule>> {
        let resp = self.handler.handle(&req).await;
        match resp.status.as_u16() {
            200 => {}
            404 => return Ok(None),
            status => return Err(LoaderError::Transport(format!("{} answered {status}", req.to_url()))),
        }

        let filename = resp
            .header("x-filename")
            .ok_or_else(|| LoaderError::Transport("response without X-Filename".into()))?
            .to_string();
        let dirname = resp
            .header("x-dirname")
            .map_or_else(|| path::dirname(&filename), str::to_string);
        let body = resp
            .into_bytes()
            .await
            .map_err(|e| LoaderError::Transport(e.to_string()))?;
        let source = String::from_utf8(body.to_vec())
            .map_err(|_| LoaderError::Transport(format!("{filename} is not UTF-8")))?;
        Ok(Some(ResolvedModule { filename, dirname, source }))
    }
}

impl ModuleSource for HandlerSource {
    fn fetch(
        &self,
        name: &str,
        filename: &str,
        host: Option<&ContentKey>,
    ) -> LoaderResult<Option<ResolvedModule>> {
        self.runtime.block_on(self.fetch_async(request(name, filename, host.copied())))
    }

    fn read_many(
        &self,
        files: &[String],
        host: Option<&ContentKey>,
        concurrency: usize,
    ) -> Vec<(String, LoaderResult<Option<ResolvedModule>>)> {
        let host = host.copied();
        let reads = stream::iter(files)
            .map(move |file| async move { (file.clone(), self.fetch_async(request(file, "/", host)).await) })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>();
        self.runtime.block_on(reads)
    }
}

fn request(name: &str, filename: &str, host: Option<ContentKey>) -> ResolveRequest {
    let req = ResolveRequest::new(name, filename);
    match host {
        Some(key) => req.with_key(key),
        None => req,
    }
}

impl std::fmt::Debug for HandlerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSource").field("handler", &self.handler).finish()
    }
}
