use std::sync::Arc;

use http::header::{HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use http::StatusCode;
use hyp_drive::{path, DriveStore, Filesystem, ReadRange};
use hyp_types::ContentKey;
use tracing::{debug, warn};

use crate::mime::content_type;
use crate::range::ByteRange;
use crate::request::parse_asset_url;
use crate::response::ProtocolResponse;
use crate::stream::StreamAdapter;

/// Serves files from drives, honouring single byte ranges.
///
/// Every request on a valid key checks the drive out once. Error responses
/// check it back in before returning; successful ones hand the lease to the
/// response body.
pub struct AssetStreamHandler {
    store: Arc<DriveStore>,
}

impl AssetStreamHandler {
    pub fn new(store: Arc<DriveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<DriveStore> {
        &self.store
    }

    /// Serve an `asset://<key>/<path>` URL.
    pub async fn handle_url(&self, url: &str, range: Option<&str>) -> ProtocolResponse {
        match parse_asset_url(url) {
            Ok(url) => self.serve(url.key, &url.path, range).await,
            Err(e) => {
                debug!(url, error = %e, "rejecting asset request");
                ProtocolResponse::not_found()
            }
        }
    }

    /// Serve `path` from the drive named by the hex `key`.
    pub async fn handle(&self, key: &str, path: &str, range: Option<&str>) -> ProtocolResponse {
        match ContentKey::from_hex(key) {
            Ok(key) => self.serve(key, &path::normalize(path), range).await,
            Err(e) => {
                debug!(key, error = %e, "rejecting asset request");
                ProtocolResponse::not_found()
            }
        }
    }

    pub async fn serve(&self, key: ContentKey, path: &str, range: Option<&str>) -> ProtocolResponse {
        let lease = match self.store.lease(&key) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(key = %key.short_hex(), error = %e, "drive checkout failed");
                return ProtocolResponse::internal_error();
            }
        };
        self.store.announce_lookup(lease.handle());

        let stat = match lease.stat(path).await {
            Ok(stat) if stat.is_file() => stat,
            Ok(_) => {
                debug!(key = %key.short_hex(), path, "not a file");
                return ProtocolResponse::not_found();
            }
            Err(e) if e.is_not_found() => return ProtocolResponse::not_found(),
            Err(e) => {
                warn!(key = %key.short_hex(), path, error = %e, "stat failed");
                return ProtocolResponse::internal_error();
            }
        };

        let byte_range = range.and_then(|header| {
            let parsed = ByteRange::parse(header, stat.size);
            if parsed.is_none() {
                debug!(path, header, size = stat.size, "ignoring unsatisfiable range");
            }
            parsed
        });
        let (status, read_range, length) = match byte_range {
            Some(r) => (StatusCode::PARTIAL_CONTENT, r.to_read_range(), r.len()),
            None => (StatusCode::OK, ReadRange::FULL, stat.size),
        };

        let stream = match lease.create_read_stream(path, read_range).await {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => return ProtocolResponse::not_found(),
            Err(e) => {
                warn!(key = %key.short_hex(), path, error = %e, "read failed");
                return ProtocolResponse::internal_error();
            }
        };

        let mut resp = ProtocolResponse::new(status).permissive();
        resp.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
        resp.headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        resp.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        if let Some(r) = byte_range {
            resp.set_header(CONTENT_RANGE, &r.content_range(stat.size));
        }
        debug!(key = %key.short_hex(), path, status = status.as_u16(), length, "serving asset");

        resp.with_body(StreamAdapter::new(stream).with_release(move || {
            lease.release();
        }))
    }
}

impl std::fmt::Debug for AssetStreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStreamHandler").field("store", &self.store).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyp_drive::{Drive, JoinOptions, MemoryOpener, RecordingNetwork};

    const SIZE: usize = 1000;

    fn key() -> ContentKey {
        ContentKey::from_bytes([0x24; 32])
    }

    struct Fixture {
        handler: AssetStreamHandler,
        opener: Arc<MemoryOpener>,
        network: Arc<RecordingNetwork>,
        store: Arc<DriveStore>,
    }

    fn setup() -> Fixture {
        let opener = Arc::new(MemoryOpener::new());
        let data: Vec<u8> = (0..SIZE).map(|i| (i % 256) as u8).collect();
        opener.insert_file(&key(), "/media/clip.mp4", data);
        opener.insert_file(&key(), "/index.html", "<h1>hi</h1>");
        let network = Arc::new(RecordingNetwork::new());
        let store = Arc::new(DriveStore::new(opener.clone(), network.clone()));
        Fixture { handler: AssetStreamHandler::new(store.clone()), opener, network, store }
    }

    #[tokio::test]
    async fn full_response() {
        let f = setup();
        let resp = f.handler.handle(&key().to_hex(), "/index.html", None).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(resp.header("content-length"), Some("11"));
        assert_eq!(resp.header("accept-ranges"), Some("bytes"));
        assert!(resp.header("content-range").is_none());
        assert_eq!(&resp.into_bytes().await.unwrap()[..], b"<h1>hi</h1>");
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn partial_response() {
        let f = setup();
        let resp = f.handler.handle(&key().to_hex(), "media/clip.mp4", Some("bytes=100-199")).await;
        assert_eq!(resp.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.header("content-range"), Some("bytes 100-199/1000"));
        assert_eq!(resp.header("content-length"), Some("100"));
        assert_eq!(resp.header("content-type"), Some("video/mp4"));
        let body = resp.into_bytes().await.unwrap();
        assert_eq!(body.len(), 100);
        assert_eq!(body[0], 100);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn bad_range_falls_back_to_full() {
        let f = setup();
        let resp = f.handler.handle(&key().to_hex(), "/media/clip.mp4", Some("bytes=5000-")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.header("content-length"), Some("1000"));
        assert_eq!(resp.into_bytes().await.unwrap().len(), SIZE);
    }

    #[tokio::test]
    async fn invalid_key_is_404_without_checkout() {
        let f = setup();
        let resp = f.handler.handle("zz", "/index.html", None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(f.opener.opened().is_empty());
        assert!(f.network.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_path_releases_exactly_once() {
        let f = setup();
        let resp = f.handler.handle(&key().to_hex(), "/nope.js", None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.body.is_none());
        assert!(f.store.is_empty());
        assert!(f.opener.opened()[0].is_closed());

        let dk = key().discovery_key();
        assert_eq!(
            f.network.calls(),
            vec![(dk, JoinOptions::LOOKUP), (dk, JoinOptions::LOOKUP), (dk, JoinOptions::LEAVE)]
        );
    }

    #[tokio::test]
    async fn directories_are_not_served() {
        let f = setup();
        let resp = f.handler.handle(&key().to_hex(), "/media", None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_drive() {
        let f = setup();
        let hex = key().to_hex();
        let a = f.handler.handle(&hex, "/index.html", None).await;
        let b = f.handler.handle(&hex, "/media/clip.mp4", Some("bytes=-10")).await;
        assert_eq!(f.store.ref_count(&key()), 2);
        assert_eq!(f.opener.open_count(&key()), 1);

        assert_eq!(b.into_bytes().await.unwrap().len(), 10);
        assert!(f.store.is_open(&key()));
        drop(a);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn handle_url_strips_query() {
        let f = setup();
        let url = format!("asset://{}/index.html?cache=no", key().to_hex());
        let resp = f.handler.handle_url(&url, None).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(f.handler.handle_url("asset://short/index.html", None).await.status, StatusCode::NOT_FOUND);
    }
}
