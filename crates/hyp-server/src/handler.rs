use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::RANGE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use hyp_drive::{DriveStore, LocalFs};
use hyp_protocol::{
    AssetStreamHandler, HealthResponse, ModuleResolutionHandler, ProtocolResponse, ResolveRequest,
};
use tracing::debug;

/// Handlers shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub resolution: Arc<ModuleResolutionHandler>,
    pub assets: Arc<AssetStreamHandler>,
}

impl AppState {
    pub fn new(store: Arc<DriveStore>, local: Option<LocalFs>) -> Self {
        Self {
            resolution: Arc::new(ModuleResolutionHandler::new(store.clone()).with_local(local)),
            assets: Arc::new(AssetStreamHandler::new(store)),
        }
    }
}

/// Adapts a [`ProtocolResponse`] to axum; the body keeps its drive lease
/// until the connection is done with it.
pub struct ProtocolReply(pub ProtocolResponse);

impl IntoResponse for ProtocolReply {
    fn into_response(self) -> Response {
        let ProtocolResponse { status, headers, body } = self.0;
        let body = match body {
            Some(stream) => Body::from_stream(stream),
            None => Body::empty(),
        };
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /require?name=&filename=&key=&empty=`
pub async fn require_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> ProtocolReply {
    let req = match ResolveRequest::from_query(query.as_deref().unwrap_or_default()) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "rejecting resolve request");
            return ProtocolReply(ProtocolResponse::bad_request());
        }
    };
    ProtocolReply(state.resolution.handle(&req).await)
}

/// `GET /asset/{key}/{*path}`, honouring `Range`.
pub async fn asset_handler(
    State(state): State<AppState>,
    Path((key, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> ProtocolReply {
    let range = headers.get(RANGE).and_then(|v| v.to_str().ok());
    ProtocolReply(state.assets.handle(&key, &path, range).await)
}
