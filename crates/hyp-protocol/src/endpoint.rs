/// HTTP endpoint paths serving the two schemes.
pub mod endpoints {
    pub const REQUIRE: &str = "/require";
    pub const ASSET: &str = "/asset";
    pub const HEALTH: &str = "/v1/health";
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schemes: Vec<String>,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            schemes: crate::scheme::PRIVILEGED_SCHEMES
                .iter()
                .map(|s| s.scheme.to_string())
                .collect(),
        }
    }
}
