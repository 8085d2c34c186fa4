use hyp_types::{ASSET_SCHEME, RESOLVE_SCHEME};
use serde::Serialize;

/// Privileges a hosting environment must grant a custom scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SchemePrivileges {
    pub standard: bool,
    pub secure: bool,
    pub bypass_csp: bool,
    pub cors_enabled: bool,
    pub support_fetch_api: bool,
    pub allow_service_workers: bool,
}

impl SchemePrivileges {
    /// Everything enabled.
    pub const FULL: Self = Self {
        standard: true,
        secure: true,
        bypass_csp: true,
        cors_enabled: true,
        support_fetch_api: true,
        allow_service_workers: true,
    };
}

/// A scheme to register with the host before any window loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SchemeDeclaration {
    pub scheme: &'static str,
    pub privileges: SchemePrivileges,
}

/// Both Hyperspace schemes, in registration order.
pub const PRIVILEGED_SCHEMES: [SchemeDeclaration; 2] = [
    SchemeDeclaration { scheme: RESOLVE_SCHEME, privileges: SchemePrivileges::FULL },
    SchemeDeclaration { scheme: ASSET_SCHEME, privileges: SchemePrivileges::FULL },
];
