use crate::source::ResolvedModule;

/// What the loader knows about one `"<specifier>@<filename>"` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEntry {
    /// Resolved path only; the source still has to be fetched.
    Path(String),
    /// Resolved path with its source, ready to load without a round trip.
    Inline(ResolvedModule),
}

impl TraceEntry {
    pub fn filename(&self) -> &str {
        match self {
            Self::Path(filename) => filename,
            Self::Inline(module) => &module.filename,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

/// Outcome of [`ClientModuleLoader::preload`](crate::ClientModuleLoader::preload).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Trace entries that were not inline yet.
    pub requested: usize,
    /// Entries that now carry their source.
    pub preloaded: usize,
    /// Entries whose fetch failed.
    pub failed: usize,
}
