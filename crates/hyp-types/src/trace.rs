use std::fmt;

/// Key of a module trace entry: `"<specifier>@<requesting file>"`.
///
/// Manifests persist traces under these keys and the module loader looks
/// them up the same way, so a trace recorded by one run can be replayed by
/// the next.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceKey {
    pub specifier: String,
    pub filename: String,
}

impl TraceKey {
    pub fn new(specifier: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { specifier: specifier.into(), filename: filename.into() }
    }

    /// Split a rendered key at its last `@`.
    ///
    /// Scoped specifiers such as `@scope/pkg` keep their leading `@`.
    pub fn parse(key: &str) -> Option<Self> {
        let (specifier, filename) = key.rsplit_once('@')?;
        if specifier.is_empty() {
            return None;
        }
        Some(Self::new(specifier, filename))
    }
}

impl fmt::Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.specifier, self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_specifier_at_filename() {
        assert_eq!(TraceKey::new("./lib", "/index.js").to_string(), "./lib@/index.js");
    }

    #[test]
    fn parse_keeps_scoped_names() {
        let key = TraceKey::parse("@scope/pkg@/app/main.js").unwrap();
        assert_eq!(key.specifier, "@scope/pkg");
        assert_eq!(key.filename, "/app/main.js");
        assert!(TraceKey::parse("no-separator").is_none());
        assert!(TraceKey::parse("@/index.js").is_none());
    }
}
