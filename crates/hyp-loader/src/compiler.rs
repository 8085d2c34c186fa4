use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::LoaderResult;
use crate::loader::Require;

/// Shared handle to a module's exported value.
///
/// Every `require` of the same module hands out the same handle, so callers
/// can compare them with [`Arc::ptr_eq`].
pub type Exports = Arc<RwLock<Value>>;

/// One loaded (or loading) module, keyed by its resolved filename.
#[derive(Debug)]
pub struct Module {
    filename: String,
    dirname: String,
    exports: Exports,
    loaded: AtomicBool,
}

impl Module {
    pub fn new(filename: impl Into<String>, dirname: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            dirname: dirname.into(),
            exports: Arc::new(RwLock::new(Value::Object(Default::default()))),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    pub fn exports(&self) -> Exports {
        self.exports.clone()
    }

    /// Replace the exported value in place.
    pub fn set_exports(&self, value: Value) {
        *self.exports.write().expect("lock poisoned") = value;
    }

    /// `false` while the module body is still running.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }
}

/// Evaluates fetched source.
///
/// The loader hands over the module record, the source (with its
/// `sourceURL` annotation) and a `require` bound to the module's filename.
/// Implementations publish results through [`Module::set_exports`].
pub trait Compiler: Send + Sync {
    fn compile(&self, module: &Module, source: &str, require: &Require<'_>) -> LoaderResult<()>;
}

/// Exports each script's source text as a string.
///
/// Useful to collect an application's modules without executing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceCompiler;

impl Compiler for SourceCompiler {
    fn compile(&self, module: &Module, source: &str, _require: &Require<'_>) -> LoaderResult<()> {
        module.set_exports(Value::String(source.to_string()));
        Ok(())
    }
}
