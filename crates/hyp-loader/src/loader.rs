use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hyp_types::{TraceKey, ASSET_SCHEME};
use serde_json::Value;
use tracing::{debug, warn};

use crate::builtin::is_builtin;
use crate::compiler::{Compiler, Exports, Module};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::source::{ModuleSource, ResolvedModule};
use crate::trace::{PreloadReport, TraceEntry};

/// `require` bound to one requiring file.
///
/// Handed to the [`Compiler`] for every module it runs.
pub struct Require<'a> {
    loader: &'a ClientModuleLoader,
    filename: String,
}

impl Require<'_> {
    pub fn require(&self, name: &str) -> LoaderResult<Exports> {
        self.loader.require_from(name, &self.filename)
    }

    /// File this `require` resolves relative to.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn loader(&self) -> &ClientModuleLoader {
        self.loader
    }
}

/// Synchronous module loader over the resolution protocol.
///
/// A `require(name)` call:
///
/// 1. answers allow-listed built-ins from host-provided values;
/// 2. consults the trace for `name@filename`, which wins over the network;
/// 3. otherwise fetches through the [`ModuleSource`] and records the
///    resolved path in the trace;
/// 4. returns the cached exports if that path is loaded or loading;
/// 5. otherwise parses `.json` files, or compiles everything else with a
///    nested `require` bound to the new module.
///
/// A module is cached before its body runs, so circular requires see the
/// partial exports of the module that is still loading.
pub struct ClientModuleLoader {
    config: LoaderConfig,
    source: Arc<dyn ModuleSource>,
    compiler: Arc<dyn Compiler>,
    builtins: HashMap<String, Exports>,
    cache: Mutex<HashMap<String, Arc<Module>>>,
    trace: Mutex<BTreeMap<String, TraceEntry>>,
    fetches: AtomicUsize,
}

impl ClientModuleLoader {
    pub fn new(config: LoaderConfig, source: Arc<dyn ModuleSource>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            config,
            source,
            compiler,
            builtins: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            trace: Mutex::new(BTreeMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Provide the value of an allow-listed built-in. Other names are
    /// ignored: they always go through resolution.
    pub fn with_builtin(mut self, name: &str, value: Value) -> Self {
        if is_builtin(name) {
            self.builtins.insert(name.to_string(), Arc::new(std::sync::RwLock::new(value)));
        } else {
            warn!(name, "ignoring built-in outside the allow-list");
        }
        self
    }

    /// Seed the trace with recorded resolutions, e.g. a manifest's `trace`.
    pub fn with_trace(self, trace: &BTreeMap<String, String>) -> Self {
        {
            let mut entries = self.trace.lock().expect("lock poisoned");
            for (key, filename) in trace {
                entries
                    .entry(key.clone())
                    .or_insert_with(|| TraceEntry::Path(filename.clone()));
            }
        }
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// `require` from the configured root file.
    pub fn require(&self, name: &str) -> LoaderResult<Exports> {
        self.require_from(name, &self.config.root_filename)
    }

    /// `require` as if called from `filename`.
    pub fn require_from(&self, name: &str, filename: &str) -> LoaderResult<Exports> {
        if is_builtin(name) {
            return self
                .builtins
                .get(name)
                .cloned()
                .ok_or_else(|| LoaderError::BuiltinUnavailable(name.to_string()));
        }

        let key = TraceKey::new(name, filename).to_string();
        let entry = self.trace.lock().expect("lock poisoned").get(&key).cloned();
        let resolved = match entry {
            Some(TraceEntry::Inline(module)) => module,
            Some(TraceEntry::Path(path)) => {
                if let Some(exports) = self.cached(&path) {
                    return Ok(exports);
                }
                self.fetch(|source, host| source.read(&path, host))?
                    .ok_or_else(|| cannot_require(name, filename))?
            }
            None => {
                let module = self
                    .fetch(|source, host| source.fetch(name, filename, host))?
                    .ok_or_else(|| cannot_require(name, filename))?;
                self.trace
                    .lock()
                    .expect("lock poisoned")
                    .insert(key, TraceEntry::Path(module.filename.clone()));
                module
            }
        };

        self.instantiate(resolved)
    }

    /// Fetch the source of every trace entry that is not inline yet.
    ///
    /// `map` defaults to the loader's own trace. Each distinct file is fetched
    /// once, with up to `preload_concurrency` fetches in flight. Failures are counted and logged; they never
    /// abort the batch.
    pub fn preload(&self, map: Option<&BTreeMap<String, String>>) -> PreloadReport {
        let map = match map {
            Some(map) => map.clone(),
            None => self.trace_paths(),
        };
        let pending: Vec<(String, String)> = {
            let trace = self.trace.lock().expect("lock poisoned");
            map.into_iter()
                .filter(|(key, _)| !trace.get(key).is_some_and(TraceEntry::is_inline))
                .collect()
        };

        let mut files: Vec<String> = pending.iter().map(|(_, f)| f.clone()).collect();
        files.sort_unstable();
        files.dedup();
        let fetched = self.read_all(&files);

        let mut report = PreloadReport { requested: pending.len(), ..PreloadReport::default() };
        let mut trace = self.trace.lock().expect("lock poisoned");
        for (key, filename) in &pending {
            match fetched.get(filename) {
                Some(Ok(Some(module))) => {
                    trace.insert(key.clone(), TraceEntry::Inline(module.clone()));
                    report.preloaded += 1;
                }
                Some(Err(e)) => {
                    warn!(key = %key, filename = %filename, error = %e, "preload failed");
                    report.failed += 1;
                }
                _ => {
                    warn!(key = %key, filename = %filename, "preload found nothing");
                    report.failed += 1;
                }
            }
        }
        debug!(requested = report.requested, preloaded = report.preloaded, failed = report.failed, "preload done");
        report
    }

    /// Trace in manifest form: `"name@filename"` → resolved path.
    pub fn trace_paths(&self) -> BTreeMap<String, String> {
        self.trace
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(key, entry)| (key.clone(), entry.filename().to_string()))
            .collect()
    }

    pub fn trace_entry(&self, key: &TraceKey) -> Option<TraceEntry> {
        self.trace.lock().expect("lock poisoned").get(&key.to_string()).cloned()
    }

    /// Exports of a loaded or loading module.
    pub fn cached(&self, filename: &str) -> Option<Exports> {
        self.cache
            .lock()
            .expect("lock poisoned")
            .get(filename)
            .map(|m| m.exports())
    }

    pub fn module(&self, filename: &str) -> Option<Arc<Module>> {
        self.cache.lock().expect("lock poisoned").get(filename).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("lock poisoned").len()
    }

    /// Round trips made to the module source so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// URL a compiled script reports in stack traces.
    pub fn source_url(&self, filename: &str) -> String {
        match &self.config.host {
            Some(host) => format!("{ASSET_SCHEME}://{}{filename}", host.to_hex()),
            None => format!("file://{filename}"),
        }
    }

    fn fetch(
        &self,
        op: impl FnOnce(&dyn ModuleSource, Option<&hyp_types::ContentKey>) -> LoaderResult<Option<ResolvedModule>>,
    ) -> LoaderResult<Option<ResolvedModule>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        op(self.source.as_ref(), self.config.host.as_ref())
    }

    fn read_all(&self, files: &[String]) -> HashMap<String, LoaderResult<Option<ResolvedModule>>> {
        self.fetches.fetch_add(files.len(), Ordering::Relaxed);
        self.source
            .read_many(files, self.config.host.as_ref(), self.config.preload_concurrency)
            .into_iter()
            .collect()
    }

    fn instantiate(&self, resolved: ResolvedModule) -> LoaderResult<Exports> {
        let module = {
            let mut cache = self.cache.lock().expect("lock poisoned");
            if let Some(existing) = cache.get(&resolved.filename) {
                return Ok(existing.exports());
            }
            let module = Arc::new(Module::new(&resolved.filename, &resolved.dirname));
            cache.insert(resolved.filename.clone(), module.clone());
            module
        };

        let result = if is_json(&resolved.filename) {
            serde_json::from_str(&resolved.source)
                .map(|value| module.set_exports(value))
                .map_err(|e| LoaderError::InvalidJson {
                    filename: resolved.filename.clone(),
                    reason: e.to_string(),
                })
        } else {
            let source = format!(
                "{}\n//# sourceURL={}\n",
                resolved.source,
                self.source_url(&resolved.filename)
            );
            let require = Require { loader: self, filename: resolved.filename.clone() };
            debug!(filename = %resolved.filename, "compiling module");
            self.compiler.compile(&module, &source, &require)
        };

        match result {
            Ok(()) => {
                module.mark_loaded();
                Ok(module.exports())
            }
            Err(e) => {
                self.cache.lock().expect("lock poisoned").remove(&resolved.filename);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ClientModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientModuleLoader")
            .field("config", &self.config)
            .field("cached", &self.cache_len())
            .finish()
    }
}

fn is_json(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".json")
}

fn cannot_require(name: &str, filename: &str) -> LoaderError {
    LoaderError::CannotRequire { name: name.to_string(), filename: filename.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HandlerSource;
    use hyp_drive::{DriveStore, MemoryOpener, RecordingNetwork};
    use hyp_protocol::ModuleResolutionHandler;
    use hyp_types::ContentKey;
    use serde_json::json;

    /// Line-oriented stand-in for a script engine: `require <name>` runs a
    /// nested require, `export <json>` sets the exports, `fail` fails.
    #[derive(Default)]
    struct ToyCompiler {
        required: Mutex<Vec<(String, String, Exports)>>,
        sources: Mutex<Vec<String>>,
    }

    impl Compiler for ToyCompiler {
        fn compile(&self, module: &Module, source: &str, require: &Require<'_>) -> LoaderResult<()> {
            self.sources.lock().unwrap().push(source.to_string());
            let failed = |reason: String| LoaderError::Compile { filename: module.filename().into(), reason };
            for line in source.lines() {
                if let Some(name) = line.strip_prefix("require ") {
                    let exports = require.require(name)?;
                    self.required.lock().unwrap().push((
                        module.filename().to_string(),
                        name.to_string(),
                        exports,
                    ));
                } else if let Some(value) = line.strip_prefix("export ") {
                    module.set_exports(serde_json::from_str(value).map_err(|e| failed(e.to_string()))?);
                } else if line == "fail" {
                    return Err(failed("fail".into()));
                }
            }
            Ok(())
        }
    }

    fn key() -> ContentKey {
        ContentKey::from_bytes([0x55; 32])
    }

    struct Fixture {
        loader: ClientModuleLoader,
        compiler: Arc<ToyCompiler>,
        store: Arc<DriveStore>,
    }

    fn setup(files: &[(&str, &str)]) -> Fixture {
        let opener = Arc::new(MemoryOpener::new());
        for (path, data) in files {
            opener.insert_file(&key(), path, data.to_string());
        }
        let store = Arc::new(DriveStore::new(opener, Arc::new(RecordingNetwork::new())));
        let handler = Arc::new(ModuleResolutionHandler::new(store.clone()).with_local(None));
        let source = Arc::new(HandlerSource::new(handler).unwrap());
        let compiler = Arc::new(ToyCompiler::default());
        let config = LoaderConfig::for_host(key()).with_root_filename("/app/index.js");
        let loader = ClientModuleLoader::new(config, source, compiler.clone());
        Fixture { loader, compiler, store }
    }

    fn value(exports: &Exports) -> Value {
        exports.read().unwrap().clone()
    }

    #[test]
    fn second_require_hits_cache_without_fetching() {
        let f = setup(&[("/app/lib.js", "export 42")]);
        let first = f.loader.require("./lib").unwrap();
        let second = f.loader.require("./lib").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(value(&first), json!(42));
        assert_eq!(f.loader.fetch_count(), 1);
        assert!(f.store.is_empty());
    }

    #[test]
    fn one_record_per_resolved_path() {
        let f = setup(&[("/app/lib.js", "export 1")]);
        let a = f.loader.require("./lib").unwrap();
        let b = f.loader.require("./lib.js").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.loader.cache_len(), 1);
        assert_eq!(f.compiler.sources.lock().unwrap().len(), 1);
    }

    #[test]
    fn json_is_parsed_not_compiled() {
        let f = setup(&[("/app/data.json", r#"{"a": [1, 2]}"#), ("/app/bad.json", "{")]);
        assert_eq!(value(&f.loader.require("./data").unwrap()), json!({"a": [1, 2]}));
        assert!(f.compiler.sources.lock().unwrap().is_empty());

        let err = f.loader.require("./bad.json").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidJson { .. }));
        assert!(f.loader.cached("/app/bad.json").is_none());
    }

    #[test]
    fn nested_require_and_source_url() {
        let f = setup(&[
            ("/app/main.js", "require ./lib/util\nexport \"main\""),
            ("/app/lib/util.js", "export \"util\""),
        ]);
        assert_eq!(value(&f.loader.require("./main").unwrap()), json!("main"));

        let required = f.compiler.required.lock().unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].0, "/app/main.js");
        assert_eq!(value(&required[0].2), json!("util"));

        let sources = f.compiler.sources.lock().unwrap();
        let expected = format!("\n//# sourceURL=asset://{}/app/main.js\n", key().to_hex());
        assert!(sources[0].ends_with(&expected), "{}", sources[0]);
    }

    #[test]
    fn circular_require_sees_partial_exports() {
        let f = setup(&[
            ("/app/a.js", "export {\"a\": 1}\nrequire ./b\nexport {\"a\": 2}"),
            ("/app/b.js", "require ./a\nexport \"b\""),
        ]);
        let a = f.loader.require("./a").unwrap();
        assert_eq!(value(&a), json!({"a": 2}));

        let required = f.compiler.required.lock().unwrap();
        let (from, name, seen) = &required[0];
        assert_eq!((from.as_str(), name.as_str()), ("/app/b.js", "./a"));
        assert!(Arc::ptr_eq(seen, &a));
        assert!(f.loader.module("/app/a.js").unwrap().is_loaded());
        assert!(f.loader.module("/app/b.js").unwrap().is_loaded());
    }

    #[test]
    fn builtins_bypass_resolution() {
        let f = setup(&[]);
        let loader = f.loader.with_builtin("fs", json!({"native": true})).with_builtin("left-pad", json!(0));
        assert_eq!(value(&loader.require("fs").unwrap()), json!({"native": true}));
        assert!(matches!(loader.require("path"), Err(LoaderError::BuiltinUnavailable(_))));
        assert!(matches!(loader.require("left-pad"), Err(LoaderError::CannotRequire { .. })));
        assert_eq!(loader.fetch_count(), 1);
    }

    #[test]
    fn missing_module_cannot_be_required() {
        let f = setup(&[]);
        let err = f.loader.require("./nope").unwrap_err();
        assert_eq!(err.to_string(), "Cannot require ./nope from /app/index.js");
        assert!(f.loader.trace_paths().is_empty());
    }

    #[test]
    fn failed_compile_is_not_cached() {
        let f = setup(&[("/app/bad.js", "fail")]);
        assert!(matches!(f.loader.require("./bad"), Err(LoaderError::Compile { .. })));
        assert_eq!(f.loader.cache_len(), 0);
        assert!(f.loader.require("./bad").is_err());
        assert_eq!(f.loader.fetch_count(), 2);
    }

    #[test]
    fn trace_takes_priority_over_resolution() {
        let f = setup(&[("/app/x.js", "export \"x\""), ("/app/y.js", "export \"y\"")]);
        let trace = BTreeMap::from([("./x@/app/index.js".to_string(), "/app/y.js".to_string())]);
        let loader = f.loader.with_trace(&trace);
        assert_eq!(value(&loader.require("./x").unwrap()), json!("y"));
    }

    #[test]
    fn preload_inlines_trace_and_tolerates_failures() {
        let f = setup(&[("/app/lib.js", "export \"lib\"")]);
        let trace = BTreeMap::from([
            ("./lib@/app/index.js".to_string(), "/app/lib.js".to_string()),
            ("./lib.js@/app/index.js".to_string(), "/app/lib.js".to_string()),
            ("./gone@/app/index.js".to_string(), "/app/gone.js".to_string()),
        ]);
        let loader = f.loader.with_trace(&trace);

        let report = loader.preload(None);
        assert_eq!(report, PreloadReport { requested: 3, preloaded: 2, failed: 1 });
        assert_eq!(loader.fetch_count(), 2);
        assert!(loader.trace_entry(&TraceKey::new("./lib", "/app/index.js")).unwrap().is_inline());

        assert_eq!(value(&loader.require("./lib").unwrap()), json!("lib"));
        assert_eq!(loader.fetch_count(), 2);

        let again = loader.preload(None);
        assert_eq!(again, PreloadReport { requested: 1, preloaded: 0, failed: 1 });
    }

    #[test]
    fn preload_with_single_fetch_in_flight() {
        let f = setup(&[("/app/a.js", "export 1"), ("/app/b.js", "export 2"), ("/app/c.json", "3")]);
        let config = LoaderConfig { preload_concurrency: 1, ..f.loader.config().clone() };
        let loader = ClientModuleLoader::new(config, f.loader.source.clone(), f.compiler.clone());
        let trace = BTreeMap::from([
            ("./a@/app/index.js".to_string(), "/app/a.js".to_string()),
            ("./b@/app/index.js".to_string(), "/app/b.js".to_string()),
            ("./c@/app/index.js".to_string(), "/app/c.json".to_string()),
        ]);

        let report = loader.preload(Some(&trace));
        assert_eq!(report, PreloadReport { requested: 3, preloaded: 3, failed: 0 });
        assert_eq!(value(&loader.require("./c").unwrap()), json!(3));
        assert_eq!(loader.fetch_count(), 3);
        assert!(f.store.is_empty());
    }

    #[test]
    fn trace_paths_export_manifest_form() {
        let f = setup(&[("/app/lib.js", "export 1")]);
        f.loader.require("./lib").unwrap();
        assert_eq!(
            f.loader.trace_paths(),
            BTreeMap::from([("./lib@/app/index.js".to_string(), "/app/lib.js".to_string())])
        );
    }

    #[test]
    fn local_source_url() {
        let f = setup(&[]);
        let loader = ClientModuleLoader::new(LoaderConfig::default(), f.loader.source.clone(), f.compiler.clone());
        assert_eq!(loader.source_url("/srv/app/x.js"), "file:///srv/app/x.js");
    }
}
