//! Client module loader for Hyperspace.
//!
//! [`ClientModuleLoader`] gives code running in a host a synchronous
//! `require`: specifiers are resolved through the resolution protocol,
//! sources are evaluated by a pluggable [`Compiler`], and modules are cached
//! by resolved filename. Every resolution is recorded in a trace that can be
//! persisted to the application manifest and replayed with
//! [`ClientModuleLoader::preload`] to skip the round trips next time.

pub mod builtin;
pub mod compiler;
pub mod config;
pub mod error;
pub mod loader;
pub mod source;
pub mod trace;

pub use builtin::{is_builtin, BUILTIN_MODULES};
pub use compiler::{Compiler, Exports, Module, SourceCompiler};
pub use config::LoaderConfig;
pub use error::{LoaderError, LoaderResult};
pub use loader::{ClientModuleLoader, Require};
pub use source::{HandlerSource, ModuleSource, ResolvedModule};
pub use trace::{PreloadReport, TraceEntry};
