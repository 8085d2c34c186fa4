//! Drive pool and virtual filesystem for Hyperspace.
//!
//! Applications live on drives: content-addressed, peer-replicated data sets
//! named by a [`ContentKey`](hyp_types::ContentKey). This crate gives the rest
//! of the system one way to read them, and one place that owns them.
//!
//! # Filesystem Backends
//!
//! All backends implement the [`Filesystem`] trait:
//!
//! - [`LocalFs`] -- host disk, optionally confined to a root directory
//! - [`MemoryDrive`] -- in-memory drive for tests and embedding
//! - [`DirDrive`] -- drive replica stored as a directory named by its key
//!
//! # Drive Pool
//!
//! [`DriveStore`] maps content keys to open drives with reference counting.
//! Components check a drive out, use the [`DriveHandle`], and check it back
//! in exactly once on every exit path. [`DriveLease`] does the checkin on
//! drop so early returns and cancellation cannot leak a reference.
//!
//! # Design Rules
//!
//! 1. The pool is the only mutable shared state; it changes only through
//!    checkout and checkin.
//! 2. A drive is closed exactly once, when its count returns to zero.
//! 3. Opening a drive starts a lookup-only join on its discovery key; closing
//!    it leaves the topic.
//! 4. Not-found is distinct from every other storage failure.

pub mod dir;
pub mod download;
pub mod drive;
pub mod error;
pub mod fs;
pub mod local;
pub mod memory;
pub mod network;
pub mod path;
pub mod store;

pub use dir::{DirDrive, DirOpener};
pub use download::{fetch_tree, Download, DownloadCanceller, DownloadStats};
pub use drive::{Drive, DriveOpener};
pub use error::{DriveError, DriveResult};
pub use fs::{ByteStream, EntryKind, Filesystem, ReadRange, Stat};
pub use local::LocalFs;
pub use memory::{MemoryDrive, MemoryOpener};
pub use network::{JoinOptions, LogNetwork, Network, RecordingNetwork};
pub use store::{DriveHandle, DriveLease, DriveStore};
