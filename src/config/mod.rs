//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML) or inline base64
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (scheme checks, rule filtering)
//!     → runtime::Snapshot (immutable, built whole)
//!
//! On file change:
//!     watcher.rs receives a notify event
//!     → debounce, settle
//!     → loader.rs loads new config
//!     → runtime::ProxyContext builds and publishes a new snapshot
//!     → in-flight requests finish on the snapshot they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - A bad reload never replaces a good snapshot

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{decode_inline, load_config, parse_config, LoadError};
pub use schema::{Configuration, LogFormat, MatchMode, Rule, ServerSettings, Upstream};
pub use validation::{ValidRule, ValidationError};
pub use watcher::{ConfigWatcher, WatchSettings};
