//! Rule matching logic.
//!
//! # Responsibilities
//! - Match the request host (port stripped) exactly, case-sensitive
//! - Match the request path by prefix or by exact equality
//! - Combine both conditions with AND semantics
//!
//! # Design Decisions
//! - Empty rule host = always matches (wildcard)
//! - No normalisation beyond dropping the port; a rule written for
//!   `api.example.com` does not match `API.example.com`
//! - No regex to guarantee O(n) matching

use crate::config::schema::MatchMode;

/// Drop a port suffix from a Host value. Splits on the first colon.
pub fn strip_port(host: &str) -> &str {
    match host.split_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// Host and path predicate of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatcher {
    host: Option<String>,
    path: String,
    mode: MatchMode,
}

impl RuleMatcher {
    /// Create a matcher. An empty `host` matches every host.
    pub fn new(host: impl Into<String>, path: impl Into<String>, mode: MatchMode) -> Self {
        let host = host.into();
        Self {
            host: (!host.is_empty()).then_some(host),
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns true if the host condition passes. `host` must already have its port stripped.
    pub fn matches_host(&self, host: &str) -> bool {
        self.host.as_deref().map_or(true, |expected| expected == host)
    }

    /// Returns true if the path condition passes.
    pub fn matches_path(&self, path: &str) -> bool {
        match self.mode {
            MatchMode::Prefix => path.starts_with(&self.path),
            MatchMode::Exact => path == self.path,
        }
    }

    /// Both conditions.
    pub fn matches(&self, host: &str, path: &str) -> bool {
        self.matches_host(host) && self.matches_path(path)
    }
}
