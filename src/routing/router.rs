//! Route lookup.
//!
//! # Responsibilities
//! - Store the validated rules in source order
//! - Return the first rule whose host and path conditions both pass
//! - Return an explicit no-match otherwise
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) linear scan; rule lists are tens of entries, not thousands
//! - Priority is list position, never path specificity

use crate::config::validation::ValidRule;
use crate::routing::matcher::{strip_port, RuleMatcher};

/// A compiled rule ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Position of the rule in the source configuration.
    pub index: usize,
    pub matcher: RuleMatcher,
    /// Upstream name to forward to.
    pub upstream: String,
    pub strip_path: bool,
}

impl Route {
    /// Request path as it should be sent upstream.
    ///
    /// With `strip_path`, the first occurrence of the rule path is removed. A
    /// result without a leading slash gets one.
    pub fn rewrite_path(&self, path: &str) -> String {
        if !self.strip_path {
            return path.to_string();
        }

        let stripped = path.replacen(self.matcher.path(), "", 1);
        if stripped.starts_with('/') {
            stripped
        } else {
            format!("/{stripped}")
        }
    }
}

/// Ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Build the table from validated rules, keeping their order.
    pub fn from_rules(rules: Vec<ValidRule>) -> Self {
        let routes = rules
            .into_iter()
            .map(|valid| Route {
                index: valid.index,
                matcher: RuleMatcher::new(valid.rule.host, valid.rule.path, valid.mode),
                upstream: valid.rule.upstream,
                strip_path: valid.rule.strip_path,
            })
            .collect();

        Self { routes }
    }

    /// Find the first route matching `host` (port allowed) and `path`.
    pub fn match_request(&self, host: &str, path: &str) -> Option<&Route> {
        let host = strip_port(host);

        let matched = self.routes.iter().find(|route| {
            tracing::trace!(
                rule = route.index,
                rule_path = %route.matcher.path(),
                host = %host,
                path = %path,
                "Checking rule"
            );
            route.matcher.matches(host, path)
        });

        if let Some(route) = matched {
            tracing::debug!(rule = route.index, upstream = %route.upstream, "Matched rule");
        }
        matched
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Configuration, Rule};
    use crate::config::validation::validate;

    fn router(rules: Vec<Rule>) -> Router {
        let config = Configuration {
            upstreams: vec![],
            rules,
        };
        Router::from_rules(validate(&config).unwrap())
    }

    fn rule(path: &str, upstream: &str) -> Rule {
        Rule {
            path: path.into(),
            upstream: upstream.into(),
            ..Default::default()
        }
    }

    #[test]
    fn first_match_wins_over_more_specific() {
        let router = router(vec![rule("/", "catch-all"), rule("/api", "api")]);

        let route = router.match_request("example.com", "/api/items").unwrap();
        assert_eq!(route.upstream, "catch-all");
        assert_eq!(route.index, 0);
    }

    #[test]
    fn host_constraint_ignores_port() {
        let router = router(vec![
            Rule {
                host: "proxy.example.net".into(),
                ..rule("/", "a")
            },
            rule("/api", "b"),
        ]);

        assert_eq!(
            router.match_request("proxy.example.net:8443", "/").unwrap().upstream,
            "a"
        );
        assert!(router.match_request("other.net", "/").is_none());
        assert_eq!(
            router.match_request("other.net", "/api/x").unwrap().upstream,
            "b"
        );
    }

    #[test]
    fn invalid_rules_never_match() {
        let router = router(vec![
            Rule {
                match_mode: "bogus".into(),
                ..rule("/", "bad")
            },
            rule("", "blank"),
            rule("/ok", "good"),
        ]);

        assert_eq!(router.len(), 1);
        assert!(router.match_request("h", "/").is_none());
        assert_eq!(router.match_request("h", "/ok").unwrap().upstream, "good");
    }

    #[test]
    fn exact_mode_requires_equality() {
        let router = router(vec![
            Rule {
                match_mode: "exact".into(),
                ..rule("/health", "exact")
            },
            rule("/health", "prefix"),
        ]);

        assert_eq!(router.match_request("h", "/health").unwrap().upstream, "exact");
        assert_eq!(router.match_request("h", "/healthz").unwrap().upstream, "prefix");
    }

    #[test]
    fn empty_router_matches_nothing() {
        let router = Router::default();
        assert!(router.is_empty());
        assert!(router.match_request("h", "/").is_none());
    }

    #[test]
    fn strip_path_removes_first_occurrence_once() {
        let router = router(vec![Rule {
            strip_path: true,
            ..rule("/api", "b")
        }]);
        let route = router.match_request("h", "/api/x").unwrap();

        assert_eq!(route.rewrite_path("/api/x"), "/x");
        assert_eq!(route.rewrite_path("/api/api/x"), "/api/x");
        assert_eq!(route.rewrite_path("/api"), "/");
        assert_eq!(route.rewrite_path("/apiary"), "/ary");
    }

    #[test]
    fn no_strip_keeps_path() {
        let router = router(vec![rule("/api", "b")]);
        let route = router.match_request("h", "/api/x").unwrap();
        assert_eq!(route.rewrite_path("/api/x"), "/api/x");
    }
}
