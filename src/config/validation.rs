//! Configuration validation.
//!
//! # Responsibilities
//! - Reject upstreams with a scheme other than http/https (fatal for the load)
//! - Drop rules with an unknown match mode or an empty path (warning only)
//! - Warn when nothing is left to route
//!
//! # Design Decisions
//! - Serde handles syntax; this module handles meaning
//! - A fatal error rejects the whole configuration, so a half-valid
//!   configuration never reaches a snapshot
//! - Rule problems are local: the offending rule is skipped, the rest survive

use thiserror::Error;

use crate::config::schema::{Configuration, MatchMode, Rule, Upstream};

/// Fatal configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream '{upstream}' has unsupported scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { upstream: String, scheme: String },
}

/// Why a single rule was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleIssue {
    #[error("invalid match mode '{0}'")]
    InvalidMatchMode(String),

    #[error("path is blank, this rule will never match")]
    EmptyPath,
}

/// A rule that passed validation, with its match mode resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRule {
    /// Position of the rule in the source list.
    pub index: usize,
    pub rule: Rule,
    pub mode: MatchMode,
}

/// Check every upstream scheme. The first offender fails the whole configuration.
pub fn check_upstreams(upstreams: &[Upstream]) -> Result<(), ValidationError> {
    for upstream in upstreams {
        match upstream.effective_scheme() {
            "http" | "https" => {}
            other => {
                return Err(ValidationError::UnsupportedScheme {
                    upstream: upstream.name.clone(),
                    scheme: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Check one rule and resolve its match mode.
pub fn check_rule(rule: &Rule) -> Result<MatchMode, RuleIssue> {
    let mode = rule
        .match_mode
        .parse::<MatchMode>()
        .map_err(RuleIssue::InvalidMatchMode)?;

    if rule.path.is_empty() {
        return Err(RuleIssue::EmptyPath);
    }

    Ok(mode)
}

/// Validate a configuration and return the rules that can be served, in source order.
pub fn validate(config: &Configuration) -> Result<Vec<ValidRule>, ValidationError> {
    check_upstreams(&config.upstreams)?;

    let rules: Vec<ValidRule> = config
        .rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| match check_rule(rule) {
            Ok(mode) => Some(ValidRule {
                index,
                rule: rule.clone(),
                mode,
            }),
            Err(issue) => {
                tracing::warn!(
                    rule = index,
                    path = %rule.path,
                    upstream = %rule.upstream,
                    "Rule skipped: {}",
                    issue
                );
                None
            }
        })
        .collect();

    if rules.is_empty() {
        tracing::warn!("Configuration contains no usable rules, every routed request will get 404");
    }
    if config.upstreams.is_empty() {
        tracing::warn!("Configuration contains no upstreams");
    }

    Ok(rules)
}
