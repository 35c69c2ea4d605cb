//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint, when a metrics address is configured
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request span
//! - Metric updates are cheap and never fail the request path

pub mod logging;
pub mod metrics;
