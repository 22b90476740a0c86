//! Structured logging facade with Cloud Logging output and request correlation.
//!
//! A thin shim over the `tracing` ecosystem: pick an output encoding
//! ([`LogFormat`]), optionally enable debug verbosity, and build a [`Logger`]
//! handle whose derived forms stamp a `REQUEST_ID` field on every entry
//! emitted while handling a request. [`build`] is the injectable entry point;
//! the [`facade`] module layers a process-global, built-once-on-first-use
//! accessor on top of it for hosts that want a single shared logger.

pub mod config;
pub mod context;
pub mod encoder;
pub mod facade;
pub mod logger;
pub mod sampling;

pub use config::{LogFormat, LoggerConfig, SamplingConfig};
pub use context::RequestContext;
pub use encoder::{GoogleCloudLayer, Severity};
pub use facade::{enable_debug_logging, instance, set_context, set_format, LoggerError};
pub use logger::{build, build_with_filter, Logger};
pub use sampling::SamplingFilter;
