//! Engine assembly and the shared logger handle.

use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggerConfig};
use crate::encoder::GoogleCloudLayer;
use crate::sampling::SamplingFilter;

/// Build the logger engine for `config`, writing entries to `make_writer`.
///
/// Returns the owned handle together with the assembled subscriber; the
/// caller decides where the subscriber lives: installed process-wide with
/// `tracing::subscriber::set_global_default`, or scoped with
/// `tracing::subscriber::with_default` (how the tests isolate output).
/// Construction itself cannot fail.
pub fn build<W>(
    config: &LoggerConfig,
    make_writer: W,
) -> (Logger, impl Subscriber + Send + Sync + 'static)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build_with_filter(EnvFilter::new(config.filter_directive()), config, make_writer)
}

/// Like [`build`], with a caller-supplied filter for hosts that need
/// per-target directives (for example `"info,my_crate=debug"`).
pub fn build_with_filter<W>(
    filter: EnvFilter,
    config: &LoggerConfig,
    make_writer: W,
) -> (Logger, impl Subscriber + Send + Sync + 'static)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let sampler = SamplingFilter::new(config.sampling.clone());

    // The severity filter sits outermost so suppressed-level entries never
    // reach the sampling counters.
    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Lines => fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(make_writer)
            .with_filter(sampler)
            .with_filter(filter)
            .boxed(),
        LogFormat::GoogleCloud => GoogleCloudLayer::new(make_writer)
            .with_filter(sampler)
            .with_filter(filter)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(output);
    (Logger::new(config.clone()), subscriber)
}

/// Shared handle to a built logger engine.
///
/// Cheap to clone. A handle derived with [`Logger::with_request_id`] stamps a
/// `REQUEST_ID` field on every entry it emits; the base handle emits entries
/// unadorned. Entries go through the dispatcher active on the calling thread.
#[derive(Debug, Clone)]
pub struct Logger {
    config: Arc<LoggerConfig>,
    request_id: Option<Arc<str>>,
}

impl Logger {
    pub(crate) fn new(config: LoggerConfig) -> Self {
        Self {
            config: Arc::new(config),
            request_id: None,
        }
    }

    /// Derive a handle that stamps `request_id` on every entry it emits.
    pub fn with_request_id(&self, request_id: &str) -> Logger {
        Self {
            config: Arc::clone(&self.config),
            request_id: Some(Arc::from(request_id)),
        }
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// The request identifier bound to this handle, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// True when both handles are backed by the same engine build.
    pub fn same_engine(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.config, &other.config)
    }

    pub fn debug(&self, message: &str) {
        match &self.request_id {
            Some(id) => tracing::debug!(REQUEST_ID = %id, "{message}"),
            None => tracing::debug!("{message}"),
        }
    }

    pub fn info(&self, message: &str) {
        match &self.request_id {
            Some(id) => tracing::info!(REQUEST_ID = %id, "{message}"),
            None => tracing::info!("{message}"),
        }
    }

    pub fn warn(&self, message: &str) {
        match &self.request_id {
            Some(id) => tracing::warn!(REQUEST_ID = %id, "{message}"),
            None => tracing::warn!("{message}"),
        }
    }

    pub fn error(&self, message: &str) {
        match &self.request_id {
            Some(id) => tracing::error!(REQUEST_ID = %id, "{message}"),
            None => tracing::error!("{message}"),
        }
    }
}
