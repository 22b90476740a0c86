//! Process-global logger facade.
//!
//! Configuration is staged by the setters during startup; the engine is built
//! exactly once, on the first [`instance`] call, from whatever was staged at
//! that moment. A misconfigured call never aborts the host: late setters are
//! rejected with a typed error plus an in-band warning, and an install
//! failure degrades to a stderr report.

use std::io;
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggerConfig};
use crate::context::RequestContext;
use crate::logger::{self, Logger};

/// Errors surfaced by the facade's configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// A setter was called after the engine had already been built. The
    /// running engine keeps its original configuration.
    #[error("logger already initialized; {0} has no effect")]
    AlreadyInitialized(&'static str),
}

static PENDING: Mutex<Option<LoggerConfig>> = Mutex::new(None);
static CONTEXT: RwLock<Option<RequestContext>> = RwLock::new(None);
static ENGINE: OnceLock<Logger> = OnceLock::new();

fn lock_pending() -> std::sync::MutexGuard<'static, Option<LoggerConfig>> {
    PENDING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Set the output encoding for the process-global logger.
///
/// Must be called before the first [`instance`] call. Once the engine is
/// built the configuration is frozen: the running engine is left untouched,
/// a warning entry is emitted through it, and
/// [`LoggerError::AlreadyInitialized`] is returned.
pub fn set_format(format: LogFormat) -> Result<(), LoggerError> {
    if let Some(base) = ENGINE.get() {
        base.warn("logger already initialized when setting format");
        return Err(LoggerError::AlreadyInitialized("set_format"));
    }
    lock_pending().get_or_insert_with(LoggerConfig::default).format = format;
    Ok(())
}

/// Lower the emitted severity threshold to include debug entries.
///
/// Same late-call rule as [`set_format`].
pub fn enable_debug_logging() -> Result<(), LoggerError> {
    if let Some(base) = ENGINE.get() {
        base.warn("logger already initialized when enabling debug");
        return Err(LoggerError::AlreadyInitialized("enable_debug_logging"));
    }
    lock_pending()
        .get_or_insert_with(LoggerConfig::default)
        .debug_logging = true;
    Ok(())
}

/// Install `ctx` as the correlation context consulted by [`instance`].
///
/// Installing a context with no request identifier unbinds correlation.
pub fn set_context(ctx: RequestContext) {
    *CONTEXT.write().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
}

/// The shared logger handle, building the engine on first call.
///
/// Exactly one engine is built even under concurrent first use; every caller
/// observes the same instance. The subscriber is installed as the global
/// default, writing to stdout, with the severity threshold overridable
/// through `RUST_LOG`. When the installed correlation context carries a
/// request identifier, the returned handle stamps it on emitted entries.
pub fn instance() -> Logger {
    let base = ENGINE.get_or_init(|| {
        let config = lock_pending().take().unwrap_or_default();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
        let (handle, subscriber) = logger::build_with_filter(filter, &config, io::stdout);
        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("cloudlog: failed to install global subscriber: {err}");
        }
        handle
    });

    let context = CONTEXT.read().unwrap_or_else(PoisonError::into_inner);
    match context.as_ref().and_then(|ctx| ctx.request_id()) {
        Some(request_id) => base.with_request_id(request_id),
        None => base.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct TestWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl TestWriter {
        fn new() -> Self {
            Self::default()
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for TestWriter {
        type Writer = TestWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    // The facade is process-global state and the unit tests share one
    // process, so every assertion against it lives in this single test.
    #[test]
    fn test_facade_lifecycle() {
        set_format(LogFormat::GoogleCloud).unwrap();
        enable_debug_logging().unwrap();

        // Concurrent first use builds exactly one engine.
        let handles: Vec<Logger> = thread::scope(|scope| {
            let spawned: Vec<_> = (0..8).map(|_| scope.spawn(instance)).collect();
            spawned
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });
        for pair in handles.windows(2) {
            assert!(pair[0].same_engine(&pair[1]));
        }
        assert_eq!(handles[0].config().format, LogFormat::GoogleCloud);
        assert!(handles[0].config().debug_logging);

        // Later accesses return the same engine.
        assert!(instance().same_engine(&handles[0]));

        // Late reconfiguration is rejected and leaves the engine untouched.
        let err = set_format(LogFormat::Lines).unwrap_err();
        assert!(matches!(err, LoggerError::AlreadyInitialized("set_format")));
        assert!(enable_debug_logging().is_err());
        assert_eq!(instance().config().format, LogFormat::GoogleCloud);
        assert!(instance().config().debug_logging);

        // The rejection is also visible as a warning entry in the stream.
        let writer = TestWriter::new();
        let (_, subscriber) = logger::build(&LoggerConfig::default(), writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            let _ = set_format(LogFormat::Lines);
        });
        assert!(writer.output().contains("logger already initialized when setting format"));

        // Correlation follows the installed context.
        let ctx = RequestContext::new().with_request_id("req-1");
        set_context(ctx.clone());
        assert_eq!(instance().request_id(), Some("req-1"));

        set_context(ctx.with_request_id("req-2"));
        assert_eq!(instance().request_id(), Some("req-2"));

        set_context(RequestContext::new());
        assert_eq!(instance().request_id(), None);
    }
}
