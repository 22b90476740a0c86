//! Cloud Logging encoder profile: field-name mapping, severity names, and the
//! JSON output layer.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

// Entry keys of the Cloud Logging LogEntry schema.
// https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry
pub(crate) const TIMESTAMP_KEY: &str = "timestamp";
pub(crate) const SEVERITY_KEY: &str = "severity";
pub(crate) const LOG_NAME_KEY: &str = "logName";
pub(crate) const CALLER_KEY: &str = "caller";
pub(crate) const MESSAGE_KEY: &str = "textPayload";
pub(crate) const STACKTRACE_KEY: &str = "trace";

/// Severity names accepted by the Cloud Logging ingestion schema.
///
/// The schema defines seven names; entries emitted through `tracing` use the
/// `Debug`..`Error` subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        if level == Level::TRACE || level == Level::DEBUG {
            Severity::Debug
        } else if level == Level::INFO {
            Severity::Info
        } else if level == Level::WARN {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

/// Shorten a call-site path to its final two components.
fn short_caller(file: &str, line: Option<u32>) -> String {
    let short = match file.rmatch_indices('/').nth(1) {
        Some((index, _)) => &file[index + 1..],
        None => file,
    };
    match line {
        Some(line) => format!("{short}:{line}"),
        None => short.to_string(),
    }
}

/// Span attributes captured at creation, kept in the span's extensions so
/// events inside the span inherit them.
struct SpanFields(BTreeMap<String, Value>);

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), json!(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), json!(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields
                .insert(field.name().to_string(), json!(format!("{value:?}")));
        }
    }
}

/// Layer that writes one Cloud-Logging-shaped JSON object per event.
///
/// Field names, severity names, ISO-8601 timestamps, and the short
/// `file:line` call-site form follow the ingestion schema exactly. Fields
/// recorded on enclosing spans (a bound `REQUEST_ID`, for instance) are
/// folded into every entry emitted inside them.
pub struct GoogleCloudLayer<W> {
    make_writer: W,
}

impl<W> GoogleCloudLayer<W> {
    pub fn new(make_writer: W) -> Self {
        Self { make_writer }
    }
}

impl<S, W> Layer<S> for GoogleCloudLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        let mut fields = extensions
            .remove::<SpanFields>()
            .map(|existing| existing.0)
            .unwrap_or_default();
        fields.extend(visitor.fields);
        extensions.insert(SpanFields(fields));
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = Map::new();
        entry.insert(
            TIMESTAMP_KEY.to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        entry.insert(
            SEVERITY_KEY.to_string(),
            json!(Severity::from(*metadata.level()).as_str()),
        );
        entry.insert(LOG_NAME_KEY.to_string(), json!(metadata.target()));
        if let Some(file) = metadata.file() {
            entry.insert(CALLER_KEY.to_string(), json!(short_caller(file, metadata.line())));
        }
        entry.insert(
            MESSAGE_KEY.to_string(),
            json!(visitor.message.unwrap_or_default()),
        );

        if *metadata.level() == Level::ERROR {
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                entry.insert(STACKTRACE_KEY.to_string(), json!(backtrace.to_string()));
            }
        }

        // Fields inherited from the enclosing span scope, outermost first so
        // inner spans win on key collisions.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    for (key, value) in &fields.0 {
                        entry.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        for (key, value) in visitor.fields {
            entry.insert(key, value);
        }

        let Ok(mut line) = serde_json::to_vec(&Value::Object(entry)) else {
            return;
        };
        line.push(b'\n');
        let _ = self.make_writer.make_writer().write_all(&line);
    }
}
