//! Log-volume sampling.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::field::{Field, Visit};
use tracing::{Event, Metadata};
use tracing_subscriber::layer::{Context, Filter};

use crate::config::SamplingConfig;

/// How often per-message counters reset.
const SAMPLE_TICK: Duration = Duration::from_secs(1);

struct MessageCounter {
    window_start: Instant,
    seen: u64,
}

/// Per-message-pattern sampling filter.
///
/// Within each one-second window the first `initial` occurrences of a message
/// pass verbatim, then one in every `thereafter`. Bounds log volume when the
/// same statement fires at high frequency without losing distinct messages.
pub struct SamplingFilter {
    sampling: Option<SamplingConfig>,
    tick: Duration,
    counters: Mutex<HashMap<String, MessageCounter>>,
}

impl SamplingFilter {
    pub fn new(sampling: Option<SamplingConfig>) -> Self {
        Self {
            sampling,
            tick: SAMPLE_TICK,
            counters: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Decide whether this occurrence of `message` is kept.
    fn admit(&self, message: String) -> bool {
        let Some(sampling) = &self.sampling else {
            return true;
        };
        let thereafter = sampling.thereafter.max(1);

        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = counters.entry(message).or_insert(MessageCounter {
            window_start: now,
            seen: 0,
        });
        if now.duration_since(counter.window_start) >= self.tick {
            counter.window_start = now;
            counter.seen = 0;
        }
        counter.seen += 1;

        counter.seen <= sampling.initial || (counter.seen - sampling.initial) % thereafter == 0
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S> Filter<S> for SamplingFilter {
    fn enabled(&self, _metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        if self.sampling.is_none() {
            return true;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.admit(visitor.message.unwrap_or_default())
    }
}
