//! Forward `tracing` events to the browser console.
//!
//! The controller logs through `tracing` so it stays host-agnostic. Inside a
//! worker or page, [`init_logging`] installs a [`ConsoleLayer`] that renders
//! each event to a single line and hands it to a [`ConsoleSink`].

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// Destination for rendered log lines.
pub trait ConsoleSink {
    fn write(&self, level: Level, line: &str);
}

/// Writes through `console.{debug,log,warn,error}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserConsole;

impl ConsoleSink for BrowserConsole {
    fn write(&self, level: Level, line: &str) {
        match level {
            Level::ERROR => gloo::console::error!(line),
            Level::WARN => gloo::console::warn!(line),
            Level::INFO => gloo::console::log!(line),
            _ => gloo::console::debug!(line),
        }
    }
}

pub struct ConsoleLayer<W = BrowserConsole> {
    sink: W,
    max_level: LevelFilter,
}

impl<W: ConsoleSink> ConsoleLayer<W> {
    pub fn new(sink: W, max_level: LevelFilter) -> Self {
        Self { sink, max_level }
    }
}

impl<S, W> Layer<S> for ConsoleLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: ConsoleSink + 'static,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.sink
            .write(*meta.level(), &visitor.finish(meta.target()));
    }
}

/// Collects the message and `key=value` pairs of one event.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self, target: &str) -> String {
        format!("[{target}] {}{}", self.message, self.fields)
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the console layer as the global subscriber. Later calls are no-ops.
pub fn init_logging(max_level: LevelFilter) {
    let subscriber =
        tracing_subscriber::registry().with(ConsoleLayer::new(BrowserConsole, max_level));
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(Level, String)>>>);

    impl ConsoleSink for Recorder {
        fn write(&self, level: Level, line: &str) {
            self.0.lock().unwrap().push((level, line.to_string()));
        }
    }

    #[test]
    fn test_layer_renders_message_and_fields() {
        let recorder = Recorder::default();
        let subscriber = tracing_subscriber::registry()
            .with(ConsoleLayer::new(recorder.clone(), LevelFilter::INFO));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "proposal_shell::sw", path = "/assets/a.js", status = 404u16, "bundle not cacheable");
            tracing::debug!(target: "proposal_shell::sw", "filtered out");
        });
        let lines = recorder.0.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::WARN);
        assert_eq!(
            lines[0].1,
            "[proposal_shell::sw] bundle not cacheable path=/assets/a.js status=404"
        );
    }
}
