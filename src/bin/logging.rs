//! Installs the process's `tracing` subscriber: a syslog sink (always
//! active, facility `LOG_LOCAL0`, identity `zmq_adapter`) and a stderr
//! debug-trace sink active only when `--debug` is passed.
//!
//! Only the binary crate calls this; the library crate never touches
//! global subscriber state.

use syslog::Facility;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, Layer};

/// Installs the global `tracing` subscriber. `debug` enables the stderr
/// trace layer at `DEBUG` and above; the syslog layer is always active at
/// `INFO` and above.
pub fn init(debug: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let formatter = syslog::Formatter3164 {
        facility: Facility::LOG_LOCAL0,
        hostname: None,
        process: "zmq_adapter".into(),
        pid: std::process::id(),
    };
    let syslog_writer = syslog::unix(formatter)?;
    let syslog_layer = tracing_syslog_layer(syslog_writer);

    let stderr_layer = debug.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(syslog_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

/// Wraps a syslog writer as a minimal `tracing_subscriber` layer sinking
/// `INFO`-and-above events as single-line syslog messages.
fn tracing_syslog_layer(
    writer: syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>,
) -> impl tracing_subscriber::Layer<tracing_subscriber::Registry> {
    SyslogLayer {
        writer: std::sync::Mutex::new(writer),
    }
    .with_filter(LevelFilter::INFO)
}

struct SyslogLayer {
    writer: std::sync::Mutex<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>,
}

impl<S> tracing_subscriber::Layer<S> for SyslogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut message = String::new();
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        let mut writer = self.writer.lock().unwrap();
        let _ = match *event.metadata().level() {
            tracing::Level::ERROR => writer.err(&message),
            tracing::Level::WARN => writer.warning(&message),
            _ => writer.info(&message),
        };
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        use std::fmt::Write;
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}
