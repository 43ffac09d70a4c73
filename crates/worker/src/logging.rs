// Log output. JSON lines carry a `severity` field (`ERROR`, `WARNING`,
// `INFO`, `DEBUG`), which is what managed log sinks read to classify entries.

use std::fmt;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{JsonFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, WorkerConfig};

/// Install the global subscriber. Logs go to stderr; an unparsable filter
/// falls back to `info`.
pub fn init(config: &WorkerConfig) {
    let filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => builder.fmt_fields(JsonFields::new()).event_format(SeverityJson).init(),
        LogFormat::Text => builder.init(),
    }
}

pub fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

/// One JSON object per event: `timestamp`, `severity`, `message`, `target`,
/// the event's own fields at top level, and `spans` from the outermost in.
///
/// Span fields must be recorded with [`JsonFields`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityJson;

impl<S, N> FormatEvent<S, N> for SeverityJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        let message = fields.0.remove("message").unwrap_or_else(|| Value::String(String::new()));

        let mut entry = fields.0;
        entry.insert("timestamp".into(), Value::String(timestamp));
        entry.insert("severity".into(), severity(metadata.level()).into());
        entry.insert("message".into(), message);
        entry.insert("target".into(), metadata.target().into());

        let spans: Vec<Value> = ctx
            .event_scope()
            .into_iter()
            .flat_map(|scope| scope.from_root())
            .map(|span| {
                let mut object = Map::new();
                object.insert("name".into(), span.name().into());
                let extensions = span.extensions();
                if let Some(formatted) = extensions.get::<FormattedFields<N>>() {
                    if let Ok(Value::Object(recorded)) = serde_json::from_str::<Value>(formatted) {
                        object.extend(recorded);
                    }
                }
                Value::Object(object)
            })
            .collect();
        if !spans.is_empty() {
            entry.insert("spans".into(), Value::Array(spans));
        }

        let line = serde_json::to_string(&Value::Object(entry)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl Visit for FieldMap {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().into(), Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(emit: impl FnOnce()) -> Vec<Value> {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .fmt_fields(JsonFields::new())
            .event_format(SeverityJson)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        output.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
    }

    #[test]
    fn failed_stage_is_a_warning_entry_with_job_context() {
        let entries = capture(|| {
            let span = tracing::info_span!("job", job_id = "job-7", user_id = "u1");
            let _entered = span.enter();
            tracing::warn!(stage = "cloneGithubRepo", attempts = 1u64, "job failed");
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["severity"], "WARNING");
        assert_eq!(entry["message"], "job failed");
        assert_eq!(entry["stage"], "cloneGithubRepo");
        assert_eq!(entry["attempts"], 1);
        assert_eq!(entry["spans"][0]["name"], "job");
        assert_eq!(entry["spans"][0]["job_id"], "job-7");
        assert!(entry["timestamp"].as_str().is_some_and(|ts| !ts.is_empty()));
        assert!(entry.get("level").is_none());
    }

    #[test]
    fn every_level_maps_to_a_severity() {
        let entries = capture(|| {
            tracing::error!("e");
            tracing::warn!("w");
            tracing::info!("i");
            tracing::debug!("d");
            tracing::trace!("t");
        });

        let severities: Vec<&str> =
            entries.iter().map(|entry| entry["severity"].as_str().unwrap()).collect();
        assert_eq!(severities, vec!["ERROR", "WARNING", "INFO", "DEBUG", "DEBUG"]);
        assert!(entries.iter().all(|entry| entry.get("spans").is_none()));
    }
}
