//! Tracing subscriber setup for the wsp binaries.
//!
//! Configuration comes from the environment:
//!
//! | Variable         | Values                          | Default          |
//! |------------------|---------------------------------|------------------|
//! | `WSP_LOG_LEVEL`  | any `EnvFilter` directive       | `info`           |
//! | `WSP_LOG_OUTPUT` | `console`, `file`, `both`, `none` | `console`      |
//! | `WSP_LOG_FORMAT` | `human`, `json`                 | `human`          |
//! | `WSP_LOG_FILE`   | path of the log file            | `/tmp/wsp.log`   |
//! | `WSP_LOG_TAGS`   | `key:value,...` span filters    | empty            |
//!
//! Console logs go to stderr so that machine-readable stdout (for example
//! `list-routes --json`) stays clean.

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{field::Visit, span, Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::{Context, Layer},
    prelude::*,
    registry, EnvFilter,
};

pub const LOG_LEVEL_ENV: &str = "WSP_LOG_LEVEL";
pub const LOG_OUTPUT_ENV: &str = "WSP_LOG_OUTPUT";
pub const LOG_FORMAT_ENV: &str = "WSP_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "WSP_LOG_FILE";
pub const LOG_TAGS_ENV: &str = "WSP_LOG_TAGS";

const DEFAULT_LOG_FILE: &str = "/tmp/wsp.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

impl LogOutput {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            "none" | "off" => LogOutput::None,
            _ => LogOutput::Console,
        }
    }

    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

/// A `key:value` pair that must be present on an enclosing span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub file: PathBuf,
    pub tags: Vec<Tag>,
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup(LOG_LEVEL_ENV).unwrap_or_else(|| "info".to_string());
        let output = lookup(LOG_OUTPUT_ENV)
            .map(|v| LogOutput::parse(&v))
            .unwrap_or(LogOutput::Console);
        let format = match lookup(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        let file = lookup(LOG_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        let tags = lookup(LOG_TAGS_ENV)
            .map(|v| parse_tags(&v))
            .unwrap_or_default();

        Self {
            level,
            output,
            format,
            file,
            tags,
        }
    }
}

fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter_map(|s| {
            let (key, value) = s.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(Tag {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

// --- Tee writer: one event, two sinks ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

// --- Span tag filtering ---
type SpanFields = HashMap<String, String>;

struct TagFilterLayer {
    filters: Vec<Tag>,
}

impl<S> Layer<S> for TagFilterLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor(fields));
        }
    }

    // Spans are always enabled so their fields exist when events are checked.
    fn event_enabled(&self, event: &Event<'_>, ctx: Context<'_, S>) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        // With tags configured, events outside any span are dropped.
        let Some(scope) = ctx.event_scope(event) else {
            return false;
        };

        let mut seen = SpanFields::new();
        for span_ref in scope {
            if let Some(fields) = span_ref.extensions().get::<SpanFields>() {
                for (k, v) in fields {
                    seen.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        tags_match(&self.filters, &seen)
    }
}

fn tags_match(filters: &[Tag], fields: &SpanFields) -> bool {
    filters.iter().all(|filter| {
        fields
            .get(&filter.key)
            .is_some_and(|value| filter.value == "*" || value.contains(&filter.value))
    })
}

struct FieldVisitor<'a>(&'a mut SpanFields);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Initializes the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the program.
pub fn init_with(settings: LogSettings) -> Option<WorkerGuard> {
    let mut env_filter =
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let subscriber = registry().with(env_filter).with(TagFilterLayer {
        filters: settings.tags.clone(),
    });
    let is_json = settings.format == LogFormat::Json;

    let log_dir = settings
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/tmp"))
        .to_path_buf();
    let log_filename = settings
        .file
        .file_name()
        .map(|f| f.to_os_string())
        .unwrap_or_else(|| "wsp.log".into());

    let mut guard: Option<WorkerGuard> = None;

    match (settings.output.console(), settings.output.file()) {
        (true, true) => {
            let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(file_guard);

            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(MakeTee {
                make_a: io::stderr,
                make_b: non_blocking,
            });
            if is_json {
                let _ = subscriber.with(fmt_layer.json()).try_init();
            } else {
                let _ = subscriber.with(fmt_layer.with_ansi(false)).try_init();
            }
        }
        (true, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
            if is_json {
                let _ = subscriber.with(fmt_layer.json()).try_init();
            } else {
                let _ = subscriber.with(fmt_layer.pretty()).try_init();
            }
        }
        (false, true) => {
            let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(file_guard);

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            if is_json {
                let _ = subscriber.with(fmt_layer.json()).try_init();
            } else {
                let _ = subscriber.with(fmt_layer).try_init();
            }
        }
        (false, false) => {
            let _ = subscriber.try_init();
        }
    }

    guard
}
