//! `unionkit_log`:
//! Tracing subscriber setup shared by the unionkit crates and bindings.
//!
//! Library crates only emit `tracing` events; whoever hosts them (a binary,
//! the Python bridge, a test) calls [`init_logging`] once.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

pub use tracing::Level;

static B_INITIALIZED: AtomicBool = AtomicBool::new(false);

////////////////////////////////////////////////////////////////////////////////
// #region Spec

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumLogFormat {
    /// Human-readable lines.
    #[default]
    Plaintext,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for EnumLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext => write!(f, "plaintext"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for EnumLogFormat {
    type Err = LogInitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" | "text" => Ok(Self::Plaintext),
            "json" => Ok(Self::Json),
            _ => Err(LogInitError::InvalidFormat(s.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct SpecLogOptions {
    /// Target whose events are shown at `level`.
    pub component: String,
    /// Default verbosity when `RUST_LOG` does not decide.
    pub level: Level,
    pub format: EnumLogFormat,
    /// Colorize plaintext output.
    pub if_ansi: bool,
    /// Let `RUST_LOG` override `level`.
    pub if_respect_env: bool,
}

impl Default for SpecLogOptions {
    fn default() -> Self {
        Self {
            component: "unionkit_io_fs".to_string(),
            level: Level::INFO,
            format: EnumLogFormat::Plaintext,
            if_ansi: true,
            if_respect_env: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("Invalid log format: `{0}`. Expected one of: ['plaintext', 'json']")]
    InvalidFormat(String),
    #[error("Invalid log level: `{0}`. Expected one of: ['error', 'warn', 'info', 'debug', 'trace']")]
    InvalidLevel(String),
    #[error("Failed to install global subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Parse a level name such as `"debug"` (case-insensitive).
pub fn parse_level(value: &str) -> Result<Level, LogInitError> {
    Level::from_str(value).map_err(|_| LogInitError::InvalidLevel(value.to_string()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Init

/// Filter directives used when `RUST_LOG` is absent or ignored.
pub fn default_directives(spec_log_options: &SpecLogOptions) -> String {
    let level = spec_log_options.level;
    if spec_log_options.component.is_empty() {
        return level.to_string().to_lowercase();
    }
    format!(
        "{},{}={}",
        Level::WARN.to_string().to_lowercase(),
        spec_log_options.component,
        level.to_string().to_lowercase()
    )
}

fn build_filter(spec_log_options: &SpecLogOptions) -> EnvFilter {
    let c_directives = default_directives(spec_log_options);
    if spec_log_options.if_respect_env {
        return EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(c_directives));
    }
    EnvFilter::new(c_directives)
}

/// Subscriber for `spec_log_options`, writing through `writer`.
pub fn build_subscriber<W>(
    spec_log_options: &SpecLogOptions,
    writer: W,
) -> Box<dyn tracing::Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_filter(spec_log_options);
    match spec_log_options.format {
        EnumLogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).json();
            Box::new(tracing_subscriber::registry().with(filter).with(layer))
        }
        EnumLogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(spec_log_options.if_ansi);
            Box::new(tracing_subscriber::registry().with(filter).with(layer))
        }
    }
}

/// Install the global subscriber, logging to stderr.
///
/// Returns `Ok(false)` when logging was already initialized by this crate.
pub fn init_logging(spec_log_options: &SpecLogOptions) -> Result<bool, LogInitError> {
    init_logging_with_writer(spec_log_options, std::io::stderr)
}

/// Install the global subscriber with a custom writer.
pub fn init_logging_with_writer<W>(
    spec_log_options: &SpecLogOptions,
    writer: W,
) -> Result<bool, LogInitError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    if B_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }
    let subscriber = build_subscriber(spec_log_options, writer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        B_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(LogInitError::Install(e));
    }
    Ok(true)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::{
        EnumLogFormat, Level, LogInitError, SpecLogOptions, build_subscriber, default_directives,
        parse_level,
    };

    #[derive(Clone, Default)]
    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl BufferWriter {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).to_string()
        }
    }

    fn options_for(format: EnumLogFormat, level: Level) -> SpecLogOptions {
        SpecLogOptions {
            component: "unionkit_log".to_string(),
            level,
            format,
            if_ansi: false,
            if_respect_env: false,
        }
    }

    #[test]
    fn log_format_parses_and_displays() {
        assert_eq!(
            "JSON".parse::<EnumLogFormat>().expect("json"),
            EnumLogFormat::Json
        );
        assert_eq!(
            "plaintext".parse::<EnumLogFormat>().expect("plaintext"),
            EnumLogFormat::Plaintext
        );
        assert!(matches!(
            "xml".parse::<EnumLogFormat>(),
            Err(LogInitError::InvalidFormat(_))
        ));
        assert_eq!(EnumLogFormat::Json.to_string(), "json");
    }

    #[test]
    fn parse_level_accepts_names() {
        assert_eq!(parse_level("debug").expect("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN").expect("warn"), Level::WARN);
        assert!(matches!(
            parse_level("loud"),
            Err(LogInitError::InvalidLevel(_))
        ));
    }

    #[test]
    fn default_directives_scope_level_to_component() {
        let spec_log_options = options_for(EnumLogFormat::Plaintext, Level::DEBUG);
        assert_eq!(
            default_directives(&spec_log_options),
            "warn,unionkit_log=debug"
        );

        let spec_log_options = SpecLogOptions {
            component: String::new(),
            ..options_for(EnumLogFormat::Plaintext, Level::TRACE)
        };
        assert_eq!(default_directives(&spec_log_options), "trace");
    }

    #[test]
    fn plaintext_subscriber_filters_by_level() {
        let writer = BufferWriter::default();
        let subscriber = build_subscriber(
            &options_for(EnumLogFormat::Plaintext, Level::INFO),
            writer.clone(),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("cloned level visible");
            tracing::debug!("cloned level hidden");
        });

        let txt = writer.text();
        assert!(txt.contains("cloned level visible"));
        assert!(!txt.contains("cloned level hidden"));
    }

    #[test]
    fn json_subscriber_emits_structured_fields() {
        let writer = BufferWriter::default();
        let subscriber =
            build_subscriber(&options_for(EnumLogFormat::Json, Level::DEBUG), writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(relative = "/a/b", "cloned directory level");
        });

        let txt = writer.text();
        assert!(txt.contains("\"message\":\"cloned directory level\""));
        assert!(txt.contains("\"relative\":\"/a/b\""));
    }
}
