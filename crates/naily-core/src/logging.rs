//! Process-wide logger.
//!
//! One [`Logger`] is shared by the whole process: it is created on first
//! access and, when replaced, the host layer in `naily_ipc` is switched to
//! the same sink so agent and host output never diverge. Components take a
//! `Logger` in their constructors instead of reaching for the global.
//!
//! Lines look like `2013-06-04T10:22:31 warn: message key=value`.

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Timestamp layout at the start of every line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static PROCESS_LOGGER: RwLock<Option<Logger>> = parking_lot::const_rwlock(None);

/// A cloneable handle to a log sink
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Log to standard output at `level`, unless `RUST_LOG` says otherwise
    pub fn stdout(level: &str) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        Self::build(filter, io::stdout)
    }

    /// Log to an arbitrary writer at `level`
    pub fn with_writer<W>(level: &str, make_writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self::build(EnvFilter::new(level), make_writer)
    }

    /// Wrap an existing dispatcher
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    fn build<W>(filter: EnvFilter, make_writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(make_writer)
            .event_format(LineFormat)
            .finish();

        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this logger as the default
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// The process logger, created on first use
pub fn logger() -> Logger {
    if let Some(logger) = PROCESS_LOGGER.read().as_ref() {
        return logger.clone();
    }

    let mut slot = PROCESS_LOGGER.write();
    slot.get_or_insert_with(|| {
        let logger = Logger::stdout("info");
        naily_ipc::logging::set_logger(logger.dispatch().clone());
        logger
    })
    .clone()
}

/// Replace the process logger and the host layer's logger together
pub fn set_logger(logger: Logger) {
    let mut slot = PROCESS_LOGGER.write();
    naily_ipc::logging::set_logger(logger.dispatch().clone());
    *slot = Some(logger);
}

/// `<timestamp> <severity>: <message>`
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
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
        write!(
            writer,
            "{} {}: ",
            Local::now().format(TIMESTAMP_FORMAT),
            event.metadata().level().as_str().to_lowercase()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// In-memory log sink
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
