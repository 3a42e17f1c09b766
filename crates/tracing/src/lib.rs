//! Tracing setup for argus.
//!
//! The [`ArgusTracer`] assembles a [`tracing_subscriber`] registry out of up to three
//! layers: stdout (terminal, json or logfmt), journald, and a daily rotated log file.
//! Each layer carries its own [`EnvFilter`].

use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use clap::ValueEnum;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{
    filter::Directive, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

// Re-export tracing crates
pub use tracing;
pub use tracing_subscriber;

/// Guard that flushes the non-blocking file writer when dropped.
pub type FileWorkerGuard = tracing_appender::non_blocking::WorkerGuard;

/// A boxed tracing [Layer].
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Directives applied to every layer, keeping transport internals out of the output.
const DEFAULT_ENV_FILTER_DIRECTIVES: [&str; 3] =
    ["hyper=off", "reqwest=off", "alloy_rpc_client=off"];

/// The output format of a layer.
#[derive(Debug, Copy, Clone, ValueEnum, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// `key=value` pairs.
    #[value(name = "log-fmt")]
    LogFmt,
    /// Human readable, optionally colored.
    Terminal,
}

impl LogFormat {
    /// Build a layer in this format over `filter`. `color` is one of `always`, `auto`,
    /// `never`; `None` disables ansi codes. When `file_writer` is given, output goes
    /// there instead of stdout.
    pub fn apply(
        &self,
        filter: EnvFilter,
        color: Option<String>,
        file_writer: Option<NonBlocking>,
    ) -> BoxedLayer<Registry> {
        let ansi = match color {
            Some(color) => std::env::var("RUST_LOG_STYLE")
                .map(|val| val != "never")
                .unwrap_or(color != "never"),
            None => false,
        };
        let target = std::env::var("RUST_LOG_TARGET").map(|val| val != "0").unwrap_or(false);

        match self {
            LogFormat::Json => {
                let layer =
                    tracing_subscriber::fmt::layer().json().with_ansi(ansi).with_target(target);
                match file_writer {
                    Some(writer) => layer.with_writer(writer).with_filter(filter).boxed(),
                    None => layer.with_filter(filter).boxed(),
                }
            }
            LogFormat::LogFmt => tracing_logfmt::layer().with_filter(filter).boxed(),
            LogFormat::Terminal => {
                let layer = tracing_subscriber::fmt::layer().with_ansi(ansi).with_target(target);
                match file_writer {
                    Some(writer) => layer.with_writer(writer).with_filter(filter).boxed(),
                    None => layer.with_filter(filter).boxed(),
                }
            }
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::LogFmt => write!(f, "log-fmt"),
            LogFormat::Terminal => write!(f, "terminal"),
        }
    }
}

/// Settings for one layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    format: LogFormat,
    default_directive: String,
    filters: String,
    color: Option<String>,
}

impl LayerInfo {
    /// Create a new [LayerInfo].
    pub fn new(
        format: LogFormat,
        default_directive: String,
        filters: String,
        color: Option<String>,
    ) -> Self {
        Self { format, default_directive, filters, color }
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            default_directive: "info".to_string(),
            filters: String::new(),
            color: Some("always".to_string()),
        }
    }
}

/// Where the file layer writes.
#[derive(Debug, Clone)]
pub struct FileInfo {
    dir: PathBuf,
    file_name: String,
}

impl FileInfo {
    /// Log to `dir/file_name.<date>`.
    pub fn new(dir: PathBuf, file_name: impl Into<String>) -> Self {
        Self { dir, file_name: file_name.into() }
    }
}

/// Something that can install a global subscriber.
pub trait Tracer {
    /// Install the subscriber. The returned guard, if any, must be kept alive for
    /// file output to be flushed.
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>>;
}

/// The argus tracer: a stdout layer plus optional journald and file layers.
#[derive(Debug, Clone, Default)]
pub struct ArgusTracer {
    stdout: LayerInfo,
    journald: Option<String>,
    file: Option<(LayerInfo, FileInfo)>,
}

impl ArgusTracer {
    /// A tracer with the default stdout layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stdout layer settings.
    pub fn with_stdout(mut self, config: LayerInfo) -> Self {
        self.stdout = config;
        self
    }

    /// Also log to journald with the given filter.
    pub fn with_journald(mut self, filter: String) -> Self {
        self.journald = Some(filter);
        self
    }

    /// Also log to a file.
    pub fn with_file(mut self, config: LayerInfo, info: FileInfo) -> Self {
        self.file = Some((config, info));
        self
    }
}

impl Tracer for ArgusTracer {
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>> {
        let mut layers = Layers::new();

        layers.stdout(
            self.stdout.format,
            self.stdout.default_directive.parse()?,
            &self.stdout.filters,
            self.stdout.color,
        )?;

        if let Some(filter) = self.journald {
            layers.journald(&filter)?;
        }

        let file_guard = match self.file {
            Some((config, info)) => Some(layers.file(config.format, &config.filters, info)?),
            None => None,
        };

        tracing_subscriber::registry().with(layers.into_inner()).try_init()?;
        Ok(file_guard)
    }
}

/// The layers that make up the subscriber.
#[derive(Default)]
struct Layers {
    inner: Vec<BoxedLayer<Registry>>,
}

impl fmt::Debug for Layers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layers").field("len", &self.inner.len()).finish()
    }
}

impl Layers {
    fn new() -> Self {
        Self::default()
    }

    fn into_inner(self) -> Vec<BoxedLayer<Registry>> {
        self.inner
    }

    fn stdout(
        &mut self,
        format: LogFormat,
        default_directive: Directive,
        filters: &str,
        color: Option<String>,
    ) -> eyre::Result<()> {
        let filter = build_env_filter(Some(default_directive), filters)?;
        self.inner.push(format.apply(filter, color, None));
        Ok(())
    }

    fn journald(&mut self, filter: &str) -> eyre::Result<()> {
        let layer = tracing_journald::layer()?.with_filter(build_env_filter(None, filter)?).boxed();
        self.inner.push(layer);
        Ok(())
    }

    fn file(
        &mut self,
        format: LogFormat,
        filter: &str,
        info: FileInfo,
    ) -> eyre::Result<FileWorkerGuard> {
        std::fs::create_dir_all(&info.dir)?;
        let appender = tracing_appender::rolling::daily(&info.dir, &info.file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        self.inner.push(format.apply(build_env_filter(None, filter)?, None, Some(writer)));
        Ok(guard)
    }
}

/// Build an [EnvFilter] from `RUST_LOG`, the default directive, the crate-wide
/// silencing directives and a comma separated list of user directives.
fn build_env_filter(
    default_directive: Option<Directive>,
    directives: &str,
) -> eyre::Result<EnvFilter> {
    let env_filter = match default_directive {
        Some(directive) => EnvFilter::builder().with_default_directive(directive).from_env_lossy(),
        None => EnvFilter::builder().from_env_lossy(),
    };

    DEFAULT_ENV_FILTER_DIRECTIVES
        .into_iter()
        .chain(directives.split(',').map(str::trim).filter(|d| !d.is_empty()))
        .try_fold(env_filter, |env_filter, directive| {
            Ok(env_filter.add_directive(directive.parse()?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_env_filter_accepts_user_directives() {
        let filter = build_env_filter(Some("warn".parse().expect("directive")), "argus_core=debug")
            .expect("valid filter");
        let rendered = filter.to_string();
        assert!(rendered.contains("argus_core=debug"));
        assert!(rendered.contains("hyper=off"));
    }

    #[test]
    fn test_build_env_filter_rejects_garbage() {
        assert!(build_env_filter(None, "argus_core=[").is_err());
    }

    #[test]
    fn test_log_format_round_trips_through_clap() {
        for format in [LogFormat::Json, LogFormat::LogFmt, LogFormat::Terminal] {
            let parsed = LogFormat::from_str(&format.to_string(), true).expect("valid format");
            assert_eq!(parsed, format);
        }
    }
}
