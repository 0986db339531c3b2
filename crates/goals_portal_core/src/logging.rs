//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start rolling file logs once per process.
//! - Record panics as `panic_captured` events before the default hook runs.
//!
//! # Invariants
//! - A second `init_logging` with equal settings succeeds without effect; any
//!   other second call fails.
//! - Initialization never panics.
//! - Log lines carry metadata only: no form field contents, no codes.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info, Level};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "goals_portal";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Validated `init_logging` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: Level,
    dir: PathBuf,
}

impl LogSettings {
    fn parse(level: &str, dir: &str) -> Result<Self, String> {
        let level_text = level.trim().to_ascii_lowercase();
        let level_text = if level_text == "warning" {
            "warn"
        } else {
            level_text.as_str()
        };
        let level = Level::from_str(level_text).map_err(|_| {
            format!("unsupported log level `{level_text}`; expected trace|debug|info|warn|error")
        })?;

        let dir = dir.trim();
        if dir.is_empty() {
            return Err("log_dir cannot be empty".to_string());
        }
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(format!(
                "log_dir must be an absolute path, got `{}`",
                dir.display()
            ));
        }
        Ok(Self { level, dir })
    }

    fn level_name(&self) -> String {
        self.level.as_str().to_ascii_lowercase()
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn accept(&self, requested: &LogSettings) -> Result<(), String> {
        if self.settings == *requested {
            return Ok(());
        }
        Err(format!(
            "logging already initialized with level `{}` at `{}`; refusing to switch to level `{}` at `{}`",
            self.settings.level_name(),
            self.settings.dir.display(),
            requested.level_name(),
            requested.dir.display()
        ))
    }
}

/// Initializes logging with `level` into the absolute directory `log_dir`.
///
/// # Errors
/// - Unsupported level, empty or relative directory.
/// - Directory creation or logger backend failure.
/// - A previous call used different settings.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let settings = LogSettings::parse(level, log_dir)?;
    ACTIVE
        .get_or_try_init(|| start(settings.clone()))?
        .accept(&settings)
}

/// Returns the active `(level, log_dir)`, if logging was started.
pub fn logging_status() -> Option<(String, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.settings.level_name(), active.settings.dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(settings: LogSettings) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&settings.dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            settings.dir.display()
        )
    })?;

    let level = settings.level_name();
    let handle = Logger::try_with_str(&level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(&settings.dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    if PANIC_HOOK.set(()).is_ok() {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            record_panic(panic);
            previous(panic);
        }));
    }

    info!(
        "event=logging_init module=core status=ok level={level} log_dir={} os={} version={}",
        settings.dir.display(),
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn record_panic(panic: &PanicHookInfo<'_>) {
    let location = panic.location().map_or_else(
        || "unknown".to_string(),
        |location| format!("{}:{}", location.file(), location.line()),
    );
    let payload = panic
        .payload()
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(
        "event=panic_captured module=core status=error location={location} payload={}",
        one_line(&payload, PANIC_SUMMARY_CHARS)
    );
}

// Panic payloads may echo user-entered text.
fn one_line(value: &str, max_chars: usize) -> String {
    let mut summary = value
        .chars()
        .take(max_chars)
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if value.chars().nth(max_chars).is_some() {
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, one_line, LogSettings};
    use log::Level;

    #[test]
    fn settings_accept_known_levels_case_insensitively() {
        let settings = LogSettings::parse(" WARNING ", "/var/log/portal").expect("settings");
        assert_eq!(settings.level, Level::Warn);
        assert_eq!(settings.level_name(), "warn");
        assert!(LogSettings::parse("verbose", "/var/log/portal").is_err());
    }

    #[test]
    fn settings_reject_relative_and_empty_dirs() {
        let error = LogSettings::parse("info", "logs/dev").expect_err("relative dir");
        assert!(error.contains("absolute"));
        assert!(LogSettings::parse("info", "   ").is_err());
    }

    #[test]
    fn one_line_strips_control_chars_and_truncates() {
        let summary = one_line("goal one\ngoal two\rgoal three", 8);
        assert_eq!(summary, "goal one...");
        assert_eq!(one_line("a\tb", 10), "a b");
    }

    #[test]
    fn init_logging_is_idempotent_and_rejects_conflicts() {
        // The logger keeps writing after the test, so the directory is not
        // cleaned up.
        let root = std::env::temp_dir().join(format!(
            "goals-portal-logging-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        let log_dir = root.join("logs");
        let log_dir_str = log_dir.to_str().expect("utf-8 temp dir").to_string();
        let other_dir_str = root
            .join("other")
            .to_str()
            .expect("utf-8 temp dir")
            .to_string();

        init_logging("info", &log_dir_str).expect("first init");
        init_logging("INFO", &log_dir_str).expect("same settings are idempotent");

        let level_error = init_logging("debug", &log_dir_str).expect_err("level conflict");
        assert!(level_error.contains("refusing to switch"));
        let dir_error = init_logging("info", &other_dir_str).expect_err("dir conflict");
        assert!(dir_error.contains("refusing to switch"));

        let (active_level, active_dir) = logging_status().expect("logging active");
        assert_eq!(active_level, "info");
        assert_eq!(active_dir, log_dir);
    }
}
