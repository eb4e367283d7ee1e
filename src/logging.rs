use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Global crash log directory, set during init.
static CRASH_LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Env var checked before `RUST_LOG` for the filter directive.
pub const ENV_LOG: &str = "OPTION_SYNC_LOG";

const DEFAULT_FILTER: &str = "info,option_sync=debug";

/// How events are rendered on stderr. Stdout is reserved for command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Install the global subscriber: a stderr layer in `format` plus a Sentry
/// layer that turns ERROR events into issues and WARN events into breadcrumbs.
/// Filter comes from `OPTION_SYNC_LOG`, then `RUST_LOG`, then the default.
pub fn init(format: LogFormat) {
    let env_filter = filter_directive()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = match format {
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .flatten_event(true)
            .boxed(),
    };

    // No-op when Sentry DSN is not configured.
    let sentry_layer = sentry_tracing::layer().event_filter(|meta| match *meta.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(sentry_layer)
        .init();

    tracing::debug!(?format, "Tracing initialized");
}

fn filter_directive() -> Option<String> {
    [ENV_LOG, "RUST_LOG"].iter().find_map(|key| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Install a panic hook that writes a crash report into `dir` before
/// delegating to the previous hook.
pub fn install_crash_hook(dir: &Path) {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "full");
    }

    let _ = std::fs::create_dir_all(dir);
    CRASH_LOG_DIR.set(dir.to_path_buf()).ok();

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(dir) = CRASH_LOG_DIR.get() {
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<unknown payload>".to_string());
            let location = info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));

            let path = dir.join(crash_file_name(chrono::Local::now()));
            let report = crash_report(&message, location.as_deref());
            if std::fs::write(&path, report).is_ok() {
                eprintln!("[CRASH] Report written to: {}", path.display());
            }
        }

        prev_hook(info);
    }));

    tracing::info!(dir = %dir.display(), "Crash hook installed");
}

fn crash_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("crash_{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn crash_report(message: &str, location: Option<&str>) -> String {
    let thread = std::thread::current();
    format!(
        "=== OPTION-SYNC CRASH REPORT ===\n\
         Time: {}\n\
         Version: {}\n\n\
         Panic: {}\n\
         Location: {}\n\n\
         Backtrace:\n{}\n\n\
         Thread: {:?} (id: {:?})\n",
        chrono::Local::now().to_rfc3339(),
        env!("CARGO_PKG_VERSION"),
        message,
        location.unwrap_or("<unknown>"),
        std::backtrace::Backtrace::force_capture(),
        thread.name(),
        thread.id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_crash_file_name_is_sortable_timestamp() {
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(crash_file_name(at), "crash_20240309_070501.log");
    }

    #[test]
    fn test_crash_report_contains_panic_details() {
        let report = crash_report("boom", Some("src/main.rs:1:1"));
        assert!(report.starts_with("=== OPTION-SYNC CRASH REPORT ==="));
        assert!(report.contains("Panic: boom"));
        assert!(report.contains("Location: src/main.rs:1:1"));
    }
}
