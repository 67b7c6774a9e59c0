use std::{env, path::Path, sync::OnceLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

static INITED: OnceLock<()> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer() -> BoxedLayer {
    let builder = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(env::var("LOG_ANSI").map_or(true, |v| v != "0"));
    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    if format.eq_ignore_ascii_case("json") {
        builder.json().boxed()
    } else {
        builder.pretty().boxed()
    }
}

/// Split `LOG_FILE` into (dir, file name); `LOG_DIR` fills in a missing dir.
fn log_file_target(file_var: &str) -> (String, String) {
    let p = Path::new(file_var);
    let fallback_dir = || env::var("LOG_DIR").unwrap_or_else(|_| ".".into());
    match p.file_name().and_then(|s| s.to_str()) {
        Some(fname) => {
            let dir = p
                .parent()
                .map(|pp| pp.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(fallback_dir);
            (dir, fname.to_string())
        }
        None => (fallback_dir(), file_var.to_string()),
    }
}

fn file_layer() -> Option<(BoxedLayer, WorkerGuard)> {
    let file_var = env::var("LOG_FILE").ok().filter(|v| !v.is_empty())?;
    let (dir, file) = log_file_target(&file_var);
    let rotation = env::var("LOG_ROTATION").unwrap_or_else(|_| "never".into());
    let appender = match rotation.to_lowercase().as_str() {
        "daily" => tracing_appender::rolling::daily(&dir, &file),
        "hourly" => tracing_appender::rolling::hourly(&dir, &file),
        "minutely" => tracing_appender::rolling::minutely(&dir, &file),
        _ => tracing_appender::rolling::never(&dir, &file),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .json()
        .with_writer(writer)
        .boxed();
    Some((layer, guard))
}

/// Initialize the global tracing subscriber once.
///
/// Env vars:
/// - RUST_LOG: env filter (e.g. "fee_indexer=debug,sqlx=warn")
/// - LOG_FORMAT: "pretty" (default) or "json"
/// - LOG_ANSI: "0" to disable ANSI colors
/// - LOG_FILE / LOG_DIR / LOG_ROTATION: optional JSON file output
///   (rotation: never|daily|hourly|minutely)
///
/// Keep the returned guard alive for the life of the process, dropping it
/// flushes and stops the file writer. Later calls are no-ops; panics if a
/// different global subscriber was installed first.
pub fn init() -> Option<WorkerGuard> {
    let mut guard = None;
    INITED.get_or_init(|| {
        let mut layers = vec![console_layer()];
        guard = file_layer().map(|(layer, guard)| {
            layers.push(layer);
            guard
        });
        Registry::default()
            .with(layers)
            .with(env_filter())
            .init();
    });
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_target_splits_dir_and_name() {
        let (dir, file) = log_file_target("/var/log/fees/indexer.log");
        assert_eq!(dir, "/var/log/fees");
        assert_eq!(file, "indexer.log");
    }

    #[test]
    fn init_installs_once_then_is_a_no_op() {
        // LOG_FILE unset: console only, so no guard either way
        let _first = init();
        assert!(INITED.get().is_some());
        assert!(init().is_none());
        tracing::info!("still logging after repeated init");
    }
}
