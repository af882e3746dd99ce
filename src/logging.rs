use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

static LOG_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);

const MAX_LOG_BYTES: u64 = 2 * 1024 * 1024;

/// Writes each log line to stderr and, when available, to the log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = std::io::stderr().write_all(buf);
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = std::io::stderr().flush();
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install the logger. `RUST_LOG` controls the filter (default `info`).
/// Passing a data dir also appends to `slotsite.log` there.
pub fn init(data_dir: Option<&Path>) {
    let file = data_dir.and_then(open_log_file);

    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .try_init();

    if result.is_err() {
        return;
    }

    log::info!("=== slotsite v{} started ===", env!("CARGO_PKG_VERSION"));
    if let Some(path) = log_path() {
        log::info!("Log file: {}", path);
    }
}

fn open_log_file(data_dir: &Path) -> Option<File> {
    let _ = std::fs::create_dir_all(data_dir);
    let log_path = data_dir.join("slotsite.log");

    // Rotate: if file is > 2MB, rename to .old and start fresh
    if let Ok(meta) = std::fs::metadata(&log_path) {
        if meta.len() > MAX_LOG_BYTES {
            let old_path = data_dir.join("slotsite.old.log");
            let _ = std::fs::rename(&log_path, old_path);
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;
    *LOG_PATH.lock().unwrap_or_else(PoisonError::into_inner) = Some(log_path);
    Some(file)
}

/// Log a message; an `ERROR: ` prefix raises it to error level.
pub fn log(msg: &str) {
    match msg.strip_prefix("ERROR: ") {
        Some(rest) => log::error!("{}", rest),
        None => log::info!("{}", msg),
    }
}

pub fn log_path() -> Option<String> {
    LOG_PATH
        .lock()
        .ok()
        .and_then(|g| g.as_ref().map(|p| p.display().to_string()))
}

/// Convenience macro for logging with format args.
#[macro_export]
macro_rules! clog {
    ($($arg:tt)*) => {
        $crate::logging::log(&format!($($arg)*))
    };
}
