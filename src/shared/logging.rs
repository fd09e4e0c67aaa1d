use chrono::{SecondsFormat, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

pub fn execution_log_path(state_root: &Path, log_id: &str, trigger: &str) -> PathBuf {
    state_root
        .join("agents")
        .join(log_id)
        .join(trigger)
        .join("execution.log")
}

/// Handle for one run's execution log. Every line is a JSON object appended
/// to `agents/<id>/<trigger>/execution.log`; `info` and above can be echoed
/// to the console. Write failures are dropped so logging never fails a run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    log_id: String,
    path: Option<PathBuf>,
    console: bool,
}

impl RunLogger {
    pub fn open(state_root: &Path, log_id: &str, trigger: &str, console: bool) -> Self {
        let logger = Self {
            log_id: log_id.to_string(),
            path: Some(execution_log_path(state_root, log_id, trigger)),
            console,
        };
        logger.debug("logger.init", &format!("logger initialized for {log_id}"));
        logger
    }

    /// Console-only logger; used before a run id exists.
    pub fn detached(console: bool) -> Self {
        Self {
            log_id: String::new(),
            path: None,
            console,
        }
    }

    pub fn disabled() -> Self {
        Self::detached(false)
    }

    pub fn console(&self) -> bool {
        self.console
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn debug(&self, event: &str, message: &str) {
        self.log(LogLevel::Debug, event, message);
    }

    pub fn info(&self, event: &str, message: &str) {
        self.log(LogLevel::Info, event, message);
    }

    pub fn warn(&self, event: &str, message: &str) {
        self.log(LogLevel::Warn, event, message);
    }

    pub fn error(&self, event: &str, message: &str) {
        self.log(LogLevel::Error, event, message);
    }

    pub fn log(&self, level: LogLevel, event: &str, message: &str) {
        if self.console && level >= LogLevel::Info {
            if level >= LogLevel::Warn {
                eprintln!("{message}");
            } else {
                println!("{message}");
            }
        }

        let Some(path) = self.path.as_ref() else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "level": level.as_str(),
            "runId": self.log_id,
            "event": event,
            "message": message,
        });
        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }
}
