use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::Valves;

/// Module-path prefix of records governed by the valves-driven level.
const TOOL_TARGET: &str = "imagegen_tool";

static TOOL_LOGGER: Lazy<ToolLogger> = Lazy::new(ToolLogger::new);
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    TOOL_LOGGER.update_config(config);

    if let Err(e) = log::set_logger(&*TOOL_LOGGER) {
        return Err(format!("Failed to set logger: {:?}", e));
    }
    INSTALLED.store(true, Ordering::SeqCst);
    TOOL_LOGGER.refresh_max_level();
    Ok(())
}

/// Re-applies the admin valves to this crate's log records.
///
/// Other crates' records keep the configured `min_level`. When the host
/// installed its own logger this only records the level.
pub fn apply_valves(valves: &Valves) {
    TOOL_LOGGER.set_tool_level(valves.log_level());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Level for records outside this crate.
    pub min_level: LogLevel,
    /// Level for this crate's records; replaced by `apply_valves`.
    pub tool_level: LogLevel,
    pub show_colors: bool,
    pub show_module: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub prefix: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Warn,
            tool_level: LogLevel::Warn,
            show_colors: true,
            show_module: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            output_json: false,
            prefix: "IMAGE_GEN".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_valves(valves: &Valves) -> Self {
        Self {
            tool_level: valves.log_level(),
            show_module: valves.verbose_logging,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    fn level_for(&self, module: &str) -> LogLevel {
        if module.starts_with(TOOL_TARGET) {
            self.tool_level
        } else {
            self.min_level
        }
    }

    fn max_level_filter(&self) -> LevelFilter {
        self.min_level.min(self.tool_level).to_level_filter()
    }
}

pub struct ToolLogger {
    config: Mutex<LoggerConfig>,
}

impl ToolLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn set_tool_level(&self, level: LogLevel) {
        if let Ok(mut config) = self.config.lock() {
            config.tool_level = level;
        }
        self.refresh_max_level();
    }

    fn refresh_max_level(&self) {
        if !INSTALLED.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(config) = self.config.lock() {
            log::set_max_level(config.max_level_filter());
        }
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
        let level = entry.level.as_str();

        let mut output = if config.show_colors {
            format!(
                "[{}] [{}] [{}] ",
                timestamp.bright_black(),
                config.prefix.bright_white().bold(),
                level.color(entry.level.color()).bold()
            )
        } else {
            format!("[{}] [{}] [{}] ", timestamp, config.prefix, level)
        };

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}: ", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.module));
            }
        }

        output.push_str(&entry.message);
        output
    }
}

impl Default for ToolLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for ToolLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.level_for(metadata.target()).to_level_filter(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
        );

        if let Ok(config) = self.config.lock() {
            let line = if config.output_json {
                serde_json::to_string(&entry).unwrap_or_default()
            } else {
                self.format_console_output(&entry, &config)
            };
            // stderr keeps stdout free for the host's own output
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Warn.as_str(), "WARNING");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::from_log_level(Level::Info), LogLevel::Info);
    }

    #[test]
    fn test_config_from_valves() {
        let config = LoggerConfig::from_valves(&Valves::new().with_debug(true));
        assert_eq!(config.tool_level, LogLevel::Info);
        assert_eq!(config.min_level, LogLevel::Warn);
        assert_eq!(config.max_level_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_level_for_target() {
        let config = LoggerConfig::new().with_level(LogLevel::Error);
        assert_eq!(config.level_for("imagegen_tool::pipeline"), LogLevel::Warn);
        assert_eq!(config.level_for("hyper::client"), LogLevel::Error);
    }

    #[test]
    fn test_console_format_without_colors() {
        let logger = ToolLogger::new();
        let config = LoggerConfig::new().with_colors(false);
        let entry = LogEntry::new(LogLevel::Info, "hello".into(), "imagegen_tool".into());
        let line = logger.format_console_output(&entry, &config);
        assert!(line.contains("[IMAGE_GEN] [INFO] hello"));
    }
}
