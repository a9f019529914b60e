//! Integration tests for logging system

use bridge_traits::logging::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, strip_url_query, LogFormat, LoggingConfig};
use std::sync::Arc;

#[test]
fn test_format_selection() {
    let config = LoggingConfig::default();

    #[cfg(debug_assertions)]
    assert_eq!(config.format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
    assert!(config.logger_sink.is_some());
}

#[test]
fn test_media_urls_are_sanitized() {
    assert_eq!(
        strip_url_query("https://cdn.example.com/movies/a.mp4?Expires=1&Signature=x"),
        "https://cdn.example.com/movies/a.mp4"
    );
    assert_eq!(strip_url_query("ws://live.example.com/feed"), "ws://live.example.com/feed");
}

// Only one global subscriber can exist per test binary, so initialization and
// the double-init failure are checked in a single test.
#[test]
fn test_init_logging_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).expect("first init succeeds");
    tracing::debug!(target: "core_playback", "logging initialized");

    assert!(init_logging(config).is_err());
}
