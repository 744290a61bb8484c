//! Logging setup
//!
//! Structured logging through `tracing`, formatted as text or JSON and always
//! written to stderr so stdout stays reserved for command output (tables and
//! JSON documents that other tools may consume).
//!
//! ## Environment Variables
//!
//! * `BERTH_LOG` - filter directive (e.g. `debug`, `berth_core::cache=trace`)
//! * `RUST_LOG` - fallback filter when `BERTH_LOG` is unset
//! * `BERTH_LOG_FORMAT` - `json` for JSON lines, anything else for text
//! * `BERTH_LOG_SPAN_EVENTS` - span lifecycle events, comma or pipe separated
//!   (`none`, `new`, `close`, `enter`, `exit`, `active`, `full`)

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// `format` takes precedence over `BERTH_LOG_FORMAT`; `None` falls back to
/// the environment and then to text.
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        let env_format = std::env::var("BERTH_LOG_FORMAT").ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

fn create_env_filter() -> EnvFilter {
    match std::env::var("BERTH_LOG") {
        Ok(spec) => EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            tracing::warn!("Invalid BERTH_LOG specification '{}', using 'info'", spec);
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var("BERTH_LOG_SPAN_EVENTS") {
        return parse_span_events(&raw);
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

fn parse_span_events(raw: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    raw.split(&[',', '|'][..])
        .map(|t| t.trim().to_lowercase())
        .fold(FmtSpan::NONE, |acc, token| {
            acc | match token.as_str() {
                "new" => FmtSpan::NEW,
                "close" => FmtSpan::CLOSE,
                "enter" => FmtSpan::ENTER,
                "exit" => FmtSpan::EXIT,
                "active" => FmtSpan::ACTIVE,
                "full" => FmtSpan::FULL,
                _ => FmtSpan::NONE,
            }
        })
}

pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmt::format::FmtSpan;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_multiple_calls_safe() {
        assert!(init(None).is_ok());
        assert!(init(Some("json")).is_ok());
        assert!(init(Some("invalid")).is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_parse_span_events() {
        assert_eq!(parse_span_events("new|close"), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(parse_span_events(" FULL "), FmtSpan::FULL);
        assert_eq!(parse_span_events("bogus"), FmtSpan::NONE);
    }

    #[test]
    #[serial]
    fn test_env_filter_falls_back_on_invalid_spec() {
        std::env::set_var("BERTH_LOG", "[[not a filter");
        let _filter = create_env_filter();
        std::env::remove_var("BERTH_LOG");
    }
}
