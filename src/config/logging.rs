//! Logging setup for the connector runner
//!
//! # Environment Variables
//! - `LOG_FORMAT`: `json` (default) or `pretty`
//! - `RUST_LOG`: Log level filter (default: `info`)

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Only an exact `pretty` selects human-readable output
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber; later calls are ignored
pub fn init_logging() {
    let result = match LogFormat::from_env() {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .pretty()
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .json()
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_format_parsing() {
        let cases = [
            (None, LogFormat::Json),
            (Some("json"), LogFormat::Json),
            (Some("pretty"), LogFormat::Pretty),
            (Some("PRETTY"), LogFormat::Json),
            (Some(""), LogFormat::Json),
        ];
        for (input, expected) in cases {
            assert_eq!(LogFormat::parse(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    #[serial]
    fn test_format_from_env() {
        std::env::set_var("LOG_FORMAT", "pretty");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
        std::env::remove_var("LOG_FORMAT");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging();
        init_logging();
    }
}
