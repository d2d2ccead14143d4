//! Subscriber setup shared by the workspace binaries. Logs go to stderr so
//! stdout stays machine-readable JSON.

use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Switches output to JSON lines when truthy.
pub const LOG_JSON_ENV: &str = "MOVIE_CATALOG_LOG_JSON";

#[must_use]
pub fn env_bool(name: &str, default: bool) -> bool {
    env::var(name).ok().and_then(|value| parse_bool(&value)).unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), stderr writer.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if env_bool(LOG_JSON_ENV, false) {
        tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for value in ["1", "true", "TRUE", "yes", "YES"] {
            assert_eq!(parse_bool(value), Some(true), "{value}");
        }
        for value in ["0", "false", "FALSE", "no", "NO"] {
            assert_eq!(parse_bool(value), Some(false), "{value}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let name = format!("MOVIE_CATALOG_UNSET_{}", ulid::Ulid::new());
        assert!(env_bool(&name, true));
        assert!(!env_bool(&name, false));
    }
}
