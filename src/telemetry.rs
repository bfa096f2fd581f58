//! Tracing setup shared by the cookbook binaries.

use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{EngineError, Result};

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). Setting
/// `REACT_LOG_FORMAT=json` switches the formatter to JSON lines.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("REACT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    installed.map_err(|err| EngineError::Config(format!("failed to install tracing: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_reports_an_error() {
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
