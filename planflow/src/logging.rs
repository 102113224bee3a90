//! Diagnostics on stderr for binaries embedding the engine.
//!
//! Workflow events reach clients over the event stream; tracing output is
//! for operators only.

use anyhow::Context;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Level applied when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LEVEL: &str = "warn";

/// `RUST_LOG` (or [`DEFAULT_LEVEL`]) with each of `directives` layered on top.
pub fn filter(directives: &[&str]) -> anyhow::Result<EnvFilter> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    for directive in directives {
        let parsed: Directive = directive
            .parse()
            .with_context(|| format!("invalid log directive {directive:?}"))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Install a compact stderr subscriber filtered by [`filter`].
///
/// ```bash
/// RUST_LOG=planflow=debug cargo run -p planflow-server
/// ```
pub fn init(directives: &[&str]) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(filter(directives)?)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .context("tracing subscriber already installed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_are_layered_on_the_base_filter() {
        let filter = filter(&["planflow_server=info", "planflow=debug"]).unwrap();
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("planflow_server=info"));
        assert!(rendered.contains("planflow=debug"));
    }

    #[test]
    fn bad_directive_is_an_error() {
        let err = filter(&["planflow=loud"]).unwrap_err();
        assert!(err.to_string().contains("planflow=loud"));
    }
}
