//! Diagnostic logging setup.
//!
//! Logs go to stderr; stdout belongs to the renderer.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Overrides the computed filter, e.g. `DECKHAND_LOG=deckhand=trace`.
pub const LOG_ENV_VAR: &str = "DECKHAND_LOG";

const QUIET_FILTER: &str = "warn";
const VERBOSE_FILTER: &str =
    "warn,deckhand=debug,deckhand_cli=debug,agent_provider_chat_api=debug,chat_api=debug,session_store=debug";

/// Filter directives used when `DECKHAND_LOG` is unset.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        QUIET_FILTER
    }
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(verbose, "logging initialized");
    }
}
