//! Log output for the ukigumo binaries.
//!
//! Logs go to stderr so stdout stays free for command output. Without
//! `RUST_LOG`, ukigumo's own crates and the agent's HTTP trace layer log at
//! the requested level and everything else (reqwest, hyper, rustls) at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets that follow the `--verbose` level.
const OWN_TARGETS: [&str; 4] = ["ukigumo_core", "ukigumo_client", "ukigumo_agent", "tower_http"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber writing to stderr.
///
/// `json` switches to newline-delimited JSON. Only the first call in a
/// process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let registry = tracing_subscriber::registry().with(env_filter(level));
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
