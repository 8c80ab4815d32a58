//! Jiahao: group-chat plugin with two toys.
//! `jhdj` sends back a random clip with a randomized volume envelope;
//! `开鹿` runs a timed keyword tally game and posts a leaderboard.

pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod listener;
pub mod milestone;
pub mod plugin;
pub mod session;
pub mod state_machine;

pub use config::{PluginConfig, VolumeEnvelopeConfig};
pub use error::PluginError;
pub use host::{ChatEvent, HostError, OutgoingMessage};
pub use plugin::JhdjPlugin;

/// Install the global tracing subscriber (`RUST_LOG`, default `jiahao=debug`).
/// Set `JIAHAO_LOG_JSON=1` for JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jiahao=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    if std::env::var_os("JIAHAO_LOG_JSON").is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}
