//! Shared fixtures for the end-to-end signal-lifecycle tests: a seeded
//! in-memory settings store plus hand-rolled fakes for the three outbound
//! ports (broker bridge, LLM parser, Telegram transport). The application
//! layer (`ConnectionManager`, `SignalRouter`, `AccountExecutor`) runs for
//! real against these fakes, exactly as it would against the production
//! adapters.

pub mod fakes;
pub mod seed;

pub use fakes::{FakeBridgeGateway, FakeLlmClient, FakeTelegramSession};
pub use seed::{find_signal_by_message, seed_broker_account, seed_credentials, seed_settings, seed_tenant, test_store};

/// Installs an env-filtered subscriber so a failing scenario can be re-run
/// with `RUST_LOG=debug` for full stage-machine tracing. Safe to call from
/// every test; the global default is only set once.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
    });
}
