//! Shared process-wide Telegram listener (C9). A bot account is added as an
//! admin to every monitored channel; inbound `channel_post` updates are
//! forwarded into the router's shared-ingress fan-out. The signal-parsing
//! core only ever needs "deliver messages from this set of channels" (§1,
//! §6) — MTProto user-session framing is intentionally not reproduced here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::dispatching::UpdateHandler;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::application::{InboundMessage, SignalRouter};
use crate::domain::models::TenantCredentials;
use crate::ports::TelegramSession;

const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(5);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(300);
const RECONNECT_MAX_ATTEMPTS: u32 = 10;
const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(60);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

struct DispatchHandle {
    task: JoinHandle<()>,
}

/// Owns the single `teloxide::Bot` shared by every tenant's
/// `ConnectionSupervisor` (all of which connect with `skip_telegram = true`).
///
/// Constructed before the `SignalRouter` it forwards into exists — the
/// manager/router/ingress wiring is mutually dependent at bootstrap — so the
/// router is attached after construction via `set_router` and resolved lazily
/// the first time the dispatcher actually starts.
pub struct TeloxideIngress {
    bot: Bot,
    router: OnceLock<Arc<SignalRouter>>,
    connected: AtomicBool,
    dispatch: Mutex<Option<DispatchHandle>>,
}

impl TeloxideIngress {
    pub fn new(bot_token: String) -> Self {
        Self { bot: Bot::new(bot_token), router: OnceLock::new(), connected: AtomicBool::new(false), dispatch: Mutex::new(None) }
    }

    /// Must be called exactly once before `connect`/`connect_with_reconnect`.
    pub fn set_router(&self, router: Arc<SignalRouter>) {
        let _ = self.router.set(router);
    }

    fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
        Update::filter_channel_post().endpoint(forward_channel_post)
    }

    async fn start_dispatcher(&self) {
        let bot = self.bot.clone();
        let router = self.router.get().cloned().expect("TeloxideIngress::set_router must be called before connecting");
        let task = tokio::spawn(async move {
            Dispatcher::builder(bot, Self::schema())
                .dependencies(dptree::deps![router])
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await;
        });
        *self.dispatch.lock().await = Some(DispatchHandle { task });
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Starts the listener, retrying with exponential backoff and jitter
    /// (§5): 5s initial, doubling to a 300s cap, at most 10 attempts before
    /// surfacing a fatal error to the caller.
    pub async fn connect_with_reconnect(&self) -> Result<()> {
        let mut delay = RECONNECT_INITIAL_DELAY;
        for attempt in 1..=RECONNECT_MAX_ATTEMPTS {
            match self.bot.get_me().await {
                Ok(_) => {
                    self.start_dispatcher().await;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(attempt, %err, "telegram ingress connect attempt failed");
                    if attempt == RECONNECT_MAX_ATTEMPTS {
                        return Err(anyhow!("telegram ingress failed to connect after {RECONNECT_MAX_ATTEMPTS} attempts: {err}"));
                    }
                    let jitter = Duration::from_millis(rand_jitter_ms());
                    tokio::time::sleep(delay + jitter).await;
                    delay = (delay * 2).min(RECONNECT_MAX_DELAY);
                }
            }
        }
        Err(anyhow!("telegram ingress exhausted reconnect attempts"))
    }

    /// Spawns the periodic session health check (§5): pings the remote with
    /// a 10s deadline; on failure it forces disconnect and lets the caller's
    /// supervising task re-invoke `connect_with_reconnect`.
    pub fn spawn_health_check(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_CHECK_PERIOD);
            loop {
                interval.tick().await;
                if !this.connected.load(Ordering::SeqCst) {
                    continue;
                }
                let ping = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, this.bot.get_me()).await;
                if !matches!(ping, Ok(Ok(_))) {
                    tracing::warn!("telegram ingress health check failed; forcing disconnect");
                    let _ = this.disconnect().await;
                }
            }
        })
    }
}

#[async_trait]
impl TelegramSession for TeloxideIngress {
    /// The shared listener ignores per-tenant credentials and channel lists:
    /// it already consumes every channel any tenant is subscribed to, and
    /// routing is decided downstream by the router's subscription cache.
    async fn connect(&self, _credentials: &TenantCredentials, _channel_ids: &[String]) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.connect_with_reconnect().await
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.dispatch.lock().await.take() {
            handle.task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn forward_channel_post(msg: Message, router: Arc<SignalRouter>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };
    let channel_id = msg.chat.id.to_string();
    let channel_name = msg.chat.title().unwrap_or("unknown").to_string();
    let message = InboundMessage {
        text: text.to_string(),
        channel_id,
        channel_name,
        message_id: msg.id.0.to_string(),
        timestamp: msg.date,
        tenant_id: None,
    };
    router.route_message_to_subscribers(message).await;
    Ok(())
}

/// Small jitter to avoid every tenant's reconnect attempt landing on the
/// broker at the exact same instant after a shared outage.
fn rand_jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    (nanos % 1000) as u64
}
