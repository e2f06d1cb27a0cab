use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_channel::{Sender, TrySendError, bounded};
use msgnotify::Result;
use msgnotify::api::{MESSAGES_PAGE_PATH, MessagesClient};
use msgnotify::badge::{Badge, BadgeSurface, StatusFileBadge};
use msgnotify::config::Config;
use msgnotify::error::{ConfigError, Error as AppError};
use msgnotify::poller::{Alert, Intent, Outcome, Poller};
use msgnotify::sound::Chime;
use msgnotify::telemetry::init_tracing;
use tokio::signal;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::cli::Cli;
use super::notifier::{NotificationItem, Presenter, finish_chime, run_notifier};

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Trigger {
    Scheduled,
    Manual,
}

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = Config::from_env_and_file(&config_path)?;

    if let Some(interval) = cli.interval {
        if interval.is_zero() {
            return Err(AppError::from(ConfigError::InvalidField {
                field: "cli.interval",
                message: "interval must be greater than zero".to_string(),
            }));
        }
        config.poll_interval = interval;
    }

    let client = MessagesClient::new(
        config.base_url.clone(),
        config.session_cookie.clone(),
        config.http_request_timeout,
        config.http_connect_timeout,
        cli.insecure,
    )?;
    let messages_page = client.endpoint(MESSAGES_PAGE_PATH)?;

    let chime = Chime::detect(&config.sound);
    let sound = !chime.is_silent();
    let presenter = Presenter::new(
        &config.notify,
        config.toast.clone(),
        Arc::new(chime),
        messages_page,
        cli.dry_run,
    );

    if cli.test_toast {
        finish_chime(presenter.present(&Alert::synthetic()).await).await;
        info!("test notification sent, exiting");
        return Ok(());
    }

    let (tx, rx) = bounded(config.queue_capacity);
    let notifier = tokio::spawn(run_notifier(rx, presenter));

    let poller = Poller::new(client);
    let mut badge = Badge::new(
        config
            .badge
            .status_file
            .clone()
            .map(|path| Box::new(StatusFileBadge::new(path)) as Box<dyn BadgeSurface>),
    );
    let mut manual = ManualTrigger::install();

    info!(
        url = %config.base_url,
        interval_ms = config.poll_interval.as_millis(),
        sound,
        "message notifier started"
    );

    let mut trigger = Trigger::Scheduled;
    loop {
        let iteration_start = Instant::now();
        tokio::select! {
            biased;
            _ = signal::ctrl_c() => {
                info!("shutdown signal received, stopping loop");
                break;
            }
            _ = poll_once(&poller, &mut badge, &tx, trigger) => {}
        }

        if cli.once {
            break;
        }

        let sleep_dur = config
            .poll_interval
            .checked_sub(iteration_start.elapsed())
            .unwrap_or_default();

        trigger = Trigger::Scheduled;
        if sleep_dur.is_zero() {
            continue;
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received, stopping loop");
                break;
            }
            () = manual.recv() => {
                trigger = Trigger::Manual;
            }
            () = sleep(sleep_dur) => {}
        }
    }

    badge.update(0);
    tx.close();
    if let Err(err) = notifier.await {
        warn!(error = %err, "notifier task terminated unexpectedly");
    }

    Ok(())
}

/// One polling cycle. Failures are logged and leave everything untouched; the
/// next tick simply tries again.
pub(super) async fn poll_once(
    poller: &Poller,
    badge: &mut Badge,
    tx: &Sender<NotificationItem>,
    trigger: Trigger,
) -> Option<Intent> {
    let result = match trigger {
        Trigger::Scheduled => poller.check().await,
        Trigger::Manual => poller.force_check().await,
    };

    let intent = match result {
        Ok(Outcome::Applied(intent)) => intent,
        Ok(Outcome::Superseded) => return None,
        Err(err) => {
            warn!(error = %err, transient = err.is_transient(), "message check failed");
            return None;
        }
    };

    if let Some(alert) = intent.alert() {
        info!(
            new_messages = alert.new_messages,
            latest_id = alert.latest.as_ref().map(|m| m.id),
            "new messages"
        );
        match tx.try_send(NotificationItem { alert }) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => {
                warn!(
                    new_messages = item.alert.new_messages,
                    "notification queue full; dropping toast"
                );
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    if let Some(unread) = intent.badge_count() {
        debug!(unread, "updating badge");
        badge.update(unread);
    }

    Some(intent)
}

/// `SIGUSR1` forces an immediate check.
#[cfg(unix)]
struct ManualTrigger(Option<signal::unix::Signal>);

#[cfg(unix)]
impl ManualTrigger {
    fn install() -> Self {
        match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
            Ok(sig) => Self(Some(sig)),
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGUSR1; manual checks disabled");
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        match self.0.as_mut() {
            Some(sig) => {
                if sig.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(not(unix))]
struct ManualTrigger;

#[cfg(not(unix))]
impl ManualTrigger {
    const fn install() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending().await
    }
}
