mod backends;

use std::sync::Arc;

use async_channel::Receiver;
use msgnotify::config::{NotifySettings, ToastSettings};
use msgnotify::poller::Alert;
use msgnotify::sound::AlertSound;
use msgnotify::toast::{Toast, ToastCenter};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

pub struct NotificationItem {
    pub(crate) alert: Alert,
}

/// Renders alerts: one toast plus one chime per alert.
pub struct Presenter {
    center: ToastCenter,
    sound: Arc<dyn AlertSound>,
    toast: ToastSettings,
    messages_page: Url,
    dry_run: bool,
}

impl Presenter {
    pub fn new(
        notify: &NotifySettings,
        toast: ToastSettings,
        sound: Arc<dyn AlertSound>,
        messages_page: Url,
        dry_run: bool,
    ) -> Self {
        let center = ToastCenter::spawn(
            backends::desktop_surface(notify, &toast),
            Arc::new(backends::SystemNavigator),
            &toast,
        );
        Self::with_center(center, sound, toast, messages_page, dry_run)
    }

    pub fn with_center(
        center: ToastCenter,
        sound: Arc<dyn AlertSound>,
        toast: ToastSettings,
        messages_page: Url,
        dry_run: bool,
    ) -> Self {
        Self {
            center,
            sound,
            toast,
            messages_page,
            dry_run,
        }
    }

    /// Show the toast and start the chime. The returned handle completes when
    /// the chime has finished playing.
    pub async fn present(&self, alert: &Alert) -> Option<JoinHandle<()>> {
        if self.dry_run {
            info!(
                new_messages = alert.new_messages,
                sender = alert.latest.as_ref().map_or("<none>", |m| m.sender.as_str()),
                "dry-run: would emit notification"
            );
            return None;
        }

        let toast = Toast::from_alert(alert, &self.toast, self.messages_page.clone());
        if let Err(err) = self.center.show(toast).await {
            error!(error = %err, new_messages = alert.new_messages, "failed to show toast");
        }
        self.sound.play()
    }
}

/// Wait for a chime started by [`Presenter::present`].
pub async fn finish_chime(chime: Option<JoinHandle<()>>) {
    if let Some(handle) = chime {
        if let Err(err) = handle.await {
            debug!(error = %err, "chime task did not complete");
        }
    }
}

pub async fn run_notifier(rx: Receiver<NotificationItem>, presenter: Presenter) {
    while let Ok(item) = rx.recv().await {
        let chime = presenter.present(&item.alert).await;
        tokio::spawn(finish_chime(chime));
    }
}
