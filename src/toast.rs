//! Toasts announcing new messages and the container that owns them.
//!
//! Every toast runs its own lifecycle task: it becomes visible after the
//! enter delay, starts leaving once the display time has elapsed and is
//! removed after the exit time. Closing or activating a toast removes it at
//! once; its lifecycle task then finds nothing left to do. Toasts never
//! share timers, so closing one leaves the others running.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_channel::{Receiver, Sender, unbounded};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::config::{ToastLabels, ToastSettings};
use crate::error::NotifyError;
use crate::poller::Alert;

pub type ToastId = u64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Toast {
    pub title: String,
    pub from_line: Option<String>,
    pub preview: Option<String>,
    pub hint: String,
    /// Page opened when the toast is activated.
    pub target: Url,
}

impl Toast {
    pub fn from_alert(alert: &Alert, settings: &ToastSettings, target: Url) -> Self {
        let ToastLabels {
            title_one,
            title_many,
            from,
            hint,
        } = &settings.labels;
        let title = if alert.new_messages > 1 {
            title_many.clone()
        } else {
            title_one.clone()
        };
        let (from_line, preview) = alert.latest.as_ref().map_or((None, None), |message| {
            (
                Some(format!("{from}: {}", message.sender)),
                Some(truncate_preview(&message.content, settings.preview_chars)),
            )
        });
        Self {
            title,
            from_line,
            preview,
            hint: hint.clone(),
            target,
        }
    }

    /// Body text for surfaces that only take a summary and a body.
    pub fn body(&self) -> String {
        let mut lines = Vec::with_capacity(3);
        if let Some(from) = &self.from_line {
            lines.push(from.clone());
        }
        if let Some(preview) = &self.preview {
            lines.push(format!("\"{preview}\""));
        }
        lines.push(self.hint.clone());
        lines.join("\n")
    }

    /// [`Toast::body`] for surfaces that interpret their body as markup
    /// (freedesktop notification servers). Sender and content come from
    /// other users and must never be read as tags or entities.
    pub fn markup_body(&self) -> String {
        escape_markup(&self.body())
    }
}

fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate_preview(content: &str, max_chars: usize) -> String {
    let content = content.trim();
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ToastPhase {
    Entering,
    Visible,
    Leaving,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ToastAction {
    /// Click on the toast body: open the messages page.
    Activate,
    /// Click on the close control.
    Close,
}

/// Handle given to surfaces to report what the user did with a toast.
#[derive(Clone, Debug)]
pub struct ToastActions {
    id: ToastId,
    tx: Sender<(ToastId, ToastAction)>,
}

impl ToastActions {
    pub const fn id(&self) -> ToastId {
        self.id
    }

    pub fn activate(&self) {
        self.send(ToastAction::Activate);
    }

    pub fn close(&self) {
        self.send(ToastAction::Close);
    }

    fn send(&self, action: ToastAction) {
        if self.tx.try_send((self.id, action)).is_err() {
            debug!(id = self.id, ?action, "toast center gone, action dropped");
        }
    }
}

/// Where toasts are drawn.
pub trait ToastSurface: Send + Sync + 'static {
    /// Show a new toast.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses the toast.
    fn present(
        &self,
        id: ToastId,
        toast: &Toast,
        actions: ToastActions,
    ) -> Result<(), NotifyError>;

    /// The exit animation starts.
    fn leave(&self, _id: ToastId) {}

    /// The toast is gone from the container.
    fn withdraw(&self, id: ToastId);
}

/// Opens the messages page.
pub trait Navigator: Send + Sync + 'static {
    fn open(&self, url: &Url);
}

#[derive(Clone, Copy, Debug)]
struct Timing {
    display: Duration,
    exit: Duration,
    enter_delay: Duration,
}

struct Entry {
    toast: Toast,
    phase: ToastPhase,
}

struct Inner {
    surface: Arc<dyn ToastSurface>,
    navigator: Arc<dyn Navigator>,
    timing: Timing,
    toasts: Mutex<BTreeMap<ToastId, Entry>>,
    next_id: AtomicU64,
    actions: Sender<(ToastId, ToastAction)>,
}

/// Singleton container of the toasts currently on screen.
#[derive(Clone)]
pub struct ToastCenter {
    inner: Arc<Inner>,
}

impl ToastCenter {
    /// Create the container and start listening for surface actions.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        surface: Arc<dyn ToastSurface>,
        navigator: Arc<dyn Navigator>,
        settings: &ToastSettings,
    ) -> Self {
        let (tx, rx) = unbounded();
        let inner = Arc::new(Inner {
            surface,
            navigator,
            timing: Timing {
                display: settings.display,
                exit: settings.exit,
                enter_delay: settings.enter_delay,
            },
            toasts: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            actions: tx,
        });
        tokio::spawn(listen_for_actions(Arc::downgrade(&inner), rx));
        Self { inner }
    }

    /// Add a toast and start its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns the surface error; the toast is then not kept.
    pub async fn show(&self, toast: Toast) -> Result<ToastId, NotifyError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let actions = ToastActions {
            id,
            tx: self.inner.actions.clone(),
        };

        self.inner.toasts.lock().await.insert(
            id,
            Entry {
                toast: toast.clone(),
                phase: ToastPhase::Entering,
            },
        );

        if let Err(err) = self.inner.surface.present(id, &toast, actions) {
            self.inner.toasts.lock().await.remove(&id);
            return Err(err);
        }

        debug!(id, title = %toast.title, "toast shown");
        tokio::spawn(self.clone().run_lifecycle(id));
        Ok(id)
    }

    /// Remove one toast immediately. Returns `false` if it was already gone.
    pub async fn close(&self, id: ToastId) -> bool {
        let removed = self.inner.toasts.lock().await.remove(&id).is_some();
        if removed {
            self.inner.surface.withdraw(id);
            debug!(id, "toast closed");
        }
        removed
    }

    /// Open the messages page for a toast and close it.
    pub async fn activate(&self, id: ToastId) -> bool {
        let target = self
            .inner
            .toasts
            .lock()
            .await
            .get(&id)
            .map(|entry| entry.toast.target.clone());
        let Some(target) = target else {
            return false;
        };
        info!(id, url = %target, "opening messages page");
        self.inner.navigator.open(&target);
        self.close(id).await
    }

    pub async fn phase(&self, id: ToastId) -> Option<ToastPhase> {
        self.inner.toasts.lock().await.get(&id).map(|e| e.phase)
    }

    pub async fn len(&self) -> usize {
        self.inner.toasts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn run_lifecycle(self, id: ToastId) {
        let Timing {
            display,
            exit,
            enter_delay,
        } = self.inner.timing;

        sleep(enter_delay).await;
        self.transition(id, ToastPhase::Entering, ToastPhase::Visible)
            .await;

        sleep(display.saturating_sub(enter_delay)).await;
        if !self.begin_exit(id).await {
            return;
        }

        sleep(exit).await;
        if self.inner.toasts.lock().await.remove(&id).is_some() {
            self.inner.surface.withdraw(id);
            debug!(id, "toast expired");
        }
    }

    async fn transition(&self, id: ToastId, from: ToastPhase, to: ToastPhase) -> bool {
        let mut toasts = self.inner.toasts.lock().await;
        match toasts.get_mut(&id) {
            Some(entry) if entry.phase == from => {
                entry.phase = to;
                true
            }
            _ => false,
        }
    }

    async fn begin_exit(&self, id: ToastId) -> bool {
        let mut toasts = self.inner.toasts.lock().await;
        let Some(entry) = toasts.get_mut(&id) else {
            return false;
        };
        entry.phase = ToastPhase::Leaving;
        drop(toasts);
        self.inner.surface.leave(id);
        true
    }
}

async fn listen_for_actions(inner: Weak<Inner>, rx: Receiver<(ToastId, ToastAction)>) {
    while let Ok((id, action)) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let center = ToastCenter { inner };
        let handled = match action {
            ToastAction::Activate => center.activate(id).await,
            ToastAction::Close => center.close(id).await,
        };
        if !handled {
            debug!(id, ?action, "action for a toast that is already gone");
        }
    }
}
