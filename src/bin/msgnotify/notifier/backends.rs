use std::sync::Arc;

use msgnotify::config::{NotifySettings, ToastSettings};
use msgnotify::toast::{Navigator, ToastSurface};
use url::Url;

/// Surface for the current platform.
#[cfg(target_os = "linux")]
pub(super) fn desktop_surface(
    notify: &NotifySettings,
    toast: &ToastSettings,
) -> Arc<dyn ToastSurface> {
    Arc::new(linux::DesktopSurface::new(notify, toast))
}

#[cfg(target_os = "windows")]
pub(super) fn desktop_surface(
    notify: &NotifySettings,
    _toast: &ToastSettings,
) -> Arc<dyn ToastSurface> {
    Arc::new(windows::DesktopSurface::new(notify))
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub(super) fn desktop_surface(
    notify: &NotifySettings,
    _toast: &ToastSettings,
) -> Arc<dyn ToastSurface> {
    let _ = notify;
    Arc::new(log_only::LogSurface)
}

pub struct SystemNavigator;

impl Navigator for SystemNavigator {
    fn open(&self, url: &Url) {
        use std::process::{Command, Stdio};

        #[cfg(target_os = "windows")]
        let mut command = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        };
        #[cfg(target_os = "macos")]
        let mut command = Command::new("open");
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let mut command = Command::new("xdg-open");

        let spawned = command
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(err) = spawned {
            tracing::warn!(error = %err, %url, "failed to open messages page");
        }
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::path::PathBuf;

    use msgnotify::config::{NotifySettings, ToastSettings};
    use msgnotify::error::NotifyError;
    use msgnotify::toast::{Toast, ToastActions, ToastId, ToastSurface};
    use notify_rust::{Notification, Timeout as LibTimeout, Urgency};
    use tracing::{debug, trace, warn};

    const DEFAULT_KEY: &str = "default";
    const DISMISS_KEY: &str = "dismiss";
    const CLOSED_KEY: &str = "__closed";
    const DISMISS_LABEL: &str = "×";

    pub struct DesktopSurface {
        appname: String,
        icon: Option<PathBuf>,
        timeout_ms: u32,
    }

    impl DesktopSurface {
        pub fn new(notify: &NotifySettings, toast: &ToastSettings) -> Self {
            let lifetime = toast.display + toast.exit;
            Self {
                appname: notify.appname.clone(),
                icon: notify.icon.clone(),
                timeout_ms: u32::try_from(lifetime.as_millis()).unwrap_or(u32::MAX),
            }
        }
    }

    impl ToastSurface for DesktopSurface {
        fn present(
            &self,
            id: ToastId,
            toast: &Toast,
            actions: ToastActions,
        ) -> Result<(), NotifyError> {
            let mut builder = Notification::new();
            builder
                .summary(&toast.title)
                .body(&toast.markup_body())
                .appname(&self.appname)
                .urgency(Urgency::Normal)
                .timeout(LibTimeout::Milliseconds(self.timeout_ms))
                .action(DEFAULT_KEY, &toast.hint)
                .action(DISMISS_KEY, DISMISS_LABEL);

            if let Some(icon_path) = &self.icon {
                builder.icon(&icon_path.to_string_lossy());
            }

            let handle = builder.show().map_err(|err| {
                warn!(error = %err, id, "desktop notification refused");
                NotifyError::Backend
            })?;

            std::thread::spawn(move || {
                handle.wait_for_action(|action| match action {
                    DEFAULT_KEY => {
                        trace!(id, "toast activated");
                        actions.activate();
                    }
                    DISMISS_KEY | CLOSED_KEY => actions.close(),
                    _ => {}
                });
            });
            Ok(())
        }

        fn withdraw(&self, id: ToastId) {
            debug!(id, "toast withdrawn; notification server expires it");
        }
    }
}

#[cfg(target_os = "windows")]
mod windows {
    use msgnotify::config::NotifySettings;
    use msgnotify::error::NotifyError;
    use msgnotify::toast::{Toast, ToastActions, ToastId, ToastSurface};
    use tauri_winrt_notification::{Duration as WinDuration, Toast as WinToast};

    pub struct DesktopSurface {
        app_id: String,
    }

    impl DesktopSurface {
        pub fn new(notify: &NotifySettings) -> Self {
            let app_id = if notify.appname.trim().is_empty() {
                WinToast::POWERSHELL_APP_ID.to_string()
            } else {
                notify.appname.clone()
            };
            Self { app_id }
        }
    }

    impl ToastSurface for DesktopSurface {
        fn present(
            &self,
            id: ToastId,
            toast: &Toast,
            actions: ToastActions,
        ) -> Result<(), NotifyError> {
            tracing::debug!(id, app_id = %self.app_id, "sending windows toast");
            let on_close = actions.clone();
            WinToast::new(&self.app_id)
                .title(&toast.title)
                .text1(&toast.body())
                .duration(WinDuration::Short)
                .sound(None)
                .on_activated(move |_arguments| {
                    actions.activate();
                    Ok(())
                })
                .on_dismissed(move |_reason| {
                    on_close.close();
                    Ok(())
                })
                .show()
                .map_err(|err| {
                    tracing::warn!(error = %err, "windows toast failed");
                    NotifyError::Backend
                })
        }

        fn withdraw(&self, id: ToastId) {
            tracing::debug!(id, "toast withdrawn");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod log_only {
    use msgnotify::error::NotifyError;
    use msgnotify::toast::{Toast, ToastActions, ToastId, ToastSurface};

    pub struct LogSurface;

    impl ToastSurface for LogSurface {
        fn present(
            &self,
            id: ToastId,
            toast: &Toast,
            _actions: ToastActions,
        ) -> Result<(), NotifyError> {
            tracing::info!(id, title = %toast.title, body = %toast.body(), "toast");
            Ok(())
        }

        fn withdraw(&self, id: ToastId) {
            tracing::debug!(id, "toast withdrawn");
        }
    }
}
