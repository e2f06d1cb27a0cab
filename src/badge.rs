//! Unread counter shown next to the messages entry of the status bar.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::NotifyError;

const BADGE_CAP: u64 = 99;

/// What the surface has to display.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BadgeView {
    pub label: String,
    pub unread: u64,
    /// Flips on every update so the surface can restart its pulse animation.
    pub pulse: PulsePhase,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PulsePhase {
    A,
    B,
}

impl PulsePhase {
    const fn flip(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub const fn class(self) -> &'static str {
        match self {
            Self::A => "pulse-a",
            Self::B => "pulse-b",
        }
    }
}

/// Where the badge is drawn.
pub trait BadgeSurface: Send {
    fn render(&mut self, view: &BadgeView) -> Result<(), NotifyError>;
    fn remove(&mut self) -> Result<(), NotifyError>;
}

/// Singleton badge. Without an anchor every update is a silent no-op.
pub struct Badge {
    anchor: Option<Box<dyn BadgeSurface>>,
    shown: Option<BadgeView>,
    pulse: PulsePhase,
}

pub fn badge_label(count: u64) -> String {
    if count > BADGE_CAP {
        format!("{BADGE_CAP}+")
    } else {
        count.to_string()
    }
}

impl Badge {
    /// Attach the badge. Whatever a previous run left on the surface is
    /// cleared so that the badge only reflects this process.
    pub fn new(mut anchor: Option<Box<dyn BadgeSurface>>) -> Self {
        if let Some(surface) = anchor.as_mut() {
            if let Err(err) = surface.remove() {
                warn!(error = %err, "failed to clear stale badge");
            }
        }
        Self {
            anchor,
            shown: None,
            pulse: PulsePhase::B,
        }
    }

    pub fn detached() -> Self {
        Self::new(None)
    }

    pub const fn current(&self) -> Option<&BadgeView> {
        self.shown.as_ref()
    }

    pub fn update(&mut self, count: u64) {
        let Some(anchor) = self.anchor.as_mut() else {
            debug!(count, "no badge anchor configured");
            return;
        };

        if count == 0 {
            if self.shown.take().is_some() {
                if let Err(err) = anchor.remove() {
                    warn!(error = %err, "failed to remove badge");
                }
            }
            return;
        }

        self.pulse = self.pulse.flip();
        let view = BadgeView {
            label: badge_label(count),
            unread: count,
            pulse: self.pulse,
        };
        match anchor.render(&view) {
            Ok(()) => self.shown = Some(view),
            Err(err) => warn!(error = %err, count, "failed to render badge"),
        }
    }
}

impl Drop for Badge {
    fn drop(&mut self) {
        self.update(0);
    }
}

/// Badge written as a status-bar JSON document (waybar `custom` module format).
pub struct StatusFileBadge {
    path: PathBuf,
}

#[derive(Serialize)]
struct StatusDocument<'a> {
    text: &'a str,
    tooltip: String,
    class: [&'static str; 2],
}

impl StatusFileBadge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> NotifyError {
        NotifyError::Badge {
            path: self.path.clone(),
            source,
        }
    }
}

impl BadgeSurface for StatusFileBadge {
    fn render(&mut self, view: &BadgeView) -> Result<(), NotifyError> {
        let doc = StatusDocument {
            text: &view.label,
            tooltip: format!("{} unread messages", view.unread),
            class: ["unread", view.pulse.class()],
        };
        let json = serde_json::to_vec(&doc)
            .map_err(|err| NotifyError::InvalidPayload(err.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(|err| self.io_error(err))?;
        file.write_all(&json).map_err(|err| self.io_error(err))?;
        file.write_all(b"\n").map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }

    fn remove(&mut self) -> Result<(), NotifyError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
