use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime::parse_duration;
use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{DeserializeAs, serde_as};
use url::Url;

use crate::Result;
use crate::error::ConfigError;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub session_cookie: Option<SecretString>,
    pub poll_interval: Duration,
    pub queue_capacity: usize,
    pub toast: ToastSettings,
    pub notify: NotifySettings,
    pub badge: BadgeSettings,
    pub sound: SoundSettings,
    pub http_connect_timeout: Duration,
    pub http_request_timeout: Duration,
}

/// Timing and wording of the toasts.
#[derive(Debug, Clone)]
pub struct ToastSettings {
    /// Time a toast stays up before its exit starts, counted from insertion.
    pub display: Duration,
    /// Exit animation length; the toast is removed once it elapses.
    pub exit: Duration,
    /// Delay before the toast is marked visible.
    pub enter_delay: Duration,
    pub preview_chars: usize,
    pub labels: ToastLabels,
}

#[derive(Debug, Clone)]
pub struct ToastLabels {
    pub title_one: String,
    pub title_many: String,
    pub from: String,
    pub hint: String,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub appname: String,
    pub icon: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct BadgeSettings {
    pub status_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SoundSettings {
    pub enabled: bool,
    pub player: Option<PathBuf>,
}

impl Config {
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        let path = path.as_ref();
        builder = builder.add_source(::config::File::from(path).required(false));
        builder = builder.add_source(
            ::config::Environment::with_prefix("MSGNOTIFY")
                .separator("__")
                .try_parsing(true),
        );

        let mut raw: RawConfig = builder
            .build()
            .map_err(|err| ConfigError::Other(err.to_string()))?
            .try_deserialize()
            .map_err(|err| ConfigError::Parse(err.to_string()))?;

        raw.apply_env_overrides()?;
        raw.validate_and_build()
    }
}

impl Default for ToastSettings {
    fn default() -> Self {
        RawToast::default().into_settings()
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            appname: default_notify_appname(),
            icon: None,
        }
    }
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            player: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    app: RawApp,
    #[serde(default)]
    toast: RawToast,
    #[serde(default)]
    notify: RawNotify,
    #[serde(default)]
    badge: RawBadge,
    #[serde(default)]
    sound: RawSound,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    url: Option<String>,
    session_cookie: Option<String>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawApp {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "HumantimeDuration")]
    poll_interval: Duration,
    #[serde(default = "default_queue_bound")]
    queue_bound: usize,
    #[serde(default = "default_http_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    http_timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    connect_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawToast {
    #[serde(default = "default_toast_display")]
    #[serde_as(as = "HumantimeDuration")]
    display: Duration,
    #[serde(default = "default_toast_exit")]
    #[serde_as(as = "HumantimeDuration")]
    exit: Duration,
    #[serde(default = "default_toast_enter_delay")]
    #[serde_as(as = "HumantimeDuration")]
    enter_delay: Duration,
    #[serde(default = "default_preview_chars")]
    preview_chars: usize,
    #[serde(default = "default_title_one")]
    title_one: String,
    #[serde(default = "default_title_many")]
    title_many: String,
    #[serde(default = "default_from_label")]
    from_label: String,
    #[serde(default = "default_hint")]
    hint: String,
}

#[derive(Debug, Deserialize)]
struct RawNotify {
    #[serde(default = "default_notify_appname")]
    appname: String,
    #[serde(default)]
    icon: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBadge {
    #[serde(default)]
    status_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawSound {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    player: Option<PathBuf>,
}

impl Default for RawApp {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            queue_bound: default_queue_bound(),
            http_timeout: default_http_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for RawToast {
    fn default() -> Self {
        Self {
            display: default_toast_display(),
            exit: default_toast_exit(),
            enter_delay: default_toast_enter_delay(),
            preview_chars: default_preview_chars(),
            title_one: default_title_one(),
            title_many: default_title_many(),
            from_label: default_from_label(),
            hint: default_hint(),
        }
    }
}

impl Default for RawNotify {
    fn default() -> Self {
        Self {
            appname: default_notify_appname(),
            icon: None,
        }
    }
}

impl Default for RawSound {
    fn default() -> Self {
        Self {
            enabled: true,
            player: None,
        }
    }
}

impl RawToast {
    fn into_settings(self) -> ToastSettings {
        ToastSettings {
            display: self.display,
            exit: self.exit,
            enter_delay: self.enter_delay,
            preview_chars: self.preview_chars,
            labels: ToastLabels {
                title_one: self.title_one,
                title_many: self.title_many,
                from: self.from_label,
                hint: self.hint,
            },
        }
    }
}

impl RawConfig {
    fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(url) = env_string("MESSAGES_URL")? {
            self.server.url = Some(url);
        }
        if let Some(cookie) = env_string("MESSAGES_SESSION_COOKIE")? {
            self.server.session_cookie = Some(cookie);
        }
        if let Some(interval) = env_duration("POLL_INTERVAL")? {
            self.app.poll_interval = interval;
        }
        if let Some(queue) = env_parse::<usize>("NOTIFY_QUEUE_BOUND")? {
            self.app.queue_bound = queue;
        }
        if let Some(display) = env_duration("TOAST_DISPLAY")? {
            self.toast.display = display;
        }
        if let Some(appname) = env_string("NOTIFY_APPNAME")? {
            self.notify.appname = appname;
        }
        if let Some(icon) = env_string("NOTIFY_ICON")? {
            self.notify.icon = Some(PathBuf::from(icon));
        }
        if let Some(status_file) = env_string("BADGE_STATUS_FILE")? {
            self.badge.status_file = Some(PathBuf::from(status_file));
        }
        if let Some(enabled) = env_parse::<bool>("SOUND_ENABLED")? {
            self.sound.enabled = enabled;
        }
        if let Some(player) = env_string("SOUND_PLAYER")? {
            self.sound.player = Some(PathBuf::from(player));
        }
        Ok(())
    }

    fn validate_and_build(self) -> Result<Config> {
        let url_str = self.server.url.ok_or(ConfigError::MissingField {
            field: "server.url",
        })?;
        let base_url = Url::parse(&url_str).map_err(|err| ConfigError::InvalidField {
            field: "server.url",
            message: err.to_string(),
        })?;
        let session_cookie = self
            .server
            .session_cookie
            .filter(|cookie| !cookie.trim().is_empty())
            .map(SecretString::from);

        if self.app.poll_interval.is_zero() {
            return Err(invalid("app.poll_interval", "poll interval must be greater than zero"));
        }
        if self.app.queue_bound == 0 {
            return Err(invalid("app.queue_bound", "queue bound must be greater than zero"));
        }
        if self.toast.display.is_zero() {
            return Err(invalid("toast.display", "display duration must be greater than zero"));
        }
        if self.toast.enter_delay > self.toast.display {
            return Err(invalid(
                "toast.enter_delay",
                "enter delay cannot exceed the display duration",
            ));
        }
        if self.toast.preview_chars == 0 {
            return Err(invalid("toast.preview_chars", "preview must keep at least one character"));
        }

        Ok(Config {
            base_url,
            session_cookie,
            poll_interval: self.app.poll_interval,
            queue_capacity: self.app.queue_bound,
            toast: self.toast.into_settings(),
            notify: NotifySettings {
                appname: self.notify.appname,
                icon: self.notify.icon,
            },
            badge: BadgeSettings {
                status_file: self.badge.status_file,
            },
            sound: SoundSettings {
                enabled: self.sound.enabled,
                player: self.sound.player,
            },
            http_connect_timeout: self.app.connect_timeout,
            http_request_timeout: self.app.http_timeout,
        })
    }
}

fn invalid(field: &'static str, message: &str) -> crate::error::Error {
    ConfigError::InvalidField {
        field,
        message: message.to_string(),
    }
    .into()
}

struct HumantimeDuration;

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

fn env_string(key: &'static str) -> std::result::Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(ConfigError::Other(err.to_string())),
    }
}

fn env_parse<T>(key: &'static str) -> std::result::Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env_string(key)? {
        if value.trim().is_empty() {
            return Ok(None);
        }
        return value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidField {
                field: key,
                message: err.to_string(),
            });
    }
    Ok(None)
}

fn env_duration(key: &'static str) -> std::result::Result<Option<Duration>, ConfigError> {
    if let Some(value) = env_string(key)? {
        if value.trim().is_empty() {
            return Ok(None);
        }
        return parse_duration(value.trim())
            .map(Some)
            .map_err(|err| ConfigError::InvalidField {
                field: key,
                message: err.to_string(),
            });
    }
    Ok(None)
}

const fn default_poll_interval() -> Duration {
    Duration::from_secs(8)
}

const fn default_queue_bound() -> usize {
    16
}

const fn default_http_timeout() -> Duration {
    DEFAULT_HTTP_TIMEOUT
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_toast_display() -> Duration {
    Duration::from_secs(8)
}

const fn default_toast_exit() -> Duration {
    Duration::from_millis(400)
}

const fn default_toast_enter_delay() -> Duration {
    Duration::from_millis(100)
}

const fn default_preview_chars() -> usize {
    160
}

const fn default_true() -> bool {
    true
}

fn default_title_one() -> String {
    "New message!".to_string()
}

fn default_title_many() -> String {
    "New messages!".to_string()
}

fn default_from_label() -> String {
    "From".to_string()
}

fn default_hint() -> String {
    "Click to view".to_string()
}

fn default_notify_appname() -> String {
    "Messages".to_string()
}

#[cfg(test)]
mod tests {
    use super::{HumantimeDuration, RawConfig};
    use crate::error::{ConfigError, Error};
    use serde::Deserialize;
    use serde_with::serde_as;
    use std::time::Duration;

    #[test]
    fn humantime_duration_parses_strings() {
        #[serde_as]
        #[derive(Deserialize)]
        struct Sample {
            #[serde_as(as = "Option<HumantimeDuration>")]
            duration: Option<Duration>,
        }

        let sample: Sample = serde_json::from_str(r#"{"duration":"400ms"}"#).unwrap();
        assert_eq!(sample.duration, Some(Duration::from_millis(400)));
    }

    #[test]
    fn defaults_match_widget_timings() {
        let mut raw = RawConfig::default();
        raw.server.url = Some("http://localhost:5000".into());
        let config = raw.validate_and_build().unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(8));
        assert_eq!(config.toast.display, Duration::from_secs(8));
        assert_eq!(config.toast.exit, Duration::from_millis(400));
        assert_eq!(config.toast.enter_delay, Duration::from_millis(100));
        assert!(config.session_cookie.is_none());
        assert!(config.badge.status_file.is_none());
        assert!(config.sound.enabled);
    }

    #[test]
    fn missing_url_is_reported() {
        let err = RawConfig::default().validate_and_build().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { field: "server.url" })
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut raw = RawConfig::default();
        raw.server.url = Some("https://example.org".into());
        raw.app.poll_interval = Duration::ZERO;
        let err = raw.validate_and_build().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidField {
                field: "app.poll_interval",
                ..
            })
        ));
    }

    #[test]
    fn toml_sections_are_read() {
        let raw: RawConfig = ::config::Config::builder()
            .add_source(::config::File::from_str(
                r#"
                [server]
                url = "https://forum.example.org"
                session_cookie = "session=abc"

                [toast]
                display = "5s"
                title_one = "Новое сообщение!"

                [badge]
                status_file = "/run/user/1000/msgnotify.json"
                "#,
                ::config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let config = raw.validate_and_build().unwrap();
        assert_eq!(config.base_url.as_str(), "https://forum.example.org/");
        assert!(config.session_cookie.is_some());
        assert_eq!(config.toast.display, Duration::from_secs(5));
        assert_eq!(config.toast.labels.title_one, "Новое сообщение!");
        assert_eq!(config.toast.labels.title_many, "New messages!");
        assert!(config.badge.status_file.is_some());
    }
}
