use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use humantime::parse_duration;

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(author, version, about = "Desktop notifications for unread site messages", long_about = None)]
pub struct Cli {
    /// Chemin du fichier de configuration TOML.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Exécute une seule vérification puis quitte.
    #[arg(long, action = ArgAction::SetTrue)]
    pub once: bool,

    /// Force l'intervalle de vérification (ex. "8s").
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Autorise les URLs HTTP non chiffrées.
    #[arg(long, action = ArgAction::SetTrue)]
    pub insecure: bool,

    /// N'émet pas de notifications, logue uniquement ce qui serait affiché.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Utilise un layer JSON pour les logs (`--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Filtre de logs explicite (ex. "msgnotify=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Affiche une notification factice avec son, sans interroger le serveur, puis quitte.
    #[arg(long, action = ArgAction::SetTrue)]
    pub test_toast: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
