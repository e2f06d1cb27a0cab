//! Short synthesized chime played when new messages arrive.
//!
//! The tone is rendered once at start-up into an in-memory WAV and piped to
//! the first audio player found on `PATH`. Without a player the chime is
//! silent; playback problems are only logged.

use std::f32::consts::TAU;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SoundSettings;

const SAMPLE_RATE: u32 = 22_050;
const TONE_HZ: f32 = 800.0;
const TONE_LENGTH: Duration = Duration::from_millis(500);
const GAIN_START: f32 = 0.1;
const GAIN_END: f32 = 0.01;

/// Players tried in order, with the arguments that make them read stdin.
const PLAYERS: &[(&str, &[&str])] = &[
    ("paplay", &[]),
    ("pw-play", &["-"]),
    ("aplay", &["-q", "-"]),
];

#[derive(Clone, Debug)]
struct Player {
    program: PathBuf,
    args: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Chime {
    player: Option<Player>,
    wav: Arc<[u8]>,
}

impl Chime {
    pub fn silent() -> Self {
        Self {
            player: None,
            wav: Arc::from(Vec::new()),
        }
    }

    /// Build the chime from settings, falling back to [`Chime::silent`].
    pub fn detect(settings: &SoundSettings) -> Self {
        if !settings.enabled {
            info!("sound notifications disabled");
            return Self::silent();
        }

        let player = settings.player.as_ref().map_or_else(
            || find_player(std::env::var_os("PATH").as_deref()),
            |program| {
                Some(Player {
                    program: program.clone(),
                    args: Vec::new(),
                })
            },
        );

        let Some(player) = player else {
            info!("sound notifications unavailable: no audio player found");
            return Self::silent();
        };
        debug!(player = %player.program.display(), "sound notifications enabled");
        Self {
            player: Some(player),
            wav: Arc::from(encode_wav(&synthesize_tone())),
        }
    }

    pub const fn is_silent(&self) -> bool {
        self.player.is_none()
    }
}

/// Audible half of a notification.
pub trait AlertSound: Send + Sync {
    /// Start playing in the background. Returns `None` when nothing plays.
    fn play(&self) -> Option<JoinHandle<()>>;
}

impl AlertSound for Chime {
    fn play(&self) -> Option<JoinHandle<()>> {
        let player = self.player.clone()?;
        let wav = Arc::clone(&self.wav);
        Some(tokio::task::spawn_blocking(move || {
            if let Err(err) = pipe_to_player(&player, &wav) {
                debug!(error = %err, player = %player.program.display(), "chime playback failed");
            }
        }))
    }
}

fn pipe_to_player(player: &Player, wav: &[u8]) -> std::io::Result<()> {
    let mut child = Command::new(&player.program)
        .args(&player.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(wav)?;
    }
    let status = child.wait()?;
    if !status.success() {
        debug!(%status, "audio player exited with an error");
    }
    Ok(())
}

fn find_player(path_var: Option<&std::ffi::OsStr>) -> Option<Player> {
    let dirs: Vec<PathBuf> = path_var.map(|p| std::env::split_paths(p).collect())?;
    PLAYERS.iter().find_map(|(name, args)| {
        dirs.iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .map(|program| Player {
                program,
                args: args.iter().map(|a| (*a).to_string()).collect(),
            })
    })
}

fn is_executable(path: &Path) -> bool {
    path.metadata().is_ok_and(|meta| meta.is_file())
}

/// Sine tone whose gain decays exponentially from `GAIN_START` to `GAIN_END`.
pub fn synthesize_tone() -> Vec<i16> {
    let total = (SAMPLE_RATE as f32 * TONE_LENGTH.as_secs_f32()) as usize;
    let length = TONE_LENGTH.as_secs_f32();
    (0..total)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let gain = GAIN_START * (GAIN_END / GAIN_START).powf(t / length);
            let sample = (TAU * TONE_HZ * t).sin() * gain;
            (sample * f32::from(i16::MAX)) as i16
        })
        .collect()
}

/// 16-bit mono PCM WAV.
pub fn encode_wav(samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
