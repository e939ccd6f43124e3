//! JSON configuration: the message map plus transport and injection options.
//!
//! ```json
//! {
//!   "message_map": [[[144, 60], ["a"]], [[176, 7], ["ctrl+Up"]]],
//!   "backend": "jack",
//!   "key_delay_ms": 12
//! }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Read from the working directory unless `MIDI2KEY_CONFIG` says otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Jack,
    /// ALSA sequencer through midir.
    Alsa,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `[[key bytes], [names]]` pairs, in order.
    pub message_map: Vec<(Vec<u8>, Vec<String>)>,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_client_name")]
    pub client_name: String,

    #[serde(default = "default_port_name")]
    pub port_name: String,

    /// JACK port connected to our input after activation.
    #[serde(default)]
    pub connect_from: Option<String>,

    /// ALSA: case-insensitive substring of the input port name.
    #[serde(default)]
    pub port_match: Option<String>,

    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub server_timeout_ms: u64,
}

fn default_client_name() -> String {
    "midi2key".into()
}

fn default_port_name() -> String {
    "midi_in".into()
}

fn default_key_delay_ms() -> u64 {
    12
}

fn default_queue_capacity() -> usize {
    256
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.server_timeout_ms)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os("MIDI2KEY_CONFIG")
        .map(Into::into)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into())
}
