use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
}

/// Everything worth surviving a restart: the current media selection and
/// the chat transcript. Local to this machine, never shared.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedRoomState {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    pub transcript: Vec<ChatLine>,
}

/// Wholesale-overwrite persistence: the whole state is rewritten on every
/// change, no versioning, no merging.
pub struct RoomStore {
    path: PathBuf,
}

impl RoomStore {
    pub fn at_default_location() -> Result<Self> {
        let dir = dirs::data_dir().ok_or_else(|| anyhow!("no user data directory"))?;
        Ok(Self {
            path: dir.join("movienight").join("room_state.json"),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Best-effort: a missing or unreadable file is just an empty state.
    pub fn load(&self) -> SavedRoomState {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, state: &SavedRoomState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("create state directory")?;
        }
        let text = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, text).context("write room state")?;
        Ok(())
    }
}
