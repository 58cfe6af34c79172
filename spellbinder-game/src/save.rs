//! Versioned persisted snapshot of a whole game.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::activity::ActivityRunnerSnapshot;
use crate::combat::CombatProgress;
use crate::constants::SAVE_VERSION;
use crate::explore::LocaleState;
use crate::monster::MonsterSnapshot;
use crate::player::PlayerSnapshot;
use crate::talent::TalentPreset;

const REQUIRED_SECTIONS: [&str; 5] = ["version", "gameTime", "player", "activityRunner", "meta"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("save is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("save is missing the `{0}` section")]
    MissingSection(String),
    #[error("save references unknown {kind} `{id}`")]
    UnknownId { kind: &'static str, id: String },
    #[error("save is inconsistent: {0}")]
    Invalid(String),
}

/// Position of the game's random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RngState {
    pub seed: u64,
    pub word_pos: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveMeta {
    /// Wall-clock milliseconds supplied by the caller.
    pub saved_at: u64,
    /// Seconds of unpaused play.
    pub play_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    pub version: String,
    /// Seconds.
    pub game_time: f64,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub last_update: u64,
    pub player: PlayerSnapshot,
    pub activity_runner: ActivityRunnerSnapshot,
    /// Monsters of the encounter in progress, if any.
    #[serde(default)]
    pub monsters: Vec<MonsterSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combat: Option<CombatProgress>,
    #[serde(default)]
    pub locales: BTreeMap<String, LocaleState>,
    #[serde(default)]
    pub rng: RngState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<TalentPreset>,
    pub meta: SaveMeta,
}

impl SaveData {
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a save document, checking required sections before decoding.
    ///
    /// A version other than the current one is accepted with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::MissingSection`] when a required top-level key is absent
    /// and [`LoadError::Parse`] for anything else that fails to decode.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let Some(object) = value.as_object() else {
            return Err(LoadError::MissingSection("root".to_string()));
        };
        if let Some(missing) = REQUIRED_SECTIONS.iter().find(|k| !object.contains_key(**k)) {
            return Err(LoadError::MissingSection((*missing).to_string()));
        }
        let save: Self = serde_json::from_value(value)?;
        if !save.is_current_version() {
            log::warn!(
                "save version {} differs from {SAVE_VERSION}; loading without migration",
                save.version
            );
        }
        Ok(save)
    }

    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == SAVE_VERSION
    }
}
