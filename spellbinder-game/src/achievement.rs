//! Achievements: one-shot milestones with progress counters and rewards.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use crate::events::{EventBus, SubscriptionId};
use crate::save::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AchievementKind {
    Skill,
    Spell,
    Activity,
    Resource,
    Combat,
    Exploration,
    Time,
    #[default]
    Misc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AchievementReward {
    Resource { resource_id: String, amount: f64 },
    Unlock { unlock_id: String },
    Bonus { bonus_type: String, bonus_value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementCondition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target: String,
    pub required: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: AchievementKind,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub rewards: Vec<AchievementReward>,
    pub condition: AchievementCondition,
}

/// Persisted progress for one achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<u64>,
    pub current: f64,
    pub progress: f64,
}

impl AchievementProgress {
    fn set_current(&mut self, current: f64, required: f64) {
        let required = required.max(f64::MIN_POSITIVE);
        self.current = current.clamp(0.0, required);
        self.progress = self.current / required * 100.0;
    }
}

/// Published once per achievement, at the moment it unlocks.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementUnlocked {
    pub id: String,
    pub name: String,
    pub rewards: Vec<AchievementReward>,
    pub unlocked_at: u64,
}

#[derive(Debug)]
pub struct AchievementManager {
    defs: Arc<BTreeMap<String, AchievementDef>>,
    progress: BTreeMap<String, AchievementProgress>,
    pending_rewards: Vec<(String, AchievementReward)>,
    bus: EventBus<AchievementUnlocked>,
    clock_ms: u64,
}

impl AchievementManager {
    #[must_use]
    pub fn new(defs: Arc<BTreeMap<String, AchievementDef>>) -> Self {
        Self {
            defs,
            progress: BTreeMap::new(),
            pending_rewards: Vec::new(),
            bus: EventBus::new(),
            clock_ms: 0,
        }
    }

    /// Restore persisted progress, rejecting ids missing from the definitions.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] for progress naming an undefined achievement.
    pub fn restore(
        defs: Arc<BTreeMap<String, AchievementDef>>,
        progress: BTreeMap<String, AchievementProgress>,
    ) -> Result<Self, LoadError> {
        let mut manager = Self::new(defs);
        for (id, mut entry) in progress {
            let Some(def) = manager.defs.get(&id) else {
                return Err(LoadError::UnknownId {
                    kind: "achievement",
                    id,
                });
            };
            if !entry.unlocked && entry.current >= def.condition.required {
                entry.unlocked = true;
            }
            manager.progress.insert(id, entry);
        }
        Ok(manager)
    }

    pub const fn set_clock(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&AchievementDef> {
        self.defs.get(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AchievementProgress> {
        self.progress.get(id)
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.progress.get(id).is_some_and(|p| p.unlocked)
    }

    /// Unlock outright. Returns `true` only on the locked -> unlocked transition.
    pub fn unlock(&mut self, id: &str) -> bool {
        let Some(def) = self.defs.get(id) else {
            log::warn!("unknown achievement `{id}`");
            return false;
        };
        let required = def.condition.required;
        let entry = self.progress.entry(id.to_string()).or_default();
        if entry.unlocked {
            return false;
        }
        entry.set_current(required, required);
        self.finish_unlock(id);
        true
    }

    /// Set the progress counter. Returns `false` for unknown ids.
    pub fn update_progress(&mut self, id: &str, current: f64) -> bool {
        let Some(required) = self.defs.get(id).map(|d| d.condition.required) else {
            return false;
        };
        let entry = self.progress.entry(id.to_string()).or_default();
        if entry.unlocked {
            return true;
        }
        entry.set_current(current, required);
        if entry.current >= required {
            self.finish_unlock(id);
        }
        true
    }

    pub fn increment(&mut self, id: &str, amount: f64) -> bool {
        let current = self.progress.get(id).map_or(0.0, |p| p.current);
        self.update_progress(id, current + amount)
    }

    fn finish_unlock(&mut self, id: &str) {
        let Some(def) = self.defs.get(id) else {
            return;
        };
        if let Some(entry) = self.progress.get_mut(id) {
            entry.unlocked = true;
            entry.unlocked_at = Some(self.clock_ms);
            entry.progress = 100.0;
        }
        log::info!("achievement unlocked: {}", def.name);
        for reward in &def.rewards {
            self.pending_rewards.push((id.to_string(), reward.clone()));
        }
        let event = AchievementUnlocked {
            id: def.id.clone(),
            name: def.name.clone(),
            rewards: def.rewards.clone(),
            unlocked_at: self.clock_ms,
        };
        self.bus.publish(&event);
    }

    /// Rewards earned since the last call, in unlock order.
    pub fn take_pending_rewards(&mut self) -> Vec<(String, AchievementReward)> {
        std::mem::take(&mut self.pending_rewards)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AchievementDef, Option<&AchievementProgress>)> {
        self.defs.values().map(|def| (def, self.progress.get(&def.id)))
    }

    #[must_use]
    pub fn unlocked(&self) -> Vec<&AchievementDef> {
        self.iter()
            .filter(|(_, p)| p.is_some_and(|p| p.unlocked))
            .map(|(def, _)| def)
            .collect()
    }

    #[must_use]
    pub fn locked(&self) -> Vec<&AchievementDef> {
        self.iter()
            .filter(|(_, p)| !p.is_some_and(|p| p.unlocked))
            .map(|(def, _)| def)
            .collect()
    }

    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<&AchievementDef> {
        self.defs.values().filter(|d| d.category == category).collect()
    }

    #[must_use]
    pub fn by_kind(&self, kind: AchievementKind) -> Vec<&AchievementDef> {
        self.defs.values().filter(|d| d.kind == kind).collect()
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<AchievementUnlocked>) {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, AchievementProgress> {
        self.progress.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Arc<BTreeMap<String, AchievementDef>> {
        let json = r#"[
            { "id": "skill_master", "name": "Skill Master", "type": "skill", "category": "growth",
              "rewards": [{ "type": "resource", "resource_id": "gold", "amount": 50 }],
              "condition": { "type": "skill_count", "required": 3 } },
            { "id": "first_spell", "name": "First Spell", "type": "spell", "category": "growth",
              "rewards": [{ "type": "bonus", "bonus_type": "spell_power", "bonus_value": 1 }],
              "condition": { "type": "spell_count", "required": 1 } }
        ]"#;
        let list: Vec<AchievementDef> = serde_json::from_str(json).unwrap();
        Arc::new(list.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    #[test]
    fn increments_until_unlocked_once() {
        let mut manager = AchievementManager::new(defs());
        let (_, rx) = manager.subscribe();
        manager.set_clock(42);
        for _ in 0..5 {
            assert!(manager.increment("skill_master", 1.0));
        }
        let progress = manager.get("skill_master").unwrap();
        assert!(progress.unlocked);
        assert!((progress.current - 3.0).abs() < f64::EPSILON);
        assert_eq!(progress.unlocked_at, Some(42));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "skill_master");
        assert_eq!(manager.take_pending_rewards().len(), 1);
        assert!(manager.take_pending_rewards().is_empty());
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut manager = AchievementManager::new(defs());
        assert!(manager.unlock("first_spell"));
        assert!(!manager.unlock("first_spell"));
        assert!(!manager.unlock("missing"));
        assert!(!manager.increment("missing", 1.0));
        assert_eq!(manager.unlocked().len(), 1);
        assert_eq!(manager.locked().len(), 1);
        assert_eq!(manager.by_category("growth").len(), 2);
        assert_eq!(manager.by_kind(AchievementKind::Spell).len(), 1);
    }

    #[test]
    fn progress_percentage_tracks_counter() {
        let mut manager = AchievementManager::new(defs());
        manager.increment("skill_master", 1.0);
        let progress = manager.get("skill_master").unwrap();
        assert!((progress.progress - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn restore_rejects_unknown_ids() {
        let mut saved = BTreeMap::new();
        saved.insert("ghost".to_string(), AchievementProgress::default());
        let err = AchievementManager::restore(defs(), saved).unwrap_err();
        assert!(matches!(err, LoadError::UnknownId { kind: "achievement", .. }));
    }
}
