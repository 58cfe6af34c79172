//! Timed activities: one running slot plus a FIFO queue.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use crate::events::{EventBus, SubscriptionId};
use crate::explore::ExploreEvent;
use crate::numbers::u64_to_f64;
use crate::resource::{ResourceId, ResourceManager};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReward {
    /// Ledger id, `experience`, or `skill_exp`.
    pub resource: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_range: Option<(u64, u64)>,
}

impl ActivityReward {
    #[must_use]
    pub fn fixed(resource: &str, amount: f64) -> Self {
        Self {
            resource: resource.to_string(),
            amount,
            random_range: None,
        }
    }

    /// Amount credited on completion; a random range replaces the fixed amount.
    pub fn roll(&self, rng: &mut impl Rng) -> f64 {
        match self.random_range {
            Some((a, b)) => {
                let (min, max) = if a <= b { (a, b) } else { (b, a) };
                u64_to_f64(rng.gen_range(min..=max))
            }
            None => self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCost {
    pub resource: ResourceId,
    pub amount: f64,
}

/// Typed payload routed to progression on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActivityKind {
    Learning { spell_id: String },
    Practice { skill_id: String },
    Training { skill_id: String },
    Exploration {
        locale_id: String,
        events: Vec<ExploreEvent>,
    },
}

impl ActivityKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Learning { .. } => "learning",
            Self::Practice { .. } => "practice",
            Self::Training { .. } => "training",
            Self::Exploration { .. } => "exploration",
        }
    }

    /// Kinds that credit skill experience themselves.
    #[must_use]
    pub const fn grants_skill_exp(&self) -> bool {
        matches!(self, Self::Practice { .. } | Self::Training { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Seconds.
    pub duration: f64,
    #[serde(default)]
    pub rewards: Vec<ActivityReward>,
    #[serde(default)]
    pub costs: Vec<ActivityCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActivityKind>,
}

impl ActivityData {
    #[must_use]
    pub fn cost_list(&self) -> Vec<(ResourceId, f64)> {
        self.costs.iter().map(|c| (c.resource, c.amount)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInstance {
    pub id: u64,
    pub activity: ActivityData,
    /// Milliseconds on the game clock.
    pub start_time: u64,
    pub progress: f64,
    pub is_completed: bool,
}

impl ActivityInstance {
    fn measure(&mut self, now_ms: u64) {
        let elapsed = u64_to_f64(now_ms.saturating_sub(self.start_time)) / 1000.0;
        self.progress = if self.activity.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.activity.duration).min(1.0)
        };
    }

    #[must_use]
    pub fn remaining_seconds(&self, now_ms: u64) -> f64 {
        let elapsed = u64_to_f64(now_ms.saturating_sub(self.start_time)) / 1000.0;
        (self.activity.duration - elapsed).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRunnerSnapshot {
    pub current_activity: Option<ActivityInstance>,
    #[serde(default)]
    pub queue: Vec<ActivityInstance>,
}

#[derive(Debug, Default)]
pub struct ActivityRunner {
    current: Option<ActivityInstance>,
    queue: VecDeque<ActivityInstance>,
    next_id: u64,
    bus: EventBus<ActivityInstance>,
}

impl ActivityRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn restore(snapshot: ActivityRunnerSnapshot) -> Self {
        let next_id = snapshot
            .current_activity
            .iter()
            .chain(&snapshot.queue)
            .map(|i| i.id + 1)
            .max()
            .unwrap_or(0);
        Self {
            current: snapshot.current_activity,
            queue: snapshot.queue.into(),
            next_id,
            bus: EventBus::new(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ActivityRunnerSnapshot {
        ActivityRunnerSnapshot {
            current_activity: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
        }
    }

    /// Deduct the costs and occupy the slot or join the queue.
    ///
    /// Returns the instance id, or `None` (with nothing deducted) when unaffordable.
    pub fn start_activity(
        &mut self,
        activity: ActivityData,
        resources: &mut ResourceManager,
        now_ms: u64,
    ) -> Option<u64> {
        if !resources.consume_all(&activity.cost_list()) {
            log::warn!("cannot afford activity `{}`", activity.id);
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        let instance = ActivityInstance {
            id,
            activity,
            start_time: now_ms,
            progress: 0.0,
            is_completed: false,
        };
        if self.current.is_none() {
            log::debug!("activity `{}` started", instance.activity.id);
            self.current = Some(instance);
        } else {
            log::debug!("activity `{}` queued", instance.activity.id);
            self.queue.push_back(instance);
        }
        Some(id)
    }

    fn promote(&mut self, now_ms: u64) {
        if let Some(mut next) = self.queue.pop_front() {
            next.start_time = now_ms;
            next.progress = 0.0;
            self.current = Some(next);
        }
    }

    /// Measure progress and complete the current instance at most once.
    pub fn update(&mut self, now_ms: u64) -> Option<ActivityInstance> {
        if self.current.is_none() {
            self.promote(now_ms);
        }
        let current = self.current.as_mut()?;
        current.measure(now_ms);
        if current.progress < 1.0 || current.is_completed {
            return None;
        }
        current.is_completed = true;
        let finished = self.current.take()?;
        log::info!("activity `{}` completed", finished.activity.name);
        self.bus.publish(&finished);
        self.promote(now_ms);
        Some(finished)
    }

    /// Drop the running instance. Costs are not refunded.
    pub fn cancel_current(&mut self) -> Option<ActivityInstance> {
        self.current.take()
    }

    /// Drop every queued instance. Costs are not refunded.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    #[must_use]
    pub const fn current(&self) -> Option<&ActivityInstance> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn queue(&self) -> &VecDeque<ActivityInstance> {
        &self.queue
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.current.as_ref().map_or(0.0, |c| c.progress)
    }

    #[must_use]
    pub fn remaining_time(&self, now_ms: u64) -> f64 {
        self.current
            .as_ref()
            .map_or(0.0, |c| c.remaining_seconds(now_ms))
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<ActivityInstance>) {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn activity(id: &str, duration: f64, gold_cost: f64) -> ActivityData {
        ActivityData {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            duration,
            rewards: vec![ActivityReward::fixed("gold", 5.0)],
            costs: if gold_cost > 0.0 {
                vec![ActivityCost {
                    resource: ResourceId::Gold,
                    amount: gold_cost,
                }]
            } else {
                Vec::new()
            },
            category: None,
            kind: None,
        }
    }

    #[test]
    fn queued_activity_measures_from_its_own_start() {
        let mut ledger = ResourceManager::create_default();
        let mut runner = ActivityRunner::new();
        let (_, rx) = runner.subscribe();
        assert_eq!(runner.start_activity(activity("a", 10.0, 0.0), &mut ledger, 0), Some(0));
        assert_eq!(runner.start_activity(activity("b", 10.0, 0.0), &mut ledger, 0), Some(1));
        assert_eq!(runner.current().map(|c| c.activity.id.as_str()), Some("a"));
        assert_eq!(runner.queue().len(), 1);

        assert!(runner.update(5_000).is_none());
        assert!((runner.progress() - 0.5).abs() < 1e-9);
        let done = runner.update(10_000).unwrap();
        assert_eq!(done.activity.id, "a");
        assert!(done.is_completed);
        assert_eq!(rx.try_recv().unwrap().id, 0);

        let current = runner.current().unwrap();
        assert_eq!(current.activity.id, "b");
        assert_eq!(current.start_time, 10_000);
        assert!(runner.update(12_000).is_none());
        assert!((runner.progress() - 0.2).abs() < 1e-9);
        assert!(runner.queue().is_empty());
    }

    #[test]
    fn unaffordable_start_changes_nothing() {
        let mut ledger = ResourceManager::create_default();
        let mut runner = ActivityRunner::new();
        let before = ledger.clone();
        assert!(runner.start_activity(activity("pricey", 1.0, 1_000.0), &mut ledger, 0).is_none());
        assert_eq!(ledger, before);
        assert!(runner.is_idle());
        assert!(runner.start_activity(activity("cheap", 1.0, 40.0), &mut ledger, 0).is_some());
        assert!((ledger.value(ResourceId::Gold) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn completion_fires_once_and_cancel_forfeits() {
        let mut ledger = ResourceManager::create_default();
        let mut runner = ActivityRunner::new();
        runner.start_activity(activity("a", 0.0, 0.0), &mut ledger, 0);
        assert!(runner.update(0).is_some());
        assert!(runner.update(1).is_none());

        runner.start_activity(activity("b", 5.0, 10.0), &mut ledger, 0);
        runner.start_activity(activity("c", 5.0, 10.0), &mut ledger, 0);
        assert!(runner.cancel_current().is_some());
        assert_eq!(runner.clear_queue(), 1);
        assert!(runner.is_idle());
        assert!((ledger.value(ResourceId::Gold) - 80.0).abs() < 1e-9);
        assert!((runner.remaining_time(100) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn random_range_rewards_stay_in_bounds() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let reward = ActivityReward {
            resource: "gold".into(),
            amount: 0.0,
            random_range: Some((8, 3)),
        };
        for _ in 0..50 {
            let value = reward.roll(&mut rng);
            assert!((3.0..=8.0).contains(&value));
        }
    }

    #[test]
    fn snapshot_uses_camel_case_and_restores_ids() {
        let mut ledger = ResourceManager::create_default();
        let mut runner = ActivityRunner::new();
        let mut data = activity("a", 10.0, 0.0);
        data.kind = Some(ActivityKind::Practice {
            skill_id: "fire_affinity".into(),
        });
        runner.start_activity(data, &mut ledger, 0);
        runner.start_activity(activity("b", 10.0, 0.0), &mut ledger, 0);
        let json = serde_json::to_value(runner.snapshot()).unwrap();
        assert!(json.get("currentActivity").is_some());
        assert_eq!(json["currentActivity"]["activity"]["kind"]["type"], "practice");
        assert_eq!(json["currentActivity"]["activity"]["kind"]["skillId"], "fire_affinity");
        let restored = ActivityRunner::restore(serde_json::from_value(json).unwrap());
        assert_eq!(restored.snapshot(), runner.snapshot());
        let mut restored = restored;
        assert_eq!(restored.start_activity(activity("c", 1.0, 0.0), &mut ledger, 0), Some(2));
    }
}
