//! Class tree: a DAG of unlockable class nodes and the manager tracking progress.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::achievement::AchievementManager;
use crate::constants::{CLASS_CACHE_WINDOW_MS, achievement_ids};
use crate::definitions::DefinitionError;
use crate::element::Element;
use crate::predicate::{Predicate, PredicateContext};
use crate::resource::{ResourceId, ResourceManager};
use crate::save::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassEffectKind {
    SkillUnlock,
    SkillMax,
    TalentBonus,
    ManaCapacity,
    ManaRegen,
    SpellPower,
    Custom,
}

impl ClassEffectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SkillUnlock => "skill_unlock",
            Self::SkillMax => "skill_max",
            Self::TalentBonus => "talent_bonus",
            Self::ManaCapacity => "mana_capacity",
            Self::ManaRegen => "mana_regen",
            Self::SpellPower => "spell_power",
            Self::Custom => "custom",
        }
    }

    /// Kinds whose missing target falls back to the node's element.
    const fn is_elemental(self) -> bool {
        matches!(
            self,
            Self::TalentBonus | Self::ManaCapacity | Self::ManaRegen | Self::SpellPower
        )
    }
}

impl fmt::Display for ClassEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEffect {
    #[serde(rename = "type")]
    pub kind: ClassEffectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ClassCosts {
    #[serde(default)]
    pub gold: f64,
    #[serde(default)]
    pub research: f64,
    /// Threshold on lifetime experience; never deducted.
    #[serde(default)]
    pub experience: f64,
}

impl ClassCosts {
    fn deductions(self) -> Vec<(ResourceId, f64)> {
        [(ResourceId::Gold, self.gold), (ResourceId::Research, self.research)]
            .into_iter()
            .filter(|(_, amount)| *amount > 0.0)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Element>,
    #[serde(default)]
    pub requirements: Vec<Predicate>,
    #[serde(default)]
    pub costs: ClassCosts,
    #[serde(default)]
    pub effects: Vec<ClassEffect>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

impl ClassNode {
    #[must_use]
    pub fn requirements_met<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        self.requirements.iter().all(|r| r.evaluate(ctx))
    }

    #[must_use]
    pub fn prerequisites_met(&self, unlocked: &[String]) -> bool {
        self.prerequisites.iter().all(|p| unlocked.contains(p))
    }

    /// Secret nodes are hidden until every prerequisite is unlocked.
    #[must_use]
    pub fn is_revealed(&self, unlocked: &[String]) -> bool {
        !self.secret || self.prerequisites_met(unlocked)
    }

    /// Effective target of an effect, defaulting elemental kinds to the node element.
    #[must_use]
    pub fn effect_target<'a>(&'a self, effect: &'a ClassEffect) -> Option<&'a str> {
        effect.target.as_deref().or_else(|| {
            if effect.kind.is_elemental() {
                self.element.map(Element::as_str)
            } else {
                None
            }
        })
    }
}

/// Read-only class graph built from definitions.
#[derive(Debug, Clone, Default)]
pub struct ClassTree {
    nodes: BTreeMap<String, ClassNode>,
    children: BTreeMap<String, Vec<String>>,
}

impl ClassTree {
    /// Build and validate the graph.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] for duplicate ids, unknown prerequisites or cycles.
    pub fn from_nodes(nodes: Vec<ClassNode>) -> Result<Self, DefinitionError> {
        let mut tree = Self::default();
        for node in nodes {
            if tree.nodes.contains_key(&node.id) {
                return Err(DefinitionError::DuplicateId {
                    kind: "class",
                    id: node.id,
                });
            }
            tree.children.insert(node.id.clone(), Vec::new());
            tree.nodes.insert(node.id.clone(), node);
        }
        for node in tree.nodes.values() {
            for prereq in &node.prerequisites {
                let Some(children) = tree.children.get_mut(prereq) else {
                    return Err(DefinitionError::DanglingReference {
                        kind: "class",
                        id: node.id.clone(),
                        target_kind: "class",
                        target: prereq.clone(),
                    });
                };
                children.push(node.id.clone());
            }
        }
        tree.check_acyclic()?;
        Ok(tree)
    }

    fn check_acyclic(&self) -> Result<(), DefinitionError> {
        let mut indegree: BTreeMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.id.as_str(), n.prerequisites.len()))
            .collect();
        let mut ready: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0;
        while let Some(id) = ready.pop_front() {
            visited += 1;
            for child in self.children.get(id).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(child.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(child);
                    }
                }
            }
        }
        if visited == self.nodes.len() {
            return Ok(());
        }
        let stuck = indegree
            .into_iter()
            .find(|(_, d)| *d > 0)
            .map_or_else(String::new, |(id, _)| id.to_string());
        Err(DefinitionError::Cycle(stuck))
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ClassNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ClassNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that list `id` as a prerequisite.
    #[must_use]
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes grouped by tier.
    #[must_use]
    pub fn tree_structure(&self) -> BTreeMap<u32, Vec<&ClassNode>> {
        let mut tiers: BTreeMap<u32, Vec<&ClassNode>> = BTreeMap::new();
        for node in self.nodes.values() {
            tiers.entry(node.tier).or_default().push(node);
        }
        tiers
    }

    /// Shortest prerequisite chain from a root to `target`, root first.
    #[must_use]
    pub fn path_to(&self, target: &str) -> Vec<&ClassNode> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(&str, Vec<&ClassNode>)> = VecDeque::new();
        queue.push_back((target, Vec::new()));
        while let Some((id, path)) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let mut path = path;
            path.push(node);
            if node.prerequisites.is_empty() {
                path.reverse();
                return path;
            }
            for prereq in &node.prerequisites {
                queue.push_back((prereq.as_str(), path.clone()));
            }
        }
        Vec::new()
    }
}

/// Funds checked when listing or unlocking classes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassBudget {
    pub gold: f64,
    pub research: f64,
    pub lifetime_experience: f64,
}

impl ClassBudget {
    #[must_use]
    pub fn from_ledger(resources: &ResourceManager, lifetime_experience: f64) -> Self {
        Self {
            gold: resources.value(ResourceId::Gold),
            research: resources.value(ResourceId::Research),
            lifetime_experience,
        }
    }

    #[must_use]
    pub fn covers(&self, costs: &ClassCosts) -> bool {
        self.gold >= costs.gold
            && self.research >= costs.research
            && self.lifetime_experience >= costs.experience
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassSnapshot {
    pub unlocked_classes: Vec<String>,
}

#[derive(Debug, Clone)]
struct AvailabilityCache {
    computed_at_ms: u64,
    ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClassManager {
    tree: Arc<ClassTree>,
    unlocked: Vec<String>,
    cache: Option<AvailabilityCache>,
}

impl ClassManager {
    #[must_use]
    pub const fn new(tree: Arc<ClassTree>) -> Self {
        Self {
            tree,
            unlocked: Vec::new(),
            cache: None,
        }
    }

    /// Rebind a saved unlocked set.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] when a saved class is not in the tree.
    pub fn restore(tree: Arc<ClassTree>, snapshot: ClassSnapshot) -> Result<Self, LoadError> {
        let mut manager = Self::new(tree);
        for id in snapshot.unlocked_classes {
            if manager.tree.node(&id).is_none() {
                return Err(LoadError::UnknownId { kind: "class", id });
            }
            if !manager.unlocked.contains(&id) {
                manager.unlocked.push(id);
            }
        }
        Ok(manager)
    }

    #[must_use]
    pub fn tree(&self) -> &ClassTree {
        &self.tree
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.iter().any(|u| u == id)
    }

    /// Unlocked ids in unlock order.
    #[must_use]
    pub fn unlocked_ids(&self) -> &[String] {
        &self.unlocked
    }

    #[must_use]
    pub fn unlocked_classes(&self) -> Vec<&ClassNode> {
        self.unlocked
            .iter()
            .filter_map(|id| self.tree.node(id))
            .collect()
    }

    /// The class tree by tier with unrevealed secret nodes left out.
    #[must_use]
    pub fn visible_tree(&self) -> BTreeMap<u32, Vec<&ClassNode>> {
        let mut tiers = self.tree.tree_structure();
        for nodes in tiers.values_mut() {
            nodes.retain(|node| node.is_revealed(&self.unlocked));
        }
        tiers.retain(|_, nodes| !nodes.is_empty());
        tiers
    }

    fn is_candidate<C: PredicateContext + ?Sized>(&self, node: &ClassNode, ctx: &C) -> bool {
        !self.is_unlocked(&node.id)
            && node.is_revealed(&self.unlocked)
            && node.prerequisites_met(&self.unlocked)
            && node.requirements_met(ctx)
    }

    /// Classes that could be unlocked right now, sorted by tier.
    ///
    /// Results are reused for [`CLASS_CACHE_WINDOW_MS`] unless a class is unlocked meanwhile.
    pub fn available_classes<C: PredicateContext + ?Sized>(
        &mut self,
        ctx: &C,
        budget: ClassBudget,
        now_ms: u64,
    ) -> Vec<&ClassNode> {
        let fresh = self.cache.as_ref().is_some_and(|cache| {
            now_ms >= cache.computed_at_ms
                && now_ms - cache.computed_at_ms < CLASS_CACHE_WINDOW_MS
        });
        if !fresh {
            let mut nodes: Vec<&ClassNode> = self
                .tree
                .nodes()
                .filter(|node| self.is_candidate(node, ctx) && budget.covers(&node.costs))
                .collect();
            nodes.sort_by_key(|node| node.tier);
            let ids = nodes.into_iter().map(|n| n.id.clone()).collect();
            self.cache = Some(AvailabilityCache {
                computed_at_ms: now_ms,
                ids,
            });
        }
        self.cache
            .as_ref()
            .map(|cache| cache.ids.iter().filter_map(|id| self.tree.node(id)).collect())
            .unwrap_or_default()
    }

    /// Fresh check of prerequisites, requirements and affordability.
    #[must_use]
    pub fn can_unlock_class<C: PredicateContext + ?Sized>(
        &self,
        id: &str,
        ctx: &C,
        budget: ClassBudget,
    ) -> bool {
        let Some(node) = self.tree.node(id) else {
            return false;
        };
        if self.is_unlocked(id) {
            return true;
        }
        self.is_candidate(node, ctx) && budget.covers(&node.costs)
    }

    /// Revalidate and unlock, deducting gold and research. Already unlocked is `true`.
    pub fn unlock_class<C: PredicateContext + ?Sized>(
        &mut self,
        id: &str,
        ctx: &C,
        resources: &mut ResourceManager,
        lifetime_experience: f64,
        achievements: &mut AchievementManager,
    ) -> bool {
        let tree = Arc::clone(&self.tree);
        let Some(node) = tree.node(id) else {
            log::warn!("unknown class `{id}`");
            return false;
        };
        if self.is_unlocked(id) {
            return true;
        }
        if !self.is_candidate(node, ctx) {
            log::warn!("requirements not met for class `{id}`");
            return false;
        }
        if lifetime_experience < node.costs.experience {
            log::warn!("not enough experience for class `{id}`");
            return false;
        }
        if !resources.consume_all(&node.costs.deductions()) {
            log::warn!("cannot afford class `{id}`");
            return false;
        }
        self.unlocked.push(id.to_string());
        self.cache = None;
        log::info!("class unlocked: {} (tier {})", node.name, node.tier);
        achievements.increment(achievement_ids::FIRST_CLASS, 1.0);
        true
    }

    /// Every effect of every unlocked node with its effective target.
    pub fn effects(&self) -> impl Iterator<Item = (ClassEffectKind, Option<&str>, f64)> {
        self.unlocked_classes().into_iter().flat_map(|node| {
            node.effects
                .iter()
                .map(move |effect| (effect.kind, node.effect_target(effect), effect.value))
        })
    }

    /// Sum of `kind` effects whose effective target equals `target`.
    #[must_use]
    pub fn total(&self, kind: ClassEffectKind, target: Option<&str>) -> f64 {
        self.effects()
            .filter(|(k, t, _)| *k == kind && *t == target)
            .map(|(_, _, v)| v)
            .sum()
    }

    /// Bonus for one element: effects aimed at it plus untargeted ones.
    #[must_use]
    pub fn elemental_total(&self, kind: ClassEffectKind, element: Element) -> f64 {
        let untargeted = self.total(kind, None);
        if element.is_magical() {
            untargeted + self.total(kind, Some(element.as_str()))
        } else {
            untargeted
        }
    }

    #[must_use]
    pub fn custom_bonus(&self, name: &str) -> f64 {
        self.total(ClassEffectKind::Custom, Some(name))
    }

    #[must_use]
    pub fn skill_max_bonuses(&self) -> BTreeMap<String, u32> {
        let mut bonuses = BTreeMap::new();
        for (kind, target, value) in self.effects() {
            if kind == ClassEffectKind::SkillMax
                && let Some(target) = target
            {
                *bonuses.entry(target.to_string()).or_insert(0) +=
                    crate::numbers::floor_f64_to_u32(value);
            }
        }
        bonuses
    }

    /// Skill ids granted by unlocked classes, deduplicated in unlock order.
    #[must_use]
    pub fn granted_skills(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.effects()
            .filter(|(kind, _, _)| *kind == ClassEffectKind::SkillUnlock)
            .filter_map(|(_, target, _)| target)
            .filter(|target| seen.insert(*target))
            .map(str::to_string)
            .collect()
    }

    /// Talent bonuses carried by one node, applied once when it unlocks.
    #[must_use]
    pub fn talent_bonuses(&self, id: &str) -> Vec<(Element, f64)> {
        let Some(node) = self.tree.node(id) else {
            return Vec::new();
        };
        node.effects
            .iter()
            .filter(|e| e.kind == ClassEffectKind::TalentBonus)
            .filter_map(|e| {
                let element = node.effect_target(e)?.parse::<Element>().ok()?;
                Some((element, e.value))
            })
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> ClassSnapshot {
        ClassSnapshot {
            unlocked_classes: self.unlocked.clone(),
        }
    }
}
