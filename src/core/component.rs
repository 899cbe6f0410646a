//! Component payloads stored on entities.
//!
//! The interpreter mutates simulation state only through these types:
//! health, stats with temporary modifiers, stacking statuses, transformation
//! records, item stacks and materials.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::position::Position;

/// Well-known component type strings.
pub mod names {
    pub const POSITION: &str = "position";
    pub const FACING: &str = "facing";
    pub const HEALTH: &str = "health";
    pub const FACTION: &str = "faction";
    pub const STATS: &str = "stats";
    pub const STATUSES: &str = "statuses";
    pub const TRANSFORMED: &str = "transformed";
    pub const ITEM: &str = "item";
    pub const MATERIAL: &str = "material";
}

/// A component value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Position(Position),
    Facing { degrees: f64 },
    Health(Health),
    Faction { name: String },
    Stats(StatBlock),
    Statuses(StatusSet),
    Transformed(Transformation),
    Item(ItemStack),
    Material { name: String },
    /// Presence-only component (e.g. "flying", "undead").
    Marker,
}

/// Current and maximum health.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f64,
    pub max: f64,
    /// Timed changes already folded into `max`, undone when they lapse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boosts: Vec<HealthBoost>,
}

/// A temporary change to maximum health.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthBoost {
    /// Change actually applied to `max` after flooring at zero.
    pub applied: f64,
    pub expires_at: u64,
}

impl Health {
    #[must_use]
    pub fn new(current: f64, max: f64) -> Self {
        Self {
            current,
            max,
            boosts: Vec::new(),
        }
    }

    /// Shift max health, flooring at zero and clamping current health.
    /// A timed change is remembered so `expire` can undo it.
    /// Returns the new max.
    pub fn adjust_max(&mut self, amount: f64, expires_at: Option<u64>) -> f64 {
        let before = self.max;
        self.max = (self.max + amount).max(0.0);
        self.current = self.current.min(self.max);
        if let Some(expires_at) = expires_at {
            self.boosts.push(HealthBoost {
                applied: self.max - before,
                expires_at,
            });
        }
        self.max
    }

    /// Overwrite max health, discarding outstanding timed changes.
    pub fn set_max(&mut self, value: f64) -> f64 {
        self.boosts.clear();
        self.max = value.max(0.0);
        self.current = self.current.min(self.max);
        self.max
    }

    /// Undo timed max-health changes whose expiry tick has been reached.
    /// Returns how many lapsed.
    pub fn expire(&mut self, tick: u64) -> usize {
        if self.boosts.iter().all(|b| b.expires_at > tick) {
            return 0;
        }
        let (lapsed, kept): (Vec<HealthBoost>, Vec<HealthBoost>) =
            std::mem::take(&mut self.boosts).into_iter().partition(|b| b.expires_at <= tick);
        let undo: f64 = lapsed.iter().map(|b| b.applied).sum();
        self.boosts = kept;
        self.max = (self.max - undo).max(0.0);
        self.current = self.current.min(self.max);
        lapsed.len()
    }

    /// Subtract damage, flooring at zero. Returns the new current value.
    pub fn damage(&mut self, amount: f64) -> f64 {
        self.current = (self.current - amount).max(0.0);
        self.current
    }

    /// Add healing, capped at max. Returns the new current value.
    pub fn heal(&mut self, amount: f64) -> f64 {
        self.current = (self.current + amount).min(self.max);
        self.current
    }
}

/// A stat modifier, permanent or expiring at a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: String,
    pub amount: f64,
    /// Tick at which the modifier lapses. `None` = permanent.
    pub expires_at: Option<u64>,
}

/// Base stat values plus stacked modifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    #[serde(default)]
    pub base: FxHashMap<String, f64>,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
}

impl StatBlock {
    /// Base value plus the sum of all modifiers for the stat.
    #[must_use]
    pub fn effective(&self, stat: &str) -> f64 {
        let base = self.base.get(stat).copied().unwrap_or(0.0);
        let bonus: f64 = self
            .modifiers
            .iter()
            .filter(|m| m.stat == stat)
            .map(|m| m.amount)
            .sum();
        base + bonus
    }

    /// Overwrite the base value and drop outstanding modifiers for the stat.
    pub fn set_base(&mut self, stat: impl Into<String>, value: f64) {
        let stat = stat.into();
        self.modifiers.retain(|m| m.stat != stat);
        self.base.insert(stat, value);
    }

    pub fn add_modifier(&mut self, stat: impl Into<String>, amount: f64, expires_at: Option<u64>) {
        self.modifiers.push(StatModifier {
            stat: stat.into(),
            amount,
            expires_at,
        });
    }

    /// Drop modifiers whose expiry tick has been reached. Returns how many lapsed.
    pub fn expire(&mut self, tick: u64) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.expires_at.map_or(true, |at| at > tick));
        before - self.modifiers.len()
    }
}

/// One active status on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInstance {
    pub stacks: u32,
    /// `None` = until removed.
    pub expires_at: Option<u64>,
}

/// Active statuses keyed by status identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSet {
    #[serde(default)]
    entries: FxHashMap<String, StatusInstance>,
}

impl StatusSet {
    /// Add stacks of a status, extending its expiry.
    ///
    /// A permanent application makes the status permanent; otherwise the
    /// later of the two expiry ticks wins.
    pub fn apply(&mut self, status: impl Into<String>, stacks: u32, expires_at: Option<u64>) -> u32 {
        let entry = self.entries.entry(status.into()).or_insert(StatusInstance {
            stacks: 0,
            expires_at,
        });
        entry.stacks = entry.stacks.saturating_add(stacks);
        entry.expires_at = match (entry.expires_at, expires_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        entry.stacks
    }

    /// Remove up to `stacks` stacks (`None` = all). Returns stacks removed.
    pub fn remove(&mut self, status: &str, stacks: Option<u32>) -> u32 {
        let Some(entry) = self.entries.get_mut(status) else {
            return 0;
        };
        let removed = match stacks {
            Some(n) => n.min(entry.stacks),
            None => entry.stacks,
        };
        entry.stacks -= removed;
        if entry.stacks == 0 {
            self.entries.remove(status);
        }
        removed
    }

    #[must_use]
    pub fn stacks(&self, status: &str) -> u32 {
        self.entries.get(status).map_or(0, |s| s.stacks)
    }

    #[must_use]
    pub fn get(&self, status: &str) -> Option<&StatusInstance> {
        self.entries.get(status)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop statuses whose expiry tick has been reached. Returns their names, sorted.
    pub fn expire(&mut self, tick: u64) -> Vec<String> {
        let mut expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, s)| s.expires_at.is_some_and(|at| at <= tick))
            .map(|(k, _)| k.clone())
            .collect();
        expired.sort();
        for name in &expired {
            self.entries.remove(name);
        }
        expired
    }
}

/// Record of a type transformation, used to revert it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub original_type: String,
    pub expires_at: Option<u64>,
}

/// An item entity's payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    pub count: u32,
}
