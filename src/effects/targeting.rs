//! Effect targeting.
//!
//! Turns a [`TargetSelector`] into an ordered list of entity ids:
//! - `TargetShape`: which region or role is selected
//! - `TargetFilter`: ANDed checks on each candidate
//! - `TargetResolver`: shape, then filter, then exclusions, then `maxTargets`
//!
//! ## Anchoring
//!
//! Shapes are measured from an *origin* entity: the caster for a top-level
//! effect, the current target for `chain_effect`. `excludeSelf` drops the
//! caster and the origin, so a chained area never bounces back onto the
//! caster or stays on the entity it jumped from.
//!
//! ## Ordering
//!
//! `all` follows world iteration order (ascending id in `SimWorld`).
//! `area`, `cone` and `line` sort by distance from the origin with a stable
//! sort, so equidistant entities keep world iteration order. `maxTargets`
//! keeps the first N.
//!
//! ## Edges
//!
//! All shape boundaries are inclusive. `area` includes the origin itself.
//! `cone` and `line` never include the origin, but do include other entities
//! standing on it. Angle and width comparisons allow `EDGE_TOLERANCE` of slack.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::{EffectRng, Entity, EntityId, Position, World};
use crate::error::EffectError;
use crate::expr::{EvalContext, Expression, ExpressionEvaluator};

/// Slack for floating-point edge comparisons in cones and lines.
pub const EDGE_TOLERANCE: f64 = 1e-9;

/// Which entities a selector covers before filtering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TargetShape {
    /// The origin.
    #[serde(rename = "self")]
    Caster,

    /// The designated target, if any.
    Single,

    /// Everything within `radius` of the origin.
    Area { radius: f64 },

    /// Everything within `length` of the origin and within `angle / 2`
    /// degrees of its facing.
    Cone { angle: f64, length: f64 },

    /// A rectangle of `length` by `width` along the origin's facing.
    Line {
        length: f64,
        #[serde(default)]
        width: Option<f64>,
    },

    /// Every entity in the world.
    All,
}

/// Checks every candidate must pass. Empty lists are not checked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetFilter {
    pub entity_types: Vec<String>,
    pub factions: Vec<String>,
    pub has_components: Vec<String>,
    /// Evaluated with the candidate bound as `target`.
    pub custom_predicate: Option<Expression>,
}

impl TargetFilter {
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_types.push(entity_type.into());
        self
    }

    #[must_use]
    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.factions.push(faction.into());
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.has_components.push(component.into());
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Expression) -> Self {
        self.custom_predicate = Some(predicate);
        self
    }

    /// The static checks (everything except the predicate).
    fn admits(&self, entity: &Entity) -> bool {
        (self.entity_types.is_empty() || self.entity_types.iter().any(|t| *t == entity.entity_type))
            && (self.factions.is_empty()
                || entity.faction().is_some_and(|f| self.factions.iter().any(|x| x == f)))
            && self.has_components.iter().all(|c| entity.has_component(c))
    }
}

/// A complete target selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSelector {
    #[serde(flatten)]
    pub shape: TargetShape,

    #[serde(default)]
    pub filter: Option<TargetFilter>,

    #[serde(default, alias = "count")]
    pub max_targets: Option<u32>,

    #[serde(default)]
    pub exclude_self: bool,

    #[serde(default)]
    pub exclude_previous: bool,
}

impl TargetSelector {
    #[must_use]
    pub fn new(shape: TargetShape) -> Self {
        Self {
            shape,
            filter: None,
            max_targets: None,
            exclude_self: false,
            exclude_previous: false,
        }
    }

    /// `self`: the origin.
    #[must_use]
    pub fn caster() -> Self {
        Self::new(TargetShape::Caster)
    }

    #[must_use]
    pub fn single() -> Self {
        Self::new(TargetShape::Single)
    }

    #[must_use]
    pub fn area(radius: f64) -> Self {
        Self::new(TargetShape::Area { radius })
    }

    #[must_use]
    pub fn cone(angle: f64, length: f64) -> Self {
        Self::new(TargetShape::Cone { angle, length })
    }

    #[must_use]
    pub fn line(length: f64) -> Self {
        Self::new(TargetShape::Line { length, width: None })
    }

    #[must_use]
    pub fn all() -> Self {
        Self::new(TargetShape::All)
    }

    // === Builders ===

    #[must_use]
    pub fn with_filter(mut self, filter: TargetFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_max_targets(mut self, n: u32) -> Self {
        self.max_targets = Some(n);
        self
    }

    #[must_use]
    pub fn excluding_self(mut self) -> Self {
        self.exclude_self = true;
        self
    }

    #[must_use]
    pub fn excluding_previous(mut self) -> Self {
        self.exclude_previous = true;
        self
    }

    /// Reject negative or non-finite shape parameters.
    pub fn check_shape(&self) -> Result<(), EffectError> {
        let check = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(EffectError::validation(format!(
                    "target {name} must be a non-negative finite number, got {v}"
                )))
            }
        };
        match self.shape {
            TargetShape::Area { radius } => check("radius", radius),
            TargetShape::Cone { angle, length } => {
                check("angle", angle)?;
                check("length", length)
            }
            TargetShape::Line { length, width } => {
                check("length", length)?;
                width.map_or(Ok(()), |w| check("width", w))
            }
            TargetShape::Caster | TargetShape::Single | TargetShape::All => Ok(()),
        }
    }
}

/// Who a resolution is anchored on and what it must skip.
#[derive(Clone, Copy, Debug)]
pub struct TargetScope<'s> {
    /// Bound as `caster` in predicates.
    pub caster: EntityId,
    /// Shape anchor. `excludeSelf` drops it along with the caster.
    pub origin: EntityId,
    /// The `single` target.
    pub designated: Option<EntityId>,
    /// Ids `excludePrevious` drops.
    pub excluded: &'s FxHashSet<EntityId>,
}

/// Resolves selectors against the world.
pub struct TargetResolver;

impl TargetResolver {
    /// Resolve a selector to an ordered list of entity ids.
    ///
    /// An empty result is a valid resolution, not an error.
    pub fn resolve(
        selector: &TargetSelector,
        world: &dyn World,
        scope: &TargetScope<'_>,
        line_width: f64,
        rng: &mut EffectRng,
    ) -> Result<Vec<EntityId>, EffectError> {
        selector.check_shape()?;

        let candidates = Self::shape_candidates(&selector.shape, world, scope, line_width);

        let mut targets = Vec::with_capacity(candidates.len());
        for id in candidates {
            let Some(entity) = world.entity(id) else {
                continue;
            };
            if let Some(filter) = &selector.filter {
                if !filter.admits(entity) {
                    continue;
                }
                if let Some(predicate) = &filter.custom_predicate {
                    let mut ctx = EvalContext::new(world, scope.caster, rng).with_target(Some(id));
                    if !ExpressionEvaluator::evaluate_bool(predicate, &mut ctx)? {
                        continue;
                    }
                }
            }
            if selector.exclude_self && (id == scope.caster || id == scope.origin) {
                continue;
            }
            if selector.exclude_previous && scope.excluded.contains(&id) {
                continue;
            }
            targets.push(id);
        }

        if let Some(max) = selector.max_targets {
            targets.truncate(max as usize);
        }
        Ok(targets)
    }

    fn shape_candidates(
        shape: &TargetShape,
        world: &dyn World,
        scope: &TargetScope<'_>,
        line_width: f64,
    ) -> Vec<EntityId> {
        let origin = scope.origin;
        match *shape {
            TargetShape::Caster => vec![origin],
            TargetShape::Single => scope.designated.into_iter().collect(),
            TargetShape::All => world.entity_ids(),
            TargetShape::Area { radius } => {
                Self::by_distance(world, origin, true, |_, distance| distance <= radius)
            }
            TargetShape::Cone { angle, length } => {
                let facing = Self::facing(world, origin);
                let half = angle / 2.0;
                Self::by_distance(world, origin, false, |offset, distance| {
                    if distance > length {
                        return false;
                    }
                    if distance == 0.0 {
                        return true;
                    }
                    let cos = (offset.dot(facing) / distance).clamp(-1.0, 1.0);
                    cos.acos().to_degrees() <= half + EDGE_TOLERANCE
                })
            }
            TargetShape::Line { length, width } => {
                let facing = Self::facing(world, origin);
                let half_width = width.unwrap_or(line_width) / 2.0;
                Self::by_distance(world, origin, false, |offset, _| {
                    let along = offset.dot(facing);
                    let across = (offset.x * facing.y - offset.y * facing.x).abs();
                    along >= -EDGE_TOLERANCE
                        && along <= length + EDGE_TOLERANCE
                        && across <= half_width + EDGE_TOLERANCE
                })
            }
        }
    }

    fn facing(world: &dyn World, origin: EntityId) -> Position {
        Position::from_degrees(world.entity(origin).map_or(0.0, Entity::facing))
    }

    /// Positioned entities passing `inside`, sorted by distance from the
    /// origin. An origin without a position selects nothing.
    fn by_distance(
        world: &dyn World,
        origin: EntityId,
        include_origin: bool,
        inside: impl Fn(Position, f64) -> bool,
    ) -> Vec<EntityId> {
        let Some(center) = world.entity(origin).and_then(Entity::position) else {
            return Vec::new();
        };

        let mut hits: Vec<(f64, EntityId)> = world
            .entity_ids()
            .into_iter()
            .filter(|id| include_origin || *id != origin)
            .filter_map(|id| {
                let pos = world.entity(id)?.position()?;
                let offset = pos - center;
                let distance = offset.length();
                inside(offset, distance).then_some((distance, id))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, id)| id).collect()
    }
}
