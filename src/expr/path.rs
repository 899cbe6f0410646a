//! Variable paths.
//!
//! A path such as `caster.position.x` is parsed once, when the expression is
//! built, into a root and a typed accessor. Evaluation then dispatches on the
//! accessor with an exhaustive match; no string is ever used to index into
//! anything at evaluation time except the sanitized stat/status names.
//!
//! ## Grammar
//!
//! ```text
//! path     := root ('.' segment)*        (at most 4 segments in total)
//! root     := 'caster' | 'target' | 'world' | 'tick'
//! segment  := [A-Za-z][A-Za-z0-9_]{0,63}, not a forbidden name
//! ```
//!
//! Entity roots accept: (bare), `id`, `health`, `maxHealth`, `position.x`,
//! `position.y`, `facing`, `faction`, `type`, `<stat>`, `stats.<stat>` and
//! `status.<status>`. The world root accepts `tick` and `entityCount`.

use smallvec::SmallVec;

use crate::core::KNOWN_STATS;
use crate::error::EffectError;
use crate::governor::{check_fragments, sanitize_identifier};

/// Most segments a path may have, root included.
pub const MAX_PATH_SEGMENTS: usize = 4;

/// Which entity an entity path reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityRoot {
    Caster,
    Target,
}

/// Field read from an entity.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityField {
    /// The entity reference itself.
    Ref,
    Id,
    Health,
    MaxHealth,
    PositionX,
    PositionY,
    Facing,
    Faction,
    Type,
    /// Effective stat value (base plus active modifiers).
    Stat(String),
    /// Stack count of a status.
    Status(String),
}

/// Field read from the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldField {
    Tick,
    EntityCount,
}

/// A resolved accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum PathAccess {
    Entity { root: EntityRoot, field: EntityField },
    World(WorldField),
}

/// A pre-validated variable path.
#[derive(Clone, Debug, PartialEq)]
pub struct VarPath {
    raw: String,
    access: PathAccess,
}

impl VarPath {
    /// Parse and validate a dotted path.
    pub fn parse(raw: &str) -> Result<Self, EffectError> {
        let invalid = |reason: String| EffectError::validation(format!("path '{raw}': {reason}"));

        check_fragments(raw).map_err(|r| invalid(r.to_string()))?;

        let segments: SmallVec<[&str; MAX_PATH_SEGMENTS]> = raw.split('.').collect();
        if segments.len() > MAX_PATH_SEGMENTS {
            return Err(invalid(format!("more than {MAX_PATH_SEGMENTS} segments")));
        }
        for segment in &segments {
            sanitize_identifier(segment).map_err(|r| invalid(r.to_string()))?;
        }

        let access = match segments.as_slice() {
            ["tick"] | ["world", "tick"] => PathAccess::World(WorldField::Tick),
            ["world", "entityCount"] => PathAccess::World(WorldField::EntityCount),
            ["world", ..] => return Err(invalid("unknown world field".to_string())),
            ["caster", rest @ ..] => PathAccess::Entity {
                root: EntityRoot::Caster,
                field: entity_field(rest).map_err(invalid)?,
            },
            ["target", rest @ ..] => PathAccess::Entity {
                root: EntityRoot::Target,
                field: entity_field(rest).map_err(invalid)?,
            },
            _ => return Err(invalid("unknown root".to_string())),
        };

        Ok(Self {
            raw: raw.to_string(),
            access,
        })
    }

    /// The resolved accessor.
    #[must_use]
    pub fn access(&self) -> &PathAccess {
        &self.access
    }

    /// The path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn entity_field(rest: &[&str]) -> Result<EntityField, String> {
    let field = match rest {
        [] => EntityField::Ref,
        ["id"] => EntityField::Id,
        ["health"] => EntityField::Health,
        ["maxHealth"] => EntityField::MaxHealth,
        ["position", "x"] => EntityField::PositionX,
        ["position", "y"] => EntityField::PositionY,
        ["facing"] => EntityField::Facing,
        ["faction"] => EntityField::Faction,
        ["type"] => EntityField::Type,
        ["status", status] => EntityField::Status((*status).to_string()),
        ["stats", stat] | [stat] => {
            if !KNOWN_STATS.contains(stat) {
                return Err(format!("'{stat}' is not a known stat"));
            }
            match *stat {
                "health" => EntityField::Health,
                "maxHealth" => EntityField::MaxHealth,
                _ => EntityField::Stat((*stat).to_string()),
            }
        }
        _ => return Err("unknown entity field".to_string()),
    };
    Ok(field)
}

impl TryFrom<String> for VarPath {
    type Error = EffectError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<VarPath> for String {
    fn from(path: VarPath) -> Self {
        path.raw
    }
}

impl serde::Serialize for VarPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for VarPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for VarPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(raw: &str) -> EntityField {
        match VarPath::parse(raw).unwrap().access {
            PathAccess::Entity { field, .. } => field,
            other => panic!("expected entity path, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_paths() {
        assert_eq!(field("caster"), EntityField::Ref);
        assert_eq!(field("caster.health"), EntityField::Health);
        assert_eq!(field("target.position.x"), EntityField::PositionX);
        assert_eq!(field("caster.strength"), EntityField::Stat("strength".into()));
        assert_eq!(field("caster.stats.mana"), EntityField::Stat("mana".into()));
        assert_eq!(field("caster.stats.maxHealth"), EntityField::MaxHealth);
        assert_eq!(field("target.status.burning"), EntityField::Status("burning".into()));
    }

    #[test]
    fn test_world_paths() {
        assert_eq!(
            VarPath::parse("tick").unwrap().access,
            PathAccess::World(WorldField::Tick)
        );
        assert_eq!(
            VarPath::parse("world.entityCount").unwrap().access,
            PathAccess::World(WorldField::EntityCount)
        );
    }

    #[test]
    fn test_rejects_reflective_segments() {
        for bad in [
            "caster.__proto__",
            "caster.constructor",
            "target.prototype.health",
            "caster..health",
            "caster.health()",
            "caster[0]",
            "world.process",
            "this.health",
        ] {
            assert!(
                matches!(VarPath::parse(bad), Err(EffectError::Validation(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(VarPath::parse("caster.charisma").is_err());
        assert!(VarPath::parse("enemy.health").is_err());
        assert!(VarPath::parse("world.time").is_err());
        assert!(VarPath::parse("caster.position.z").is_err());
        assert!(VarPath::parse("caster.stats.mana.max.x").is_err());
    }

    #[test]
    fn test_display_round_trips_raw_text() {
        let path = VarPath::parse("caster.position.y").unwrap();
        assert_eq!(path.to_string(), "caster.position.y");
        assert_eq!(String::from(path), "caster.position.y");
    }
}
