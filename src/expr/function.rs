//! Whitelisted expression functions.

use crate::error::EffectError;
use crate::governor::sanitize_identifier;

/// A function callable from expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    // === Random ===
    RandomInt,
    Random,

    // === Math ===
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
    Clamp,

    // === Entity Queries ===
    Distance,
    HasStatus,
    HasComponent,
    Stacks,
}

impl Function {
    /// Look up a function by name.
    ///
    /// The name is sanitized before the whitelist is consulted.
    pub fn from_name(name: &str) -> Result<Self, EffectError> {
        sanitize_identifier(name)
            .map_err(|r| EffectError::evaluation(format!("function '{name}': {r}")))?;

        let function = match name {
            "random_int" => Self::RandomInt,
            "random" => Self::Random,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "sqrt" => Self::Sqrt,
            "clamp" => Self::Clamp,
            "distance" => Self::Distance,
            "has_status" => Self::HasStatus,
            "has_component" => Self::HasComponent,
            "stacks" => Self::Stacks,
            _ => return Err(EffectError::evaluation(format!("unknown function '{name}'"))),
        };
        Ok(function)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RandomInt => "random_int",
            Self::Random => "random",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Sqrt => "sqrt",
            Self::Clamp => "clamp",
            Self::Distance => "distance",
            Self::HasStatus => "has_status",
            Self::HasComponent => "has_component",
            Self::Stacks => "stacks",
        }
    }

    /// Accepted argument counts, inclusive. `None` upper bound is variadic.
    #[must_use]
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Random => (0, Some(0)),
            Self::Abs | Self::Floor | Self::Ceil | Self::Round | Self::Sqrt => (1, Some(1)),
            Self::RandomInt
            | Self::Distance
            | Self::HasStatus
            | Self::HasComponent
            | Self::Stacks => (2, Some(2)),
            Self::Clamp => (3, Some(3)),
            Self::Min | Self::Max => (1, None),
        }
    }

    /// Check an argument count against the arity.
    pub fn check_arity(self, given: usize) -> Result<(), EffectError> {
        let (min, max) = self.arity();
        let ok = given >= min && max.map_or(true, |max| given <= max);
        if ok {
            Ok(())
        } else {
            Err(EffectError::evaluation(format!(
                "{}() takes {} argument(s), got {given}",
                self.name(),
                match max {
                    Some(max) if max == min => min.to_string(),
                    Some(max) => format!("{min}..={max}"),
                    None => format!("at least {min}"),
                }
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist() {
        assert_eq!(Function::from_name("random_int"), Ok(Function::RandomInt));
        assert_eq!(Function::from_name("has_status"), Ok(Function::HasStatus));
        assert!(matches!(Function::from_name("exec"), Err(EffectError::Evaluation(_))));
    }

    #[test]
    fn test_sanitizer_runs_first() {
        let err = Function::from_name("eval").unwrap_err();
        assert!(err.to_string().contains("forbidden name"));
        assert!(Function::from_name("constructor").is_err());
        assert!(Function::from_name("alert(1)").is_err());
    }

    #[test]
    fn test_arity() {
        assert!(Function::Clamp.check_arity(3).is_ok());
        assert!(Function::Clamp.check_arity(2).is_err());
        assert!(Function::Max.check_arity(5).is_ok());
        assert!(Function::Max.check_arity(0).is_err());
        assert!(Function::Random.check_arity(1).is_err());
    }
}
