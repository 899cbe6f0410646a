//! Expression AST.
//!
//! ## Authoring format
//!
//! | JSON | Expression |
//! |---|---|
//! | `12`, `true` | literal |
//! | `"caster.health"` | variable path |
//! | `{"text": "undead"}` | text literal |
//! | `{"op": "<", "left": .., "right": ..}` | binary operator |
//! | `{"op": "!", "operand": ..}` | unary operator |
//! | `{"fn": "random_int", "args": [1, 6]}` | function call |

use serde::{Deserialize, Serialize};

use crate::error::EffectError;

use super::path::VarPath;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // === Arithmetic ===
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Rem,

    // === Comparison ===
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,

    // === Logical ===
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 13] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Rem,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Eq,
        Self::Ne,
        Self::And,
        Self::Or,
    ];

    /// Look up an operator by its authoring token.
    #[must_use]
    pub fn from_symbol(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == token)
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "neg")]
    Neg,
}

impl UnaryOp {
    #[must_use]
    pub fn from_symbol(token: &str) -> Option<Self> {
        match token {
            "!" => Some(Self::Not),
            "neg" => Some(Self::Neg),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "neg",
        }
    }
}

/// An expression tree.
///
/// Serializes to the authoring format. Deserialization goes through
/// `RawExpression` so a bad operator token, path or node shape is reported
/// by name instead of as an untagged mismatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawExpression")]
pub enum Expression {
    Number(f64),
    Bool(bool),
    Path(VarPath),
    Text {
        text: String,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Call {
        #[serde(rename = "fn")]
        function: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
}

impl Expression {
    // === Builders ===

    #[must_use]
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    /// Parse a variable path.
    pub fn path(raw: &str) -> Result<Self, EffectError> {
        VarPath::parse(raw).map(Self::Path)
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn call(function: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Call {
            function: function.into(),
            args,
        }
    }

    /// Parse an expression from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, EffectError> {
        serde_json::from_str(json).map_err(|e| EffectError::validation(format!("expression: {e}")))
    }

    // === Inspection ===

    /// The value if this is a number literal.
    #[must_use]
    pub fn literal_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Number(_) | Self::Bool(_) | Self::Path(_) | Self::Text { .. } => 1,
            Self::Binary { left, right, .. } => 1 + left.node_count() + right.node_count(),
            Self::Unary { operand, .. } => 1 + operand.node_count(),
            Self::Call { args, .. } => 1 + args.iter().map(Expression::node_count).sum::<usize>(),
        }
    }
}

// === Decoding ===

/// Authoring-format node as written, before operator tokens and paths are
/// checked. Every object shape is accepted here; the `TryFrom` conversion
/// decides whether it is well formed.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RawExpression {
    Number(f64),
    Bool(bool),
    Path(String),
    Text {
        text: String,
    },
    Operator {
        op: String,
        left: Option<Box<RawExpression>>,
        right: Option<Box<RawExpression>>,
        operand: Option<Box<RawExpression>>,
    },
    Call {
        #[serde(rename = "fn")]
        function: String,
        #[serde(default)]
        args: Vec<RawExpression>,
    },
}

impl TryFrom<RawExpression> for Expression {
    type Error = EffectError;

    fn try_from(raw: RawExpression) -> Result<Self, Self::Error> {
        match raw {
            RawExpression::Number(n) => Ok(Self::Number(n)),
            RawExpression::Bool(b) => Ok(Self::Bool(b)),
            RawExpression::Path(raw) => Self::path(&raw),
            RawExpression::Text { text } => Ok(Self::Text { text }),
            RawExpression::Operator {
                op,
                left,
                right,
                operand,
            } => match (left, right, operand) {
                (Some(left), Some(right), None) => {
                    let op = BinaryOp::from_symbol(&op).ok_or_else(|| {
                        EffectError::validation(format!("unknown binary operator '{op}'"))
                    })?;
                    Ok(Self::binary(op, Self::try_from(*left)?, Self::try_from(*right)?))
                }
                (None, None, Some(operand)) => {
                    let op = UnaryOp::from_symbol(&op).ok_or_else(|| {
                        EffectError::validation(format!("unknown unary operator '{op}'"))
                    })?;
                    Ok(Self::unary(op, Self::try_from(*operand)?))
                }
                _ => Err(EffectError::validation(format!(
                    "operator '{op}' needs either 'left' and 'right' or a single 'operand'"
                ))),
            },
            RawExpression::Call { function, args } => Ok(Self::Call {
                function,
                args: args.into_iter().map(Self::try_from).collect::<Result<_, _>>()?,
            }),
        }
    }
}

impl From<f64> for Expression {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<VarPath> for Expression {
    fn from(path: VarPath) -> Self {
        Self::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals_and_paths() {
        assert_eq!(Expression::from_json("100").unwrap(), Expression::Number(100.0));
        assert_eq!(Expression::from_json("true").unwrap(), Expression::Bool(true));
        assert_eq!(
            Expression::from_json(r#""caster.health""#).unwrap(),
            Expression::path("caster.health").unwrap()
        );
        assert_eq!(
            Expression::from_json(r#"{"text": "undead"}"#).unwrap(),
            Expression::text("undead")
        );
    }

    #[test]
    fn test_parse_nested() {
        let expr = Expression::from_json(
            r#"{"op": "<", "left": "caster.health",
                "right": {"op": "*", "left": "caster.maxHealth", "right": 0.5}}"#,
        )
        .unwrap();
        let expected = Expression::binary(
            BinaryOp::Lt,
            Expression::path("caster.health").unwrap(),
            Expression::binary(BinaryOp::Mul, Expression::path("caster.maxHealth").unwrap(), 0.5.into()),
        );
        assert_eq!(expr, expected);
        assert_eq!(expr.node_count(), 5);
    }

    #[test]
    fn test_parse_unary_and_call() {
        let expr = Expression::from_json(r#"{"op": "!", "operand": false}"#).unwrap();
        assert_eq!(expr, Expression::unary(UnaryOp::Not, false.into()));

        let call = Expression::from_json(r#"{"fn": "random_int", "args": [1, 6]}"#).unwrap();
        assert_eq!(call, Expression::call("random_int", vec![1.0.into(), 6.0.into()]));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        assert!(matches!(
            Expression::from_json(r#"{"op": "**", "left": 2, "right": 3}"#),
            Err(EffectError::Validation(_))
        ));
        assert!(Expression::from_json(r#"{"op": "+", "left": "a"}"#).is_err());
    }

    #[test]
    fn test_decode_errors_name_the_problem() {
        let message = |json: &str| Expression::from_json(json).unwrap_err().to_string();

        assert!(message(r#"{"op": "**", "left": 2, "right": 3}"#).contains("unknown binary operator '**'"));
        assert!(message(r#"{"op": "~", "operand": 1}"#).contains("unknown unary operator '~'"));
        assert!(message(r#"{"op": "+", "left": 1}"#).contains("operator '+' needs"));
        // Nested nodes report their own fault.
        assert!(message(r#"{"op": "+", "left": 1, "right": {"op": "^", "left": 1, "right": 2}}"#)
            .contains("'^'"));
        assert!(message(r#"{"fn": "max", "args": [1, "caster.__proto__"]}"#).contains("__proto__"));
    }

    #[test]
    fn test_operator_tokens_round_trip() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_symbol(op.symbol()), Some(op));
        }
        for op in [UnaryOp::Not, UnaryOp::Neg] {
            assert_eq!(UnaryOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(BinaryOp::from_symbol("**"), None);
    }

    #[test]
    fn test_forbidden_path_is_rejected() {
        assert!(Expression::from_json(r#""caster.__proto__.polluted""#).is_err());
        assert!(Expression::path("caster.constructor").is_err());
    }
}
