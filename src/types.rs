use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators available to internal tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Multiply,
    Add,
    Subtract,
    Divide,
    RandomBetween,
}

impl Operator {
    pub const ALL: [Operator; 5] = [
        Operator::Multiply,
        Operator::Add,
        Operator::Subtract,
        Operator::Divide,
        Operator::RandomBetween,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Multiply => "*",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Divide => "/",
            Operator::RandomBetween => "RAND",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    /// Apply the operator to two evaluated operands.
    ///
    /// Division by zero yields 0. `RandomBetween` draws uniformly from the
    /// closed range spanned by its operands, whichever order they come in.
    pub fn apply<R: Rng>(&self, left: f64, right: f64, rng: &mut R) -> f64 {
        match self {
            Operator::Multiply => left * right,
            Operator::Add => left + right,
            Operator::Subtract => left - right,
            Operator::Divide => {
                if right == 0.0 {
                    0.0
                } else {
                    left / right
                }
            }
            Operator::RandomBetween => {
                let (low, high) = if left > right { (right, left) } else { (left, right) };
                if low == high || !(high - low).is_finite() {
                    return low;
                }
                rng.gen_range(low..=high)
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Value held by a genotype node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    Operator(Operator),
    Sensor(String),
    Constant(f64),
}

impl NodeValue {
    pub fn is_operator(&self) -> bool {
        matches!(self, NodeValue::Operator(_))
    }

    /// Parse the textual form produced by `Display`.
    ///
    /// Operator symbols win, then numbers, and anything else is a sensor name.
    pub fn parse(text: &str) -> NodeValue {
        if let Some(op) = Operator::from_symbol(text) {
            return NodeValue::Operator(op);
        }
        match text.parse::<f64>() {
            Ok(value) => NodeValue::Constant(value),
            Err(_) => NodeValue::Sensor(text.to_string()),
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Operator(op) => write!(f, "{}", op),
            NodeValue::Sensor(name) => f.write_str(name),
            NodeValue::Constant(value) => write!(f, "{}", value),
        }
    }
}

/// Tree construction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMode {
    /// Operators everywhere above the depth limit
    Full,
    /// Operator or terminal by coin flip above the depth limit
    Grow,
}
