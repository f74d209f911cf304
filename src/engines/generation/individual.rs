use crate::engines::generation::pareto::{self, OptimizationDirection};
use crate::engines::generation::tree::Tree;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const LABEL_LENGTH: usize = 8;

/// Objective vector reported by an evaluator.
///
/// The primary metric is maximised; violation counts and the optional
/// resource count are minimised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objectives {
    pub primary: f64,
    pub violations: Vec<f64>,
    pub resource: Option<f64>,
}

impl Objectives {
    pub fn scalar(primary: f64) -> Self {
        Self {
            primary,
            violations: Vec::new(),
            resource: None,
        }
    }

    pub fn new(primary: f64, violations: Vec<f64>) -> Self {
        Self {
            primary,
            violations,
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: f64) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Replace undefined scores with the worst value for their direction:
    /// NaN primary becomes -inf, NaN violation or resource becomes +inf.
    pub fn sanitized(mut self) -> Self {
        if self.primary.is_nan() {
            self.primary = f64::NEG_INFINITY;
        }
        for value in self.violations.iter_mut().chain(self.resource.iter_mut()) {
            if value.is_nan() {
                *value = f64::INFINITY;
            }
        }
        self
    }

    /// Raw objective values: primary, violations, then resource.
    pub fn components(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.violations.len() + 2);
        values.push(self.primary);
        values.extend_from_slice(&self.violations);
        values.extend(self.resource);
        values
    }

    pub fn directions(&self) -> Vec<OptimizationDirection> {
        let mut directions = vec![OptimizationDirection::Maximize];
        directions.extend(std::iter::repeat(OptimizationDirection::Minimize).take(
            self.violations.len() + usize::from(self.resource.is_some()),
        ));
        directions
    }

    pub fn dominates(&self, other: &Objectives) -> bool {
        pareto::dominates(&self.components(), &other.components(), &self.directions())
    }

    pub fn distance(&self, other: &Objectives) -> f64 {
        self.components()
            .iter()
            .zip(other.components())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Anything the selection operators can rank
pub trait Scored {
    fn fitness(&self) -> f64;
}

/// Fitness order with NaN below every number, equal values tie.
pub fn compare_fitness(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl Scored for f64 {
    fn fitness(&self) -> f64 {
        *self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    /// Random label telling apart individuals with equal scores
    pub id: String,
    pub tree: Tree,
    pub objectives: Objectives,
    /// Working fitness fed to selection: the parsimony-adjusted primary
    /// objective, or the dominance rank plus diversity terms
    pub fitness: f64,
    /// Dominance tier assigned by ranking, 0 until ranked
    pub rank: i64,
    /// Carried rate under self-adaptive mutation
    pub mutation_rate: Option<f64>,
}

impl Individual {
    /// Undefined objective values are sanitized on the way in.
    pub fn new(id: String, tree: Tree, objectives: Objectives) -> Self {
        let objectives = objectives.sanitized();
        let fitness = objectives.primary;
        Self {
            id,
            tree,
            objectives,
            fitness,
            rank: 0,
            mutation_rate: None,
        }
    }

    pub fn with_mutation_rate(mut self, rate: Option<f64>) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn dominates(&self, other: &Individual) -> bool {
        self.objectives.dominates(&other.objectives)
    }
}

impl Scored for Individual {
    fn fitness(&self) -> f64 {
        self.fitness
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} f:{:.4} primary:{}", self.id, self.fitness, self.objectives.primary)?;
        if !self.objectives.violations.is_empty() {
            write!(f, " violations:{:?}", self.objectives.violations)?;
        }
        if let Some(resource) = self.objectives.resource {
            write!(f, " resource:{}", resource)?;
        }
        Ok(())
    }
}

/// Lowercase identity label for a new individual.
pub fn random_label<R: Rng>(rng: &mut R) -> String {
    (0..LABEL_LENGTH)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}
