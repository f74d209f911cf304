use super::traits::ConfigSection;
use crate::error::{GpError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Independent runs per experiment
    pub runs: usize,
    /// μ, survivors per generation
    pub mu: usize,
    /// λ, offspring per generation
    pub lambda: usize,
    pub seed: Option<u64>,
    /// Fixed probability of mutating instead of crossing over
    pub mutation_rate: Option<f64>,
    /// Let every individual carry and evolve its own mutation rate
    pub self_adaptive_mutation: bool,
    pub parent_selection: ParentSelection,
    pub survival_selection: SurvivalSelection,
    pub survival_strategy: SurvivalStrategy,
    pub termination: Termination,
    pub objectives: ObjectiveMode,
    pub parsimony_coefficient: f64,
    pub parsimony_measure: ParsimonyMeasure,
    /// Reject crossover donors that would push the offspring past its depth limit
    pub depth_limited_crossover: bool,
    /// Evaluation worker pool size, `None` uses one worker per core
    pub worker_threads: Option<usize>,
    /// Distinct generation bests kept across the experiment
    pub hall_of_fame_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParentSelection {
    FitnessProportional,
    StochasticUniform,
    /// k-tournament, candidates drawn with replacement
    Tournament { k: usize },
    Uniform,
    /// Draw 80% of parents from the top fraction, 20% from the rest
    OverSelection { top_fraction: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurvivalSelection {
    Truncation,
    /// k-tournament, candidates drawn without replacement
    Tournament { k: usize },
    FitnessProportional,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalStrategy {
    /// (μ + λ): survivors compete with offspring
    Plus,
    /// (μ, λ): offspring replace the population
    Comma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    EvaluationBudget { max_evaluations: usize },
    /// Stop after this many consecutive generations without a better best individual
    NoImprovement { generations: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ObjectiveMode {
    Single,
    Pareto { diversity: Diversity },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diversity {
    None,
    Crowding,
    Sharing { sigma: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsimonyMeasure {
    NodeCount,
    Height,
}

/// Mutation behaviour resolved from the raw config fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MutationPolicy {
    Fixed(f64),
    SelfAdaptive,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            mu: 20,
            lambda: 40,
            seed: None,
            mutation_rate: Some(0.1),
            self_adaptive_mutation: false,
            parent_selection: ParentSelection::Tournament { k: 4 },
            survival_selection: SurvivalSelection::Truncation,
            survival_strategy: SurvivalStrategy::Plus,
            termination: Termination::EvaluationBudget { max_evaluations: 2000 },
            objectives: ObjectiveMode::Single,
            parsimony_coefficient: 0.0,
            parsimony_measure: ParsimonyMeasure::NodeCount,
            depth_limited_crossover: true,
            worker_threads: None,
            hall_of_fame_size: 10,
        }
    }
}

impl EvolutionConfig {
    /// Resolve the mutation settings, rejecting a fixed rate combined with self-adaptation.
    pub fn mutation_policy(&self) -> Result<MutationPolicy> {
        match (self.mutation_rate, self.self_adaptive_mutation) {
            (Some(_), true) => Err(GpError::Configuration(
                "Cannot fix a mutation rate and self-adapt it at the same time".to_string(),
            )),
            (Some(rate), false) => {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(GpError::Configuration(
                        "Mutation rate must be between 0 and 1".to_string(),
                    ));
                }
                Ok(MutationPolicy::Fixed(rate))
            }
            (None, true) => Ok(MutationPolicy::SelfAdaptive),
            (None, false) => Err(GpError::Configuration(
                "Either a mutation rate or self-adaptive mutation is required".to_string(),
            )),
        }
    }

    pub fn is_pareto(&self) -> bool {
        matches!(self.objectives, ObjectiveMode::Pareto { .. })
    }

    /// Size of the population survival selection chooses from
    pub fn survival_pool_size(&self) -> usize {
        match self.survival_strategy {
            SurvivalStrategy::Plus => self.mu + self.lambda,
            SurvivalStrategy::Comma => self.lambda,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(GpError::Configuration(
                "At least one run is required".to_string()
            ));
        }
        if self.mu < 2 {
            return Err(GpError::Configuration(
                "μ must be at least 2".to_string()
            ));
        }
        if self.lambda == 0 {
            return Err(GpError::Configuration(
                "λ must be at least 1".to_string()
            ));
        }
        if self.survival_strategy == SurvivalStrategy::Comma && self.lambda < self.mu {
            return Err(GpError::Configuration(
                "λ must be greater than or equal to μ for comma survival".to_string()
            ));
        }
        self.mutation_policy()?;

        match self.parent_selection {
            ParentSelection::Tournament { k } if k == 0 => {
                return Err(GpError::Configuration(
                    "Parent tournament size must be at least 1".to_string()
                ));
            }
            ParentSelection::OverSelection { top_fraction }
                if !(top_fraction > 0.0 && top_fraction < 1.0) =>
            {
                return Err(GpError::Configuration(
                    "Over-selection fraction must be between 0 and 1".to_string()
                ));
            }
            _ => {}
        }

        if let SurvivalSelection::Tournament { k } = self.survival_selection {
            if k == 0 || k > self.survival_pool_size() {
                return Err(GpError::Configuration(format!(
                    "Survival tournament size must be between 1 and {}",
                    self.survival_pool_size()
                )));
            }
        }

        match self.termination {
            Termination::EvaluationBudget { max_evaluations } if max_evaluations < self.mu => {
                return Err(GpError::Configuration(
                    "Evaluation budget must cover the initial population".to_string()
                ));
            }
            Termination::NoImprovement { generations } if generations == 0 => {
                return Err(GpError::Configuration(
                    "No-improvement window must be at least 1 generation".to_string()
                ));
            }
            _ => {}
        }

        if let ObjectiveMode::Pareto { diversity: Diversity::Sharing { sigma } } = self.objectives {
            if !(sigma > 0.0) {
                return Err(GpError::Configuration(
                    "Sharing radius σ must be positive".to_string()
                ));
            }
        }

        if self.parsimony_coefficient < 0.0 {
            return Err(GpError::Configuration(
                "Parsimony coefficient must not be negative".to_string()
            ));
        }
        if self.hall_of_fame_size == 0 {
            return Err(GpError::Configuration(
                "Hall of fame must hold at least one individual".to_string()
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(GpError::Configuration(
                "Worker pool needs at least one thread".to_string()
            ));
        }
        Ok(())
    }
}
