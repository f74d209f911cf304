//! One population's reproduction pipeline.
//!
//! The breeder turns the validated configuration into concrete steps:
//! initial genotypes, parent selection, variation, merging, scoring and
//! survival. Each configurable step is a single exhaustive match over the
//! algorithm enum, so every supported choice is known at compile time.

use crate::config::{
    ConfigSection, EvolutionConfig, MutationPolicy, ObjectiveMode, ParentSelection,
    ParsimonyMeasure, SurvivalSelection, SurvivalStrategy, TreeConfig,
};
use crate::engines::generation::individual::{random_label, Individual, Objectives};
use crate::engines::generation::operators::{
    fitness_proportional, fitness_proportional_without_replacement, over_selection,
    stochastic_uniform_sampling, tournament_with_replacement, tournament_without_replacement,
    truncation, uniform_random, uniform_with_replacement,
};
use crate::engines::generation::pareto;
use crate::engines::generation::tree::{PrimitiveSet, Tree};
use crate::error::{GpError, Result};
use crate::types::GrowthMode;
use rand::seq::index::sample;
use rand::Rng;
use std::borrow::Borrow;

/// A genotype waiting for evaluation
#[derive(Debug, Clone)]
pub struct Offspring {
    pub tree: Tree,
    pub mutation_rate: Option<f64>,
}

impl Borrow<Tree> for Offspring {
    fn borrow(&self) -> &Tree {
        &self.tree
    }
}

pub struct Breeder {
    config: EvolutionConfig,
    tree_config: TreeConfig,
    primitives: PrimitiveSet,
    mutation: MutationPolicy,
}

impl Breeder {
    /// Validate both config sections; nothing invalid gets past this point.
    pub fn new(config: EvolutionConfig, tree_config: TreeConfig) -> Result<Self> {
        config.validate()?;
        tree_config.validate()?;
        let mutation = config.mutation_policy()?;
        let primitives = PrimitiveSet::from_config(&tree_config);
        Ok(Self {
            config,
            tree_config,
            primitives,
            mutation,
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn primitives(&self) -> &PrimitiveSet {
        &self.primitives
    }

    /// μ random genotypes, full or grow picked per tree by a fair coin.
    pub fn initial_offspring<R: Rng>(&self, rng: &mut R) -> Result<Vec<Offspring>> {
        (0..self.config.mu)
            .map(|_| {
                let mode = if rng.gen_bool(0.5) { GrowthMode::Full } else { GrowthMode::Grow };
                let max_depth = if self.tree_config.ramped_depth {
                    rng.gen_range(1..=self.tree_config.max_depth)
                } else {
                    self.tree_config.max_depth
                };
                let tree = Tree::random(&self.primitives, max_depth, mode, rng)?;
                let mutation_rate = match self.mutation {
                    MutationPolicy::SelfAdaptive => Some(rng.gen::<f64>()),
                    MutationPolicy::Fixed(_) => None,
                };
                Ok(Offspring { tree, mutation_rate })
            })
            .collect()
    }

    /// Pair evaluated offspring with their objectives and fresh labels.
    pub fn into_individuals<R: Rng>(
        &self,
        offspring: Vec<Offspring>,
        objectives: Vec<Objectives>,
        rng: &mut R,
    ) -> Vec<Individual> {
        offspring
            .into_iter()
            .zip(objectives)
            .map(|(child, objectives)| {
                Individual::new(random_label(rng), child.tree, objectives)
                    .with_mutation_rate(child.mutation_rate)
            })
            .collect()
    }

    /// Indices of the 2λ parents.
    pub fn select_parents<R: Rng>(&self, population: &[Individual], rng: &mut R) -> Vec<usize> {
        let count = 2 * self.config.lambda;
        match self.config.parent_selection {
            ParentSelection::FitnessProportional => fitness_proportional(population, count, rng),
            ParentSelection::StochasticUniform => {
                stochastic_uniform_sampling(population, count, rng)
            }
            ParentSelection::Tournament { k } => {
                tournament_with_replacement(population, k, count, rng)
            }
            ParentSelection::Uniform => uniform_with_replacement(population.len(), count, rng),
            ParentSelection::OverSelection { top_fraction } => {
                over_selection(population, top_fraction, count, rng)
            }
        }
    }

    /// λ offspring, each from two distinct slots of the parent pool.
    ///
    /// With probability equal to the mutation rate one of the two parents is
    /// mutated, otherwise they are crossed over. Under self-adaptation the
    /// rate comes from a random parent and the child keeps a crept copy.
    pub fn vary<R: Rng>(
        &self,
        population: &[Individual],
        parents: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Offspring>> {
        if parents.len() < 2 {
            return Err(GpError::Configuration(
                "Variation needs at least two parents".to_string(),
            ));
        }
        (0..self.config.lambda)
            .map(|_| {
                let pair = sample(rng, parents.len(), 2);
                let first = &population[parents[pair.index(0)]];
                let second = &population[parents[pair.index(1)]];

                let (rate, child_rate) = match self.mutation {
                    MutationPolicy::Fixed(rate) => (rate, None),
                    MutationPolicy::SelfAdaptive => {
                        let carried = if rng.gen_bool(0.5) {
                            first.mutation_rate
                        } else {
                            second.mutation_rate
                        };
                        let inherited = match carried {
                            Some(rate) => rate,
                            None => rng.gen::<f64>(),
                        };
                        (inherited, Some(creep_rate(inherited, rng)))
                    }
                };

                let tree = if rng.gen::<f64>() < rate {
                    let parent = if rng.gen_bool(0.5) { first } else { second };
                    parent.tree.mutate(&self.primitives, rng)?
                } else if self.config.depth_limited_crossover {
                    first.tree.crossover(&second.tree, rng)?
                } else {
                    first.tree.crossover_unbounded(&second.tree, rng)?
                };
                Ok(Offspring {
                    tree,
                    mutation_rate: child_rate,
                })
            })
            .collect()
    }

    /// Plus keeps the old population alongside the offspring, comma drops it.
    pub fn merge(&self, population: Vec<Individual>, offspring: Vec<Individual>) -> Vec<Individual> {
        match self.config.survival_strategy {
            SurvivalStrategy::Plus => {
                let mut merged = population;
                merged.extend(offspring);
                merged
            }
            SurvivalStrategy::Comma => offspring,
        }
    }

    /// Genotypes to evaluate this generation when the whole merged pool is re-scored.
    pub fn merge_trees(&self, population: &[Individual], offspring: Vec<Offspring>) -> Vec<Offspring> {
        match self.config.survival_strategy {
            SurvivalStrategy::Plus => population
                .iter()
                .map(|p| Offspring {
                    tree: p.tree.clone(),
                    mutation_rate: p.mutation_rate,
                })
                .chain(offspring)
                .collect(),
            SurvivalStrategy::Comma => offspring,
        }
    }

    /// Set the working fitness: parsimony-adjusted primary objective in
    /// single-objective mode, dominance rank plus diversity otherwise.
    pub fn assess(&self, population: &mut [Individual]) {
        match &self.config.objectives {
            ObjectiveMode::Single => {
                for individual in population.iter_mut() {
                    individual.fitness =
                        individual.objectives.primary - self.parsimony_penalty(&individual.tree);
                }
            }
            ObjectiveMode::Pareto { diversity } => pareto::rank_population(population, diversity),
        }
    }

    pub fn parsimony_penalty(&self, tree: &Tree) -> f64 {
        let measure = match self.config.parsimony_measure {
            ParsimonyMeasure::NodeCount => tree.node_count(),
            ParsimonyMeasure::Height => tree.height(),
        };
        self.config.parsimony_coefficient * measure as f64
    }

    /// Narrow the population back to μ survivors.
    pub fn select_survivors<R: Rng>(
        &self,
        population: Vec<Individual>,
        rng: &mut R,
    ) -> Vec<Individual> {
        let mu = self.config.mu;
        let chosen = match self.config.survival_selection {
            SurvivalSelection::Truncation => truncation(&population, mu),
            SurvivalSelection::Tournament { k } => {
                tournament_without_replacement(&population, k, mu, rng)
            }
            SurvivalSelection::FitnessProportional => {
                fitness_proportional_without_replacement(&population, mu, rng)
            }
            SurvivalSelection::Uniform => uniform_random(&population, mu, rng),
        };
        chosen.into_iter().map(|i| population[i].clone()).collect()
    }
}

/// Nudge a self-adaptive rate up or down by U[0, 1), clamped to [0, 1].
pub fn creep_rate<R: Rng>(rate: f64, rng: &mut R) -> f64 {
    let step = rng.gen::<f64>();
    if rng.gen_bool(0.5) {
        (rate + step).min(1.0)
    } else {
        (rate - step).max(0.0)
    }
}
