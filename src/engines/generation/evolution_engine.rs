use crate::config::{AppConfig, EvolutionConfig, Termination, TreeConfig};
use crate::engines::evaluation::{EvaluationPool, Evaluator};
use crate::engines::generation::breeder::{Breeder, Offspring};
use crate::engines::generation::hall_of_fame::HallOfFame;
use crate::engines::generation::individual::{compare_fitness, Individual};
use crate::engines::generation::pareto::{self, ParetoFront};
use crate::error::{GpError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub trait ProgressCallback: Send {
    fn on_run_start(&mut self, run: usize);
    fn on_generation_complete(&mut self, record: &GenerationRecord);
    fn on_run_complete(&mut self, report: &RunReport);
}

/// One row of the per-generation log, suitable for plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub run: usize,
    pub generation: usize,
    /// Evaluations spent in this run so far
    pub evaluations: usize,
    pub average_primary: f64,
    pub best_primary: f64,
    pub average_fitness: f64,
    pub best_fitness: f64,
}

impl GenerationRecord {
    pub fn from_population(
        run: usize,
        generation: usize,
        evaluations: usize,
        population: &[Individual],
    ) -> Self {
        let count = population.len().max(1) as f64;
        let average_primary = population.iter().map(|p| p.objectives.primary).sum::<f64>() / count;
        let average_fitness = population.iter().map(|p| p.fitness).sum::<f64>() / count;
        let best_primary = population
            .iter()
            .map(|p| p.objectives.primary)
            .fold(f64::NEG_INFINITY, f64::max);
        let best_fitness = population
            .iter()
            .map(|p| p.fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        Self {
            run,
            generation,
            evaluations,
            average_primary,
            best_primary,
            average_fitness,
            best_fitness,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: usize,
    pub evaluations: usize,
    pub best: Individual,
    /// Best first-tier front seen in the run, multi-objective mode only
    pub best_front: Option<ParetoFront>,
    pub generations: Vec<GenerationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub best: Individual,
    pub best_front: Option<ParetoFront>,
    pub runs: Vec<RunReport>,
    pub hall_of_fame: Vec<Individual>,
}

impl ExperimentReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The best genotype in depth-indented text form
    pub fn best_tree_text(&self) -> String {
        self.best.tree.to_indented_string()
    }

    /// Every generation record of every run, in order
    pub fn generation_log(&self) -> impl Iterator<Item = &GenerationRecord> {
        self.runs.iter().flat_map(|r| r.generations.iter())
    }
}

/// Best individual and best front seen so far.
///
/// Single-objective mode improves on strictly higher fitness. Multi-objective
/// mode only accepts a new best that dominates the incumbent, and replaces
/// the front when the incumbent front is outperformed.
#[derive(Debug, Clone)]
pub struct BestTracker {
    pareto: bool,
    best: Option<Individual>,
    front: Option<ParetoFront>,
}

impl BestTracker {
    pub fn new(pareto: bool) -> Self {
        Self {
            pareto,
            best: None,
            front: None,
        }
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    pub fn front(&self) -> Option<&ParetoFront> {
        self.front.as_ref()
    }

    /// Returns true when the candidate became the new best
    pub fn offer(&mut self, candidate: &Individual) -> bool {
        let improved = match &self.best {
            None => true,
            Some(incumbent) if self.pareto => candidate.dominates(incumbent),
            Some(incumbent) => compare_fitness(candidate.fitness, incumbent.fitness) == Ordering::Greater,
        };
        if improved {
            self.best = Some(candidate.clone());
        }
        improved
    }

    pub fn offer_front(&mut self, front: ParetoFront) {
        let replace = match &self.front {
            None => true,
            Some(incumbent) => incumbent.is_outperformed_by(&front),
        };
        if replace {
            self.front = Some(front);
        }
    }

    /// Look at a scored population, returns true when its best improved on ours
    pub fn observe(&mut self, population: &[Individual]) -> bool {
        let improved = match generation_best(population) {
            Some(best) => self.offer(best),
            None => false,
        };
        if self.pareto {
            if let Some(front) = pareto::split_fronts(population).into_iter().next() {
                self.offer_front(front);
            }
        }
        improved
    }
}

/// Highest working fitness, first one wins ties, NaN never wins
pub fn generation_best(population: &[Individual]) -> Option<&Individual> {
    population.iter().fold(None, |best: Option<&Individual>, p| match best {
        Some(b) if compare_fitness(p.fitness, b.fitness) != Ordering::Greater => Some(b),
        _ => Some(p),
    })
}

/// Whether another generation of `batch` evaluations may start.
///
/// A generation only starts when its whole batch fits in the remaining
/// evaluation budget.
pub fn should_continue(termination: &Termination, evaluations: usize, batch: usize, stale: usize) -> bool {
    match termination {
        Termination::EvaluationBudget { max_evaluations } => evaluations + batch <= *max_evaluations,
        Termination::NoImprovement { generations } => stale < *generations,
    }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn new_hall_of_fame(config: &EvolutionConfig) -> HallOfFame {
    if config.is_pareto() {
        HallOfFame::new_with_pareto(config.hall_of_fame_size)
    } else {
        HallOfFame::new(config.hall_of_fame_size)
    }
}

pub struct EvolutionEngine<E: Evaluator> {
    breeder: Breeder,
    evaluator: E,
    pool: EvaluationPool,
    hall_of_fame: HallOfFame,
    rng: StdRng,
}

impl<E: Evaluator> EvolutionEngine<E> {
    /// Validates the configuration; an invalid one never starts a run.
    pub fn new(config: EvolutionConfig, tree_config: TreeConfig, evaluator: E) -> Result<Self> {
        let rng = seeded_rng(config.seed);
        let worker_threads = config.worker_threads;
        let hall_of_fame = new_hall_of_fame(&config);
        let breeder = Breeder::new(config, tree_config)?;
        let pool = EvaluationPool::new(worker_threads)?;

        Ok(Self {
            breeder,
            evaluator,
            pool,
            hall_of_fame,
            rng,
        })
    }

    pub fn from_app_config(config: &AppConfig, evaluator: E) -> Result<Self> {
        Self::new(config.evolution.clone(), config.tree.clone(), evaluator)
    }

    /// Run every configured run and keep the best of the experiment.
    ///
    /// Each call is a fresh experiment with an empty hall of fame.
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<ExperimentReport> {
        let runs = self.breeder.config().runs;
        self.hall_of_fame = new_hall_of_fame(self.breeder.config());
        let mut experiment = BestTracker::new(self.breeder.config().is_pareto());
        let mut reports = Vec::with_capacity(runs);

        for run in 0..runs {
            info!("Starting run {}/{}", run + 1, runs);
            callback.on_run_start(run);

            let report = self.run_once(run, callback)?;
            experiment.offer(&report.best);
            if let Some(front) = &report.best_front {
                experiment.offer_front(front.clone());
            }

            info!(
                "Run {} finished after {} evaluations, best: {}",
                run + 1,
                report.evaluations,
                report.best
            );
            callback.on_run_complete(&report);
            reports.push(report);
        }

        let best = experiment
            .best()
            .cloned()
            .ok_or_else(|| GpError::Configuration("No runs were executed".to_string()))?;

        Ok(ExperimentReport {
            best,
            best_front: experiment.front().cloned(),
            runs: reports,
            hall_of_fame: self.hall_of_fame.get_all().to_vec(),
        })
    }

    fn run_once<C: ProgressCallback>(&mut self, run: usize, callback: &mut C) -> Result<RunReport> {
        let config = self.breeder.config().clone();
        let mut tracker = BestTracker::new(config.is_pareto());

        let initial = self.breeder.initial_offspring(&mut self.rng)?;
        let mut evaluations = initial.len();
        let mut population = self.evaluate(initial)?;
        self.breeder.assess(&mut population);
        self.observe(&mut tracker, &population);

        let mut records = vec![self.record(run, 0, evaluations, &population, callback)];
        let mut stale = 0;
        let mut generation = 0;

        while should_continue(&config.termination, evaluations, config.lambda, stale) {
            generation += 1;

            let parents = self.breeder.select_parents(&population, &mut self.rng);
            let offspring = self.breeder.vary(&population, &parents, &mut self.rng)?;
            evaluations += offspring.len();
            let offspring = self.evaluate(offspring)?;

            let mut merged = self.breeder.merge(population, offspring);
            self.breeder.assess(&mut merged);
            population = self.breeder.select_survivors(merged, &mut self.rng);
            self.breeder.assess(&mut population);

            if self.observe(&mut tracker, &population) {
                stale = 0;
            } else {
                stale += 1;
            }
            records.push(self.record(run, generation, evaluations, &population, callback));
        }

        let best = tracker
            .best()
            .cloned()
            .ok_or_else(|| GpError::Configuration("Run produced an empty population".to_string()))?;
        Ok(RunReport {
            run,
            evaluations,
            best,
            best_front: tracker.front().cloned(),
            generations: records,
        })
    }

    fn evaluate(&mut self, offspring: Vec<Offspring>) -> Result<Vec<Individual>> {
        let objectives = self.pool.evaluate_batch(&self.evaluator, &offspring)?;
        Ok(self.breeder.into_individuals(offspring, objectives, &mut self.rng))
    }

    fn observe(&mut self, tracker: &mut BestTracker, population: &[Individual]) -> bool {
        if let Some(best) = generation_best(population) {
            self.hall_of_fame.try_add(best.clone());
        }
        tracker.observe(population)
    }

    fn record<C: ProgressCallback>(
        &self,
        run: usize,
        generation: usize,
        evaluations: usize,
        population: &[Individual],
        callback: &mut C,
    ) -> GenerationRecord {
        let record = GenerationRecord::from_population(run, generation, evaluations, population);
        debug!(
            "Run {} generation {}: {} evals, avg primary {:.4}, best primary {:.4}",
            run + 1,
            generation,
            evaluations,
            record.average_primary,
            record.best_primary
        );
        callback.on_generation_complete(&record);
        record
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    pub fn breeder(&self) -> &Breeder {
        &self.breeder
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::individual::Objectives;
    use crate::engines::generation::tree::Tree;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    struct Silent;

    impl ProgressCallback for Silent {
        fn on_run_start(&mut self, _run: usize) {}
        fn on_generation_complete(&mut self, _record: &GenerationRecord) {}
        fn on_run_complete(&mut self, _report: &RunReport) {}
    }

    fn size_evaluator(tree: &Tree) -> anyhow::Result<Objectives> {
        Ok(Objectives::scalar(tree.node_count() as f64))
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let config = EvolutionConfig {
            mu: 6,
            lambda: 4,
            seed: Some(5),
            worker_threads: Some(2),
            termination: Termination::EvaluationBudget { max_evaluations: 20 },
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, TreeConfig::default(), size_evaluator).unwrap();
        let report = engine.run(&mut Silent).unwrap();
        let run = &report.runs[0];
        assert_eq!(run.evaluations, 18);
        assert_eq!(run.generations.len(), 4);
    }

    #[test]
    fn test_no_improvement_window_stops_run() {
        let constant = |_: &Tree| -> anyhow::Result<Objectives> { Ok(Objectives::scalar(1.0)) };
        let config = EvolutionConfig {
            mu: 4,
            lambda: 4,
            seed: Some(1),
            termination: Termination::NoImprovement { generations: 3 },
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, TreeConfig::default(), constant).unwrap();
        let report = engine.run(&mut Silent).unwrap();
        // Generation 0 sets the best, then three flat generations end the run
        assert_eq!(report.runs[0].generations.len(), 4);
    }

    #[test]
    fn test_evaluation_error_aborts_run() {
        let failing = |_: &Tree| -> anyhow::Result<Objectives> { anyhow::bail!("simulator exited") };
        let config = EvolutionConfig {
            seed: Some(3),
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, TreeConfig::default(), failing).unwrap();
        assert!(matches!(engine.run(&mut Silent), Err(GpError::Evaluation(_))));
    }

    #[test]
    fn test_each_experiment_starts_an_empty_hall_of_fame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        // Every later evaluation scores lower than all earlier ones
        let declining = move |_: &Tree| -> anyhow::Result<Objectives> {
            let call = counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Objectives::scalar(-(call as f64)))
        };
        let config = EvolutionConfig {
            mu: 4,
            lambda: 4,
            seed: Some(12),
            termination: Termination::EvaluationBudget { max_evaluations: 16 },
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, TreeConfig::default(), declining).unwrap();
        engine.run(&mut Silent).unwrap();
        let first_experiment = calls.load(AtomicOrdering::SeqCst) as f64;

        let second = engine.run(&mut Silent).unwrap();
        assert!(!second.hall_of_fame.is_empty());
        for member in &second.hall_of_fame {
            assert!(member.objectives.primary <= -first_experiment, "{} leaked across experiments", member);
        }
    }

    #[test]
    fn test_generation_best_skips_nan() {
        let tree = Tree::leaf(crate::types::NodeValue::Constant(0.0), 1).unwrap();
        let mut population: Vec<Individual> = [2.0, 5.0, 1.0]
            .iter()
            .map(|&f| Individual::new(format!("f{}", f), tree.clone(), Objectives::scalar(f)))
            .collect();
        population[2].fitness = f64::NAN;
        assert_eq!(generation_best(&population).map(|b| b.fitness), Some(5.0));

        population.swap(0, 2);
        assert_eq!(generation_best(&population).map(|b| b.fitness), Some(5.0));
    }

    #[test]
    fn test_tracker_replaces_undefined_score() {
        let tree = Tree::leaf(crate::types::NodeValue::Constant(0.0), 1).unwrap();
        let mut tracker = BestTracker::new(false);
        let undefined = Individual::new("nan".into(), tree.clone(), Objectives::scalar(f64::NAN));
        let finite = Individual::new("ok".into(), tree, Objectives::scalar(-1e9));
        assert!(tracker.offer(&undefined));
        assert!(tracker.offer(&finite));
        assert_eq!(tracker.best().map(|b| b.id.as_str()), Some("ok"));
    }

    #[test]
    fn test_tracker_pareto_needs_dominance() {
        let tree = Tree::leaf(crate::types::NodeValue::Constant(0.0), 1).unwrap();
        let mut tracker = BestTracker::new(true);
        let first = Individual::new("a".into(), tree.clone(), Objectives::new(2.0, vec![1.0]));
        let sideways = Individual::new("b".into(), tree.clone(), Objectives::new(3.0, vec![2.0]));
        let better = Individual::new("c".into(), tree, Objectives::new(3.0, vec![0.0]));
        assert!(tracker.offer(&first));
        assert!(!tracker.offer(&sideways));
        assert!(tracker.offer(&better));
        assert_eq!(tracker.best().map(|b| b.id.as_str()), Some("c"));
    }
}
