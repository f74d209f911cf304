//! Two populations evolved against each other.
//!
//! Every generation both populations are paired index-wise and each pair is
//! played through the pair evaluator. Scores depend on the opponent, so after
//! merging the whole pool of both sides is re-evaluated, not only the new
//! offspring.

use crate::config::{EvolutionConfig, TreeConfig};
use crate::engines::evaluation::{EvaluationPool, PairEvaluator};
use crate::engines::generation::breeder::{Breeder, Offspring};
use crate::engines::generation::evolution_engine::{
    generation_best, new_hall_of_fame, seeded_rng, should_continue, BestTracker,
    ExperimentReport, GenerationRecord, ProgressCallback, RunReport,
};
use crate::engines::generation::hall_of_fame::HallOfFame;
use crate::engines::generation::individual::Individual;
use crate::error::{GpError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoevolutionReport {
    pub first: ExperimentReport,
    pub second: ExperimentReport,
}

impl CoevolutionReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct Side {
    breeder: Breeder,
    hall_of_fame: HallOfFame,
    experiment: BestTracker,
    reports: Vec<RunReport>,
}

impl Side {
    fn new(config: EvolutionConfig, tree_config: TreeConfig) -> Result<Self> {
        let hall_of_fame = new_hall_of_fame(&config);
        let experiment = BestTracker::new(config.is_pareto());
        Ok(Self {
            breeder: Breeder::new(config, tree_config)?,
            hall_of_fame,
            experiment,
            reports: Vec::new(),
        })
    }

    /// Score, survive and track one side after its pool was evaluated
    fn advance(
        &mut self,
        mut pool: Vec<Individual>,
        tracker: &mut BestTracker,
        rng: &mut StdRng,
    ) -> (Vec<Individual>, bool) {
        self.breeder.assess(&mut pool);
        let mut survivors = self.breeder.select_survivors(pool, rng);
        self.breeder.assess(&mut survivors);
        let improved = self.observe(tracker, &survivors);
        (survivors, improved)
    }

    fn observe(&mut self, tracker: &mut BestTracker, population: &[Individual]) -> bool {
        if let Some(best) = generation_best(population) {
            self.hall_of_fame.try_add(best.clone());
        }
        tracker.observe(population)
    }

    fn finish_run(&mut self, report: RunReport) {
        self.experiment.offer(&report.best);
        if let Some(front) = &report.best_front {
            self.experiment.offer_front(front.clone());
        }
        self.reports.push(report);
    }

    fn into_report(self) -> Result<ExperimentReport> {
        let best = self
            .experiment
            .best()
            .cloned()
            .ok_or_else(|| GpError::Configuration("No runs were executed".to_string()))?;
        Ok(ExperimentReport {
            best,
            best_front: self.experiment.front().cloned(),
            runs: self.reports,
            hall_of_fame: self.hall_of_fame.get_all().to_vec(),
        })
    }
}

pub struct CoevolutionEngine<P: PairEvaluator> {
    config: EvolutionConfig,
    first: Side,
    second: Side,
    evaluator: P,
    pool: EvaluationPool,
    rng: StdRng,
}

impl<P: PairEvaluator> CoevolutionEngine<P> {
    /// Both populations share the evolution settings but have their own primitives.
    pub fn new(
        config: EvolutionConfig,
        first_tree: TreeConfig,
        second_tree: TreeConfig,
        evaluator: P,
    ) -> Result<Self> {
        let first = Side::new(config.clone(), first_tree)?;
        let second = Side::new(config.clone(), second_tree)?;
        let pool = EvaluationPool::new(config.worker_threads)?;
        let rng = seeded_rng(config.seed);
        Ok(Self {
            config,
            first,
            second,
            evaluator,
            pool,
            rng,
        })
    }

    /// Run the experiment; `first_progress` and `second_progress` follow one population each.
    pub fn run<A, B>(mut self, first_progress: &mut A, second_progress: &mut B) -> Result<CoevolutionReport>
    where
        A: ProgressCallback,
        B: ProgressCallback,
    {
        for run in 0..self.config.runs {
            info!("Starting co-evolution run {}/{}", run + 1, self.config.runs);
            first_progress.on_run_start(run);
            second_progress.on_run_start(run);

            let (first, second) = self.run_once(run, first_progress, second_progress)?;
            info!(
                "Co-evolution run {} finished after {} evaluations",
                run + 1,
                first.evaluations
            );
            first_progress.on_run_complete(&first);
            second_progress.on_run_complete(&second);
            self.first.finish_run(first);
            self.second.finish_run(second);
        }

        Ok(CoevolutionReport {
            first: self.first.into_report()?,
            second: self.second.into_report()?,
        })
    }

    fn run_once<A, B>(
        &mut self,
        run: usize,
        first_progress: &mut A,
        second_progress: &mut B,
    ) -> Result<(RunReport, RunReport)>
    where
        A: ProgressCallback,
        B: ProgressCallback,
    {
        let pareto = self.config.is_pareto();
        let mut first_tracker = BestTracker::new(pareto);
        let mut second_tracker = BestTracker::new(pareto);

        let first_initial = self.first.breeder.initial_offspring(&mut self.rng)?;
        let second_initial = self.second.breeder.initial_offspring(&mut self.rng)?;
        let mut evaluations = first_initial.len();
        let (mut first_pop, mut second_pop) = self.evaluate(first_initial, second_initial)?;

        self.first.breeder.assess(&mut first_pop);
        self.second.breeder.assess(&mut second_pop);
        self.first.observe(&mut first_tracker, &first_pop);
        self.second.observe(&mut second_tracker, &second_pop);

        let mut first_records = vec![GenerationRecord::from_population(run, 0, evaluations, &first_pop)];
        let mut second_records = vec![GenerationRecord::from_population(run, 0, evaluations, &second_pop)];
        first_progress.on_generation_complete(&first_records[0]);
        second_progress.on_generation_complete(&second_records[0]);

        let batch = self.config.survival_pool_size();
        let mut stale = 0;
        let mut generation = 0;

        while should_continue(&self.config.termination, evaluations, batch, stale) {
            generation += 1;

            let first_pool = breed(&self.first.breeder, &first_pop, &mut self.rng)?;
            let second_pool = breed(&self.second.breeder, &second_pop, &mut self.rng)?;
            let first_pool = self.first.breeder.merge_trees(&first_pop, first_pool);
            let second_pool = self.second.breeder.merge_trees(&second_pop, second_pool);
            evaluations += first_pool.len();
            let (first_scored, second_scored) = self.evaluate(first_pool, second_pool)?;

            let (next_first, first_improved) =
                self.first.advance(first_scored, &mut first_tracker, &mut self.rng);
            let (next_second, second_improved) =
                self.second.advance(second_scored, &mut second_tracker, &mut self.rng);
            first_pop = next_first;
            second_pop = next_second;

            if first_improved || second_improved {
                stale = 0;
            } else {
                stale += 1;
            }

            let first_record = GenerationRecord::from_population(run, generation, evaluations, &first_pop);
            let second_record = GenerationRecord::from_population(run, generation, evaluations, &second_pop);
            debug!(
                "Co-evolution run {} generation {}: best primaries {:.4} / {:.4}",
                run + 1,
                generation,
                first_record.best_primary,
                second_record.best_primary
            );
            first_progress.on_generation_complete(&first_record);
            second_progress.on_generation_complete(&second_record);
            first_records.push(first_record);
            second_records.push(second_record);
        }

        Ok((
            run_report(run, evaluations, &first_tracker, first_records)?,
            run_report(run, evaluations, &second_tracker, second_records)?,
        ))
    }

    fn evaluate(
        &mut self,
        first: Vec<Offspring>,
        second: Vec<Offspring>,
    ) -> Result<(Vec<Individual>, Vec<Individual>)> {
        let scores = self.pool.evaluate_pairs(&self.evaluator, &first, &second)?;
        let (first_scores, second_scores): (Vec<_>, Vec<_>) = scores.into_iter().unzip();
        Ok((
            self.first.breeder.into_individuals(first, first_scores, &mut self.rng),
            self.second.breeder.into_individuals(second, second_scores, &mut self.rng),
        ))
    }
}

fn breed(breeder: &Breeder, population: &[Individual], rng: &mut StdRng) -> Result<Vec<Offspring>> {
    let parents = breeder.select_parents(population, rng);
    breeder.vary(population, &parents, rng)
}

fn run_report(
    run: usize,
    evaluations: usize,
    tracker: &BestTracker,
    generations: Vec<GenerationRecord>,
) -> Result<RunReport> {
    let best = tracker
        .best()
        .cloned()
        .ok_or_else(|| GpError::Configuration("Run produced an empty population".to_string()))?;
    Ok(RunReport {
        run,
        evaluations,
        best,
        best_front: tracker.front().cloned(),
        generations,
    })
}
