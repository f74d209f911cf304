//! Boundary to the simulation that scores genotypes.
//!
//! The engine only knows the evaluator signatures. Batches go through a
//! bounded rayon pool and the caller blocks until every result is back.

use crate::engines::generation::individual::Objectives;
use crate::engines::generation::tree::Tree;
use crate::error::{GpError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::borrow::Borrow;

/// Scores one genotype
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, tree: &Tree) -> anyhow::Result<Objectives>;
}

impl<F> Evaluator for F
where
    F: Fn(&Tree) -> anyhow::Result<Objectives> + Send + Sync,
{
    fn evaluate(&self, tree: &Tree) -> anyhow::Result<Objectives> {
        self(tree)
    }
}

/// Scores two genotypes that play against each other, e.g. pursuer and evader
pub trait PairEvaluator: Send + Sync {
    fn evaluate_pair(&self, first: &Tree, second: &Tree) -> anyhow::Result<(Objectives, Objectives)>;
}

impl<F> PairEvaluator for F
where
    F: Fn(&Tree, &Tree) -> anyhow::Result<(Objectives, Objectives)> + Send + Sync,
{
    fn evaluate_pair(&self, first: &Tree, second: &Tree) -> anyhow::Result<(Objectives, Objectives)> {
        self(first, second)
    }
}

pub struct EvaluationPool {
    pool: ThreadPool,
}

impl EvaluationPool {
    /// `None` sizes the pool to the machine.
    pub fn new(worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("gpevo-eval-{}", i));
        if let Some(threads) = worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| GpError::Configuration(format!("Failed to build worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate every tree, results in input order. The first failure aborts the batch.
    pub fn evaluate_batch<E, T>(&self, evaluator: &E, genotypes: &[T]) -> Result<Vec<Objectives>>
    where
        E: Evaluator + ?Sized,
        T: Borrow<Tree> + Sync,
    {
        self.pool.install(|| {
            genotypes
                .par_iter()
                .map(|g| evaluator.evaluate(g.borrow()).map_err(GpError::Evaluation))
                .collect()
        })
    }

    /// Evaluate index-aligned pairs, results in input order.
    pub fn evaluate_pairs<P, T>(
        &self,
        evaluator: &P,
        first: &[T],
        second: &[T],
    ) -> Result<Vec<(Objectives, Objectives)>>
    where
        P: PairEvaluator + ?Sized,
        T: Borrow<Tree> + Sync,
    {
        if first.len() != second.len() {
            return Err(GpError::Configuration(format!(
                "Cannot pair {} genotypes with {}",
                first.len(),
                second.len()
            )));
        }
        self.pool.install(|| {
            first
                .par_iter()
                .zip(second.par_iter())
                .map(|(a, b)| {
                    evaluator
                        .evaluate_pair(a.borrow(), b.borrow())
                        .map_err(GpError::Evaluation)
                })
                .collect()
        })
    }
}
