//! Parent and survival selection.
//!
//! Every operator returns indices into the population it was given, so the
//! caller decides whether to clone, move, or just inspect the winners. Ties
//! always go to the individual met first in iteration order.

use crate::engines::generation::individual::{compare_fitness, Scored};
use log::warn;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index::sample;
use rand::Rng;
use std::cmp::Ordering;

/// Selection weights: fitness clamped at zero, `None` when they sum to zero.
fn weights<T: Scored>(population: &[T]) -> Option<Vec<f64>> {
    let weights: Vec<f64> = population.iter().map(|p| p.fitness().max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        Some(weights)
    } else {
        None
    }
}

/// Index of the fittest candidate, first one wins ties.
fn fittest<T: Scored>(population: &[T], candidates: impl IntoIterator<Item = usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for idx in candidates {
        let better = match best {
            Some(b) => compare_fitness(population[idx].fitness(), population[b].fitness()) == Ordering::Greater,
            None => true,
        };
        if better {
            best = Some(idx);
        }
    }
    best
}

/// Indices sorted by descending fitness, stable for ties, NaN last.
pub fn sort_descending<T: Scored>(population: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| compare_fitness(population[b].fitness(), population[a].fitness()));
    order
}

/// Uniform draws with replacement
pub fn uniform_with_replacement<R: Rng>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    (0..count).map(|_| rng.gen_range(0..len)).collect()
}

/// Uniform draws without replacement, capped at the population size
pub fn uniform_random<T, R: Rng>(population: &[T], count: usize, rng: &mut R) -> Vec<usize> {
    let amount = count.min(population.len());
    sample(rng, population.len(), amount).into_vec()
}

/// Roulette wheel: probability proportional to fitness, with replacement.
///
/// A zero fitness sum falls back to uniform sampling.
pub fn fitness_proportional<T: Scored, R: Rng>(
    population: &[T],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    match weights(population).and_then(|w| WeightedIndex::new(w).ok()) {
        Some(wheel) => (0..count).map(|_| wheel.sample(rng)).collect(),
        None => {
            warn!("Fitness sum is zero, falling back to uniform selection");
            uniform_with_replacement(population.len(), count, rng)
        }
    }
}

/// Roulette wheel without replacement: every winner leaves the wheel.
///
/// Once the remaining fitness sums to zero the rest is drawn uniformly.
pub fn fitness_proportional_without_replacement<T: Scored, R: Rng>(
    population: &[T],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..population.len()).collect();
    let mut chosen = Vec::with_capacity(count.min(population.len()));

    while chosen.len() < count && !remaining.is_empty() {
        let wheel = remaining
            .iter()
            .map(|&i| population[i].fitness().max(0.0))
            .collect::<Vec<_>>();
        let pick = match WeightedIndex::new(&wheel) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..remaining.len()),
        };
        chosen.push(remaining.remove(pick));
    }
    chosen
}

/// Stochastic universal sampling: one random offset, then `count` equally
/// spaced pointers over the cumulative probabilities.
pub fn stochastic_uniform_sampling<T: Scored, R: Rng>(
    population: &[T],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let weights = match weights(population) {
        Some(w) => w,
        None => {
            warn!("Fitness sum is zero, falling back to uniform selection");
            return uniform_with_replacement(population.len(), count, rng);
        }
    };
    if count == 0 {
        return Vec::new();
    }

    let total: f64 = weights.iter().sum();
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    for w in &weights {
        running += w / total;
        cumulative.push(running);
    }
    // Float drift must not leave the last pointer past the end
    if let Some(last) = cumulative.last_mut() {
        *last = 1.0;
    }

    let step = 1.0 / count as f64;
    let mut pointer = rng.gen::<f64>() * step;
    let mut chosen = Vec::with_capacity(count);
    let mut i = 0;
    while chosen.len() < count && i < cumulative.len() {
        while chosen.len() < count && pointer < cumulative[i] {
            chosen.push(i);
            pointer += step;
        }
        i += 1;
    }
    chosen
}

/// k-tournament where each tournament draws its k entrants with replacement.
pub fn tournament_with_replacement<T: Scored, R: Rng>(
    population: &[T],
    k: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    if population.is_empty() {
        return Vec::new();
    }
    (0..count)
        .filter_map(|_| {
            let entrants = uniform_with_replacement(population.len(), k.max(1), rng);
            fittest(population, entrants)
        })
        .collect()
}

/// k-tournament where each tournament draws k distinct entrants.
pub fn tournament_without_replacement<T: Scored, R: Rng>(
    population: &[T],
    k: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    if population.is_empty() {
        return Vec::new();
    }
    let k = k.clamp(1, population.len());
    (0..count)
        .filter_map(|_| {
            let entrants = sample(rng, population.len(), k);
            fittest(population, entrants.into_iter())
        })
        .collect()
}

/// The top `count` individuals by fitness, best first.
pub fn truncation<T: Scored>(population: &[T], count: usize) -> Vec<usize> {
    let mut order = sort_descending(population);
    order.truncate(count);
    order
}

/// Over-selection: 80% of the draws come from the fittest `top_fraction` of
/// the population, the remaining 20% from everyone else, with replacement.
pub fn over_selection<T: Scored, R: Rng>(
    population: &[T],
    top_fraction: f64,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let order = sort_descending(population);
    if order.len() < 2 {
        return uniform_with_replacement(order.len(), count, rng);
    }
    let split = ((order.len() as f64 * top_fraction).round() as usize).clamp(1, order.len() - 1);
    let (top, bottom) = order.split_at(split);

    let from_top = ((count as f64) * 0.8).round() as usize;
    let mut chosen: Vec<usize> = uniform_with_replacement(top.len(), from_top, rng)
        .into_iter()
        .map(|i| top[i])
        .collect();
    chosen.extend(
        uniform_with_replacement(bottom.len(), count - from_top, rng)
            .into_iter()
            .map(|i| bottom[i]),
    );
    chosen
}
