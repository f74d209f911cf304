//! Pareto utilities for multi-objective evolution
//! Dominance ranking, front splitting, crowding distance and fitness sharing

use crate::config::Diversity;
use crate::engines::generation::individual::Individual;

/// Rank given to the best tier; each dominance step below it costs one
pub const TOP_RANK: i64 = 100;

/// Finite crowding distances are scaled into [0, 0.5]
const FINITE_CROWDING_SCALE: f64 = 2.0;
/// Boundary (infinite) crowding distances all land just below 1
const BOUNDARY_CROWDING: f64 = 0.99;

/// Numerator of the fitness sharing term
const SHARING_WEIGHT: f64 = 0.5;

/// Defines whether a metric should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationDirection {
    Maximize,
    Minimize,
}

/// Check if individual A dominates individual B
/// A dominates B if A is no worse than B in all objectives and strictly better in at least one
pub fn dominates(
    a_objectives: &[f64],
    b_objectives: &[f64],
    directions: &[OptimizationDirection],
) -> bool {
    if a_objectives.len() != b_objectives.len() || a_objectives.len() != directions.len() {
        return false;
    }

    let mut at_least_one_better = false;

    for i in 0..a_objectives.len() {
        let a_val = a_objectives[i];
        let b_val = b_objectives[i];

        let (a_better, b_better) = match directions[i] {
            OptimizationDirection::Maximize => (a_val > b_val, b_val > a_val),
            OptimizationDirection::Minimize => (a_val < b_val, b_val < a_val),
        };

        if b_better {
            return false;
        }

        if a_better {
            at_least_one_better = true;
        }
    }

    at_least_one_better
}

/// Order the population by dominance, best first.
///
/// Dominance is only a partial order, so this is a stable insertion sort
/// that moves an individual ahead only of neighbours it dominates. The
/// result depends on the incoming order, which ranking relies on.
pub fn dominance_sort(population: &mut [Individual]) {
    for i in 1..population.len() {
        let mut j = i;
        while j > 0 && population[j].dominates(&population[j - 1]) {
            population.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Assign dominance ranks and reset fitness to them.
///
/// After sorting, walk the list from `TOP_RANK` downwards and drop one
/// level each time an individual dominates its successor. Adjacent
/// individuals that do not dominate each other share a tier.
pub fn assign_ranks(population: &mut [Individual]) {
    dominance_sort(population);

    let mut rank = TOP_RANK;
    for i in 0..population.len() {
        population[i].rank = rank;
        population[i].fitness = rank as f64;
        if i + 1 < population.len() && population[i].dominates(&population[i + 1]) {
            rank -= 1;
        }
    }
}

/// Rank the population and layer the configured diversity term on top.
pub fn rank_population(population: &mut [Individual], diversity: &Diversity) {
    assign_ranks(population);
    match diversity {
        Diversity::None => {}
        Diversity::Crowding => apply_crowding(population),
        Diversity::Sharing { sigma } => apply_fitness_sharing(population, *sigma),
    }
}

/// Indices grouped by identical rank, best tier first.
pub fn front_indices(population: &[Individual]) -> Vec<Vec<usize>> {
    let mut ranks: Vec<i64> = population.iter().map(|p| p.rank).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    ranks.dedup();

    ranks
        .into_iter()
        .map(|rank| {
            population
                .iter()
                .enumerate()
                .filter(|(_, p)| p.rank == rank)
                .map(|(i, _)| i)
                .collect()
        })
        .collect()
}

/// A group of individuals sharing one dominance tier
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParetoFront {
    pub rank: i64,
    pub individuals: Vec<Individual>,
}

impl ParetoFront {
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Whether `other` beats this front.
    ///
    /// Every pair across the two fronts is checked for dominance, and each
    /// side's win count is averaged over its own size. `other` wins when its
    /// average is strictly higher.
    pub fn is_outperformed_by(&self, other: &ParetoFront) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && !other.is_empty();
        }
        let mut ours = 0usize;
        let mut theirs = 0usize;
        for b in &other.individuals {
            for a in &self.individuals {
                if a.dominates(b) {
                    ours += 1;
                } else if b.dominates(a) {
                    theirs += 1;
                }
            }
        }
        (ours as f64 / self.len() as f64) < (theirs as f64 / other.len() as f64)
    }
}

/// Split a ranked population into fronts, best tier first.
pub fn split_fronts(population: &[Individual]) -> Vec<ParetoFront> {
    front_indices(population)
        .into_iter()
        .map(|indices| ParetoFront {
            rank: population[indices[0]].rank,
            individuals: indices.into_iter().map(|i| population[i].clone()).collect(),
        })
        .collect()
}

/// The front no other front outperforms, earliest on ties.
pub fn dominant_front(fronts: Vec<ParetoFront>) -> Option<ParetoFront> {
    let mut best: Option<ParetoFront> = None;
    for front in fronts {
        match &best {
            Some(current) if !current.is_outperformed_by(&front) => {}
            _ => best = Some(front),
        }
    }
    best
}

/// Raw crowding distance of each front member, in `front` order.
///
/// For each objective the front is sorted on it; both ends get
/// `f64::INFINITY` and interior members add `(next - prev) / (max - min)`.
/// An objective with no spread contributes nothing to interior members.
pub fn crowding_distances(population: &[Individual], front: &[usize]) -> Vec<f64> {
    let size = front.len();
    let mut distances = vec![0.0; size];
    if size == 0 {
        return distances;
    }

    let points: Vec<Vec<f64>> = front
        .iter()
        .map(|&i| population[i].objectives.components())
        .collect();
    let num_objectives = points.iter().map(Vec::len).min().unwrap_or(0);

    for obj in 0..num_objectives {
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by(|&a, &b| points[a][obj].total_cmp(&points[b][obj]));

        distances[order[0]] = f64::INFINITY;
        distances[order[size - 1]] = f64::INFINITY;

        let min_val = points[order[0]][obj];
        let max_val = points[order[size - 1]][obj];
        let range = max_val - min_val;
        if range == 0.0 || !range.is_finite() {
            continue;
        }

        for k in 1..size.saturating_sub(1) {
            let prev_val = points[order[k - 1]][obj];
            let next_val = points[order[k + 1]][obj];
            distances[order[k]] += (next_val - prev_val) / range;
        }
    }

    distances
}

/// Map raw crowding distances below 1 without mixing the two buckets:
/// finite values scale into [0, 0.5], infinite ones become 0.99.
pub fn normalize_crowding(distances: &[f64]) -> Vec<f64> {
    let max_finite = distances
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold(0.0, f64::max);

    distances
        .iter()
        .map(|&d| {
            if d.is_infinite() {
                BOUNDARY_CROWDING
            } else if max_finite > 0.0 {
                d / (FINITE_CROWDING_SCALE * max_finite)
            } else {
                0.0
            }
        })
        .collect()
}

/// Add normalised crowding distance to each ranked individual's fitness.
pub fn apply_crowding(population: &mut [Individual]) {
    for front in front_indices(population) {
        let normalized = normalize_crowding(&crowding_distances(population, &front));
        for (&idx, bonus) in front.iter().zip(normalized) {
            population[idx].fitness += bonus;
        }
    }
}

/// Triangular sharing kernel of radius `sigma`
pub fn sharing_kernel(distance: f64, sigma: f64) -> f64 {
    if distance < sigma {
        1.0 - distance / sigma
    } else {
        0.0
    }
}

/// Sharing term per individual: `0.5 / (Σ sh(d) + 1)` over everyone else.
///
/// Crowded individuals get a smaller term; each lies in (0, 0.5].
pub fn sharing_adjustments(population: &[Individual], sigma: f64) -> Vec<f64> {
    population
        .iter()
        .enumerate()
        .map(|(i, current)| {
            let niche: f64 = population
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| sharing_kernel(current.objectives.distance(&other.objectives), sigma))
                .sum();
            SHARING_WEIGHT / (niche + 1.0)
        })
        .collect()
}

pub fn apply_fitness_sharing(population: &mut [Individual], sigma: f64) {
    let adjustments = sharing_adjustments(population, sigma);
    for (individual, adjustment) in population.iter_mut().zip(adjustments) {
        individual.fitness += adjustment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::individual::Objectives;
    use crate::engines::generation::tree::Tree;
    use crate::types::NodeValue;

    fn individual(id: &str, primary: f64, violations: Vec<f64>) -> Individual {
        let tree = Tree::leaf(NodeValue::Constant(0.0), 1).unwrap();
        Individual::new(id.to_string(), tree, Objectives::new(primary, violations))
    }

    #[test]
    fn test_dominance_maximize() {
        let directions = vec![OptimizationDirection::Maximize, OptimizationDirection::Maximize];

        assert!(dominates(&[10.0, 20.0], &[5.0, 10.0], &directions));
        assert!(dominates(&[10.0, 20.0], &[10.0, 10.0], &directions));
        assert!(!dominates(&[10.0, 5.0], &[5.0, 10.0], &directions));
        assert!(!dominates(&[10.0, 20.0], &[10.0, 20.0], &directions));
    }

    #[test]
    fn test_dominance_mixed() {
        let directions = vec![OptimizationDirection::Maximize, OptimizationDirection::Minimize];

        assert!(dominates(&[10.0, 5.0], &[5.0, 10.0], &directions));
        assert!(!dominates(&[10.0, 15.0], &[5.0, 10.0], &directions));
    }

    #[test]
    fn test_ranks_drop_on_dominance_boundaries() {
        let mut population = vec![
            individual("c", 1.0, vec![3.0]),
            individual("a", 5.0, vec![0.0]),
            individual("b", 3.0, vec![1.0]),
        ];
        assign_ranks(&mut population);

        let ids: Vec<&str> = population.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(population[0].rank, 100);
        assert_eq!(population[1].rank, 99);
        assert_eq!(population[2].rank, 98);
    }

    #[test]
    fn test_non_dominated_neighbours_share_a_tier() {
        let mut population = vec![
            individual("a", 5.0, vec![2.0]),
            individual("b", 3.0, vec![0.0]),
        ];
        assign_ranks(&mut population);
        assert_eq!(population[0].rank, population[1].rank);
        assert_eq!(front_indices(&population).len(), 1);
    }

    #[test]
    fn test_crowding_distance_boundaries_are_infinite() {
        let mut population = vec![
            individual("a", 1.0, vec![1.0]),
            individual("b", 3.0, vec![3.0]),
            individual("c", 5.0, vec![5.0]),
            individual("d", 4.0, vec![4.0]),
        ];
        assign_ranks(&mut population);
        let fronts = front_indices(&population);
        assert_eq!(fronts.len(), 1);

        let raw = crowding_distances(&population, &fronts[0]);
        for (&idx, d) in fronts[0].iter().zip(&raw) {
            let id = population[idx].id.as_str();
            if id == "a" || id == "c" {
                assert!(d.is_infinite());
            } else {
                assert!(d.is_finite());
            }
        }
    }

    #[test]
    fn test_normalized_crowding_stays_below_one() {
        let normalized = normalize_crowding(&[f64::INFINITY, 0.5, 1.0, f64::INFINITY]);
        assert_eq!(normalized, vec![0.99, 0.25, 0.5, 0.99]);
    }

    #[test]
    fn test_sharing_kernel() {
        assert_eq!(sharing_kernel(0.0, 10.0), 1.0);
        assert_eq!(sharing_kernel(5.0, 10.0), 0.5);
        assert_eq!(sharing_kernel(10.0, 10.0), 0.0);
    }

    #[test]
    fn test_isolated_individual_gets_full_sharing_term() {
        let population = vec![
            individual("a", 0.0, vec![0.0]),
            individual("b", 100.0, vec![100.0]),
        ];
        assert_eq!(sharing_adjustments(&population, 15.0), vec![0.5, 0.5]);
    }
}
