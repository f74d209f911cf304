use gpevo::engines::generation::individual::{Individual, Objectives};
use gpevo::engines::generation::operators::{
    fitness_proportional, fitness_proportional_without_replacement, over_selection,
    stochastic_uniform_sampling, tournament_with_replacement, tournament_without_replacement,
    truncation, uniform_random, uniform_with_replacement,
};
use gpevo::engines::generation::tree::Tree;
use gpevo::types::NodeValue;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn population(fitness: &[f64]) -> Vec<Individual> {
    fitness
        .iter()
        .enumerate()
        .map(|(i, &f)| {
            let tree = Tree::leaf(NodeValue::Constant(i as f64), 2).unwrap();
            Individual::new(format!("ind{}", i), tree, Objectives::scalar(f))
        })
        .collect()
}

#[test]
fn test_truncation_keeps_top_two_in_order() {
    let population = population(&[1.0, 2.0, 3.0, 4.0]);
    let survivors: Vec<f64> = truncation(&population, 2)
        .into_iter()
        .map(|i| population[i].fitness)
        .collect();
    assert_eq!(survivors, vec![4.0, 3.0]);
}

#[test]
fn test_truncation_breaks_ties_by_position() {
    let population = population(&[2.0, 5.0, 2.0, 5.0]);
    assert_eq!(truncation(&population, 3), vec![1, 3, 0]);
}

#[test]
fn test_operators_fill_their_quota() {
    let mut rng = StdRng::seed_from_u64(11);
    let population = population(&[0.5, 3.0, 1.0, 2.5, 4.0, 0.0]);

    assert_eq!(fitness_proportional(&population, 40, &mut rng).len(), 40);
    assert_eq!(stochastic_uniform_sampling(&population, 40, &mut rng).len(), 40);
    assert_eq!(tournament_with_replacement(&population, 3, 40, &mut rng).len(), 40);
    assert_eq!(uniform_with_replacement(population.len(), 40, &mut rng).len(), 40);
    assert_eq!(over_selection(&population, 0.3, 40, &mut rng).len(), 40);
    assert_eq!(tournament_without_replacement(&population, 2, 4, &mut rng).len(), 4);
}

#[test]
fn test_without_replacement_never_repeats() {
    let mut rng = StdRng::seed_from_u64(5);
    let population = population(&[1.0, 2.0, 3.0, 4.0, 5.0]);

    let uniform = uniform_random(&population, 10, &mut rng);
    assert_eq!(uniform.len(), 5);
    assert_eq!(uniform.iter().collect::<HashSet<_>>().len(), 5);

    let wheel = fitness_proportional_without_replacement(&population, 3, &mut rng);
    assert_eq!(wheel.len(), 3);
    assert_eq!(wheel.iter().collect::<HashSet<_>>().len(), 3);
}

#[test]
fn test_all_zero_fitness_is_tolerated() {
    let mut rng = StdRng::seed_from_u64(1);
    let population = population(&[0.0, 0.0, 0.0]);

    let roulette = fitness_proportional(&population, 9, &mut rng);
    assert_eq!(roulette.len(), 9);
    assert!(roulette.iter().all(|&i| i < 3));

    let survivors = fitness_proportional_without_replacement(&population, 2, &mut rng);
    assert_eq!(survivors.len(), 2);
}

#[test]
fn test_zero_fitness_is_never_drawn_by_roulette() {
    let mut rng = StdRng::seed_from_u64(23);
    let population = population(&[0.0, 1.0, 0.0, 3.0]);
    let chosen = fitness_proportional(&population, 200, &mut rng);
    assert!(chosen.iter().all(|&i| i == 1 || i == 3));
}

#[test]
fn test_full_tournament_always_returns_the_best() {
    let mut rng = StdRng::seed_from_u64(2);
    let population = population(&[3.0, 9.0, 1.0]);
    let chosen = tournament_without_replacement(&population, 3, 5, &mut rng);
    assert_eq!(chosen, vec![1; 5]);
}
