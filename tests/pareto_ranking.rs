use gpevo::config::Diversity;
use gpevo::engines::generation::individual::{Individual, Objectives};
use gpevo::engines::generation::pareto::{
    assign_ranks, crowding_distances, dominant_front, front_indices, rank_population,
    sharing_adjustments, split_fronts, ParetoFront, TOP_RANK,
};
use gpevo::engines::generation::tree::Tree;
use gpevo::types::NodeValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn individual(id: &str, primary: f64, violations: Vec<f64>) -> Individual {
    let tree = Tree::leaf(NodeValue::Sensor(id.to_string()), 3).unwrap();
    Individual::new(id.to_string(), tree, Objectives::new(primary, violations))
}

fn random_population(rng: &mut StdRng, size: usize) -> Vec<Individual> {
    (0..size)
        .map(|i| {
            individual(
                &format!("p{}", i),
                rng.gen_range(0..5) as f64,
                vec![rng.gen_range(0..4) as f64, rng.gen_range(0..4) as f64],
            )
        })
        .collect()
}

#[test]
fn test_dominance_is_irreflexive_and_asymmetric() {
    let mut rng = StdRng::seed_from_u64(31);
    let population = random_population(&mut rng, 30);
    for a in &population {
        assert!(!a.dominates(a));
        for b in &population {
            if a.dominates(b) {
                assert!(!b.dominates(a), "{} and {} dominate each other", a.id, b.id);
            }
        }
    }
}

#[test]
fn test_strictly_best_gets_top_rank() {
    let mut population = vec![
        individual("mid", 3.0, vec![2.0]),
        individual("worst", 1.0, vec![5.0]),
        individual("best", 9.0, vec![0.0]),
    ];
    assign_ranks(&mut population);

    let best = population.iter().find(|p| p.id == "best").unwrap();
    let worst = population.iter().find(|p| p.id == "worst").unwrap();
    let lowest = population.iter().map(|p| p.rank).min().unwrap();
    assert_eq!(best.rank, TOP_RANK);
    assert_eq!(best.fitness, TOP_RANK as f64);
    assert_eq!(worst.rank, lowest);
}

#[test]
fn test_ranks_never_increase_down_the_sorted_list() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut population = random_population(&mut rng, 25);
    assign_ranks(&mut population);
    for pair in population.windows(2) {
        assert!(pair[0].rank >= pair[1].rank);
        assert!(!pair[1].dominates(&pair[0]));
    }
}

#[test]
fn test_crowding_marks_front_boundaries() {
    let mut population = vec![
        individual("low", 1.0, vec![1.0]),
        individual("mid", 2.0, vec![2.0]),
        individual("high", 6.0, vec![6.0]),
    ];
    assign_ranks(&mut population);
    let fronts = front_indices(&population);
    assert_eq!(fronts.len(), 1);

    let distances = crowding_distances(&population, &fronts[0]);
    for (&idx, distance) in fronts[0].iter().zip(&distances) {
        match population[idx].id.as_str() {
            "mid" => assert!((distance - 2.0).abs() < 1e-12),
            _ => assert!(distance.is_infinite()),
        }
    }
}

#[test]
fn test_diversity_never_overturns_rank_order() {
    let mut rng = StdRng::seed_from_u64(77);
    for diversity in [Diversity::None, Diversity::Crowding, Diversity::Sharing { sigma: 2.0 }] {
        let mut population = random_population(&mut rng, 20);
        rank_population(&mut population, &diversity);
        for p in &population {
            let bonus = p.fitness - p.rank as f64;
            assert!((0.0..1.0).contains(&bonus), "{:?} gave bonus {}", diversity, bonus);
        }
    }
}

#[test]
fn test_sharing_term_is_bounded() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut population = random_population(&mut rng, 15);
    population.push(individual("twin", 1.0, vec![1.0, 1.0]));
    population.push(individual("twin2", 1.0, vec![1.0, 1.0]));
    for adjustment in sharing_adjustments(&population, 3.0) {
        assert!(adjustment > 0.0 && adjustment <= 0.5);
    }
}

#[test]
fn test_front_comparison() {
    let strong = ParetoFront {
        rank: TOP_RANK,
        individuals: vec![individual("s1", 5.0, vec![0.0]), individual("s2", 4.0, vec![0.0])],
    };
    let weak = ParetoFront {
        rank: TOP_RANK,
        individuals: vec![individual("w1", 1.0, vec![3.0])],
    };
    assert!(weak.is_outperformed_by(&strong));
    assert!(!strong.is_outperformed_by(&weak));
    assert!(!strong.is_outperformed_by(&strong.clone()));

    let best = dominant_front(vec![weak, strong]).unwrap();
    assert_eq!(best.individuals[0].id, "s1");
}

#[test]
fn test_split_fronts_partitions_population() {
    let mut rng = StdRng::seed_from_u64(19);
    let mut population = random_population(&mut rng, 18);
    assign_ranks(&mut population);
    let fronts = split_fronts(&population);
    assert_eq!(fronts.iter().map(ParetoFront::len).sum::<usize>(), population.len());
    for pair in fronts.windows(2) {
        assert!(pair[0].rank > pair[1].rank);
    }
}
