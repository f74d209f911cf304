use gpevo::config::ConfigManager;
use gpevo::engines::generation::{
    ConsoleProgressCallback, EvolutionEngine, Objectives, SensorBindings, Tree,
};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Samples of the curve the demo tries to rediscover
fn target(x: f64) -> f64 {
    x * x + 2.0 * x - 1.0
}

/// Negative mean absolute error over a fixed grid, every sensor reads x
fn regression_error(tree: &Tree, sensors: &[String]) -> anyhow::Result<Objectives> {
    let mut rng = StdRng::seed_from_u64(0);
    let mut total = 0.0;
    let samples: Vec<f64> = (-10..=10).map(|i| i as f64 / 2.0).collect();
    for &x in &samples {
        let bindings: SensorBindings = sensors.iter().map(|s| (s.as_str(), x)).collect();
        let y = tree.evaluate(&bindings, &mut rng)?;
        total += (y - target(x)).abs();
    }
    let error = total / samples.len() as f64;
    if error.is_finite() {
        Ok(Objectives::scalar(-error))
    } else {
        Ok(Objectives::scalar(f64::MIN))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    if let Some(path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", path);
        manager.load_from_file(&path)?;
    }
    let config = manager.get()?;

    let sensors = config.tree.sensors.clone();
    let evaluator = move |tree: &Tree| regression_error(tree, &sensors);
    let mut engine = EvolutionEngine::from_app_config(&config, evaluator)?;
    info!("Evaluating on {} worker threads", engine.worker_threads());

    let report = engine.run(&mut ConsoleProgressCallback::new(10))?;

    println!("Best individual: {}", report.best);
    println!("{}", report.best_tree_text());
    for record in report.generation_log() {
        println!(
            "{}\t{}\t{:.6}\t{:.6}",
            record.run, record.evaluations, record.average_primary, record.best_primary
        );
    }
    Ok(())
}
