use gpevo::config::{
    AppConfig, ConfigManager, ConfigSection, Diversity, EvolutionConfig, MutationPolicy,
    ObjectiveMode, ParentSelection, SurvivalSelection, SurvivalStrategy, Termination, TreeConfig,
};
use gpevo::GpError;

fn rejected(config: EvolutionConfig) -> bool {
    matches!(config.validate(), Err(GpError::Configuration(_)))
}

#[test]
fn test_defaults_are_valid() {
    assert!(AppConfig::default().validate().is_ok());
    assert_eq!(EvolutionConfig::section_name(), "evolution");
    assert_eq!(TreeConfig::section_name(), "tree");
}

#[test]
fn test_conflicting_settings_are_rejected() {
    assert!(rejected(EvolutionConfig {
        mutation_rate: Some(0.3),
        self_adaptive_mutation: true,
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        mutation_rate: None,
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        mutation_rate: Some(1.5),
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        mu: 8,
        lambda: 7,
        survival_strategy: SurvivalStrategy::Comma,
        ..Default::default()
    }));
}

#[test]
fn test_out_of_range_parameters_are_rejected() {
    assert!(rejected(EvolutionConfig { runs: 0, ..Default::default() }));
    assert!(rejected(EvolutionConfig { mu: 1, ..Default::default() }));
    assert!(rejected(EvolutionConfig { lambda: 0, ..Default::default() }));
    assert!(rejected(EvolutionConfig {
        parent_selection: ParentSelection::Tournament { k: 0 },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        parent_selection: ParentSelection::OverSelection { top_fraction: 1.0 },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        mu: 5,
        lambda: 5,
        survival_strategy: SurvivalStrategy::Comma,
        survival_selection: SurvivalSelection::Tournament { k: 6 },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        termination: Termination::EvaluationBudget { max_evaluations: 5 },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        termination: Termination::NoImprovement { generations: 0 },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        objectives: ObjectiveMode::Pareto {
            diversity: Diversity::Sharing { sigma: 0.0 },
        },
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        parsimony_coefficient: -0.1,
        ..Default::default()
    }));
    assert!(rejected(EvolutionConfig {
        worker_threads: Some(0),
        ..Default::default()
    }));
}

#[test]
fn test_tree_section_is_validated() {
    let bad = [
        TreeConfig { max_depth: 0, ..Default::default() },
        TreeConfig { sensors: Vec::new(), constant_range: None, ..Default::default() },
        TreeConfig { constant_range: Some((3.0, -3.0)), ..Default::default() },
        TreeConfig { sensors: vec!["+".to_string()], ..Default::default() },
        TreeConfig { sensors: vec!["|x".to_string()], ..Default::default() },
        TreeConfig { sensors: vec!["two words".to_string()], ..Default::default() },
    ];
    for config in bad {
        assert!(config.validate().is_err(), "{:?} should be rejected", config);
    }
}

#[test]
fn test_toml_with_tagged_algorithms() {
    let config = AppConfig::from_toml_str(
        r#"
        [evolution]
        mu = 10
        lambda = 20
        mutation_rate = 0.05
        parent_selection = { kind = "over_selection", top_fraction = 0.32 }
        survival_selection = { kind = "tournament", k = 5 }
        survival_strategy = "comma"
        termination = { kind = "no_improvement", generations = 10 }
        objectives = { mode = "pareto", diversity = { kind = "sharing", sigma = 2.5 } }

        [tree]
        max_depth = 6
        sensors = ["G", "P"]
        "#,
    )
    .unwrap();

    assert_eq!(config.evolution.mu, 10);
    assert_eq!(
        config.evolution.parent_selection,
        ParentSelection::OverSelection { top_fraction: 0.32 }
    );
    assert_eq!(config.evolution.survival_strategy, SurvivalStrategy::Comma);
    assert_eq!(config.evolution.mutation_policy().unwrap(), MutationPolicy::Fixed(0.05));
    assert!(config.evolution.is_pareto());
    assert_eq!(config.tree.sensors, vec!["G", "P"]);
    // Unset fields keep their defaults
    assert_eq!(config.tree.constant_range, Some((-10.0, 10.0)));
}

#[test]
fn test_unknown_algorithm_is_a_configuration_error() {
    let result = AppConfig::from_toml_str(
        r#"
        [evolution]
        parent_selection = { kind = "lottery" }
        "#,
    );
    assert!(matches!(result, Err(GpError::Configuration(_))));
}

#[test]
fn test_save_load_and_environment_override() {
    let path = std::env::temp_dir().join(format!("gpevo-config-{}.toml", std::process::id()));

    let manager = ConfigManager::new();
    manager
        .update(|config| {
            config.evolution.mu = 14;
            config.evolution.survival_selection = SurvivalSelection::Tournament { k: 3 };
            config.tree.sensors = vec!["dist".to_string(), "angle".to_string()];
        })
        .unwrap();
    manager.save_to_file(&path).unwrap();

    let loaded = ConfigManager::new();
    loaded.load_from_file(&path).unwrap();
    let config = loaded.get().unwrap();
    assert_eq!(config.evolution.mu, 14);
    assert_eq!(config.evolution.survival_selection, SurvivalSelection::Tournament { k: 3 });
    assert_eq!(config.tree.sensors, vec!["dist", "angle"]);

    std::env::set_var("GPEVO__EVOLUTION__LAMBDA", "33");
    let overridden = ConfigManager::new();
    let result = overridden.load_from_file(&path);
    std::env::remove_var("GPEVO__EVOLUTION__LAMBDA");
    result.unwrap();
    assert_eq!(overridden.get().unwrap().evolution.lambda, 33);

    std::fs::remove_file(&path).unwrap();
}
