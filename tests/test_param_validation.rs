use maxent::train::{Algorithm, IndexingPasses};
use maxent::TrainingParameters;

#[test]
fn test_l1_negative_validation() {
    let mut params = TrainingParameters::new();

    // L1Cost must be non-negative
    let result = params.set("L1Cost", "-1.0");
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "invalid configuration: c1 must be non-negative"
    );

    // L1Cost = 0.0 should be allowed
    assert!(params.set("L1Cost", "0.0").is_ok());

    // L1Cost > 0.0 should be allowed
    assert!(params.set("L1Cost", "1.0").is_ok());
    assert_eq!(params.qn_params().c1(), 1.0);
}

#[test]
fn test_l2_negative_validation() {
    let mut params = TrainingParameters::new();

    let result = params.set("L2Cost", "-1.0");
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "invalid configuration: c2 must be non-negative"
    );

    assert!(params.set("L2Cost", "0.0").is_ok());
    assert!(params.set("L2Cost", "1.0").is_ok());
    assert_eq!(params.qn_params().c2(), 1.0);
}

#[test]
fn test_epsilon_validation() {
    let mut params = TrainingParameters::new();

    assert!(params.set("Epsilon", "0.0").is_ok());

    let result = params.set("Epsilon", "-0.001");
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "invalid configuration: epsilon must be non-negative"
    );

    assert!(params.set("Epsilon", "0.001").is_ok());
    assert!(params.set("Epsilon", "1e-5").is_ok());
    assert_eq!(params.qn_params().epsilon(), 1e-5);
}

#[test]
fn test_gis_parameter_validation() {
    let mut params = TrainingParameters::new();

    assert!(params.set("Threads", "0").is_err());
    assert!(params.set("Threads", "4").is_ok());
    assert_eq!(params.gis_params().threads(), 4);

    assert!(params.set("SmoothingObservation", "0").is_err());
    assert!(params.set("SmoothingObservation", "-0.1").is_err());
    assert!(params.set("SmoothingObservation", "0.05").is_ok());
    assert_eq!(params.gis_params().smoothing_observation(), 0.05);

    assert!(params.set("Iterations", "0").is_err());
    assert!(params.set("Iterations", "250").is_ok());
    assert_eq!(params.gis_params().iterations(), 250);
    assert_eq!(params.qn_params().max_iterations(), 250);
}

#[test]
fn test_invalid_parameter_values() {
    let mut params = TrainingParameters::new();

    // Invalid number format
    assert!(params.set("L1Cost", "not_a_number").is_err());
    assert!(params.set("L2Cost", "abc").is_err());
    assert!(params.set("Epsilon", "xyz").is_err());
    assert!(params.set("Cutoff", "-1").is_err());
    assert!(params.set("Threads", "not_an_int").is_err());
    assert!(params.set("Smoothing", "maybe").is_err());
}

#[test]
fn test_unknown_parameter() {
    let mut params = TrainingParameters::new();

    let result = params.set("unknown_param", "1.0");
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("unknown parameter")
    );

    // keys are case-sensitive
    assert!(params.set("cutoff", "1").is_err());
}

#[test]
fn test_defaults() {
    let params = TrainingParameters::new();
    assert_eq!(params.algorithm(), Algorithm::Maxent);
    assert_eq!(params.indexer_config().cutoff, 0);
    assert!(params.indexer_config().sort);
    assert_eq!(params.indexer_config().passes, IndexingPasses::OnePass);
    assert!(!params.indexer_config().real_valued);
    assert_eq!(params.gis_params().iterations(), 100);
    assert_eq!(params.qn_params().c2(), 0.1);
    assert_eq!(params.to_string(), "");
}

#[test]
fn test_algorithm_names() {
    assert_eq!("MAXENT".parse::<Algorithm>().unwrap(), Algorithm::Maxent);
    assert_eq!("MAXENT_QN".parse::<Algorithm>().unwrap(), Algorithm::MaxentQn);
    assert_eq!(Algorithm::MaxentQn.as_str(), "MAXENT_QN");
    assert!("maxent".parse::<Algorithm>().is_err());
}
