use maxent::train::LineSearchAlgorithm;
use maxent::{DataIndexer, Event, IndexerConfig, Model, ModelKind, Trainer};

fn weather() -> Vec<Event> {
    vec![
        Event::new("sunny", ["walk", "shop"]),
        Event::new("sunny", ["walk"]),
        Event::new("sunny", ["walk", "clean"]),
        Event::new("rainy", ["shop", "clean"]),
        Event::new("rainy", ["walk", "clean"]),
        Event::new("rainy", ["clean", "shop"]),
        Event::new("sunny", ["walk", "shop"]),
        Event::new("rainy", ["clean"]),
    ]
}

/// Every predicate occurs with every outcome and no outcome can be
/// predicted with certainty
fn overlapping() -> Vec<Event> {
    let mut events = Vec::new();
    let mut push = |outcome: &str, context: &[&str], times: usize| {
        for _ in 0..times {
            events.push(Event::new(outcome, context.iter().copied()));
        }
    };
    push("A", &["x", "y"], 3);
    push("B", &["x", "y"], 1);
    push("A", &["x", "z"], 1);
    push("B", &["x", "z"], 2);
    push("A", &["y"], 1);
    push("B", &["y"], 1);
    push("A", &["z"], 1);
    push("B", &["z"], 1);
    events
}

fn weight_norm(model: &Model) -> f64 {
    model
        .contexts()
        .iter()
        .flat_map(|c| c.parameters())
        .map(|w| w * w)
        .sum::<f64>()
        .sqrt()
}

#[test]
fn test_qn_weather() {
    let model = Trainer::qn()
        .with_c2(1.0)
        .unwrap()
        .train_events(weather(), IndexerConfig::default())
        .unwrap();
    assert_eq!(model.kind(), ModelKind::Qn);
    assert!(model.correction().is_none());

    let probs = model.eval(&["walk"]);
    assert_eq!(model.best_outcome(&probs), Some("sunny"));
    let probs = model.eval(&["clean"]);
    assert_eq!(model.best_outcome(&probs), Some("rainy"));
}

#[test]
fn test_gis_and_qn_agree() {
    let corpus = DataIndexer::default().index_events(overlapping()).unwrap();
    let gis = Trainer::gis()
        .with_iterations(3000)
        .unwrap()
        .train(&corpus)
        .unwrap();
    let qn = Trainer::qn()
        .with_c2(0.0)
        .unwrap()
        .with_max_iterations(500)
        .unwrap()
        .train(&corpus)
        .unwrap();

    let contexts: [&[&str]; 5] = [&["x", "y"], &["x", "z"], &["y"], &["z"], &["x"]];
    for context in contexts {
        let p = gis.eval(context);
        let q = qn.eval(context);
        for (a, b) in p.iter().zip(&q) {
            assert!((a - b).abs() < 0.01, "{:?}: GIS {:?} QN {:?}", context, p, q);
        }
    }
}

#[test]
fn test_l2_shrinks_weights() {
    let corpus = DataIndexer::default().index_events(weather()).unwrap();
    let loose = Trainer::qn().with_c2(0.01).unwrap().train(&corpus).unwrap();
    let tight = Trainer::qn().with_c2(10.0).unwrap().train(&corpus).unwrap();
    assert!(weight_norm(&tight) < weight_norm(&loose));
}

#[test]
fn test_line_search_variants() {
    let corpus = DataIndexer::default().index_events(weather()).unwrap();
    for linesearch in [
        LineSearchAlgorithm::MoreThuente,
        LineSearchAlgorithm::BacktrackingWolfe,
        LineSearchAlgorithm::BacktrackingStrongWolfe,
    ] {
        let model = Trainer::qn()
            .with_linesearch(linesearch)
            .train(&corpus)
            .unwrap();
        let probs = model.eval(&["walk"]);
        assert_eq!(model.best_outcome(&probs), Some("sunny"), "{:?}", linesearch);
    }
}

#[test]
fn test_real_valued_qn() {
    let events = vec![
        Event::with_values("hot", ["temp"], vec![3.0]).unwrap(),
        Event::with_values("hot", ["temp"], vec![2.5]).unwrap(),
        Event::with_values("cold", ["temp"], vec![-2.0]).unwrap(),
        Event::with_values("cold", ["temp"], vec![-3.0]).unwrap(),
    ];
    let config = IndexerConfig::default().with_real_values(true);
    let model = Trainer::qn().train_events(events, config).unwrap();
    let probs = model.eval_with_values(&["temp"], &[2.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), Some("hot"));
    let probs = model.eval_with_values(&["temp"], &[-2.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), Some("cold"));
}

#[test]
fn test_invalid_params() {
    assert!(Trainer::qn().with_c1(-0.1).is_err());
    assert!(Trainer::qn().with_c2(f64::NAN).is_err());
    assert!(Trainer::qn().with_max_iterations(0).is_err());
    assert!(Trainer::qn().with_epsilon(-1.0).is_err());
}
