use std::io::Write;

use maxent::train::Algorithm;
use maxent::{train_model, FileEventStream, Model, TrainingParameters};

const EVENTS: &str = "\
sunny walk shop
sunny walk
sunny walk clean
rainy shop clean
rainy walk clean
rainy clean shop
sunny walk shop
rainy clean
";

const REAL_VALUED_EVENTS: &str = "\
sunny walk=1.0 shop=0.5
sunny walk=1.0
sunny walk=1.0 clean=0.5
rainy shop=0.5 clean=0.5
rainy walk=0.5 clean=1.0
rainy clean=1.0 shop=0.1
sunny walk=1.0 shop=0.5
rainy clean=1.0
";

fn event_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_train_save_load_predict() {
    let events = event_file(EVENTS);
    let properties = "\
Algorithm=MAXENT
Iterations=100
Cutoff=1
DataIndexer=TwoPass
Threads=2
";
    let params = TrainingParameters::from_properties(properties).unwrap();
    let mut stream = FileEventStream::open(events.path(), false).unwrap();
    let model = train_model(&params, &mut stream).unwrap();

    // Use NamedTempFile for automatic cleanup on panic
    let model_file = tempfile::NamedTempFile::new().unwrap();
    model.save(model_file.path()).unwrap();
    let model = Model::load(model_file.path()).unwrap();

    // Verify model metadata
    assert_eq!(model.num_outcomes(), 2);
    assert_eq!(model.num_predicates(), 3);
    assert_eq!(model.index_of("sunny"), Some(0));
    assert_eq!(model.index_of("rainy"), Some(1));
    assert_eq!(model.outcome(1), Some("rainy"));
    assert!(model.context("walk").is_some());
    assert!(model.context("swim").is_none());

    // Test prediction on training data (should be accurate)
    let mut correct = 0;
    for line in EVENTS.lines() {
        let mut fields = line.split_whitespace();
        let outcome = fields.next().unwrap();
        let context: Vec<&str> = fields.collect();
        let probs = model.eval(&context);
        if model.best_outcome(&probs) == Some(outcome) {
            correct += 1;
        }
    }
    assert!(correct >= 6, "only {} of 8 events predicted", correct);
}

#[test]
fn test_real_valued_qn_from_file() {
    let events = event_file(REAL_VALUED_EVENTS);
    let mut params = TrainingParameters::new();
    params.set("Algorithm", Algorithm::MaxentQn.as_str()).unwrap();
    params.set("RealValued", "true").unwrap();
    params.set("L2Cost", "1.0").unwrap();
    let mut stream = FileEventStream::open(events.path(), true).unwrap();
    let model = train_model(&params, &mut stream).unwrap();

    let mut buf = Vec::new();
    model.write(&mut buf).unwrap();
    let model = Model::from_bytes(&buf).unwrap();

    let probs = model.eval_with_values(&["walk"], &[1.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), Some("sunny"));
    let probs = model.eval_with_values(&["clean"], &[1.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), Some("rainy"));

    let mut dump = Vec::new();
    model.dump(&mut dump).unwrap();
    let dump = String::from_utf8(dump).unwrap();
    assert!(dump.contains("kind: QN"));
    assert!(dump.contains("walk --> sunny"));
}
