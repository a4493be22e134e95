use std::io::Cursor;

use maxent::{train_model, FileEventStream, Model, TrainingParameters};
use tracing_subscriber::EnvFilter;

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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=maxent=debug shows per-iteration progress
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Maximum Entropy Training and Evaluation Example");
    println!("===============================================\n");

    for algorithm in ["MAXENT", "MAXENT_QN"] {
        let mut params = TrainingParameters::new();
        params.set("Algorithm", algorithm)?;
        params.set("Iterations", "100")?;
        params.set("DataIndexer", "TwoPass")?;
        println!("Training parameters:\n{}", params);

        let mut stream = FileEventStream::new(Cursor::new(EVENTS));
        let model = train_model(&params, &mut stream)?;

        let model_path = std::env::temp_dir().join(format!("example_{}.bin", algorithm));
        model.save(&model_path)?;
        println!("Saved model to {}", model_path.display());

        let model = Model::load(&model_path)?;
        let contexts: [&[&str]; 4] = [&["walk"], &["clean"], &["walk", "shop"], &["swim"]];
        for context in contexts {
            let probs = model.eval(context);
            println!(
                "  {:<12} -> {:<6} {}",
                context.join(" "),
                model.best_outcome(&probs).unwrap_or("-"),
                model.all_outcomes(&probs)
            );
        }
        println!();
    }

    Ok(())
}
