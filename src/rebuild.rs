//! `copycat rebuild`: eager warm-up of a scope's model and index.

use anyhow::Result;

use crate::config::Config;
use crate::pipeline::Pipeline;

pub async fn run_rebuild(config: &Config, scope: &str) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    let snapshot = pipeline.engine.rebuild_index(scope).await;
    pipeline.close().await;
    let snapshot = snapshot?;

    println!("Rebuilt scope '{}':", scope);
    println!("  documents:  {}", snapshot.len());
    println!("  vocabulary: {}", snapshot.model.dimension());
    println!("  generation: {}", snapshot.generation);

    Ok(())
}
