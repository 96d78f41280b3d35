use anyhow::{Context, Result};
use lorekeeper::{EngineConfig, LearnOutcome, LearningEngine};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CATEGORY: &str = "general";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(Path::new(&path))
            .with_context(|| format!("failed to read config {}", path))?,
        None => EngineConfig::default(),
    };

    tracing::info!("Starting knowledge engine. Data dir: {}", config.data_dir.display());
    let mut engine = LearningEngine::new(config)?;
    engine.initialize().await?;

    println!("Enter '<category>: <text>' to learn. Commands: stats, query <category> [threshold], recent, save [path], load [path], quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        handle_line(&engine, line).await?;
    }

    engine.shutdown().await?;
    Ok(())
}

async fn handle_line(engine: &LearningEngine, line: &str) -> Result<()> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("stats") => {
            println!("{}", serde_json::to_string_pretty(&engine.stats().await)?);
        }
        Some("recent") => {
            for item in engine.recent().await {
                println!("{}  {}", item.key, item.content);
            }
        }
        Some("query") => {
            let category = words.next().unwrap_or(DEFAULT_CATEGORY);
            let records = match words.next().map(str::parse::<f64>) {
                Some(Ok(threshold)) => engine.query(category, threshold).await,
                Some(Err(e)) => {
                    println!("bad threshold: {}", e);
                    return Ok(());
                }
                None => engine.query_default(category).await,
            };
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some("save") => match engine.save(words.next().map(Path::new)).await {
            Ok(path) => println!("saved to {}", path.display()),
            Err(e) => println!("save failed: {}", e),
        },
        Some("load") => {
            let path = words.next().map(PathBuf::from);
            match engine.load(path.as_deref()).await {
                Ok(outcome) => println!("{:?}", outcome),
                Err(e) => println!("load failed: {}", e),
            }
        }
        _ => {
            let (category, text) = match line.split_once(':') {
                Some((c, t)) if !c.trim().is_empty() && !c.contains(' ') => (c.trim(), t.trim()),
                _ => (DEFAULT_CATEGORY, line),
            };
            let outcome = LearnOutcome::from(engine.learn(Value::String(text.to_string()), category).await);
            println!("{}", serde_json::to_string(&outcome)?);
        }
    }
    Ok(())
}
