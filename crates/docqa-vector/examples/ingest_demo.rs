use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use docqa_core::config::Config;
use docqa_embed::HashEmbedder;
use docqa_text::DocumentProcessor;
use docqa_vector::{IngestPipeline, LanceConnector, VectorStorageManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <docs_dir> <query> [--limit N] [--keywords a,b]", args[0]);
        eprintln!("Example: {} ./notes 'battery maintenance' --limit 3 --keywords battery,charge", args[0]);
        std::process::exit(1);
    }
    let docs_dir = PathBuf::from(&args[1]);
    let query = &args[2];
    let mut limit = 5usize;
    let mut keywords: Vec<String> = Vec::new();
    let mut i = 3;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--limit", Some(n)) => {
                limit = n.parse()?;
                i += 1;
            }
            ("--keywords", Some(list)) => {
                keywords = list.split(',').map(str::to_string).collect();
                i += 1;
            }
            (flag, _) => anyhow::bail!("unexpected argument {flag}"),
        }
        i += 1;
    }

    let config = Config::load()?;
    let storage = config.storage()?;
    let embedder = Arc::new(HashEmbedder::new(storage.vector_size));
    let connector = LanceConnector::new(&storage.uri);
    let manager = VectorStorageManager::new(storage, connector)?;
    let processor = DocumentProcessor::new(config.processor()?)?;
    let pipeline = IngestPipeline::open(processor, embedder, manager).await?;

    let report = pipeline.ingest_directory(&docs_dir).await?;
    println!("Ingested {} chunks ({} added, {} failed)", report.chunks, report.added, report.failed);

    let results = if keywords.is_empty() {
        pipeline.query(query, limit, None).await?
    } else {
        pipeline.hybrid_query(query, &keywords, Default::default(), limit).await?
    };
    println!("\nFound {} results for \"{}\"", results.len(), query);
    for (rank, hit) in results.iter().enumerate() {
        let source = hit.metadata.get("document_id").and_then(|v| v.as_str()).unwrap_or("-");
        println!("\n  {}. score={:.4}  id={}  document={}", rank + 1, hit.score, hit.id, source);
        println!("     {}", hit.content.replace('\n', " "));
    }

    let stats = pipeline.manager().get_collection_stats().await?;
    println!("\nCollection: {} points, status {:?}", stats.points_count, stats.status);
    Ok(())
}
