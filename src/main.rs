use anyhow::Context;
use clap::{Parser, Subcommand};
use cinex_core::{EntityRecord, VectorComposer};
use cinex_search::{HashingEncoder, ScoredEntity, SearchConfig, SearchState};
use cinex_storage::{EntitySource, InMemorySource, IndexStore, JsonLinesSource, LmdbSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Composite-vector similarity search over a movie corpus
#[derive(Parser, Debug)]
#[command(name = "cinex")]
#[command(about = "Find similar movies, search by description, resolve titles", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the persisted index and metadata
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Entity source: a JSON-lines file or an LMDB directory
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the index from the source and persist it
    Build,

    /// List the movies most similar to a movie
    Similar {
        id: u64,
        #[arg(short)]
        k: Option<usize>,
    },

    /// Show one movie
    Get { id: u64 },

    /// Rank movies by how well their overview matches a description
    Describe {
        text: String,
        #[arg(short)]
        k: Option<usize>,
    },

    /// Find the ID of a movie by (approximate) title
    Resolve {
        title: String,
        #[arg(long)]
        cutoff: Option<u8>,
    },

    /// Load a JSON-lines export into an LMDB source
    Import { input: PathBuf, lmdb_dir: PathBuf },
}

fn load_config(args: &Args) -> anyhow::Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::from_file(path)
            .with_context(|| format!("failed to read config {:?}", path))?,
        None => SearchConfig::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_source(path: Option<&Path>) -> anyhow::Result<Box<dyn EntitySource>> {
    match path {
        Some(path) if path.is_dir() => {
            let source = LmdbSource::new(path)
                .with_context(|| format!("failed to open LMDB source {:?}", path))?;
            Ok(Box::new(source))
        }
        Some(path) => Ok(Box::new(JsonLinesSource::new(path))),
        None => Ok(Box::new(InMemorySource::default())),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn print_entity(rank: usize, entity: &EntityRecord, score: Option<f32>) {
    println!("{}. {} (ID: {})", rank, entity.title, entity.id);
    println!("   Rating: {}/10", entity.vote_average);
    if let Some(score) = score {
        println!("   Similarity: {:.3}", score);
    }
    println!("   Overview: {}...", truncate(&entity.overview, 100));
    println!();
}

fn print_results(results: &[ScoredEntity]) {
    for (i, hit) in results.iter().enumerate() {
        print_entity(i + 1, &hit.entity, Some(hit.score));
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cinex v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    info!("Data directory: {:?}", config.data_dir);

    if let Command::Import { input, lmdb_dir } = &args.command {
        let records = JsonLinesSource::new(input).read_all()?;
        let target = LmdbSource::new(lmdb_dir)
            .with_context(|| format!("failed to open LMDB directory {:?}", lmdb_dir))?;
        let written = target.put_batch(&records)?;
        println!("Imported {} records into {:?}", written, lmdb_dir);
        return Ok(());
    }

    let source = open_source(args.source.as_deref())?;

    if let Command::Build = &args.command {
        let composer = Arc::new(VectorComposer::new(config.composer.clone())?);
        let store = IndexStore::new(config.artifact_paths(), composer);
        let snapshot = store.build(source.as_ref())?;
        store.persist(&snapshot)?;
        println!(
            "Built index with {} movies (build {})",
            snapshot.len(),
            snapshot.header().build_id
        );
        return Ok(());
    }

    let encoder = Arc::new(HashingEncoder::new(config.composer.embedding_dim));
    let state = SearchState::open(config, source.as_ref(), encoder).with_context(|| {
        match &args.source {
            Some(path) => format!("could not load or build the index from {:?}", path),
            None => "no usable persisted index and no --source to build one from".to_string(),
        }
    })?;

    match args.command {
        Command::Similar { id, k } => {
            let k = k.unwrap_or(state.config().similar_k);
            let results = state.find_by_similarity(id, k)?;
            if results.is_empty() {
                println!("No similar movies found.");
            } else {
                println!("Found {} similar movies to movie ID {}:\n", results.len(), id);
                print_results(&results);
            }
        }
        Command::Get { id } => {
            let entity = state.find_by_id(id)?;
            println!("Found movie with movie ID {}:\n", id);
            print_entity(1, &entity, None);
        }
        Command::Describe { text, k } => {
            let k = k.unwrap_or(state.config().description_k);
            let results = state.find_by_description(&text, k)?;
            if results.is_empty() {
                println!("No similar movies found.");
            } else {
                println!("Found {} movies matching your description:\n", results.len());
                print_results(&results);
            }
        }
        Command::Resolve { title, cutoff } => {
            let id = match cutoff {
                Some(cutoff) => state.resolve_title_with_cutoff(&title, cutoff)?,
                None => state.resolve_title(&title)?,
            };
            let entity = state.find_by_id(id)?;
            println!("Found: {} (ID: {})", entity.title, id);
        }
        Command::Build | Command::Import { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("héllo wörld", 4), "héll");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["cinex", "--source", "movies.jsonl", "similar", "27205", "-k", "3"]);
        assert_eq!(args.source, Some(PathBuf::from("movies.jsonl")));
        assert!(matches!(args.command, Command::Similar { id: 27205, k: Some(3) }));

        let args = Args::parse_from(["cinex", "resolve", "Inception", "--cutoff", "80"]);
        assert!(matches!(args.command, Command::Resolve { cutoff: Some(80), .. }));
    }
}
