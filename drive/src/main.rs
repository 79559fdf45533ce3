use anyhow::Result;
use clap::{Parser, Subcommand};
use drive::{build_index, run_match, run_search, run_similar, FileSource, Reference};
use serde::Serialize;
use sift_core::EngineConfig;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Populate an in-memory index from policy/standard records and query it", long_about = None)]
struct Cli {
    /// Input path (.json/.jsonl file or a directory of them)
    #[arg(long, global = true, default_value = "./data")]
    input: String,
    /// Engine configuration (JSON); defaults apply to anything it leaves out
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a keyword query
    Search {
        #[arg(long, default_value = "text:lorem")]
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Find documents similar to a stored document or to free text
    Similar {
        /// Key of the reference document, e.g. policy:12
        #[arg(long, required_unless_present = "text", conflicts_with = "text")]
        key: Option<String>,
        /// Reference text
        #[arg(long)]
        text: Option<String>,
        #[arg(long, value_delimiter = ',', default_value = "text,comments,guidance")]
        fields: Vec<String>,
        #[arg(long)]
        exclude_category: Option<String>,
        #[arg(long)]
        min_doc_freq: Option<u32>,
        #[arg(long)]
        min_term_freq: Option<u32>,
        #[arg(long)]
        max_query_terms: Option<usize>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// For every document of one category, list the closest documents of another
    Match {
        #[arg(long, default_value = "policy")]
        from: String,
        #[arg(long, default_value = "standard")]
        to: String,
        #[arg(long, value_delimiter = ',', default_value = "text,comments,guidance")]
        fields: Vec<String>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

fn print<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let index = build_index(&FileSource::new(&cli.input), &config)?;

    match cli.command {
        Commands::Search { query, limit } => print(&run_search(&index, &config, &query, limit)?),
        Commands::Similar { key, text, fields, exclude_category, min_doc_freq, min_term_freq, max_query_terms, limit } => {
            let mlt = &mut config.more_like_this;
            if let Some(v) = min_doc_freq { mlt.min_doc_freq = v; }
            if let Some(v) = min_term_freq { mlt.min_term_freq = v; }
            if let Some(v) = max_query_terms { mlt.max_query_terms = v; }
            config.validate()?;
            let reference = match (key, text) {
                (Some(key), _) => Reference::Key(key),
                (None, Some(text)) => Reference::Text(text),
                (None, None) => anyhow::bail!("either --key or --text is required"),
            };
            print(&run_similar(&index, &config, &reference, &fields, exclude_category.as_deref(), limit)?)
        }
        Commands::Match { from, to, fields, limit } => print(&run_match(&index, &config, &from, &to, &fields, limit)?),
    }
}
