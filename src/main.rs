use anyhow::{bail, Context, Result};
use catalog_search::api::{create_router, AppState};
use catalog_search::catalog::FileCatalog;
use catalog_search::config::Config;
use catalog_search::enrich::enrich_page;
use catalog_search::thai::ThaiDictionary;
use catalog_search::{SearchEngine, Tokenizer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Bilingual product catalog search", long_about = None)]
struct Args {
    /// JSON config file (defaults to ./catalog-search.json when present)
    #[arg(short, long, global = true, env = "CATALOG_SEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog dump: JSON array or JSON lines, optionally gzip-compressed
    #[arg(long, global = true, env = "CATALOG_SEARCH_CATALOG")]
    catalog: Option<PathBuf>,

    /// Extra Thai dictionary words, one per line
    #[arg(long, global = true, env = "CATALOG_SEARCH_THAI_DICT")]
    thai_dictionary: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the index and serve the HTTP API
    Serve {
        #[arg(long, env = "CATALOG_SEARCH_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "CATALOG_SEARCH_PORT")]
        port: Option<u16>,
    },
    /// Run one query against the catalog and print the ranked page
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_search=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_engine(config: &Config, catalog: Arc<FileCatalog>) -> Result<SearchEngine> {
    let mut dict = ThaiDictionary::builtin();
    if let Some(path) = &config.catalog.thai_dictionary {
        let extra = ThaiDictionary::load_file(path)
            .with_context(|| format!("Failed to read Thai dictionary {}", path.display()))?;
        tracing::info!(words = extra.len(), path = %path.display(), "Loaded extra Thai words");
        dict = dict.merge(&extra);
    }

    Ok(SearchEngine::new(catalog)
        .with_tokenizer(Tokenizer::with_dictionary(dict))
        .with_candidate_cap(config.search.candidate_multiplier, config.search.max_limit))
}

async fn serve(config: Config, engine: Arc<SearchEngine>, catalog: Arc<FileCatalog>) -> Result<()> {
    // Build up front so the first request does not pay for it
    let startup = engine.clone();
    match tokio::task::spawn_blocking(move || startup.rebuild()).await? {
        Ok(report) => tracing::info!(documents = report.indexed, "Index ready"),
        Err(e) => tracing::error!("Initial index build failed, will retry on first search: {}", e),
    }

    if let Some(interval) = config.reindex_interval() {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let engine = engine.clone();
                match tokio::task::spawn_blocking(move || engine.rebuild()).await {
                    Ok(Ok(_)) => {}
                    // keep serving the previous snapshot
                    Ok(Err(e)) => tracing::warn!("Periodic reindex failed: {}", e),
                    Err(e) => tracing::warn!("Periodic reindex task panicked: {}", e),
                }
            }
        });
    }

    let state = AppState {
        engine,
        metadata: catalog,
        search: config.search.clone(),
        request_timeout: config.request_timeout(),
    };

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Listening on http://{}", address);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

fn do_search(
    config: &Config,
    engine: &SearchEngine,
    catalog: &FileCatalog,
    query: &str,
    limit: Option<usize>,
    offset: usize,
) -> Result<()> {
    let start = Instant::now();
    let report = engine.rebuild()?;
    println!("Indexed {} products in {:?}", report.indexed, start.elapsed());

    let limit = config.search.clamp_limit(limit);
    let response = engine.search(query, limit, offset)?;
    let rows = enrich_page(response.page, catalog);

    println!(
        "Search found {} products in {:.2}ms",
        response.total_count, response.duration_ms
    );
    println!();

    for (i, row) in rows.iter().enumerate() {
        let r = &row.result;
        let price = row
            .enrichment
            .price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}. [tier {} | {:.3}] {}\t{}\t{}",
            offset + i + 1,
            u8::from(r.tier),
            r.score,
            r.id,
            r.name,
            price
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if args.catalog.is_some() {
        config.catalog.path = args.catalog;
    }
    if args.thai_dictionary.is_some() {
        config.catalog.thai_dictionary = args.thai_dictionary;
    }

    let Some(catalog_path) = config.catalog.path.clone() else {
        bail!("No catalog configured; pass --catalog or set catalog.path in the config file");
    };
    let catalog = Arc::new(FileCatalog::new(catalog_path));
    let engine = build_engine(&config, catalog.clone())?;

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, Arc::new(engine), catalog).await
        }
        Command::Search {
            query,
            limit,
            offset,
        } => do_search(&config, &engine, &catalog, &query, limit, offset),
    }
}
