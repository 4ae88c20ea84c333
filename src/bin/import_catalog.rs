//! Loads scraped book documents into the catalog.
//!
//! Reads one JSON document per line (e.g. `mongoexport --type=json` output)
//! from a file or stdin, upserts categories and SKUs, and optionally pushes
//! the touched SKUs to the search index.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use storefront_api::{
    config, db,
    services::{
        import::{CatalogImporter, JsonLinesSource},
        search::{ElasticsearchIndex, SearchService},
    },
};

#[derive(Debug, Parser)]
#[command(name = "import-catalog", about = "Import book documents into the storefront catalog")]
struct Cli {
    /// JSON-lines input file; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Create missing categories instead of skipping their documents
    #[arg(long, requires = "root_category")]
    create_categories: bool,

    /// Top-level category (id or name) that created categories hang under
    #[arg(long, value_name = "ID_OR_NAME")]
    root_category: Option<String>,

    /// Push imported SKUs to the search index afterwards
    #[arg(long)]
    reindex: bool,

    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Run pending migrations before importing
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    let db_pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cli.migrate || cfg.auto_migrate {
        db::run_migrations(&db_pool).await?;
    }
    let db_pool = Arc::new(db_pool);

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => {
            info!(path = %path.display(), "Importing from file");
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Importing from stdin");
            Box::new(BufReader::new(io::stdin()))
        }
    };

    let mut importer = CatalogImporter::new(db_pool.clone());
    if cli.create_categories {
        if let Some(selector) = cli.root_category.as_deref() {
            let root = importer
                .resolve_root(selector)
                .await
                .with_context(|| format!("invalid --root-category {selector}"))?;
            info!(root_id = root.id, root = %root.name, "Creating missing categories under root");
            importer = importer.create_categories_under(root);
        }
    }
    let summary = importer.import_all(JsonLinesSource::new(reader)).await;

    if cli.reindex && !summary.sku_ids.is_empty() {
        let index = ElasticsearchIndex::new(&cfg.search).context("failed to build search client")?;
        let search = SearchService::new(db_pool, Arc::new(index));
        let indexed = search
            .reindex(&summary.sku_ids)
            .await
            .context("failed to reindex imported SKUs")?;
        info!(indexed, "Search index updated");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
