use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crm_api::db::run_migrations;
use crm_api::import::{ContactImporter, ImportConfig, ImportProgress, PgContactStore};
use crm_api::models::Scope;

#[derive(Parser, Debug)]
#[command(
    name = "import_contacts",
    about = "Import a JSON array of contacts into one organization"
)]
struct Args {
    /// Organization that owns the imported contacts.
    #[arg(long)]
    org_id: Uuid,

    /// Path to a JSON file holding an array of contact objects.
    #[arg(long)]
    file: PathBuf,

    /// Upserts in flight at once (defaults to IMPORT_CHUNK_SIZE).
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.file)?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    log::info!(
        "read {} rows from {}",
        rows.len(),
        args.file.display()
    );

    let mut config = ImportConfig::from_env();
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(chunk_size);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.chunk_size.clamp(1, 20) as u32)
        .connect(&database_url)
        .await?;
    run_migrations(&pool).await?;

    let importer = ContactImporter::new(Arc::new(PgContactStore::new(pool.clone())), config);
    let mut report = |progress: ImportProgress| {
        eprint!("\rimported {}/{}", progress.processed, progress.total);
    };

    let summary = importer
        .import_rows(Scope::new(args.org_id), &rows, Some(&mut report))
        .await?;
    eprintln!();

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "created {}, updated {}, unchanged {}, failed {}",
        summary.created, summary.updated, summary.skipped, summary.failed
    )?;
    for failure in &summary.failed_records {
        writeln!(
            stdout,
            "  row {} <{}>: {}",
            failure.row, failure.candidate.email, failure.error
        )?;
    }

    pool.close().await;

    if summary.failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}
