use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use tourkit_api::auth::hash_password;
use tourkit_api::config::AppConfig;
use tourkit_api::database::{pool, Repository};
use tourkit_api::models::tour::slugify;
use tourkit_api::models::{Review, Tour, User};
use tourkit_api::payments::HostedCheckoutProvider;
use tourkit_api::routes;
use tourkit_api::state::AppState;

#[derive(Parser)]
#[command(name = "tourkit-api")]
#[command(about = "Tour booking REST API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on; falls back to PORT, then 3000
        #[arg(long)]
        port: Option<u16>,
        /// Apply pending migrations before accepting traffic
        #[arg(long)]
        migrate: bool,
    },
    /// Load fixture data from a directory of JSON files
    Import {
        #[arg(long, default_value = "dev-data")]
        dir: PathBuf,
        /// Empty all tables before importing
        #[arg(long)]
        truncate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        migrate: false,
    }) {
        Command::Serve { port, migrate } => serve(config, port, migrate).await,
        Command::Import { dir, truncate } => import(config, &dir, truncate).await,
    }
}

async fn serve(config: AppConfig, port: Option<u16>, migrate: bool) -> anyhow::Result<()> {
    tracing::info!("Starting in {:?} mode", config.environment);

    let db = pool::connect(&config.database).await?;
    if migrate {
        sqlx::migrate!("./migrations").run(&db).await?;
        tracing::info!("Migrations applied");
    }

    let payments = Arc::new(HostedCheckoutProvider::new(&config.payments));
    let state = AppState::new(db, config, payments);
    let app = routes::app(state);

    let port = port
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
        })
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Imports the dev fixtures through the same validated create path the API
/// uses. Fixture documents carry string keys in place of ids; the importer
/// records the generated uuid for each key and rewrites references.
async fn import(config: AppConfig, dir: &Path, truncate: bool) -> anyhow::Result<()> {
    let db = pool::connect(&config.database).await?;

    if truncate {
        sqlx::query("TRUNCATE reviews, bookings, tours, users CASCADE")
            .execute(&db)
            .await?;
        tracing::info!("Truncated all tables");
    }

    let user_ids = import_users(&db, dir).await?;
    let tour_ids = import_tours(&db, dir, &user_ids).await?;
    import_reviews(&db, dir, &tour_ids, &user_ids).await?;

    tracing::info!("Import complete");
    Ok(())
}

async fn import_users(db: &PgPool, dir: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut ids = HashMap::new();
    let Some(docs) = read_fixture(dir, "users.json")? else {
        return Ok(ids);
    };

    let repo = Repository::<User>::new(db.clone());
    for mut doc in docs {
        let key = take_string(&mut doc, "id");
        if let Some(password) = take_string(&mut doc, "password") {
            doc.insert("password_hash".to_string(), json!(hash_password(&password)?));
        }
        let user = repo.create(&doc).await?;
        if let Some(key) = key {
            ids.insert(key, user.id.to_string());
        }
    }

    tracing::info!("Imported {} users", ids.len());
    Ok(ids)
}

async fn import_tours(
    db: &PgPool,
    dir: &Path,
    user_ids: &HashMap<String, String>,
) -> anyhow::Result<HashMap<String, String>> {
    let mut ids = HashMap::new();
    let Some(docs) = read_fixture(dir, "tours.json")? else {
        return Ok(ids);
    };

    let repo = Repository::<Tour>::new(db.clone());
    for mut doc in docs {
        let key = take_string(&mut doc, "id");
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            doc.insert("slug".to_string(), json!(slug));
        }
        if let Some(Value::Array(guides)) = doc.get("guides").cloned() {
            let mapped: Vec<Value> = guides
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|key| user_ids.get(key))
                .map(|id| json!(id))
                .collect();
            doc.insert("guides".to_string(), Value::Array(mapped));
        }
        let tour = repo.create(&doc).await?;
        if let Some(key) = key {
            ids.insert(key, tour.id.to_string());
        }
    }

    tracing::info!("Imported {} tours", ids.len());
    Ok(ids)
}

async fn import_reviews(
    db: &PgPool,
    dir: &Path,
    tour_ids: &HashMap<String, String>,
    user_ids: &HashMap<String, String>,
) -> anyhow::Result<()> {
    let Some(docs) = read_fixture(dir, "reviews.json")? else {
        return Ok(());
    };

    let repo = Repository::<Review>::new(db.clone());
    let mut count = 0usize;
    for mut doc in docs {
        remap(&mut doc, "tour_id", tour_ids);
        remap(&mut doc, "user_id", user_ids);
        repo.create(&doc).await?;
        count += 1;
    }

    // One pass over the aggregates instead of a recompute per review
    sqlx::query(
        "UPDATE tours SET ratings_quantity = s.num, ratings_average = s.avg \
         FROM (SELECT tour_id, COUNT(*)::int AS num, \
                      round(avg(rating)::numeric, 1)::float8 AS avg \
               FROM reviews GROUP BY tour_id) AS s \
         WHERE tours.id = s.tour_id",
    )
    .execute(db)
    .await?;

    tracing::info!("Imported {} reviews", count);
    Ok(())
}

fn read_fixture(dir: &Path, file: &str) -> anyhow::Result<Option<Vec<Map<String, Value>>>> {
    let path = dir.join(file);
    if !path.exists() {
        tracing::warn!("Fixture {} not found, skipping", path.display());
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn take_string(doc: &mut Map<String, Value>, key: &str) -> Option<String> {
    doc.remove(key)
        .and_then(|v| v.as_str().map(str::to_string))
}

fn remap(doc: &mut Map<String, Value>, key: &str, ids: &HashMap<String, String>) {
    if let Some(mapped) = doc
        .get(key)
        .and_then(Value::as_str)
        .and_then(|k| ids.get(k))
    {
        doc.insert(key.to_string(), json!(mapped));
    }
}
