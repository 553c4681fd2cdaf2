mod db;
mod error;
mod ingest;
mod normalize;
mod query;
mod server;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use query::{PageResult, Pagination, SearchParams};
use settings::Settings;

#[derive(Parser)]
#[command(name = "recipe_catalog", about = "Recipe catalog: JSON ingestion, listing and filtered search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load recipes from a JSON file (array, or object with recipes/data/items)
    Load {
        /// JSON source (default: RECIPES_DATA_FILE)
        path: Option<PathBuf>,
        /// Delete all existing recipes before loading
        #[arg(long)]
        reset: bool,
    },
    /// Delete all recipes
    Reset,
    /// List recipes, best rated first
    List {
        #[arg(short, long, default_value = "1")]
        page: i64,
        /// Rows per page, 1-100 (default: RECIPES_DEFAULT_LIMIT)
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },
    /// Search with filters; numeric filters accept <=, >=, =, <, > (e.g. "<=400")
    Search {
        /// Title contains (case-insensitive)
        #[arg(short, long)]
        title: Option<String>,
        /// Cuisine contains (case-insensitive)
        #[arg(short, long)]
        cuisine: Option<String>,
        /// Total time in minutes, e.g. "<=45"
        #[arg(long)]
        total_time: Option<String>,
        /// Rating, e.g. ">=4.5"
        #[arg(short, long)]
        rating: Option<String>,
        /// Calories (kcal), e.g. "<=400"
        #[arg(long)]
        calories: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: i64,
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },
    /// Show catalog statistics
    Stats,
    /// Serve the HTTP API
    Serve {
        /// Listen address (default: RECIPES_BIND)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Invalid configuration")?;

    let result = match cli.command {
        Commands::Load { path, reset } => {
            let conn = db::connect(&settings.database_path)?;
            if reset {
                let removed = ingest::reset(&conn)?;
                println!("Removed {} existing recipes.", removed);
            }
            let path = path.unwrap_or_else(|| settings.data_file.clone());
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records")?
                    .progress_chars("#>-"),
            );
            let report = ingest::ingest_file(&conn, &path, &pb)
                .with_context(|| format!("Failed to load {:?}", path))?;
            println!(
                "Inserted {} recipes ({} skipped).",
                report.inserted, report.skipped
            );
            Ok(())
        }
        Commands::Reset => {
            let conn = db::connect(&settings.database_path)?;
            let removed = ingest::reset(&conn)?;
            println!("Removed {} recipes.", removed);
            Ok(())
        }
        Commands::List { page, limit } => {
            let conn = db::connect(&settings.database_path)?;
            let pagination = Pagination::new(page, limit.unwrap_or(settings.default_limit))?;
            let result = query::list(&conn, pagination)?;
            print_page(&result);
            Ok(())
        }
        Commands::Search {
            title,
            cuisine,
            total_time,
            rating,
            calories,
            page,
            limit,
        } => {
            let conn = db::connect(&settings.database_path)?;
            let pagination = Pagination::new(page, limit.unwrap_or(settings.default_limit))?;
            let params = SearchParams {
                title,
                cuisine,
                total_time,
                rating,
                calories,
            };
            let result = query::search(&conn, &params, pagination)?;
            print_page(&result);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.database_path)?;
            let total = db::count(&conn, &query::filter::Predicate::all())?;
            println!("Database: {:?}", settings.database_path);
            println!("Recipes:  {}", total);
            Ok(())
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            server::serve(settings).await
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_page(result: &PageResult) {
    if result.data.is_empty() {
        println!(
            "No recipes on page {} ({} matching).",
            result.page, result.total
        );
        return;
    }

    println!(
        "{:>5} | {:<32} | {:<16} | {:>6} | {:>5} | {:>6}",
        "#", "Title", "Cuisine", "Rating", "Time", "kcal"
    );
    println!("{}", "-".repeat(86));

    for r in &result.data {
        let cuisine = r.cuisine.as_deref().unwrap_or("");
        let rating = r.rating.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "-".into());
        let time = r.total_time.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
        let kcal = r.calories_kcal.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>5} | {:<32} | {:<16} | {:>6} | {:>5} | {:>6}",
            r.id,
            truncate(&r.title, 32),
            truncate(cuisine, 16),
            rating,
            time,
            kcal
        );
    }

    println!(
        "\nPage {}/{} | {} matching",
        result.page, result.total_pages, result.total
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
