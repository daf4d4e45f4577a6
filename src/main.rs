mod analyzer;
mod api;
mod browser;
mod claude;
mod comparison;
mod config;
mod crawler;
mod dashboard;
mod dates;
mod models;
mod stealth;
mod store;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::analyzer::ReviewAnalyzer;
use crate::claude::ClaudeClient;
use crate::config::{AppConfig, ANALYSIS_FILE, MAIN_REVIEWS_CSV, MAIN_REVIEWS_JSON};

#[derive(OpenApi)]
#[openapi(
    paths(api::list_reviews, api::compare, api::trends),
    components(
        schemas(
            api::CompareRequest,
            api::ErrorResponse,
            dashboard::ReviewCard,
            comparison::ComparisonOutcome,
            comparison::TrendReport,
            comparison::CategoryTrend,
            comparison::TrendSeries,
            comparison::TrendPoint
        )
    ),
    tags(
        (name = "reviews", description = "Analyzed review browser"),
        (name = "comparison", description = "Competitor rating comparison")
    )
)]
struct ApiDoc;

#[derive(Parser)]
#[command(name = "review-crawler", version, about = "Restaurant review scraping, analysis and comparison")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape every review page of a restaurant listing
    Scrape {
        /// Restaurant listing URL
        url: String,
    },
    /// Annotate scraped reviews with food/staff comments and sentiment
    Analyze {
        /// Raw reviews, JSON or CSV (defaults to restaurant_reviews.json in DATA_DIR)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Defaults to reviews_analysis.json in DATA_DIR
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert restaurant_reviews.csv into restaurant_reviews.json
    Convert {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Scrape a competitor and build ratings_comparison.csv
    Compare {
        competitor_url: String,
    },
    /// Start the dashboard
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Scrape { url } => {
            let reviews = crawler::scrape_reviews(&url, &config.scrape, &config.data_dir).await?;
            info!("✅ Scraped {} reviews", reviews.len());
        }
        Command::Analyze {
            input,
            batch_size,
            output,
        } => {
            let input = input.unwrap_or_else(|| config.data_path(MAIN_REVIEWS_JSON));
            let output = output.unwrap_or_else(|| config.data_path(ANALYSIS_FILE));
            let batch_size = batch_size.unwrap_or(config.analysis.batch_size);

            let reviews: Vec<String> = store::read_raw_reviews(&input)?
                .into_iter()
                .map(|r| r.review)
                .collect();
            info!("📄 Loaded {} reviews from {}", reviews.len(), input.display());

            let analyzer = ReviewAnalyzer::new(ClaudeClient::new(&config.analysis));
            analyzer
                .generate_reviews_analysis(&reviews, batch_size, config.analysis.max_reviews, &output)
                .await?;
        }
        Command::Convert { csv, json } => {
            let csv = csv.unwrap_or_else(|| config.data_path(MAIN_REVIEWS_CSV));
            let json = json.unwrap_or_else(|| config.data_path(MAIN_REVIEWS_JSON));
            match store::convert_csv_to_json(&csv, &json) {
                Ok(n) => info!("✅ Converted {} reviews to {}", n, json.display()),
                Err(e) => error!("❌ Error converting CSV to JSON: {:#}", e),
            }
        }
        Command::Compare { competitor_url } => {
            let outcome = comparison::run_comparison(&config, &competitor_url).await?;
            if outcome.success {
                info!("✅ {}", outcome.message);
            } else {
                error!("❌ {}", outcome.message);
            }
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.dashboard_addr.clone());
            serve(config, &addr).await?;
        }
    }

    Ok(())
}

async fn serve(config: AppConfig, addr: &str) -> Result<()> {
    let state = Arc::new(api::AppState { config });

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/reviews", get(api::list_reviews))
        .route("/api/compare", post(api::compare))
        .route("/api/trends", get(api::trends))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Dashboard listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
