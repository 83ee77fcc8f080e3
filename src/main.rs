//! Command line front end: runs one search and prints matching products
//! as they are found.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use amazon_scrape::crawling::HttpPageSource;
use amazon_scrape::domain::score_distribution::STAR_BUCKETS;
use amazon_scrape::infrastructure::config::{AppConfig, ConfigManager};
use amazon_scrape::infrastructure::logging::{init_logging_with_config, log_system_info};
use amazon_scrape::{
    CoordinatorConfig, NumericRange, ProductRecord, ScoreDistribution, SearchCoordinator,
    SearchCriteria, SearchEvent,
};

#[derive(Parser, Debug)]
#[command(name = "amazon-scrape")]
#[command(about = "Search product listings and keep only the ones matching your criteria")]
#[command(version)]
struct Cli {
    /// Words to search for
    #[arg(required = true)]
    search: Vec<String>,

    /// Number of matching products to collect
    #[arg(short = 'n', long)]
    results: Option<u32>,

    /// Minimum number of reviews
    #[arg(long)]
    min_reviews: Option<u32>,

    /// Price range as "low,high"; either side may be left blank
    #[arg(long, allow_hyphen_values = true)]
    price: Option<NumericRange<f64>>,

    /// Star bucket percentage range such as "5=60," (repeatable)
    #[arg(long = "stars", value_parser = parse_star_bucket)]
    stars: Vec<(u8, NumericRange<f64>)>,

    /// Require every search word in the product name
    #[arg(long)]
    match_all: bool,

    /// Confirm shipping eligibility on each product page
    #[arg(long)]
    strict_prime: bool,

    /// Number of pages fetched in parallel
    #[arg(short, long, env = "AMAZON_SCRAPE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Configuration file (toml, yaml or json)
    #[arg(long, env = "AMAZON_SCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Print one JSON object per product instead of a table row
    #[arg(long)]
    json: bool,

    /// Skip downloading product thumbnails
    #[arg(long)]
    no_thumbnails: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_star_bucket(value: &str) -> Result<(u8, NumericRange<f64>), String> {
    let (stars, range) = value
        .split_once('=')
        .ok_or_else(|| format!("expected STARS=LOW,HIGH, got '{value}'"))?;
    let stars: u8 = stars
        .trim()
        .parse()
        .map_err(|e| format!("invalid star count '{stars}': {e}"))?;
    if stars == 0 || usize::from(stars) > STAR_BUCKETS {
        return Err(format!("star count must be between 1 and {STAR_BUCKETS}"));
    }
    let range = range.parse().map_err(|e| format!("{e}"))?;
    Ok((stars, range))
}

async fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            AppConfig::from_file(&path).with_context(|| format!("Failed to load {path}"))?
        }
        None => ConfigManager::new()?.load_config().await?,
    };

    if let Some(concurrency) = cli.concurrency {
        config.search.concurrency = concurrency;
    }
    if cli.no_thumbnails {
        config.search.fetch_thumbnails = false;
    }
    if cli.verbose {
        config.logging.level = "debug".into();
    }
    config.validate()?;
    Ok(config)
}

fn build_criteria(cli: &Cli, config: &AppConfig) -> SearchCriteria {
    let distribution = cli
        .stars
        .iter()
        .fold(ScoreDistribution::unconstrained(), |distribution, (stars, range)| {
            distribution.with_bucket(*stars, *range)
        });

    SearchCriteria::builder(cli.search.join(" "))
        .with_target_result_count(cli.results.unwrap_or(config.search.target_result_count))
        .with_minimum_review_count(cli.min_reviews.unwrap_or(config.search.minimum_review_count))
        .with_match_all_terms(cli.match_all || config.search.match_all_terms)
        .with_strict_prime_eligibility(cli.strict_prime || config.search.strict_prime_eligibility)
        .with_price(cli.price.unwrap_or_default())
        .with_score_distribution(distribution)
        .build()
}

fn format_price(record: &ProductRecord) -> String {
    match (record.low_price(), record.high_price()) {
        (Some(low), Some(high)) => format!("${low:.2} - ${high:.2}"),
        (Some(low), None) => format!("${low:.2}"),
        _ => "-".to_string(),
    }
}

fn print_record(record: &ProductRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
        return Ok(());
    }
    println!(
        "{} | {} | {} reviews | {} | {}{}",
        record.name,
        format_price(record),
        record.review_count,
        record
            .rating
            .map_or_else(|| "no rating".to_string(), |rating| format!("{rating:.1} stars")),
        if record.prime_eligible { "prime | " } else { "" },
        record.url.as_ref().map_or("", |url| url.as_str()),
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).await?;
    init_logging_with_config(&config.logging)?;
    log_system_info();

    let criteria = build_criteria(&cli, &config);
    info!(
        "Searching for '{}' (target {}, price {}, {})",
        criteria.search_text(),
        criteria.target_result_count(),
        criteria.price(),
        criteria.score_distribution()
    );

    let source = HttpPageSource::from_config(&config)?;
    let coordinator = SearchCoordinator::new(
        criteria,
        Arc::new(source),
        CoordinatorConfig::from(&config.search),
    )?;
    let mut handle = coordinator.spawn();

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping search");
            token.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            SearchEvent::Outcome { outcome, .. } => {
                if let Some(record) = &outcome.record {
                    print_record(record, cli.json)?;
                } else if let Some(status) = &outcome.status {
                    debug!("{}", status);
                }
            }
            SearchEvent::Progress {
                percent_complete,
                valid_results,
                fragments_considered,
            } => debug!(
                "{}% complete ({} of {} listings matched)",
                percent_complete, valid_results, fragments_considered
            ),
            SearchEvent::PageCompleted { page_number, state } => {
                debug!("Page {} {}", page_number, state);
            }
            SearchEvent::Finished(summary) => info!(
                "Search {} after {}s: {}% complete, {} pages fetched",
                summary.termination,
                summary.elapsed().num_seconds(),
                summary.percent_complete,
                summary.stats.pages_dispatched
            ),
        }
    }

    let summary = handle.wait().await?;
    eprintln!(
        "{} ({}% complete, {} matching of {} considered)",
        summary.termination,
        summary.percent_complete,
        summary.stats.valid_results,
        summary.stats.fragments_considered
    );
    Ok(())
}
