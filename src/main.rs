//! Manual-trigger CLI for the news sentiment pipeline.
//!
//! Lists feeds, scrapes one or all of them (optionally as a dry run),
//! drains pending analysis and prints the market summary. Each command
//! reports a success/failure tally and exits non-zero on total failure.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nse_news_sentiment::aggregate::{AggregateConfig, Aggregator};
use nse_news_sentiment::analyze::ensemble::SentimentEnsemble;
use nse_news_sentiment::analyze::entities::EntityRecognizer;
use nse_news_sentiment::analyze::AnalysisPipeline;
use nse_news_sentiment::cache::{Cache, MemoryCache};
use nse_news_sentiment::ingest::config::{
    load_feeds_default, load_sectors_default, load_tickers_default, FeedSpec,
};
use nse_news_sentiment::ingest::dedup::DedupPolicy;
use nse_news_sentiment::ingest::fetch::FetchPolicy;
use nse_news_sentiment::ingest::{IngestPipeline, IngestReport};
use nse_news_sentiment::jobs;
use nse_news_sentiment::store::{MemoryStore, NewsStore};

#[derive(Parser)]
#[command(
    name = "nse-news-sentiment",
    about = "Financial news sentiment pipeline for Indian equity markets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured feeds
    Feeds,
    /// Scrape a single feed by key
    Scrape {
        key: String,
        /// Fetch and report without persisting anything
        #[arg(long)]
        dry_run: bool,
        /// Run sentiment analysis on newly saved articles
        #[arg(long)]
        analyze: bool,
    },
    /// Scrape all configured feeds
    ScrapeAll {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        analyze: bool,
    },
    /// Analyze pending (unanalyzed) articles
    Analyze {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Scrape all feeds repeatedly on an interval until interrupted
    Watch {
        #[arg(long, default_value_t = 1800)]
        interval_secs: u64,
        #[arg(long)]
        analyze: bool,
    },
    /// Remove never-analyzed articles older than the given age
    Cleanup {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Print the cached market summary snapshot
    Summary,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

struct App {
    store: Arc<dyn NewsStore>,
    cache: Arc<dyn Cache>,
    ingest: IngestPipeline,
    analysis: AnalysisPipeline,
}

async fn build_app() -> Result<App> {
    let store: Arc<dyn NewsStore> = Arc::new(MemoryStore::new());
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

    // Seed reference data discovered in config; get-or-create keeps this
    // idempotent against an already-populated store.
    let tickers = load_tickers_default()?;
    for t in &tickers {
        store.get_or_create_ticker(t.clone()).await;
    }
    let sectors = load_sectors_default()?;
    for s in &sectors {
        store.get_or_create_sector(s.clone()).await;
    }

    let ingest = IngestPipeline::new(
        store.clone(),
        cache.clone(),
        FetchPolicy::default(),
        DedupPolicy::default(),
    );
    let analysis = AnalysisPipeline::new(
        store.clone(),
        SentimentEnsemble::from_env(),
        EntityRecognizer::new(&tickers, &sectors),
    );

    Ok(App {
        store,
        cache,
        ingest,
        analysis,
    })
}

fn print_report(report: &IngestReport) {
    println!(
        "Sources: {} attempted, {} succeeded, {} failed",
        report.tally.attempted, report.tally.succeeded, report.tally.failed
    );
    for s in &report.sources {
        match &s.error {
            None => println!("  ok   {:<30} {} entries", s.key, s.entries),
            Some(e) => println!("  FAIL {:<30} {e}", s.key),
        }
    }
    if report.dry_run {
        println!(
            "Dry run: {} entries, {} unique after dedup (nothing persisted)",
            report.tally.entries, report.unique
        );
    } else {
        println!(
            "Saved {} new articles, {} duplicates skipped, {} entries discarded",
            report.saved, report.duplicates, report.discarded
        );
    }
}

async fn scrape(app: &App, specs: &[FeedSpec], dry_run: bool, analyze: bool) -> Result<()> {
    let report = app.ingest.scrape_sources(specs, dry_run).await;
    print_report(&report);
    if report.total_failure() {
        return Err(anyhow!("all sources failed"));
    }
    if analyze && !dry_run && report.saved > 0 {
        let pending = app.analysis.analyze_pending(report.saved).await;
        println!(
            "Analysis: {} analyzed, {} failed",
            pending.analyzed, pending.failed
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let feeds = load_feeds_default()?;

    match cli.command {
        Commands::Feeds => {
            println!("Configured feeds ({}):", feeds.len());
            for f in &feeds {
                println!("  {:<30} [{}] {} ({})", f.key, f.category, f.name, f.url);
            }
        }
        Commands::Scrape {
            key,
            dry_run,
            analyze,
        } => {
            let spec = feeds
                .iter()
                .find(|f| f.key == key)
                .cloned()
                .ok_or_else(|| anyhow!("unknown feed key `{key}` (try `feeds`)"))?;
            let app = build_app().await?;
            scrape(&app, std::slice::from_ref(&spec), dry_run, analyze).await?;
        }
        Commands::ScrapeAll { dry_run, analyze } => {
            let app = build_app().await?;
            scrape(&app, &feeds, dry_run, analyze).await?;
        }
        Commands::Analyze { limit } => {
            let app = build_app().await?;
            let report = app.analysis.analyze_pending(limit).await;
            println!(
                "Analysis: {} analyzed, {} failed",
                report.analyzed, report.failed
            );
            if report.analyzed == 0 && report.failed > 0 {
                return Err(anyhow!("every pending article failed analysis"));
            }
        }
        Commands::Watch {
            interval_secs,
            analyze,
        } => {
            let app = Arc::new(build_app().await?);
            let feeds = Arc::new(feeds);
            println!(
                "Watching {} feeds every {interval_secs}s (ctrl-c to stop)",
                feeds.len()
            );
            let handle = jobs::spawn_interval_job(
                "scrape_all",
                std::time::Duration::from_secs(interval_secs.max(1)),
                move || {
                    let app = app.clone();
                    let feeds = feeds.clone();
                    async move {
                        let outcome = jobs::run_with_retry(
                            "scrape_all",
                            3,
                            std::time::Duration::from_secs(5),
                            || {
                                let app = app.clone();
                                let feeds = feeds.clone();
                                async move {
                                    let report = app.ingest.scrape_sources(&feeds, false).await;
                                    if report.total_failure() {
                                        Err(anyhow!("all sources failed"))
                                    } else {
                                        Ok(report)
                                    }
                                }
                            },
                        )
                        .await;

                        match outcome {
                            Ok(report) => {
                                if analyze && report.saved > 0 {
                                    let pending = app.analysis.analyze_pending(report.saved).await;
                                    tracing::info!(
                                        analyzed = pending.analyzed,
                                        failed = pending.failed,
                                        "scheduled analysis finished"
                                    );
                                }
                            }
                            Err(e) => tracing::error!(error = %e, "scheduled scrape failed"),
                        }
                    }
                },
            );
            handle.await?;
        }
        Commands::Cleanup { days } => {
            let app = build_app().await?;
            let removed = app.analysis.cleanup_stale(days).await;
            println!("Removed {removed} stale unanalyzed articles (older than {days} days)");
        }
        Commands::Summary => {
            let app = build_app().await?;
            let aggregator = Aggregator::new(
                app.store.clone(),
                app.cache.clone(),
                AggregateConfig::default(),
            );
            let summary = aggregator.market_summary().await;
            match summary.market_sentiment {
                Some(avg) => {
                    println!(
                        "Market sentiment: {avg:+.3} over {} scores (24h)",
                        summary.total_articles
                    );
                    for s in &summary.sector_sentiments {
                        println!(
                            "  {:<16} avg {:+.3} ({} articles)",
                            s.sector, s.average_sentiment, s.article_count
                        );
                    }
                    for r in &summary.rotation_signals {
                        println!(
                            "  rotation: {:<12} {:?} ({:+.3})",
                            r.sector, r.signal, r.sentiment_change
                        );
                    }
                }
                None => println!("No data available for the last 24 hours."),
            }
        }
    }

    Ok(())
}
