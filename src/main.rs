use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pace_metadata::{
    EpisodeMetadata, FileCandidate, MetadataService, SeasonHint, SeriesMetadata, guess_hints,
    load_settings, run_auto_refresh, scan_for_videos,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve One Pace releases against the published catalog
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Settings file (TOML); PACE_METADATA_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Match a video file, or every video in a directory, to catalog episodes
    Match(MatchArgs),
    /// Download the catalog now, ignoring the cache
    Refresh,
    /// Show series information and the arc list
    Info,
    /// Print the poster URL of an arc
    Poster(PosterArgs),
    /// Keep the catalog fresh until interrupted
    Watch,
}

#[derive(Debug, Args)]
struct MatchArgs {
    /// Video file or directory
    path: PathBuf,

    /// Season (arc part) hint, overrides the one guessed from the file name
    #[arg(long)]
    season: Option<u32>,

    /// Episode hint, overrides the one guessed from the file name
    #[arg(long)]
    episode: Option<u32>,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct PosterArgs {
    /// Arc part number
    #[arg(long)]
    season: Option<u32>,

    /// Arc title
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays usable for results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    let service = Arc::new(
        MetadataService::from_settings(settings).context("Failed to set up metadata service")?,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Match(args) => match_files(&service, &args, &cancel).await,
        Command::Refresh => {
            let catalog = service
                .refresh_catalog(&cancel)
                .await
                .context("Catalog refresh failed")?;
            println!(
                "Catalog updated: {} arc(s), {} episode(s), last update {}",
                catalog.arcs.len(),
                catalog.episode_count(),
                catalog.last_update
            );
            Ok(())
        }
        Command::Info => {
            let catalog = service
                .get_catalog(false, &cancel)
                .await
                .context("No catalog available")?;
            print_series(&SeriesMetadata::from_catalog(&catalog));
            println!("\n=== Arcs ===\n");
            for arc in &catalog.arcs {
                println!(
                    "  {:>2}. {} ({}) - {} episode(s)",
                    arc.part,
                    arc.title,
                    arc.saga,
                    arc.episodes.len()
                );
            }
            Ok(())
        }
        Command::Poster(args) => {
            let catalog = service
                .get_catalog(false, &cancel)
                .await
                .context("No catalog available")?;
            let hint = SeasonHint {
                index: args.season,
                name: args.name.as_deref(),
            };
            match service.resolve_poster(hint, &catalog) {
                Some(url) => println!("{url}"),
                None => bail!("No poster found"),
            }
            Ok(())
        }
        Command::Watch => {
            let Some(period) = service.auto_refresh_period() else {
                bail!("Auto update is disabled in the settings");
            };
            // Warm the cache once so the first tick is not the first download
            if let Err(e) = service.get_catalog(false, &cancel).await {
                error!("Initial catalog load failed: {}", e);
            }
            run_auto_refresh(service.as_ref(), period, cancel)
                .await
                .context("Auto refresh could not start")?;
            Ok(())
        }
    }
}

async fn match_files(
    service: &MetadataService,
    args: &MatchArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let paths = collect_videos(&args.path)?;
    if paths.is_empty() {
        println!("No video files found.");
        return Ok(());
    }

    let mut matched = 0;
    for path in &paths {
        let (guessed_season, guessed_episode) = guess_hints(path);
        let candidate = FileCandidate::new(path).with_hints(
            args.season.or(guessed_season),
            args.episode.or(guessed_episode),
        );

        let found = service.episode_metadata(&candidate, cancel).await;
        if cancel.is_cancelled() {
            bail!("Interrupted");
        }

        if args.json {
            let line = serde_json::json!({ "path": path, "episode": found });
            println!("{line}");
        } else {
            print_match(path, found.as_ref());
        }
        if found.is_some() {
            matched += 1;
        }
    }

    if !args.json {
        println!("Matched {} of {} video(s).", matched, paths.len());
    }
    Ok(())
}

fn collect_videos(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let videos = scan_for_videos(path)
        .with_context(|| format!("Failed to scan {}", path.display()))?;
    Ok(videos.into_iter().map(|video| video.path).collect())
}

fn print_match(path: &Path, found: Option<&EpisodeMetadata>) {
    println!("{}", path.display());
    match found {
        Some(episode) => {
            println!("  Episode: {} (season {})", episode.title, episode.season_index);
            if let Some(minutes) = episode.runtime_minutes {
                println!("  Runtime: {:.1} min", minutes);
            }
            if let Some(crc32) = &episode.crc32 {
                println!("  CRC32: {}", crc32);
            }
            println!("  Matched by: {}", episode.matched_by);
        }
        None => println!("  No match"),
    }
    println!();
}

fn print_series(series: &SeriesMetadata) {
    println!("=== {} ===\n", series.title);
    if !series.original_title.is_empty() {
        println!("  Original title: {}", series.original_title);
    }
    if let Some(date) = series.premiere_date {
        println!("  Premiered: {}", date);
    }
    if let Some(year) = series.production_year {
        println!("  Year: {}", year);
    }
    println!("  Status: {}", series.status.as_str());
    if !series.genres.is_empty() {
        println!("  Genres: {}", series.genres.join(", "));
    }
    if let Some(rating) = &series.official_rating {
        println!("  Rating: {}", rating);
    }
    if !series.overview.is_empty() {
        println!("\n{}", series.overview);
    }
}
