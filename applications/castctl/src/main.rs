/// castctl - inspect and edit the Castaway listening queue and playback state
mod config;
mod engine;

use anyhow::Context;
use cast_core::{Episode, EpisodeId, PlaybackStore, Podcast, PodcastId};
use cast_playback::{PlaybackManager, PlayerHandle};
use cast_storage::SqliteStore;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::AppConfig;
use engine::SilentEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "castctl")]
#[command(about = "Castaway podcast queue and playback state tool", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CAST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the restored playback snapshot and the queue
    Status,
    /// Inspect or edit the queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Mark an episode as played
    MarkPlayed { episode_id: String },
    /// Mark an episode as unplayed
    MarkUnplayed { episode_id: String },
    /// Favorite an episode
    Favorite {
        episode_id: String,
        /// Remove the favorite instead
        #[arg(long)]
        off: bool,
    },
    /// Register or rename a podcast
    AddPodcast { podcast_id: String, title: String },
    /// Register or update an episode
    AddEpisode {
        episode_id: String,
        podcast_id: String,
        title: String,
        audio_url: String,
        /// Duration from the feed, in seconds
        #[arg(long)]
        duration: Option<f64>,
        /// Publication time (RFC 3339)
        #[arg(long)]
        published: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Print the queue, head first
    List,
    /// Append an episode
    Add { episode_id: String },
    /// Put an episode at the head
    MoveToFront { episode_id: String },
    /// Put the given episodes first, in order
    Reorder {
        #[arg(required = true)]
        episode_ids: Vec<String>,
    },
    /// Take episodes out of the queue
    Remove {
        #[arg(required = true)]
        episode_ids: Vec<String>,
    },
    /// Queue the newest unplayed episode of a podcast
    AddLatest { podcast_id: String },
    /// Empty the queue
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let pool = cast_storage::create_pool(&config.storage.database_url)
        .await
        .with_context(|| format!("opening {}", config.storage.database_url))?;
    cast_storage::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);

    match cli.command {
        Commands::AddPodcast { podcast_id, title } => {
            store.upsert_podcast(&Podcast::new(podcast_id.as_str(), title)).await?;
            println!("Saved podcast {podcast_id}");
            return Ok(());
        }
        Commands::AddEpisode {
            episode_id,
            podcast_id,
            title,
            audio_url,
            duration,
            published,
        } => {
            let mut episode = Episode::new(episode_id.as_str(), podcast_id, title, audio_url);
            if let Some(seconds) = duration {
                episode = episode.with_feed_duration(seconds);
            }
            if let Some(at) = published {
                episode = episode.with_published_at(at);
            }
            store.upsert_episode(&episode).await?;
            println!("Saved episode {episode_id}");
            return Ok(());
        }
        _ => {}
    }

    let store: Arc<dyn PlaybackStore> = Arc::new(store);
    let player = PlaybackManager::spawn(config.playback.clone(), store.clone(), SilentEngine::new);

    let result = run(&player, store.as_ref(), cli.command).await;
    player.shutdown().await?;
    result
}

async fn run(player: &PlayerHandle, store: &dyn PlaybackStore, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Status => status(player, store).await?,
        Commands::Queue { action } => queue(player, action).await?,
        Commands::MarkPlayed { episode_id } => {
            player.mark_as_played(episode_id.as_str(), true).await?;
            println!("Marked {episode_id} as played");
        }
        Commands::MarkUnplayed { episode_id } => {
            player.mark_as_unplayed(episode_id.as_str()).await?;
            println!("Marked {episode_id} as unplayed");
        }
        Commands::Favorite { episode_id, off } => {
            player.set_favorite(episode_id.as_str(), !off).await?;
            let verb = if off { "Unfavorited" } else { "Favorited" };
            println!("{verb} {episode_id}");
        }
        Commands::AddPodcast { .. } | Commands::AddEpisode { .. } => {}
    }
    Ok(())
}

async fn status(player: &PlayerHandle, store: &dyn PlaybackStore) -> anyhow::Result<()> {
    player.restore().await?;
    let state = player.state();

    match &state.current_episode_id {
        Some(id) => {
            let title = store
                .get_episode(id)
                .await?
                .map_or_else(|| id.to_string(), |e| e.title);
            println!("Now playing: {title} ({id})");
            println!("Position:    {}", format_time(state.position));
            if state.duration > 0.0 {
                println!("Duration:    {}", format_time(state.duration));
            }
        }
        None => println!("Nothing playing"),
    }

    println!();
    print_queue(player, store).await
}

async fn queue(player: &PlayerHandle, action: QueueAction) -> anyhow::Result<()> {
    let queue = player.queue();
    match action {
        QueueAction::List => {}
        QueueAction::Add { episode_id } => queue.enqueue(&parse_id(&episode_id)?).await?,
        QueueAction::MoveToFront { episode_id } => {
            queue.move_to_front(&parse_id(&episode_id)?).await?;
        }
        QueueAction::Reorder { episode_ids } => queue.reorder(&parse_ids(&episode_ids)?).await?,
        QueueAction::Remove { episode_ids } => queue.remove(&parse_ids(&episode_ids)?).await?,
        QueueAction::AddLatest { podcast_id } => {
            match queue.insert_latest_unplayed(&PodcastId::new(podcast_id.as_str())).await? {
                Some(id) => println!("Queued {id}"),
                None => println!("No unplayed episodes for {podcast_id}"),
            }
        }
        QueueAction::Clear => queue.clear().await?,
    }

    for (index, id) in queue.queued_ids().await?.iter().enumerate() {
        println!("{:>3}. {id}", index + 1);
    }
    Ok(())
}

async fn print_queue(player: &PlayerHandle, store: &dyn PlaybackStore) -> anyhow::Result<()> {
    let ids = player.queue().queued_ids().await?;
    if ids.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    println!("Up next:");
    for (index, id) in ids.iter().enumerate() {
        let title = store
            .get_episode(id)
            .await?
            .map_or_else(|| "(unknown episode)".to_string(), |e| e.title);
        println!("{:>3}. {title} [{id}]", index + 1);
    }
    Ok(())
}

fn parse_id(raw: &str) -> anyhow::Result<EpisodeId> {
    let id = EpisodeId::new(raw.trim());
    if id.is_empty() {
        anyhow::bail!("Episode id must not be empty");
    }
    Ok(id)
}

fn parse_ids(raw: &[String]) -> anyhow::Result<Vec<EpisodeId>> {
    raw.iter().map(|id| parse_id(id)).collect()
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.4), "1:05");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_parse_id_rejects_blank() {
        assert!(parse_id("  ").is_err());
        assert_eq!(parse_id(" ep-1 ").unwrap(), EpisodeId::new("ep-1"));
    }

    #[test]
    fn test_cli_parses_queue_reorder() {
        let cli = Cli::try_parse_from(["castctl", "queue", "reorder", "b", "a"]).unwrap();
        match cli.command {
            Commands::Queue {
                action: QueueAction::Reorder { episode_ids },
            } => assert_eq!(episode_ids, vec!["b", "a"]),
            _ => panic!("expected queue reorder"),
        }
    }

    #[test]
    fn test_cli_favorite_off_flag() {
        let cli = Cli::try_parse_from(["castctl", "favorite", "ep-1", "--off"]).unwrap();
        assert!(matches!(cli.command, Commands::Favorite { off: true, .. }));
    }
}
