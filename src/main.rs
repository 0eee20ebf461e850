mod api;
mod server;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use learning_context::records::{
    generate_synthetic_dataset, is_valid_user_id, write_dataset, MAX_USER_ID_LEN,
};
use learning_context::{
    format_float, format_percent, BadgeStatus, ContextBuilder, LearningConfig, MasterContext,
};

#[derive(Parser)]
#[command(name = "learning-context", about = "Per-user learning context engine")]
struct Cli {
    /// Path to a TOML config (defaults to LEARNING_CONFIG_PATH or config/learning.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a user's context and print it
    Build(BuildArgs),
    /// Write a synthetic dataset for a user
    Seed(SeedArgs),
    /// Serve contexts over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    force_refresh: bool,
    #[arg(long)]
    pretty: bool,
    /// Print a human-readable overview instead of JSON
    #[arg(long, conflicts_with = "pretty")]
    summary: bool,
}

#[derive(Args, Debug, Clone)]
struct SeedArgs {
    #[arg(long)]
    user: String,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8787)]
    port: u16,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (config, config_path) = LearningConfig::load(cli.config).map_err(|err| err.to_string())?;
    if let Some(path) = config_path.as_ref().filter(|path| path.exists()) {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Build(args) => run_build(args, &config).await,
        Command::Seed(args) => run_seed(args, &config).await,
        Command::Serve(args) => {
            let builder = Arc::new(ContextBuilder::from_config(&config));
            server::serve(args, builder).await
        }
    }
}

async fn run_build(args: BuildArgs, config: &LearningConfig) -> Result<(), String> {
    let user = validate_user(&args.user)?;
    let builder = ContextBuilder::from_config(config);
    let context = builder.build(user, args.force_refresh).await;

    if args.summary {
        print_summary(&context);
        return Ok(());
    }

    let payload = if args.pretty {
        serde_json::to_string_pretty(&context)
    } else {
        serde_json::to_string(&context)
    }
    .map_err(|err| format!("failed to serialize context: {}", err))?;
    println!("{}", payload);
    Ok(())
}

async fn run_seed(args: SeedArgs, config: &LearningConfig) -> Result<(), String> {
    let user = validate_user(&args.user)?;
    let dataset = generate_synthetic_dataset(args.seed, Utc::now());
    let data_dir = PathBuf::from(&config.source.data_dir);
    write_dataset(&data_dir, user, &dataset).await?;
    println!(
        "Seeded {} posts, {} feedback events, {} action logs for {} in {}",
        dataset.posts.len(),
        dataset.feedback.len(),
        dataset.actions.len(),
        user,
        data_dir.display()
    );
    Ok(())
}

fn print_summary(context: &MasterContext) {
    println!(
        "User: {} (phase {}, {} interactions{})",
        context.user_id,
        context.learning_phase.label(),
        context.total_interactions,
        if context.is_cold_start { ", cold start" } else { "" }
    );
    println!(
        "Posts scored: {} (gold {} | gray {} | red {} | neutral {})",
        context.signals.len(),
        context.tag_counts.gold,
        context.tag_counts.gray,
        context.tag_counts.red,
        context.tag_counts.neutral
    );
    println!(
        "Baseline: engagement {} | reach {} | follower delta {}",
        format_float(context.baseline.avg_engagement_rate, 2),
        format_float(context.baseline.avg_reach, 0),
        format_float(context.baseline.avg_follower_delta, 1)
    );
    println!(
        "Feedback positive rate {} | adoption rate {} | RAG hit rate {}",
        format_percent(context.interaction_stats.positive_rate),
        format_percent(context.interaction_stats.adoption_rate),
        format_percent(context.rag_hit_rate)
    );
    println!("Feedback streak: {} weeks", context.feedback_streak_weeks);

    if !context.pattern_summaries.is_empty() {
        println!("\nPatterns:");
        for summary in &context.pattern_summaries {
            println!(
                "  [{}] {} ({} posts, {:?})",
                summary.tag.label(),
                summary.summary,
                summary.post_count,
                summary.source
            );
        }
    }

    let earned = context
        .badges
        .iter()
        .filter(|badge| badge.status == BadgeStatus::Earned)
        .count();
    println!("\nBadges earned: {}/{}", earned, context.badges.len());
    for badge in &context.badges {
        println!(
            "  {} {} {}",
            if badge.status == BadgeStatus::Earned { "*" } else { " " },
            badge.title,
            format_percent(badge.progress)
        );
    }

    if !context.recommendations.is_empty() {
        println!("\nRecommendations:");
        for line in &context.recommendations {
            println!("- {}", line);
        }
    }
}

fn validate_user(value: &str) -> Result<&str, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("user id must not be empty".to_string());
    }
    if !is_valid_user_id(trimmed) {
        return Err(format!(
            "invalid user id {:?}: use at most {} letters, digits, '-' or '_'",
            trimmed, MAX_USER_ID_LEN
        ));
    }
    Ok(trimmed)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("learning_context=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
