//! ridefeed - browse ride feeds and engage from the terminal.
//!
//! Wires `ridefeed-core` to the HTTP backend, prints a feed and optionally
//! toggles a like on one post.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ridefeed_core::{
    ApiClient, Collaborators, Config, FeedDomain, FeedSession, FeedSnapshot, StaticLocation,
};

// ============================================================================
// Constants
// ============================================================================

/// Overrides `api_base_url` from the config file
const API_URL_ENV: &str = "RIDEFEED_API_URL";

/// Bearer token for authenticated requests
const TOKEN_ENV: &str = "RIDEFEED_TOKEN";

/// When set, logs go to a daily rolling file in this directory instead of stderr
const LOG_DIR_ENV: &str = "RIDEFEED_LOG_DIR";

const USAGE: &str = "usage: ridefeed [feed <personal|trending|nearby|filtered>] [--pages N] [like <post-id>]";

#[derive(Debug, PartialEq)]
struct Args {
    domain: FeedDomain,
    pages: u32,
    like: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            domain: FeedDomain::Personal,
            pages: 1,
            like: None,
        }
    }
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "feed" => {
                let name = iter.next().context("missing feed name")?;
                args.domain = FeedDomain::parse(name)
                    .with_context(|| format!("unknown feed '{}'", name))?;
            }
            "--pages" => {
                let n = iter.next().context("missing page count")?;
                args.pages = n
                    .parse()
                    .with_context(|| format!("invalid page count '{}'", n))?;
                if args.pages == 0 {
                    bail!("page count must be at least 1");
                }
            }
            "like" => {
                args.like = Some(iter.next().context("missing post id")?.clone());
            }
            "-h" | "--help" => bail!(USAGE),
            other => bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(args)
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=ridefeed_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ridefeed.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn build_session(config: &Config) -> Result<FeedSession> {
    let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| config.api_base_url().to_string());
    let mut client = ApiClient::new(base_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        client.set_token(token);
    }
    let client = Arc::new(client);

    let collaborators = Collaborators {
        fetcher: client.clone(),
        engagement: client,
        location: Arc::new(StaticLocation(config.home_location())),
    };
    Ok(FeedSession::from_config(config, collaborators))
}

fn print_feed(session: &FeedSession, snapshot: &FeedSnapshot) {
    let controller = session.controller(snapshot.domain);
    let age = session
        .cache()
        .entry(snapshot.domain, &controller.params())
        .map(|entry| entry.age_display(session.cache().now()));

    match age {
        Some(age) => println!("== {} ({} posts, updated {}) ==", snapshot.domain, snapshot.posts.len(), age),
        None => println!("== {} ({} posts) ==", snapshot.domain, snapshot.posts.len()),
    }
    for post in &snapshot.posts {
        let liked = if post.user_interaction.is_liked { "*" } else { " " };
        println!(
            "{} {:<24} {:<20} {:>5} likes {:>4} comments",
            liked,
            post.id,
            post.author_display(),
            post.engagement.like_count,
            post.engagement.comment_count
        );
    }
    if snapshot.has_more {
        println!("  ... more available");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let _guard = init_tracing();
    info!(domain = %args.domain, pages = args.pages, "ridefeed starting");

    let config = Config::load()?;
    let session = build_session(&config)?;

    let mut snapshot = session.load(args.domain).await;
    for _ in 1..args.pages {
        if !snapshot.has_more {
            break;
        }
        snapshot = session.load_more(args.domain).await;
    }
    if let Some(kind) = snapshot.error {
        eprintln!("Feed error: {}", kind);
    }
    print_feed(&session, &snapshot);

    if let Some(post_id) = args.like {
        match session.toggle_like(&post_id).await {
            Ok(_) => {
                if let Some(post) = session.posts().get(&post_id) {
                    let state = if post.user_interaction.is_liked { "Liked" } else { "Unliked" };
                    println!("{} {} ({} likes)", state, post_id, post.engagement.like_count);
                }
            }
            Err(e) => eprintln!("Could not update {}: {}", post_id, e),
        }
    }

    session.teardown();
    Ok(())
}
