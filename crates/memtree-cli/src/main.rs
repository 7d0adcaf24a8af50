// ============================================================================
// memtree — CLI driver for the conversational memory service
// ============================================================================
// Usage:
//   memtree add-message --user alice --conversation c1 --kind human "text"
//   memtree search --user alice "query"
//   memtree remember --user alice "content worth keeping"
//   memtree memories --user alice
//   memtree history --user alice --conversation c1
//   memtree retrieve --user alice "query"
//   memtree stats --user alice
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use memtree_core::{
    HttpModelProvider, MemoryConfig, MessageKind, Memtree, ModelProvider, NewMessage,
    OfflineModel, RememberOutcome, SearchConfig,
};
use memtree_core::capability::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use tracing_subscriber::EnvFilter;

/// Conversational memory service driver
#[derive(Parser)]
#[command(name = "memtree", version, about = "Store, consolidate and search conversational memory")]
struct Cli {
    /// Data directory (default: ~/.memtree, or MEMTREE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one message; long human messages schedule consolidation
    AddMessage {
        #[arg(long)]
        user: String,

        #[arg(long)]
        conversation: String,

        /// Message author: human or ai
        #[arg(long, default_value = "human")]
        kind: String,

        /// Optional RFC 3339 timestamp (default: now)
        #[arg(long)]
        timestamp: Option<String>,

        text: String,
    },

    /// Hybrid search over a user's messages
    Search {
        #[arg(long)]
        user: String,

        query: String,
    },

    /// Feed content directly into memory consolidation
    Remember {
        #[arg(long)]
        user: String,

        content: String,
    },

    /// List a user's memory nodes, most valuable first
    Memories {
        #[arg(long)]
        user: String,
    },

    /// Show one conversation in chronological order
    History {
        #[arg(long)]
        user: String,

        #[arg(long)]
        conversation: String,
    },

    /// Search + related memories + context + summary in one call
    Retrieve {
        #[arg(long)]
        user: String,

        query: String,
    },

    /// Show memory counts and backend health
    Stats {
        #[arg(long)]
        user: String,
    },
}

fn data_dir(cli_arg: Option<PathBuf>) -> PathBuf {
    cli_arg
        .or_else(|| std::env::var_os("MEMTREE_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".memtree")
        })
}

fn model_from_env() -> Arc<dyn ModelProvider> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => match std::env::var("OPENAI_BASE_URL") {
            Ok(base_url) => Arc::new(HttpModelProvider::new_custom(
                api_key,
                base_url,
                std::env::var("MEMTREE_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
                std::env::var("MEMTREE_CHAT_MODEL")
                    .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            )),
            Err(_) => Arc::new(HttpModelProvider::new_openai(api_key)),
        },
        _ => {
            eprintln!("Warning: OPENAI_API_KEY not set, running in degraded mode");
            Arc::new(OfflineModel)
        }
    }
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let qdrant_url =
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
    let service = Memtree::open(
        &data_dir(cli.data_dir),
        &qdrant_url,
        model_from_env(),
        MemoryConfig::from_env(),
        SearchConfig::from_env(),
    )
    .await
    .context("failed to open the memtree service")?;

    match cli.command {
        Commands::AddMessage {
            user,
            conversation,
            kind,
            timestamp,
            text,
        } => cmd_add_message(&service, user, conversation, kind, timestamp, text).await,
        Commands::Search { user, query } => cmd_search(&service, &user, &query).await,
        Commands::Remember { user, content } => cmd_remember(&service, &user, &content).await,
        Commands::Memories { user } => cmd_memories(&service, &user).await,
        Commands::History { user, conversation } => {
            cmd_history(&service, &user, &conversation).await
        }
        Commands::Retrieve { user, query } => cmd_retrieve(&service, &user, &query).await,
        Commands::Stats { user } => cmd_stats(&service, &user).await,
    }
}

async fn cmd_add_message(
    service: &Memtree,
    user: String,
    conversation: String,
    kind: String,
    timestamp: Option<String>,
    text: String,
) -> Result<()> {
    let kind: MessageKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let ack = service
        .add_message(NewMessage {
            user_id: user,
            conversation_id: conversation,
            kind,
            text,
            timestamp,
        })
        .await?;

    println!("Stored message {}", ack.message_id);
    if ack.memory_scheduled {
        println!("Memory consolidation scheduled");
        // The consolidation task runs detached; give it a moment before
        // the process exits
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
    Ok(())
}

async fn cmd_search(service: &Memtree, user: &str, query: &str) -> Result<()> {
    let response = service.search(user, query).await?;

    println!(
        "=== Search ({}) — {}/{} relevant ===",
        response.metadata.search_type,
        response.metadata.relevant_results,
        response.metadata.total_results
    );
    if response.results.is_empty() {
        println!("No documents found.");
        return Ok(());
    }

    for result in &response.results {
        println!(
            "[{:.3}] {} ({}, {})",
            result.scores.hybrid,
            result.message.text,
            result.message.conversation_id,
            format_timestamp(result.message.timestamp)
        );
    }
    Ok(())
}

async fn cmd_remember(service: &Memtree, user: &str, content: &str) -> Result<()> {
    match service.remember(user, content).await? {
        RememberOutcome::Reinforced { node_id } => {
            println!("Reinforced existing memory {}", node_id);
        }
        RememberOutcome::Created {
            node_id,
            importance,
            summary,
        } => {
            println!("Created memory {} (importance {:.2})", node_id, importance);
            println!("Summary: {}", summary);
        }
    }
    Ok(())
}

async fn cmd_memories(service: &Memtree, user: &str) -> Result<()> {
    let nodes = service.memories(user).await?;
    if nodes.is_empty() {
        println!("No memories for {}.", user);
        return Ok(());
    }

    println!(
        "{:<36}  {:>6}  {:>6}  {:>6}  {}",
        "NODE ID", "IMP", "EFF", "HITS", "SUMMARY"
    );
    println!("{}", "-".repeat(100));
    for node in &nodes {
        let summary = node.summary.chars().take(40).collect::<String>();
        println!(
            "{:<36}  {:>6.2}  {:>6.2}  {:>6}  {}",
            node.id,
            node.importance,
            node.effective_importance(),
            node.access_count,
            summary
        );
    }
    println!("\nTotal: {} memories", nodes.len());
    Ok(())
}

async fn cmd_history(service: &Memtree, user: &str, conversation: &str) -> Result<()> {
    let messages = service.history(user, conversation).await?;
    if messages.is_empty() {
        println!("No messages in conversation {}.", conversation);
        return Ok(());
    }

    for message in &messages {
        println!(
            "[{}] {:>5}: {}",
            format_timestamp(message.timestamp),
            message.kind,
            message.text
        );
    }
    Ok(())
}

async fn cmd_retrieve(service: &Memtree, user: &str, query: &str) -> Result<()> {
    let response = service.retrieve(user, query).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_stats(service: &Memtree, user: &str) -> Result<()> {
    let count = service.memory_count(user).await?;
    let health = service.health_check().await;

    println!("=== memtree stats ===");
    println!("User:                 {}", user.to_lowercase());
    println!("Memory nodes:         {}", count);
    println!(
        "Vector index:         {}",
        if health.vector_index { "healthy" } else { "unreachable" }
    );
    println!(
        "Embedding capability: {}",
        if health.embedding_capability { "available" } else { "unavailable" }
    );
    Ok(())
}
