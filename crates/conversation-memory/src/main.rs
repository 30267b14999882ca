// conversation-memory/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use conversation_memory::{
    telemetry, Config, ContextAssembler, ContextFormat, DetailLevel, ImpactLevel, InsightParams,
    MemoryDatabase, MessageParams, SearchScope,
};

const CLEAR_CONFIRMATION: &str = "I_UNDERSTAND_THIS_WILL_DELETE_ALL_DATA";

#[derive(Parser)]
#[command(name = "conversation-memory", version, about = "Conversation and insight memory store")]
struct Cli {
    /// Database file; overrides MEMORY_DB_PATH. Use ":memory:" for a throwaway store.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store one message
    Save {
        #[arg(long, default_value = "user")]
        role: String,
        #[arg(long)]
        content: String,
        #[arg(long = "topic")]
        topics: Vec<String>,
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Store a user message and the assistant's reply in today's session
    Record {
        #[arg(long)]
        user: String,
        #[arg(long)]
        assistant: String,
        #[arg(long = "topic")]
        topics: Vec<String>,
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
    /// Store a distilled insight
    Insight {
        #[arg(long = "type")]
        insight_type: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value_t = 0.5)]
        relevance: f64,
        #[arg(long, default_value = "general")]
        business_area: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long, default_value = "medium")]
        impact: String,
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long = "action")]
        actions: Vec<String>,
    },
    /// Find messages by topic, keyword or technical term
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "all")]
        scope: String,
    },
    /// Assemble context over the most recent messages
    Context {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "adaptive")]
        detail: String,
        #[arg(long, default_value = "narrative")]
        format: String,
    },
    /// Highest-relevance insights
    Insights {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Counters and topic distribution
    Analytics,
    /// Backfill derived fields on records written by older versions
    Migrate,
    /// Check that the store answers
    Health,
    /// Delete everything
    Clear {
        #[arg(long)]
        confirm: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    telemetry::init_tracing();
    config.print_config();

    let database = Arc::new(
        MemoryDatabase::open(&config)
            .with_context(|| format!("Failed to open {}", config.db_path.display()))?,
    );

    run(cli.command, &config, &database)?;

    match Arc::try_unwrap(database) {
        Ok(database) => database.close()?,
        Err(_) => info!("Database still shared at exit; relying on drop to checkpoint"),
    }
    Ok(())
}

fn run(command: Command, config: &Config, database: &Arc<MemoryDatabase>) -> anyhow::Result<()> {
    let store = &database.conversations;

    match command {
        Command::Save {
            role,
            content,
            topics,
            keywords,
            session,
        } => {
            let id = store.save_message(MessageParams {
                role: &role,
                content: &content,
                topics: &topics,
                keywords: &keywords,
                session_id: session.as_deref(),
            })?;
            print_json(&json!({ "message_id": id }))
        }
        Command::Record {
            user,
            assistant,
            topics,
            keywords,
        } => {
            let (user_id, assistant_id) = store.record_exchange(&user, &assistant, &topics, &keywords)?;
            print_json(&json!({ "user_message_id": user_id, "assistant_message_id": assistant_id }))
        }
        Command::Insight {
            insight_type,
            content,
            relevance,
            business_area,
            summary,
            impact,
            sources,
            actions,
        } => {
            let id = store.save_insight(InsightParams {
                insight_type: &insight_type,
                content: &content,
                source_messages: &sources,
                relevance_score: relevance,
                business_area: &business_area,
                summary: summary.as_deref(),
                impact_level: ImpactLevel::from(impact.as_str()),
                actionable_items: &actions,
            })?;
            print_json(&json!({ "insight_id": id }))
        }
        Command::Search { terms, limit, scope } => {
            let limit = limit.unwrap_or(config.search_limit);
            let results = store.search(&terms, limit, SearchScope::from(scope.as_str()))?;
            print_json(&json!({ "count": results.len(), "results": results }))
        }
        Command::Context {
            limit,
            detail,
            format,
        } => {
            let assembler = ContextAssembler::new(Arc::clone(database));
            let rendered = assembler.export(
                ContextFormat::from(format.as_str()),
                limit.unwrap_or(config.context_limit),
                DetailLevel::from(detail.as_str()),
            )?;
            println!("{}", rendered);
            Ok(())
        }
        Command::Insights { limit } => {
            let insights = store.get_top_insights(limit)?;
            print_json(&json!({ "count": insights.len(), "insights": insights }))
        }
        Command::Analytics => print_json(&store.analytics()?),
        Command::Migrate => print_json(&database.migrate_existing_messages()?),
        Command::Health => {
            database.ping()?;
            print_json(&json!({
                "status": "healthy",
                "database": config.db_path.display().to_string(),
                "total_messages": store.message_count()?,
                "total_insights": store.insight_count()?,
            }))
        }
        Command::Clear { confirm } => {
            if confirm != CLEAR_CONFIRMATION {
                bail!("Refusing to clear: pass --confirm {}", CLEAR_CONFIRMATION);
            }
            database.clear_all()?;
            print_json(&json!({ "status": "cleared" }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
