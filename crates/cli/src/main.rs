//! Pavilion admin CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pavilion_cli::api_client::{ApiClient, CreateTokenRequest, SkillQuery};

/// Pavilion - admin client for the skills directory server
#[derive(Parser, Debug)]
#[command(name = "pavilion")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server base URL
    #[arg(long, env = "PAVILION_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Admin API key
    #[arg(long, env = "PAVILION_API_KEY")]
    api_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse the skill directory
    Skills {
        #[command(subcommand)]
        command: SkillsCommand,
    },
    /// Manage API keys
    Tokens {
        #[command(subcommand)]
        command: TokensCommand,
    },
    /// Control the catalog sync job
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    /// Run a stat backfill invocation now
    Backfill,
    /// Moderate skills
    Moderate {
        #[command(subcommand)]
        command: ModerateCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SkillsCommand {
    /// List skills, optionally filtered
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Substring search over name and description
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one skill
    Show { slug: String },
}

#[derive(Subcommand, Debug)]
enum TokensCommand {
    /// Create an API key (the secret prints once)
    Create {
        /// Scopes, e.g. skills:read reviews:write admin
        #[arg(required = true)]
        scopes: Vec<String>,
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        expires_in_secs: Option<u64>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List API keys
    List,
    /// Revoke an API key
    Revoke { token_id: String },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Start a sync run now
    Trigger,
    /// Show the sync checkpoint and directory summary
    Status,
}

#[derive(Subcommand, Debug)]
enum ModerateCommand {
    /// Hide a skill from listings
    Hide {
        slug: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Restore a hidden skill
    Unhide { slug: String },
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = ApiClient::new(&args.url, &args.api_key)?;

    match args.command {
        Command::Skills { command } => match command {
            SkillsCommand::List {
                category,
                tag,
                search,
                limit,
            } => {
                let query = SkillQuery {
                    category,
                    tag,
                    search,
                    limit,
                };
                let response = client.list_skills(&query).await?;
                for skill in &response.skills {
                    let slug = skill["slug"].as_str().unwrap_or("?");
                    let category = skill["category"].as_str().unwrap_or("-");
                    let mean = skill["ratings"]["combined"]["mean"]
                        .as_f64()
                        .map(|m| format!("{m:.1}"))
                        .unwrap_or_else(|| "unrated".to_string());
                    println!("{slug:<40} {category:<16} {mean}");
                }
                println!("({} skills)", response.count);
            }
            SkillsCommand::Show { slug } => {
                let response = client.get_skill(&slug).await?;
                print_json(&response.skill);
            }
        },
        Command::Tokens { command } => match command {
            TokensCommand::Create {
                scopes,
                agent_id,
                expires_in_secs,
                description,
            } => {
                let response = client
                    .create_token(CreateTokenRequest {
                        scopes,
                        agent_id,
                        expires_in_secs,
                        description,
                    })
                    .await?;
                println!("token_id: {}", response.token_id);
                println!("secret:   {} (shown once, store it now)", response.token_secret);
                if let Some(expires_at) = response.expires_at {
                    println!("expires:  {expires_at}");
                }
            }
            TokensCommand::List => {
                let response = client.list_tokens().await?;
                for token in &response.tokens {
                    let status = if token.revoked_at.is_some() {
                        "revoked"
                    } else {
                        "active"
                    };
                    println!(
                        "{} {:<8} {:<32} {}",
                        token.token_id,
                        status,
                        token.scopes.join(","),
                        token.description.as_deref().unwrap_or("-"),
                    );
                }
            }
            TokensCommand::Revoke { token_id } => {
                client.revoke_token(&token_id).await?;
                println!("revoked {token_id}");
            }
        },
        Command::Sync { command } => match command {
            SyncCommand::Trigger => {
                client.trigger_sync().await?;
                println!("sync triggered");
            }
            SyncCommand::Status => {
                let status = client.sync_status().await?;
                print_json(&status);
            }
        },
        Command::Backfill => {
            client.trigger_backfill().await?;
            println!("backfill triggered");
        }
        Command::Moderate { command } => match command {
            ModerateCommand::Hide { slug, reason } => {
                client.hide_skill(&slug, reason.as_deref()).await?;
                println!("hidden {slug}");
            }
            ModerateCommand::Unhide { slug } => {
                client.unhide_skill(&slug).await?;
                println!("restored {slug}");
            }
        },
    }

    Ok(())
}
