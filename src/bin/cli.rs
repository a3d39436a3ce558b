//! GlobeTalk CLI
//!
//! Command-line interface for GlobeTalk operations:
//! - Read, send and report chat messages
//! - Watch a chat for new messages
//! - Fetch and seed profiles
//! - Check backend status

use anyhow::Context;
use clap::{Parser, Subcommand};
use globetalk::client::GlobeTalkClient;
use globetalk::config::{generate_default_config, Config};
use globetalk::model::{Chat, ChatMessage, Language, NewReport, Profile};
use globetalk::poller::{ChatPoller, PollerConfig};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "globetalk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pen-pal chat from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL (default: NEXT_PUBLIC_API_URL, GLOBETALK_API_URL, [client] base_url
    /// from config.toml, or http://localhost:5000)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the backend is up
    Health,

    /// Print a chat's messages in delivery order
    Chat {
        /// Chat id
        chat_id: String,
    },

    /// Send a message
    Send {
        chat_id: String,
        /// Sender user id
        #[arg(short, long)]
        sender: String,
        /// Message text
        text: String,
    },

    /// Report a message
    Report {
        chat_id: String,
        /// Reporter user id
        #[arg(short, long)]
        reporter: String,
        /// Sender of the reported message
        #[arg(long)]
        sender: String,
        /// Text of the reported message
        #[arg(long)]
        text: String,
        /// Delivery time of the reported message (ms)
        #[arg(long)]
        delivery_time: i64,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Poll a chat and print messages as they arrive
    Watch {
        chat_id: String,
        /// Poll interval in milliseconds (default: [poller] interval_ms, 3000)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Show a user's profile
    Profile {
        user_id: String,
    },

    /// Create the two demo profiles
    Seed,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "globetalk=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json = cli.format == "json";

    let config = Config::load_default();
    let client_config = config.client.to_client_config_with(cli.api_url.clone());
    let base_url = client_config.base_url.clone();
    let client = GlobeTalkClient::new(client_config)?;

    match cli.command {
        Commands::Health => match client.health().await {
            Ok(health) => {
                println!("GlobeTalk CLI v{}", env!("CARGO_PKG_VERSION"));
                println!("API status: {} ({})", health.status, health.message);
            }
            Err(e) => {
                eprintln!("Cannot connect to GlobeTalk API at {}", base_url);
                eprintln!("Error: {}", e);
                eprintln!();
                eprintln!("Make sure the GlobeTalk API server is running:");
                eprintln!("  cargo run --bin globetalk-api");
                std::process::exit(1);
            }
        },

        Commands::Chat { chat_id } => {
            let chat = client.fetch_chat(&chat_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chat)?);
            } else {
                print_chat(&chat);
            }
        }

        Commands::Send {
            chat_id,
            sender,
            text,
        } => {
            let message = ChatMessage::now(sender, text);
            client.send_message(&chat_id, &message).await?;
            println!("Sent to {} at {}", chat_id, format_time(message.delivery_millis()));
        }

        Commands::Report {
            chat_id,
            reporter,
            sender,
            text,
            delivery_time,
            reason,
        } => {
            let message = ChatMessage::new(sender, text, delivery_time);
            let mut report = NewReport::for_message(chat_id, &message, reporter);
            if let Some(reason) = reason {
                report = report.reason(reason);
            }
            client.report_message(&report).await?;
            println!("Report submitted");
        }

        Commands::Watch {
            chat_id,
            interval_ms,
        } => {
            let poller_config = config.poller.to_poller_config_with(interval_ms);
            watch(client, chat_id, &poller_config).await?
        }

        Commands::Profile { user_id } => {
            let profile = client.fetch_profile(&user_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("{} ({})", profile.username, profile.user_id);
                println!("  Languages: {}", profile.language.names().join(", "));
                println!("  Timezone:  {}", profile.timezone);
                println!("  Age range: {}", profile.age_range);
                println!("  Hobbies:   {}", profile.hobbies.join(", "));
                if !profile.intro.is_empty() {
                    println!("  Intro:     {}", profile.intro);
                }
            }
        }

        Commands::Seed => {
            for profile in demo_profiles() {
                client
                    .save_profile(&profile)
                    .await
                    .with_context(|| format!("Seeding {}", profile.username))?;
                println!("Seeded {} ({})", profile.username, profile.user_id);
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, config)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

/// Print each newly seen message until Ctrl+C
async fn watch(
    client: GlobeTalkClient,
    chat_id: String,
    config: &PollerConfig,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let Some(poller) = ChatPoller::spawn(Arc::new(client), chat_id.clone(), config, &shutdown)
    else {
        anyhow::bail!("Chat id must not be empty");
    };
    let mut updates = poller.subscribe();
    let mut seen: HashSet<String> = HashSet::new();

    eprintln!("Watching {} (Ctrl+C to stop)", chat_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let mut fresh: Vec<ChatMessage> = updates
                    .borrow_and_update()
                    .iter()
                    .flatten()
                    .filter(|m| !seen.contains(&message_key(m)))
                    .cloned()
                    .collect();
                fresh.sort_by_key(ChatMessage::delivery_millis);
                for message in fresh {
                    print_message(&message);
                    seen.insert(message_key(&message));
                }
            }
        }
    }

    shutdown.cancel();
    poller.stop().await;
    Ok(())
}

/// Identity of a message for de-duplication: its full JSON form
fn message_key(message: &ChatMessage) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

fn print_chat(chat: &Chat) {
    if !chat.users.is_empty() {
        println!("Chat between {}", chat.users.join(" and "));
        println!("{}", "-".repeat(60));
    }
    let messages = chat.messages_by_delivery();
    if messages.is_empty() {
        println!("No messages yet.");
    }
    for message in messages {
        print_message(message);
    }
}

fn print_message(message: &ChatMessage) {
    println!(
        "[{}] {:<20} {}",
        format_time(message.delivery_millis()),
        message.sender,
        message.text
    );
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Two demo users in different timezones
fn demo_profiles() -> Vec<Profile> {
    vec![
        Profile {
            user_id: "vAVstGYbfsh8HL0GtAQSqt1GSvJ2".to_string(),
            username: "penpal_tokyo".to_string(),
            intro: "Hello from Tokyo! I love exchanging letters about travel and photography."
                .to_string(),
            age_range: "25-34".to_string(),
            language: Language::One("Japanese".to_string()),
            timezone: "(UTC+09:00) Osaka, Sapporo, Tokyo".to_string(),
            hobbies: vec!["travel".to_string(), "photography".to_string()],
            avatar_url: "https://api.dicebear.com/9.x/avataaars/svg?seed=tokyo&top=dreads02"
                .to_string(),
            country: Some("Japan".to_string()),
            ..Default::default()
        },
        Profile {
            user_id: "YEYbsnLkxKOg7LgLpg1W5nQuFdr1".to_string(),
            username: "lazyfrog685".to_string(),
            intro: "sdf".to_string(),
            age_range: "18-24".to_string(),
            language: Language::One("Xhosa".to_string()),
            timezone: "(UTC+02:00) Harare, Pretoria, Johannesburg".to_string(),
            hobbies: vec!["sad".to_string(), "fas".to_string()],
            avatar_url: "https://api.dicebear.com/9.x/avataaars/svg?seed=k9a8tusa&top=dreads02"
                .to_string(),
            country: Some("South Africa".to_string()),
            ..Default::default()
        },
    ]
}
