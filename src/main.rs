use std::error::Error;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use rust_social_chat::api::{RestClient, username_from_token};
use rust_social_chat::config::{self, AppConfig};
use rust_social_chat::error::ChatError;
use rust_social_chat::session::ChatSession;
use rust_social_chat::ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "rust_social_chat",
    version,
    about = "Real-time chat client for the social backend"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Log in and store the session token in the config file
    Login {
        username: String,
        #[arg(long, env = "SOCIAL_PASSWORD")]
        password: String,
    },
    /// Open a live conversation with a user
    Chat { username: String },
    /// List conversations
    Inbox,
    /// Print the message history with a user
    History { username: String },
    /// List notifications
    Notifications {
        /// Mark everything read afterwards
        #[arg(long)]
        mark_read: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).apply_env_overrides();

    match cli.mode {
        Mode::Login { username, password } => {
            let rest = RestClient::new(app_config.api_base_url.clone(), None);
            let token = rest.login(&username, &password).await?;
            config::persist_token(&cli.config, &token);
            println!("Logged in as {username}");
        }
        Mode::Chat { username } => run_chat(&app_config, &username).await?,
        Mode::Inbox => {
            let rest = rest_client(&app_config)?;
            for summary in rest.inbox().await? {
                println!(
                    "{:<20} {}",
                    summary.username,
                    summary.last_message.as_deref().unwrap_or("")
                );
            }
        }
        Mode::History { username } => {
            let rest = rest_client(&app_config)?;
            for message in rest.conversation(&username).await? {
                println!(
                    "[{}] {}: {}",
                    message.created_at.format("%Y-%m-%d %H:%M"),
                    message.sender,
                    message.content_str()
                );
            }
        }
        Mode::Notifications { mark_read } => {
            let rest = rest_client(&app_config)?;
            for notification in rest.notifications().await? {
                let marker = if notification.read { ' ' } else { '*' };
                println!("{marker} {}", notification.message);
            }
            if mark_read {
                rest.mark_all_notifications_read().await?;
            }
        }
    }

    Ok(())
}

async fn run_chat(app_config: &AppConfig, peer: &str) -> Result<(), ChatError> {
    let token = app_config.token.clone().ok_or(ChatError::MissingToken)?;
    let me = username_from_token(&token)?;
    log::info!("Opening chat with {peer} as {me}");

    let session = ChatSession::open(app_config.session_config(&token)).await?;
    let rest = RestClient::new(app_config.api_base_url.clone(), Some(token));

    let mut app = ChatApp::new(session, rest, &me, peer);
    if let Err(err) = app.load().await {
        log::warn!("Could not load history with {peer}: {err}");
    }
    app.run().await
}

fn rest_client(app_config: &AppConfig) -> Result<RestClient, ChatError> {
    let token = app_config.token.clone().ok_or(ChatError::MissingToken)?;
    Ok(RestClient::new(app_config.api_base_url.clone(), Some(token)))
}
