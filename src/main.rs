//! Triage CLI
//!
//! Command-line front end for the triage backend:
//! - Sign in (email/password, Google identity token) and out
//! - List, collect and correct classified messages
//! - Show analytics and dashboard stats
//!
//! The session is kept in the configured session store between runs.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use triage::client::UserSettings;
use triage::{
    generate_default_config, ApiClient, ClientConfig, Config, DataCache, LoggingConfig, Message,
    MessageContext, MessageQuery, MessageSource, PredictRequest, Priority, SessionCell,
    SessionManager, SessionState, TokenStore,
};

#[derive(Parser)]
#[command(name = "triage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Message triage client")]
#[command(long_about = "Triage classifies your Gmail and WhatsApp messages by priority and context.\nSign in, review messages, and correct the classifier.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend URL (overrides config)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "TRIAGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in with a Google identity token
    GoogleLogin {
        /// The ID token (JWT) issued by Google
        credential: String,
    },

    /// Create an account and sign in
    Register {
        name: String,
        email: String,
        #[arg(long, env = "TRIAGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the current session
    Status,

    /// List classified messages
    Messages {
        #[arg(long)]
        source: Option<MessageSource>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        context: Option<MessageContext>,
        #[arg(long)]
        search: Option<String>,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Collect new messages from a source
    Fetch {
        /// gmail or whatsapp (default from config)
        #[arg(long)]
        source: Option<MessageSource>,
    },

    /// Correct the classification of a message
    Feedback {
        message_id: String,
        priority: Priority,
        context: MessageContext,
    },

    /// Classify a message without storing it
    Predict {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "gmail")]
        source: MessageSource,
    },

    /// Show analytics for a time range
    Analytics {
        /// Time range (e.g., 7d, 30d, 90d)
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Show dashboard counters
    Stats,

    /// Show sentiment analysis for a time range
    Sentiment {
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Show or update user settings
    Settings {
        /// Settings to change, as key=value (values parsed as JSON when possible)
        #[arg(long = "set")]
        set: Vec<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config problems are reported before the configured subscriber exists
    let mut config = tracing::subscriber::with_default(
        startup_subscriber(log_filter("warn"), std::io::stderr),
        || match &cli.config {
            Some(path) => Config::load_with_env(path),
            None => Ok(Config::load_default()),
        },
    )?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.logging);
    let json = cli.format == "json";

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing config to {}", path.display()))?;
                println!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let cell = Arc::new(SessionCell::new(TokenStore::from_config(&config.session)));
    let client = Arc::new(ApiClient::new(ClientConfig::from(&config.api), Arc::clone(&cell))?);
    let sessions = SessionManager::new(Arc::clone(&client));
    let cache = DataCache::new(Arc::clone(&client), config.cache.clone());

    sessions.restore();
    tracing::debug!(state = sessions.state().label(), api = %client.config().base_url, "Session restored");

    match cli.command {
        Commands::Login { email, password } => {
            let session = sessions.login(&email, &password).await?;
            println!("Signed in as {} <{}>", session.display_name(), session.email());
        }

        Commands::GoogleLogin { credential } => {
            let session = sessions.google_login(&credential).await?;
            println!("Signed in as {} <{}>", session.display_name(), session.email());
        }

        Commands::Register {
            name,
            email,
            password,
        } => {
            let session = sessions.register(&name, &email, &password).await?;
            println!("Account created, signed in as {} <{}>", session.display_name(), session.email());
        }

        Commands::Logout => {
            sessions.logout().await;
            println!("Signed out");
        }

        Commands::Status => match sessions.state() {
            SessionState::Authenticated(session) => {
                if json {
                    let body = serde_json::json!({
                        "authenticated": true,
                        "email": session.email(),
                        "name": session.display_name(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    println!("Signed in as {} <{}>", session.display_name(), session.email());
                    println!("Backend: {}", client.config().base_url);
                }
            }
            _ => {
                if json {
                    println!("{}", serde_json::json!({ "authenticated": false }));
                } else {
                    println!("Not signed in");
                }
            }
        },

        Commands::Messages {
            source,
            priority,
            context,
            search,
            limit,
            offset,
        } => {
            require_session(&sessions)?;
            let query = MessageQuery {
                source,
                priority,
                context,
                search,
                limit,
                offset,
            };
            if !cache.fetch_messages(&query).await {
                bail!(failure(&cache, &sessions).await);
            }

            let messages = cache.messages().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_messages(&messages);
            }
        }

        Commands::Fetch { source } => {
            require_session(&sessions)?;
            let source = source.unwrap_or(config.cache.default_source);
            let response = cache.trigger_fetch(source).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if response.success {
                let count = cache.messages().await.len();
                println!("Collected from {}; {} messages now available", source, count);
            } else {
                println!(
                    "Collection from {} did not complete: {}",
                    source,
                    response.message.unwrap_or_else(|| "no details".to_string())
                );
            }
        }

        Commands::Feedback {
            message_id,
            priority,
            context,
        } => {
            require_session(&sessions)?;
            cache.submit_feedback(&message_id, priority, context).await?;
            println!("Feedback recorded: {} -> {} / {}", message_id, priority, context);
        }

        Commands::Predict {
            sender,
            subject,
            content,
            source,
        } => {
            require_session(&sessions)?;
            let request = PredictRequest {
                sender,
                subject,
                content,
                source,
            };
            let prediction = cache.predict_message(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else {
                let confidence = prediction
                    .confidence
                    .map(|c| format!(" ({:.0}%)", c * 100.0))
                    .unwrap_or_default();
                println!("{} / {}{}", prediction.priority, prediction.context, confidence);
            }
        }

        Commands::Analytics { range } => {
            require_session(&sessions)?;
            let range = range.unwrap_or_else(|| config.cache.analytics_range.clone());
            if !cache.fetch_analytics(&range).await {
                bail!(failure(&cache, &sessions).await);
            }
            let analytics = cache.analytics().await.unwrap_or_default();

            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                println!("Analytics ({})", range);
                println!("  Total messages:  {}", analytics.total_messages);
                println!("  Urgent messages: {}", analytics.urgent_messages);
                println!("  Accuracy:        {:.1}%", analytics.accuracy_rate * 100.0);
                for slice in &analytics.context_data {
                    println!("  {:<16} {}", slice.name, slice.value);
                }
                for bucket in &analytics.message_volume_data {
                    println!("  {:<16} {} messages", bucket.name, bucket.messages);
                }
            }
        }

        Commands::Stats => {
            require_session(&sessions)?;
            if !cache.fetch_dashboard_stats().await {
                bail!(failure(&cache, &sessions).await);
            }
            let stats = cache.stats().await.unwrap_or_default();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let mut keys: Vec<_> = stats.fields.keys().collect();
                keys.sort();
                for key in keys {
                    println!("{:<24} {}", key, stats.fields[key]);
                }
            }
        }

        Commands::Sentiment { range } => {
            require_session(&sessions)?;
            let range = range.unwrap_or_else(|| config.cache.analytics_range.clone());
            if !cache.fetch_sentiment(&range).await {
                bail!(failure(&cache, &sessions).await);
            }
            let sentiment = cache.sentiment().await.unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&sentiment)?);
        }

        Commands::Settings { set } => {
            require_session(&sessions)?;
            let settings = if set.is_empty() {
                client.user_settings().await?
            } else {
                let mut changes = UserSettings::new();
                for pair in &set {
                    let (key, value) = pair
                        .split_once('=')
                        .ok_or_else(|| anyhow!("expected key=value, got {}", pair))?;
                    let value = serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                    changes.insert(key.to_string(), value);
                }
                client.update_user_settings(&changes).await?
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// `RUST_LOG` when set, otherwise `triage=<level>`
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("triage={}", level)))
}

fn startup_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
}

fn init_logging(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(log_filter(&config.level));
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn require_session(sessions: &SessionManager) -> anyhow::Result<()> {
    if sessions.is_authenticated() {
        Ok(())
    } else {
        bail!("Not signed in. Run `triage login <email>` first.")
    }
}

/// Explain why a fetch did not replace its collection
async fn failure(cache: &DataCache, sessions: &SessionManager) -> String {
    if !sessions.is_authenticated() {
        return "Session expired. Sign in again.".to_string();
    }
    cache
        .error()
        .await
        .unwrap_or_else(|| "Request did not complete".to_string())
}

fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages");
        return;
    }

    println!(
        "{:<10} {:<9} {:<14} {:<9} {:<28} {}",
        "ID", "SOURCE", "PRIORITY", "CONTEXT", "SENDER", "SUBJECT"
    );
    for m in messages {
        println!(
            "{:<10} {:<9} {:<14} {:<9} {:<28} {}",
            truncate(&m.id, 10),
            m.source,
            m.priority,
            m.context,
            truncate(&m.sender, 28),
            m.subject
        );
    }
    println!("\n{} messages", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_config_is_reported_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = startup_subscriber(EnvFilter::new("triage=warn"), move || writer.clone());
        let config = tracing::subscriber::with_default(subscriber, || Config::load_first(&[path]));

        assert_eq!(config.cache.analytics_range, "30d");
        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Failed to load config"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("boss@corporation.example", 8), "boss@co…");
    }
}
