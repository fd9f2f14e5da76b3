#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for searching the shared mailbox and administering the
//! protected-email registry

use clap::{Parser, Subcommand};
use mailscout::{
    AdminConfig, AdminCredential, AdminDirectory, ImapConfig, JsonFileStore, Message,
    SearchRequest, SearchService, SessionManager, UpdateOp, generate_access_key,
    verifier_from_config,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailscout-cli")]
#[command(about = "Search a shared mailbox by recipient, with access-key gating")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Admin credential: shared key (falls back to ADMIN_KEY)
    #[arg(long, global = true)]
    admin_key: Option<String>,

    /// Admin credential: session token from `login`
    #[arg(long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Search messages sent to an address in the last 24 hours
    Search {
        /// Target recipient address
        email: String,

        /// Access key, for protected addresses
        #[arg(long)]
        key: Option<String>,
    },

    /// Check whether an address is protected and a key unlocks it
    Verify {
        email: String,

        #[arg(long)]
        key: Option<String>,
    },

    /// Protect a new address (key generated when omitted)
    Add {
        email: String,

        #[arg(long)]
        key: Option<String>,
    },

    /// List protected addresses with registry stats
    List,

    /// Lock a protected address by record id
    Lock { id: String },

    /// Unlock a protected address by record id
    Unlock { id: String },

    /// Rotate the access key of a record (new key generated when omitted)
    Rotate {
        id: String,

        #[arg(long)]
        key: Option<String>,
    },

    /// Delete a protected-address record
    Remove { id: String },

    /// Open an admin session (session-token auth strategy only)
    Login { password: String },

    /// Close an admin session
    Logout { session_token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let admin_config = AdminConfig::from_env()?;
    let store = Arc::new(JsonFileStore::open(&admin_config.registry_path));

    match &args.command {
        Command::Search { email, key } => {
            let service = SearchService::new(ImapConfig::from_env()?, Arc::clone(&store));
            let request = SearchRequest {
                target_email: email.clone(),
                access_key: key.clone(),
            };
            let response = service.search(&request).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_message_table(&response.messages);
                println!(
                    "{} scanned, {} verification email(s) blocked",
                    response.security.total_scanned, response.security.verification_emails_blocked,
                );
            }
        }
        Command::Verify { email, key } => {
            let service = SearchService::new(ImapConfig::from_env()?, Arc::clone(&store));
            let response = service.verify_access(email, key.as_deref())?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.message);
            }
        }
        Command::Add { email, key } => {
            let record =
                directory(&admin_config, &store)?.create(
                    &credential(&args)?,
                    email,
                    key.clone(),
                )?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("Protected {} (id {})", record.email, record.id);
                println!("Access key: {}", record.access_key);
            }
        }
        Command::List => {
            let listing = directory(&admin_config, &store)?.list(&credential(&args)?)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for record in &listing.emails {
                    println!(
                        "{:<20} {:<32} {:<8} accesses: {}",
                        record.id,
                        record.email,
                        if record.is_locked { "locked" } else { "open" },
                        record.access_count,
                    );
                }
                println!(
                    "\n{} total ({} locked, {} unlocked)",
                    listing.stats.total, listing.stats.locked, listing.stats.unlocked
                );
            }
        }
        Command::Lock { id } => {
            directory(&admin_config, &store)?.update(
                &credential(&args)?,
                id,
                &[UpdateOp::SetLocked(true)],
            )?;
            println!("Locked {id}");
        }
        Command::Unlock { id } => {
            directory(&admin_config, &store)?.update(
                &credential(&args)?,
                id,
                &[UpdateOp::SetLocked(false)],
            )?;
            println!("Unlocked {id}");
        }
        Command::Rotate { id, key } => {
            let new_key = key.clone().unwrap_or_else(generate_access_key);
            directory(&admin_config, &store)?.update(
                &credential(&args)?,
                id,
                &[UpdateOp::SetAccessKey(new_key.clone())],
            )?;
            println!("New access key for {id}: {new_key}");
        }
        Command::Remove { id } => {
            directory(&admin_config, &store)?.delete(&credential(&args)?, id)?;
            println!("Removed {id}");
        }
        Command::Login { password } => {
            let ticket = session_manager(&admin_config, &store)?.login(password)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&ticket)?);
            } else {
                println!("Token: {}", ticket.token);
                println!("Expires: {}", ticket.expires_at);
            }
        }
        Command::Logout { session_token } => {
            session_manager(&admin_config, &store)?.logout(session_token)?;
            println!("Logged out");
        }
    }

    Ok(())
}

type Directory = AdminDirectory<Arc<JsonFileStore>, Box<dyn mailscout::CredentialVerifier>>;

fn directory(
    config: &AdminConfig,
    store: &Arc<JsonFileStore>,
) -> anyhow::Result<Directory> {
    let verifier = verifier_from_config(config, Arc::clone(store))?;
    Ok(AdminDirectory::new(Arc::clone(store), verifier))
}

fn session_manager(
    config: &AdminConfig,
    store: &Arc<JsonFileStore>,
) -> anyhow::Result<SessionManager<Arc<JsonFileStore>>> {
    let secret = config
        .session_secret
        .clone()
        .ok_or_else(|| anyhow::anyhow!("ADMIN_SESSION_SECRET not set"))?;
    let password = config
        .password
        .clone()
        .ok_or_else(|| anyhow::anyhow!("ADMIN_PASSWORD not set"))?;
    Ok(SessionManager::new(
        secret,
        password,
        config.session_ttl_hours,
        Arc::clone(store),
    )?)
}

fn credential(args: &Args) -> anyhow::Result<AdminCredential> {
    if let Some(token) = &args.token {
        return Ok(AdminCredential::Token(token.clone()));
    }
    if let Some(key) = &args.admin_key {
        return Ok(AdminCredential::Key(key.clone()));
    }
    if let Ok(key) = std::env::var("ADMIN_KEY") {
        return Ok(AdminCredential::Key(key));
    }
    anyhow::bail!("No admin credential: pass --admin-key/--token or set ADMIN_KEY")
}

fn print_message_table(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    let header = format!("{:<6} {:<20} {:<30} {}", "ID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<6} {:<20} {:<30} {}",
            message.id,
            message.date.format("%Y-%m-%d %H:%M"),
            truncate(&message.from, 28),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
