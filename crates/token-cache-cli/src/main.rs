//! token-cache CLI - inspect and manage cached login credentials
//!
//! Uses the same backend selection as applications embedding the library,
//! so `token-cache status` shows what a login flow on this machine would use.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};

use token_cache::{derive_host, CacheSettings, CredentialCache, CredentialKind, Platform};

/// token-cache - cached login credentials in OS secure storage
#[derive(Parser, Debug)]
#[command(name = "token-cache")]
#[command(version)]
#[command(about = "Inspect and manage cached login credentials")]
struct Args {
    /// Path to a JSON settings file
    #[arg(long, env = "TOKEN_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the platform and the secure storage backend in use
    Status,

    /// Check whether a credential is cached (prints a redacted prefix only)
    Get(EntryArgs),

    /// Cache a credential
    Set {
        #[command(flatten)]
        entry: EntryArgs,

        /// Secret to store; prompted for when omitted
        #[arg(long, env = "TOKEN_CACHE_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Remove a cached credential
    Delete(EntryArgs),
}

#[derive(clap::Args, Debug)]
struct EntryArgs {
    /// Credential kind (id_token, mfa_token, oauth_access_token, oauth_refresh_token)
    #[arg(long)]
    kind: CredentialKind,

    /// Service host, e.g. acct.example.com
    #[arg(long)]
    host: String,

    #[arg(long)]
    user: String,

    /// OAuth token endpoint; OAuth entries are keyed by its host
    #[arg(long)]
    oauth_endpoint: Option<String>,
}

impl EntryArgs {
    fn cache_host(&self) -> token_cache::Result<String> {
        derive_host(self.kind, &self.host, self.oauth_endpoint.as_deref())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let settings = match &args.config {
        Some(path) => CacheSettings::load(path)
            .map_err(|e| format!("Failed to load settings from {:?}: {}", path, e))?,
        None => CacheSettings::default(),
    };
    debug!("Using settings: {:?}", settings);

    let platform = Platform::detect();
    let cache = CredentialCache::for_platform(&platform, &settings);

    if matches!(args.command, Command::Set { .. } | Command::Delete(_)) && !cache.is_available() {
        let reason = cache
            .unavailable_reason()
            .map(ToString::to_string)
            .unwrap_or_default();
        return Err(format!("Secure storage unavailable: {}", reason).into());
    }

    match args.command {
        Command::Status => {
            println!("Platform: {}", platform);
            match (cache.backend_name(), cache.unavailable_reason()) {
                (Some(name), _) => println!("Backend:  {}", name),
                (None, Some(reason)) => println!("Backend:  unavailable ({})", reason),
                (None, None) => println!("Backend:  unavailable"),
            }
        }
        Command::Get(entry) => {
            let cached = cache
                .fill(
                    entry.kind,
                    &entry.host,
                    &entry.user,
                    entry.oauth_endpoint.as_deref(),
                )
                .await?;
            match cached {
                Some(secret) => println!("{}: cached ({})", entry.kind, secret.redacted_prefix()),
                None => println!("{}: not cached", entry.kind),
            }
        }
        Command::Set { entry, secret } => {
            let secret = match secret {
                Some(secret) => secret,
                None => rpassword::prompt_password(format!("{}: ", entry.kind))?,
            };
            if secret.is_empty() {
                return Err("Empty secret; nothing to store".into());
            }
            let host = entry.cache_host()?;
            cache.write(entry.kind, &host, &entry.user, &secret).await;

            // Write failures are only logged by the cache; read back to report them.
            match cache.inspect(entry.kind, &host, &entry.user).await {
                Ok(Some(stored)) if stored.expose() == secret => {
                    println!("{}: stored for {}@{}", entry.kind, entry.user, host)
                }
                Ok(_) => {
                    return Err(format!(
                        "{}: not stored for {}@{} (see log)",
                        entry.kind, entry.user, host
                    )
                    .into())
                }
                Err(e) => {
                    return Err(format!(
                        "{}: write for {}@{} could not be confirmed: {}",
                        entry.kind, entry.user, host, e
                    )
                    .into())
                }
            }
        }
        Command::Delete(entry) => {
            let host = entry.cache_host()?;
            cache.delete(entry.kind, &host, &entry.user).await;

            match cache.inspect(entry.kind, &host, &entry.user).await {
                Ok(None) => println!("{}: removed for {}@{}", entry.kind, entry.user, host),
                Ok(Some(_)) => {
                    return Err(format!(
                        "{}: still cached for {}@{} (see log)",
                        entry.kind, entry.user, host
                    )
                    .into())
                }
                Err(e) => {
                    return Err(format!(
                        "{}: removal for {}@{} could not be confirmed: {}",
                        entry.kind, entry.user, host, e
                    )
                    .into())
                }
            }
        }
    }

    Ok(())
}
