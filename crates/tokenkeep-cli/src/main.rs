//! tokenkeep CLI
//!
//! Computes request fingerprints, inspects and invalidates entries in a token
//! store, and sends ad-hoc calls through the dual-mode client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use tokenkeep_client::config::{DEFAULT_PRODUCTION_URL, DEFAULT_PROXY_URL, default_token_path};
use tokenkeep_client::{ApiClient, ClientConfig};
use tokenkeep_common::{FileTokenStore, HttpMethod, RequestOptions};

mod commands;
mod display;

#[derive(Parser, Debug)]
#[command(name = "tokenkeep", author, version, about, long_about = None)]
struct Cli {
    /// Token store file (default: ./tokens.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fingerprint a request would be cached under
    Fingerprint {
        /// HTTP method (get, post, put, delete)
        method: HttpMethod,

        /// Endpoint path, e.g. /users/42
        endpoint: String,

        #[command(flatten)]
        shape: ShapeArgs,
    },

    /// Inspect or invalidate cached tokens
    #[command(subcommand)]
    Tokens(TokensCommand),

    /// Send a request through the dual-mode client
    Call {
        /// HTTP method (get, post, put, delete)
        method: HttpMethod,

        /// Endpoint path, e.g. /users
        endpoint: String,

        /// Tenant name sent as the app header
        #[arg(long)]
        app: String,

        /// Base URL for direct calls
        #[arg(long, default_value = DEFAULT_PRODUCTION_URL)]
        production_url: String,

        /// Base URL of the auth proxy
        #[arg(long, default_value = DEFAULT_PROXY_URL)]
        proxy_url: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only print where the request would go
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        shape: ShapeArgs,
    },
}

#[derive(Subcommand, Debug)]
enum TokensCommand {
    /// List every cached token
    List {
        /// Print tokens in full instead of masked
        #[arg(long)]
        reveal: bool,
    },

    /// Show the token cached for a fingerprint
    Get {
        /// Fingerprint, e.g. get:/users>icNfi78w
        fingerprint: String,
    },

    /// Drop the token for a fingerprint so the next call goes through the proxy
    Invalidate {
        /// Fingerprint, e.g. get:/users>icNfi78w
        fingerprint: String,
    },

    /// Drop every cached token
    Clear {
        /// Confirm clearing the whole store
        #[arg(long)]
        yes: bool,
    },
}

/// Request options that shape authorization and paging.
#[derive(Args, Debug, Default)]
struct ShapeArgs {
    /// JSON request body
    #[arg(long, conflicts_with = "sql")]
    body: Option<String>,

    /// Raw query, sent as {"sql": ...}
    #[arg(long)]
    sql: Option<String>,

    #[arg(long)]
    page: Option<String>,

    #[arg(long)]
    sort: Option<String>,

    /// Joined collections
    #[arg(long)]
    joins: Option<String>,

    #[arg(long)]
    filter: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    nearby: Option<String>,

    #[arg(long)]
    hidden: Option<String>,

    #[arg(long)]
    fields: Option<String>,

    #[arg(long)]
    session: Option<String>,

    #[arg(long)]
    validation: Option<String>,

    #[arg(long)]
    permissions: Option<String>,
}

impl ShapeArgs {
    fn into_options(self) -> Result<RequestOptions> {
        let body = match (self.body, self.sql) {
            (Some(body), _) => Some(
                serde_json::from_str::<Value>(&body).context("--body must be valid JSON")?,
            ),
            (None, Some(sql)) => Some(json!({ "sql": sql })),
            (None, None) => None,
        };

        Ok(RequestOptions {
            body,
            page: self.page,
            sort: self.sort,
            joins: self.joins,
            filter: self.filter,
            search: self.search,
            nearby: self.nearby,
            hidden: self.hidden,
            fields: self.fields,
            session: self.session,
            validation: self.validation,
            permissions: self.permissions,
            ..RequestOptions::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let store_path = cli.store.unwrap_or_else(default_token_path);
    log::debug!("Using token store {}", store_path.display());

    match cli.command {
        Command::Fingerprint {
            method,
            endpoint,
            shape,
        } => {
            commands::fingerprint(method, &endpoint, &shape.into_options()?);
        }
        Command::Tokens(command) => {
            let store = FileTokenStore::new(store_path);
            match command {
                TokensCommand::List { reveal } => commands::list_tokens(&store, reveal)?,
                TokensCommand::Get { fingerprint } => commands::get_token(&store, &fingerprint)?,
                TokensCommand::Invalidate { fingerprint } => {
                    commands::invalidate_token(&store, &fingerprint)?;
                }
                TokensCommand::Clear { yes } => commands::clear_tokens(&store, yes)?,
            }
        }
        Command::Call {
            method,
            endpoint,
            app,
            production_url,
            proxy_url,
            timeout,
            dry_run,
            shape,
        } => {
            let mut config = ClientConfig::new(app)
                .with_production_url(production_url)
                .with_proxy_url(proxy_url)
                .with_token_path(store_path);
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }

            let client = ApiClient::new(config)?;
            commands::call(&client, method, &endpoint, &shape.into_options()?, dry_run).await?;
        }
    }

    Ok(())
}
