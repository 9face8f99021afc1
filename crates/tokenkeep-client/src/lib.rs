//! # tokenkeep-client
//!
//! Client for a backend-as-a-service that authorizes each request shape with
//! its own short-lived token.
//!
//! The first call of a given shape is routed through the local auth proxy,
//! which attaches operator credentials and records the token the upstream
//! issues. Every later call of that shape goes straight to production with the
//! cached token.
//!
//! ## Example
//!
//! ```no_run
//! use tokenkeep_client::{ApiClient, ClientConfig};
//! use tokenkeep_common::RequestOptions;
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), tokenkeep_client::ClientError> {
//! let client = ApiClient::new(ClientConfig::new("trendingcut"))?;
//!
//! let options = RequestOptions::builder().fields("id,name").page("1").build();
//! let users: Value = client.get("/users", &options).await?;
//! println!("{users}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod route;

pub use client::{ApiClient, sql_endpoint};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use route::Route;
