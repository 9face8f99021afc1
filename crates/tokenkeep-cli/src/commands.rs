//! Subcommand implementations.

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::Value;

use tokenkeep_client::ApiClient;
use tokenkeep_common::{FileTokenStore, Fingerprint, HttpMethod, RequestOptions, TokenStore};

use crate::display;

/// Prints the fingerprint a request would be cached under.
pub fn fingerprint(method: HttpMethod, endpoint: &str, options: &RequestOptions) {
    display::display_fingerprint(&Fingerprint::compute(method, endpoint, options));
}

pub fn list_tokens(store: &FileTokenStore, reveal: bool) -> Result<()> {
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("{}", format!("No tokens in {}", store.path().display()).dimmed());
        return Ok(());
    }

    for (fingerprint, token) in &entries {
        display::display_token(fingerprint, token, reveal);
    }
    println!(
        "\n{} token(s) in {}",
        entries.len().to_string().bright_cyan(),
        store.path().display()
    );
    Ok(())
}

pub fn get_token(store: &FileTokenStore, fingerprint: &str) -> Result<()> {
    match store.get(fingerprint)? {
        Some(token) => println!("{token}"),
        None => bail!("no token cached for {fingerprint}"),
    }
    Ok(())
}

pub fn invalidate_token(store: &FileTokenStore, fingerprint: &str) -> Result<()> {
    if store.remove(fingerprint)? {
        println!("{} Invalidated {fingerprint}", "✓".bright_green());
    } else {
        println!("{} No token cached for {fingerprint}", "·".dimmed());
    }
    Ok(())
}

/// Empties the store. Refuses unless confirmed with `--yes`.
pub fn clear_tokens(store: &FileTokenStore, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "refusing to clear {} without --yes",
            store.path().display()
        );
    }

    let dropped = store.clear()?;
    println!(
        "{} Cleared {dropped} token(s) from {}",
        "✓".bright_green(),
        store.path().display()
    );
    Ok(())
}

/// Shows how a call is routed, then sends it unless `dry_run` is set.
pub async fn call(
    client: &ApiClient,
    method: HttpMethod,
    endpoint: &str,
    options: &RequestOptions,
    dry_run: bool,
) -> Result<()> {
    let route = client.route_for(method, endpoint, options).await?;
    let request = client.build_request(method, endpoint, options, &route)?;
    display::display_route(&route, request.url().as_str());

    if dry_run {
        return Ok(());
    }

    match client.send::<Value>(method, endpoint, options, &route).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "Error:".bright_red());
            if e.is_unauthorized() {
                eprintln!(
                    "{}",
                    "The cached token was rejected; run `tokenkeep tokens invalidate` to route through the proxy again."
                        .yellow()
                );
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("tokens.json"))
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("get:/users>abc", "t1").unwrap();

        assert!(clear_tokens(&store, false).is_err());
        assert_eq!(store.get("get:/users>abc").unwrap().as_deref(), Some("t1"));

        clear_tokens(&store, true).unwrap();
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_token_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(get_token(&store, "get:/users>abc").is_err());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("get:/users>abc", "t1").unwrap();
        store.set("get:/posts>def", "t2").unwrap();

        invalidate_token(&store, "get:/users>abc").unwrap();
        invalidate_token(&store, "get:/users>abc").unwrap();

        assert_eq!(store.get("get:/users>abc").unwrap(), None);
        assert_eq!(store.get("get:/posts>def").unwrap().as_deref(), Some("t2"));
    }
}
