//! Display utilities for CLI output formatting

use colored::Colorize;
use tokenkeep_client::Route;
use tokenkeep_common::Fingerprint;

/// Characters of a token shown when masked.
const VISIBLE_PREFIX: usize = 6;

/// Masks all but the first few characters of a token.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(VISIBLE_PREFIX).collect();
    if visible.len() == token.len() {
        visible
    } else {
        format!("{visible}…")
    }
}

/// Display a fingerprint with its path and short code highlighted
pub fn display_fingerprint(fingerprint: &Fingerprint) {
    println!("{}", fingerprint.as_str().bright_white().bold());
    println!("  {} {}", "code:".dimmed(), fingerprint.code().bright_cyan());
}

/// Display one store entry
pub fn display_token(fingerprint: &str, token: &str, reveal: bool) {
    let token = if reveal {
        token.to_string()
    } else {
        mask_token(token)
    };
    println!("{}  {}", fingerprint.bright_white(), token.bright_black());
}

/// Display where a request is (or would be) sent
pub fn display_route(route: &Route, url: &str) {
    match route {
        Route::Direct { token } => println!(
            "{} {url} {}",
            "direct".bright_green(),
            format!("(token {})", mask_token(token)).dimmed()
        ),
        Route::Proxied {
            fingerprint,
            store_location,
        } => println!(
            "{} {url} {}",
            "proxied".bright_yellow(),
            format!("(token-key {fingerprint}, token-path {store_location})").dimmed()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abc"), "abc");
        assert_eq!(mask_token("abcdef"), "abcdef");
        assert_eq!(mask_token("abcdefghij"), "abcdef…");
        assert_eq!(mask_token("ééééééé"), "éééééé…");
    }
}
