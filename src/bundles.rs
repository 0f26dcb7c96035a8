//! Discovery of boot-critical bundles referenced by the app shell.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Finds quoted bundle references (`"/assets/index-abc.js"`) in an HTML body.
#[derive(Clone, Debug)]
pub struct BundleScanner {
    pattern: Regex,
}

impl BundleScanner {
    /// Build a scanner for bundles under `asset_prefix` (e.g. `/assets/`).
    pub fn new(asset_prefix: &str) -> Result<Self> {
        let pattern = format!(
            r#"["']({}[^"']+\.(?:js|mjs|css))["']"#,
            regex::escape(asset_prefix)
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| CacheError::configuration(format!("bundle pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Referenced paths in document order, without duplicates.
    pub fn scan(&self, html: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for caps in self.pattern.captures_iter(html) {
            let path = &caps[1];
            if !found.iter().any(|p| p == path) {
                found.push(path.to_string());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHELL: &str = r#"<!doctype html>
<html>
  <head>
    <script type="module" crossorigin src="/assets/index-D4f9a.js"></script>
    <link rel="modulepreload" href='/assets/vendor-x1.mjs'>
    <link rel="stylesheet" href="/assets/index-Bq2.css">
    <link rel="icon" href="/assets/favicon.png">
    <script src="https://cdn.example.com/assets/lib.js"></script>
    <script type="module" src="/assets/index-D4f9a.js"></script>
  </head>
</html>"#;

    #[test]
    fn test_scan_finds_bundles_in_order() {
        let scanner = BundleScanner::new("/assets/").unwrap();
        assert_eq!(
            scanner.scan(SHELL),
            vec![
                "/assets/index-D4f9a.js",
                "/assets/vendor-x1.mjs",
                "/assets/index-Bq2.css",
            ]
        );
    }

    #[test]
    fn test_scan_respects_prefix() {
        let scanner = BundleScanner::new("/static/").unwrap();
        assert!(scanner.scan(SHELL).is_empty());
        assert_eq!(
            scanner.scan(r#"<script src="/static/app.js">"#),
            vec!["/static/app.js"]
        );
    }
}
