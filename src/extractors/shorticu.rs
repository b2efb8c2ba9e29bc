//! Short.icu is a redirector, not a host. Resolve where it points and hand
//! the target back to the engine.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;
use reqwest::Url;

use super::{fetch_embed_page, ExtractorEngine};
use crate::fetcher::parse_soft_redirect;
use crate::models::ResolvedStream;

const KNOWN_HOSTS: &[&str] = &["vidmoly", "voe", "ok.ru", "vk.com", "dood", "streaming"];

pub fn extract<'a>(
    engine: &'a ExtractorEngine,
    url: &'a str,
    depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, final_url) = fetch_embed_page(url, url).await?;

        if let Some(target) = parse_soft_redirect(&body, &final_url) {
            debug!("short.icu soft redirect -> {target}");
            return Ok(engine.extract_at(&target, depth + 1).await);
        }

        // HTTP redirects may already have left the redirector's domain
        let landed_elsewhere = Url::parse(&final_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| !h.contains("short.icu")))
            .unwrap_or(false);
        if landed_elsewhere {
            return Ok(engine.extract_at(&final_url, depth + 1).await);
        }

        if let Some(link) = find_known_host_link(&body) {
            debug!("short.icu embedded link -> {link}");
            return Ok(engine.extract_at(&link, depth + 1).await);
        }

        Ok(None)
    })
}

fn find_known_host_link(body: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^"'\s<>]+"#).unwrap())
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .find(|link| KNOWN_HOSTS.iter().any(|h| link.contains(h)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_host_link_is_picked_out() {
        let body = r#"
            <script src="https://cdn.shorticu.example/app.js"></script>
            <script>load("https://vidmoly.net/embed-abc.html")</script>
        "#;
        assert_eq!(
            find_known_host_link(body).unwrap(),
            "https://vidmoly.net/embed-abc.html"
        );
    }

    #[test]
    fn unrelated_links_are_ignored() {
        let body = r#"<a href="https://cdn.example/help">help</a>"#;
        assert!(find_known_host_link(body).is_none());
    }
}
