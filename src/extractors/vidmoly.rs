//! Vidmoly serves a "Please wait" gate page first; the real player page is
//! behind the same URL with a `g` token appended.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;

use super::{fetch_embed_page, unpack_all, ExtractorEngine};
use crate::models::ResolvedStream;

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (mut body, _) = fetch_embed_page(url, url).await?;

        if is_wait_page(&body) && !url.contains("?g=") {
            if let Some(token) = wait_page_token(&body) {
                let gated = append_gate_token(url, &token);
                debug!("vidmoly following gate redirect {gated}");
                (body, _) = fetch_embed_page(&gated, url).await?;
            }
        }

        let all_text = unpack_all(&body, 2);
        Ok(find_file_source(&all_text).map(|src| ResolvedStream::from_url(src, url)))
    })
}

fn is_wait_page(body: &str) -> bool {
    body.contains("Please wait") || body.contains("startLoading")
}

fn wait_page_token(body: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\s*\+=\s*['"]\?g=([a-f0-9]+)['"]"#).unwrap())
        .captures(body)
        .map(|c| c[1].to_string())
}

fn append_gate_token(url: &str, token: &str) -> String {
    if url.contains('?') {
        format!("{url}&g={token}")
    } else {
        format!("{url}?g={token}")
    }
}

/// `file:` sources from plain or unpacked player setup, `.m3u8`/`.mp4` only.
fn find_file_source(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"file\s*:\s*["'](https?://[^"']+)["']"#).unwrap())
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|src| src.contains(".m3u8") || src.contains(".mp4"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_token_is_parsed_from_wait_page() {
        let body = r#"<script>function startLoading(){ var url = location.href; url += '?g=9af31b'; }</script>Please wait"#;
        assert!(is_wait_page(body));
        assert_eq!(wait_page_token(body).unwrap(), "9af31b");
    }

    #[test]
    fn gate_token_respects_existing_query() {
        assert_eq!(
            append_gate_token("https://vidmoly.net/embed-x.html", "ab12"),
            "https://vidmoly.net/embed-x.html?g=ab12"
        );
        assert_eq!(
            append_gate_token("https://vidmoly.net/embed-x.html?t=1", "ab12"),
            "https://vidmoly.net/embed-x.html?t=1&g=ab12"
        );
    }

    #[test]
    fn file_source_requires_media_extension() {
        let text = r#"
            sources: [{file: "https://vidmoly.net/thumb.jpg"},
                      {file:"https://m-cdn.example/hls/master.m3u8"}]
        "#;
        assert_eq!(
            find_file_source(text).unwrap(),
            "https://m-cdn.example/hls/master.m3u8"
        );
    }
}
