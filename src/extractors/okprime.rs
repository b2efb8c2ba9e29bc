//! The aggregator's own player domains (okprime and the mirror-family hosts).
//! Pages are a mix of JS redirects, nested iframes pointing at the real host,
//! and packed JS hiding a direct stream.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;
use reqwest::Url;

use super::{
    fetch_embed_page, find_inner_iframe, find_js_redirect, find_media_url, unpack_all,
    ExtractorEngine,
};
use crate::models::ResolvedStream;

pub fn extract<'a>(
    engine: &'a ExtractorEngine,
    url: &'a str,
    depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, final_url) = fetch_embed_page(url, url).await?;

        if let Some(redirect) = find_js_redirect(&body) {
            debug!("player js redirect -> {redirect}");
            return Ok(engine.extract_at(&redirect, depth + 1).await);
        }

        if let Some(inner) = find_inner_iframe(&body) {
            debug!("nested player iframe -> {inner}");
            return Ok(engine.extract_at(&inner, depth + 1).await);
        }

        let all_text = unpack_all(&body, 3);

        if let Some(media) = find_media_url(&all_text) {
            let origin = origin_of(&final_url);
            let mut stream = ResolvedStream::from_url(media, &final_url);
            if let Some(origin) = origin {
                stream = stream.with_header("Origin", &origin);
            }
            return Ok(Some(stream));
        }

        Ok(find_sources_file(&all_text).map(|u| ResolvedStream::from_url(u, &final_url)))
    })
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(format!("{}://{}", parsed.scheme(), parsed.host_str()?))
}

/// JWPlayer-style `sources: [{file: ...}]` block.
fn find_sources_file(text: &str) -> Option<String> {
    static SOURCES: OnceLock<Regex> = OnceLock::new();
    static FILE: OnceLock<Regex> = OnceLock::new();

    let block = SOURCES
        .get_or_init(|| Regex::new(r"(?s)sources\s*:\s*\[(.*?)\]").unwrap())
        .captures(text)?;
    FILE.get_or_init(|| Regex::new(r#"file\s*:\s*["'](https?://[^"']+)["']"#).unwrap())
        .captures(&block[1])
        .map(|c| c[1].replace("\\/", "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_block_yields_file_url() {
        let text = r#"
            jwplayer("player").setup({
              sources: [{file: "https://st9.example/hls/,x,.urlset/master.m3u8", label: "auto"}],
              image: "poster.jpg"
            });
        "#;
        assert_eq!(
            find_sources_file(text).unwrap(),
            "https://st9.example/hls/,x,.urlset/master.m3u8"
        );
    }

    #[test]
    fn origin_strips_path() {
        assert_eq!(
            origin_of("https://q.larooza.video/embed-x.html").unwrap(),
            "https://q.larooza.video"
        );
    }
}
