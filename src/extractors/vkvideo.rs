//! VK video embeds declare their renditions in a `playerParams`/`videoConfig`
//! JS object: an `hls` manifest when available, numbered MP4 URLs otherwise.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

use super::{fetch_embed_page, ExtractorEngine};
use crate::models::{MediaType, ResolvedStream};

const REFERER: &str = "https://vk.com/";

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, _) = fetch_embed_page(url, REFERER).await?;

        if let Some(params) = find_player_params(&body) {
            if let Some((stream_url, media_type)) = stream_from_params(&params) {
                return Ok(Some(ResolvedStream {
                    url: stream_url,
                    media_type,
                    headers: [("Referer".to_string(), REFERER.to_string())].into(),
                }));
            }
        }

        static HLS_RE: OnceLock<Regex> = OnceLock::new();
        let fallback = HLS_RE
            .get_or_init(|| Regex::new(r#"["'](https?://[^"'\s]+\.m3u8[^"'\s]*)["']"#).unwrap())
            .captures(&body)
            .map(|c| c[1].replace("\\/", "/"));

        Ok(fallback.map(|u| ResolvedStream::from_url(u, REFERER)))
    })
}

fn find_player_params(body: &str) -> Option<Value> {
    static VIDEO_CONFIG: OnceLock<Regex> = OnceLock::new();
    static PLAYER_PARAMS: OnceLock<Regex> = OnceLock::new();

    let raw = VIDEO_CONFIG
        .get_or_init(|| Regex::new(r"videoConfig\s*:\s*(\{.+?\}),\s*playerConfig").unwrap())
        .captures(body)
        .or_else(|| {
            PLAYER_PARAMS
                .get_or_init(|| Regex::new(r"var\s+playerParams\s*=\s*(\{.+?\});").unwrap())
                .captures(body)
        })
        .map(|c| c[1].replace("\\/", "/"))?;

    serde_json::from_str(&raw).ok()
}

/// HLS first, then the highest declared MP4 quality.
fn stream_from_params(params: &Value) -> Option<(String, MediaType)> {
    if let Some(hls) = params.get("hls").and_then(|v| v.as_str()) {
        return Some((hls.to_string(), MediaType::Hls));
    }

    for quality in ["url1080", "url720", "url480", "url360"] {
        if let Some(url) = params.get(quality).and_then(|v| v.as_str()) {
            return Some((url.to_string(), MediaType::Mp4));
        }
    }
    None
}
