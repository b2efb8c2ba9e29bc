//! OK.ru keeps player metadata in an HTML-escaped `data-options` attribute:
//! JSON with a `flashvars.metadata` field that is itself a JSON string.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

use super::{fetch_embed_page, find_media_url, ExtractorEngine};
use crate::models::{MediaType, ResolvedStream};

const REFERER: &str = "https://ok.ru/";

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let embed_url = url.replace("/video/", "/videoembed/");
        let (body, _) = fetch_embed_page(&embed_url, REFERER).await?;

        if let Some(metadata) = parse_metadata(&body) {
            if let Some((stream_url, media_type)) = best_stream(&metadata) {
                return Ok(Some(ResolvedStream {
                    url: stream_url,
                    media_type,
                    headers: [("Referer".to_string(), REFERER.to_string())].into(),
                }));
            }
        }

        Ok(find_media_url(&body).map(|u| ResolvedStream::from_url(u, REFERER)))
    })
}

fn parse_metadata(body: &str) -> Option<Value> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let raw = RE
        .get_or_init(|| Regex::new(r#"data-options="([^"]+)""#).unwrap())
        .captures(body)
        .map(|c| unescape_html(&c[1]))?;

    let options: Value = serde_json::from_str(&raw).ok()?;
    let metadata = options.get("flashvars")?.get("metadata")?;
    match metadata {
        Value::String(inner) => serde_json::from_str(inner).ok(),
        other => Some(other.clone()),
    }
}

/// HLS manifests first; otherwise the highest-numbered MP4 rendition.
fn best_stream(metadata: &Value) -> Option<(String, MediaType)> {
    for key in ["hlsMasterPlaylistUrl", "hlsManifestUrl", "ondemandHls"] {
        if let Some(url) = metadata.get(key).and_then(|v| v.as_str()) {
            return Some((url.to_string(), MediaType::Hls));
        }
    }

    metadata
        .get("videos")?
        .as_array()?
        .iter()
        .max_by_key(|v| {
            v.get("name")
                .and_then(|n| n.as_str())
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(0)
        })
        .and_then(|v| v.get("url").and_then(|u| u.as_str()))
        .map(|u| (u.to_string(), MediaType::Mp4))
}

fn unescape_html(input: &str) -> String {
    input
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
