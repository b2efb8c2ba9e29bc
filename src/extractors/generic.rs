//! Last-chance extraction for hosts without a dedicated adapter. Fetches the
//! page, follows one JS redirect, unpacks nested packed JS, then scans for
//! stream URLs in decreasing order of confidence.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;

use super::{
    fetch_embed_page, find_js_redirect, fix_protocol_relative, is_ad_url, unpack_all,
    ExtractorEngine,
};
use crate::models::ResolvedStream;
use crate::utils::codec;

const UNPACK_LEVELS: usize = 5;
// interstitial redirect pages are tiny; full player pages are not
const REDIRECT_PAGE_MAX_LEN: usize = 5000;

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        debug!("generic extracting {url}");
        let (mut body, mut final_url) = fetch_embed_page(url, url).await?;

        if body.len() < REDIRECT_PAGE_MAX_LEN {
            if let Some(redirect) = find_js_redirect(&body) {
                debug!("generic following js redirect {redirect}");
                (body, final_url) = fetch_embed_page(&redirect, url).await?;
            }
        }

        let all_text = unpack_all(&body, UNPACK_LEVELS);
        Ok(scan(&all_text, &final_url))
    })
}

/// Pattern scan over page text (plus any unpacked JS). Order is deliberate:
/// player variables first, raw literals next, base64-buried URLs last.
pub(crate) fn scan(text: &str, referer: &str) -> Option<ResolvedStream> {
    let text = fix_relative_media(text);

    for strategy in [
        scan_mdcore_vars,
        scan_quality_keys,
        super::find_media_url,
        scan_file_property,
        scan_base64_streams,
    ] {
        if let Some(url) = strategy(&text) {
            return Some(ResolvedStream::from_url(url, referer));
        }
    }
    None
}

/// Protocol-relative media literals break the later absolute-URL scans.
fn fix_relative_media(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["']//([^"'\s]+\.(?:m3u8|mp4)[^"'\s]*)"#).unwrap()
    })
    .replace_all(text, "\"https://$1")
    .into_owned()
}

/// Mixdrop-family player variables (`MDCore.wurl` and friends).
fn scan_mdcore_vars(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:wurl|vfile|video_url|v_url|vurl|vsrc)\s*[:=]\s*["']([^"']+)["']"#).unwrap()
    })
    .captures(text)
    .map(|c| fix_protocol_relative(&c[1]))
    .filter(|u| !is_ad_url(u))
}

/// VOE-style `h`/`m`/`l` quality keys.
fn scan_quality_keys(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["'](?:h|m|l)["']\s*[:=]\s*["'](https?://[^"']+)["']"#).unwrap()
    })
    .captures(text)
    .map(|c| c[1].replace("\\/", "/"))
    .filter(|u| !is_ad_url(u))
}

/// JWPlayer/VideoJS `file:` property.
fn scan_file_property(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"file\s*[:=]\s*["'](https?://[^"']+)["']"#).unwrap())
        .captures(text)
        .map(|c| c[1].replace("\\/", "/"))
        .filter(|u| (u.contains(".m3u8") || u.contains(".mp4")) && !is_ad_url(u))
}

/// Stream URLs hidden inside long base64 literals.
pub(crate) fn scan_base64_streams(text: &str) -> Option<String> {
    static B64: OnceLock<Regex> = OnceLock::new();
    static STREAM: OnceLock<Regex> = OnceLock::new();

    let b64_re = B64.get_or_init(|| Regex::new(r#"["']([A-Za-z0-9+/]{40,}=*)["']"#).unwrap());
    let stream_re = STREAM.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'\\]+\.(?:m3u8|mp4)[^\s"'\\]*"#).unwrap()
    });

    for caps in b64_re.captures_iter(text) {
        let Some(decoded) = codec::decode_base64_text(&caps[1]) else {
            continue;
        };
        if let Some(m) = stream_re.find(&decoded) {
            let url = m.as_str().to_string();
            if !is_ad_url(&url) {
                return Some(url);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use base64::{engine::general_purpose::STANDARD, Engine};

    #[test]
    fn mdcore_vars_win_over_raw_literals() {
        let text = r#"
            MDCore.wurl = "//s-delivery.mxcontent.net/v/abc.mp4?s=1";
            var other = "https://cdn.example/decoy.mp4";
        "#;
        let stream = scan(text, "https://mixdrop.ag/e/x").unwrap();
        assert_eq!(stream.url, "https://s-delivery.mxcontent.net/v/abc.mp4?s=1");
        assert_eq!(stream.media_type, MediaType::Mp4);
    }

    #[test]
    fn quality_keys_skip_ad_urls() {
        let text = r#"{"h": "https://doubleclick.net/x.m3u8", "file": "https://cdn.example/s.m3u8"}"#;
        let stream = scan(text, "r").unwrap();
        assert_eq!(stream.url, "https://cdn.example/s.m3u8");
    }

    #[test]
    fn protocol_relative_literals_are_fixed() {
        let text = r#"var v = "//cdn.example/path/video.m3u8?tok=1";"#;
        let stream = scan(text, "r").unwrap();
        assert_eq!(stream.url, "https://cdn.example/path/video.m3u8?tok=1");
        assert_eq!(stream.media_type, MediaType::Hls);
    }

    #[test]
    fn base64_buried_stream_is_found() {
        let inner = "player config: https://cdn.example/hidden/master.m3u8?sig=abc end";
        let text = format!(r#"<script>var blob = "{}";</script>"#, STANDARD.encode(inner));
        let stream = scan(&text, "r").unwrap();
        assert_eq!(stream.url, "https://cdn.example/hidden/master.m3u8?sig=abc");
    }

    #[test]
    fn pure_ad_page_yields_nothing() {
        let text = r#"var u = "https://tracker.example/ads/clip.mp4";"#;
        assert!(scan(text, "r").is_none());
    }
}
