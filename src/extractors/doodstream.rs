//! DoodStream hands out the stream base URL through a `pass_md5` token
//! endpoint; the final URL wants a random-looking tail plus the token back.

use std::sync::OnceLock;

use chrono::Utc;
use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Url;

use super::{fetch_embed_page, ExtractorEngine};
use crate::models::{MediaType, ResolvedStream};
use crate::utils;

const TAIL: &str = "d96ZdcNq9N";

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, final_url) = fetch_embed_page(url, url).await?;

        let Some(endpoint) = find_pass_md5(&body) else {
            return Ok(None);
        };
        let Some(host) = Url::parse(&final_url).ok().and_then(|u| u.host_str().map(String::from))
        else {
            return Ok(None);
        };

        let token_url = format!("https://{host}{endpoint}");
        let base = utils::create_client()
            .get(&token_url)
            .header("Referer", final_url.as_str())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let media_url = build_media_url(&base, &endpoint);
        Ok(Some(ResolvedStream {
            url: media_url,
            media_type: MediaType::Mp4,
            headers: [("Referer".to_string(), format!("https://{host}/"))].into(),
        }))
    })
}

fn find_pass_md5(body: &str) -> Option<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();

    QUOTED
        .get_or_init(|| Regex::new(r#"["'](/pass_md5/[^"']+)["']"#).unwrap())
        .captures(body)
        .or_else(|| {
            BARE.get_or_init(|| Regex::new(r#"(/pass_md5/[^\s"')]+)"#).unwrap())
                .captures(body)
        })
        .map(|c| c[1].to_string())
}

fn build_media_url(base: &str, endpoint: &str) -> String {
    let token = endpoint.rsplit('/').next().unwrap_or_default();
    let expiry = Utc::now().timestamp_millis();
    format!("{base}{TAIL}?token={token}&expiry={expiry}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_md5_endpoint_is_found_quoted_or_bare() {
        let quoted = r#"$.get('/pass_md5/21356/abcdef123', function(data) {"#;
        assert_eq!(find_pass_md5(quoted).unwrap(), "/pass_md5/21356/abcdef123");

        let bare = "makePlay(/pass_md5/9/xyz)";
        assert_eq!(find_pass_md5(bare).unwrap(), "/pass_md5/9/xyz");
    }

    #[test]
    fn media_url_carries_token_and_expiry() {
        let url = build_media_url("https://d-cdn.example/stream/", "/pass_md5/21356/abcdef123");
        assert!(url.starts_with("https://d-cdn.example/stream/d96ZdcNq9N?token=abcdef123&expiry="));
    }
}
