//! Dsvplay pages are packed JS plus, occasionally, a base64-buried stream URL.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;

use super::{
    fetch_embed_page, find_media_url, fix_protocol_relative, generic, unpack_all, ExtractorEngine,
};
use crate::models::ResolvedStream;

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, _) = fetch_embed_page(url, url).await?;
        let all_text = unpack_all(&body, 2);

        if let Some(media) = find_media_url(&all_text).or_else(|| find_var_source(&all_text)) {
            return Ok(Some(ResolvedStream::from_url(media, url)));
        }

        Ok(generic::scan_base64_streams(&all_text).map(|u| ResolvedStream::from_url(u, url)))
    })
}

/// Player variables carrying a media URL without an absolute literal nearby.
fn find_var_source(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:file|source|src|url)\s*[:=]\s*["']([^"'\s]+)["']"#).unwrap()
    })
    .captures_iter(text)
    .map(|c| fix_protocol_relative(&c[1].replace("\\/", "/")))
    .find(|u| u.contains(".m3u8") || u.contains(".mp4"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_source_fixes_protocol_relative() {
        let text = r#"player.src = { file: "//ds-cdn.example/v/clip.mp4" };"#;
        assert_eq!(
            find_var_source(text).unwrap(),
            "https://ds-cdn.example/v/clip.mp4"
        );
    }

    #[test]
    fn non_media_vars_are_ignored() {
        let text = r#"var url = "/static/app.js"; var src = "poster.jpg";"#;
        assert!(find_var_source(text).is_none());
    }
}
