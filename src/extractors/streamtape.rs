//! Streamtape assembles the video URL in JS by concatenating string pieces
//! into the `robotlink` (older pages: `videolink`) element. Joining the
//! quoted pieces of that assignment reproduces the link.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;

use super::{fetch_embed_page, fix_protocol_relative, ExtractorEngine};
use crate::models::{MediaType, ResolvedStream};

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let (body, final_url) = fetch_embed_page(url, url).await?;

        let Some(link) = find_video_link(&body) else {
            return Ok(None);
        };
        debug!("streamtape assembled link on {final_url}");

        Ok(Some(ResolvedStream {
            url: link,
            media_type: MediaType::Mp4,
            headers: [("Referer".to_string(), final_url)].into(),
        }))
    })
}

/// Joins every quoted piece on the right-hand side of the
/// `getElementById('robotlink').innerHTML = ...` assignment.
pub(crate) fn find_video_link(body: &str) -> Option<String> {
    static ROBOT: OnceLock<Regex> = OnceLock::new();
    static VIDEO: OnceLock<Regex> = OnceLock::new();
    static PIECE: OnceLock<Regex> = OnceLock::new();

    let robot = ROBOT.get_or_init(|| {
        Regex::new(r#"document\.getElementById\(['"]robotlink['"]\)\.innerHTML\s*=\s*(['"].*?['"]);"#)
            .unwrap()
    });
    let video = VIDEO.get_or_init(|| {
        Regex::new(r#"document\.getElementById\(['"]videolink['"]\)\.innerHTML\s*=\s*(['"].*?['"]);"#)
            .unwrap()
    });

    let rhs = robot
        .captures(body)
        .or_else(|| video.captures(body))?
        .get(1)?
        .as_str()
        .to_string();

    let piece_re = PIECE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());
    let link: String = piece_re
        .captures_iter(&rhs)
        .map(|c| c[1].to_string())
        .collect();
    if link.is_empty() {
        return None;
    }
    Some(fix_protocol_relative(&link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_robotlink_pieces_are_joined() {
        let body = r#"
          <div id="robotlink" style="display:none;"></div>
          <script>
            document.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=abc' + '&expires=171&ip=xyz&token=q9N';
          </script>"#;
        assert_eq!(
            find_video_link(body).unwrap(),
            "https://streamtape.com/get_video?id=abc&expires=171&ip=xyz&token=q9N"
        );
    }

    #[test]
    fn legacy_videolink_element_is_accepted() {
        let body = r#"document.getElementById("videolink").innerHTML = "//streamtape.net/get_video?id=z";"#;
        assert_eq!(
            find_video_link(body).unwrap(),
            "https://streamtape.net/get_video?id=z"
        );
    }

    #[test]
    fn page_without_assignment_yields_nothing() {
        assert_eq!(find_video_link("<html><body>404</body></html>"), None);
    }
}
