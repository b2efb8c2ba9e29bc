use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
    Anime,
    Course,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Hls,
    Mp4,
}

/// One card on a listing/search page. `id` is the reversible encoding of the
/// source page URL (see [`crate::utils::codec`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub poster: String,
    pub kind: ContentKind,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub id: String,
    pub title: String,
    /// Best-effort parsed number; 0 when the page gives none. Zero sorts last.
    pub episode: u32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRef {
    pub name: String,
    pub embed_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadLink {
    pub quality: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub poster: String,
    pub kind: ContentKind,
    pub source: String,
    pub episodes: Vec<EpisodeRef>,
    pub servers: Vec<ServerRef>,
    pub download_links: Vec<DownloadLink>,
}

/// Terminal output of the extractor engine: a directly playable URL plus the
/// headers the player must send to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub url: String,
    pub media_type: MediaType,
    pub headers: HashMap<String, String>,
}

impl ResolvedStream {
    /// Media type by URL suffix; upstream hosts serve either HLS playlists or
    /// progressive MP4, nothing else survives extraction.
    pub fn from_url(url: String, referer: &str) -> Self {
        let media_type = if url.contains(".m3u8") {
            MediaType::Hls
        } else {
            MediaType::Mp4
        };
        Self {
            url,
            media_type,
            headers: HashMap::from([("Referer".to_string(), referer.to_string())]),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServerStatus {
    Ok,
    Failed,
}

/// A server entry after running it through the extractor engine. Failed
/// servers are kept so clients can still offer the raw embed as a manual
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedServer {
    pub name: String,
    pub embed_url: String,
    pub status: ServerStatus,
    pub stream: Option<ResolvedStream>,
}

/// Sort key honouring "unnumbered episodes go last".
pub fn episode_sort_key(ep: &EpisodeRef) -> (bool, u32) {
    (ep.episode == 0, ep.episode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnumbered_episodes_sort_last() {
        let mut eps: Vec<EpisodeRef> = [3, 0, 1, 2]
            .iter()
            .map(|&n| EpisodeRef {
                id: format!("ep{n}"),
                title: format!("episode {n}"),
                episode: n,
                url: String::new(),
            })
            .collect();
        eps.sort_by_key(episode_sort_key);
        let order: Vec<u32> = eps.iter().map(|e| e.episode).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn media_type_by_suffix() {
        let hls = ResolvedStream::from_url("https://cdn.example/master.m3u8?t=1".into(), "https://voe.sx/e/x");
        assert_eq!(hls.media_type, MediaType::Hls);
        assert_eq!(hls.headers.get("Referer").unwrap(), "https://voe.sx/e/x");

        let mp4 = ResolvedStream::from_url("https://cdn.example/video.mp4".into(), "r");
        assert_eq!(mp4.media_type, MediaType::Mp4);
    }
}
