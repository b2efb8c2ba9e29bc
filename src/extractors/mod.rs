//! Embed URL resolution.
//!
//! One embed URL goes in, a directly playable stream comes out. The engine
//! classifies the URL by host, runs the matching adapter and falls back to a
//! generic pattern scan when no adapter matches or the adapter comes up
//! empty. Results are memoized because upstream hosts rotate signed URLs but
//! keep them valid for a while.

pub mod doodstream;
pub mod dsvplay;
pub mod generic;
pub mod mixdrop;
pub mod okprime;
pub mod okru;
pub mod shorticu;
pub mod streamtape;
pub mod vidmoly;
pub mod vkvideo;
pub mod voe;

use std::sync::Arc;
use std::sync::OnceLock;

use futures::future::{join_all, BoxFuture};
use log::{debug, warn};
use regex::Regex;
use reqwest::Url;

use crate::cache::PersistentCache;
use crate::models::{ResolvedServer, ResolvedStream, ServerRef, ServerStatus};
use crate::settings::settings;
use crate::utils::{self, unpack::packerjs};

/// Hosts embed each other; three hops covers every chain seen in the wild
/// and stops self-referencing redirect loops.
pub const MAX_DEPTH: usize = 3;

type AdapterFn =
    for<'a> fn(&'a ExtractorEngine, &'a str, usize) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>>;

pub struct HostAdapter {
    pub name: &'static str,
    domains: &'static [&'static str],
    run: AdapterFn,
}

impl HostAdapter {
    fn matches(&self, host: &str) -> bool {
        self.domains.iter().any(|d| host.contains(d))
    }
}

/// Ordered dispatch table. More specific hosts come before the aggregator's
/// own player domains, which match broadly.
static REGISTRY: &[HostAdapter] = &[
    HostAdapter {
        name: "shorticu",
        domains: &["short.icu"],
        run: shorticu::extract,
    },
    HostAdapter {
        name: "voe",
        domains: &["voe.sx", "voe.un", "voe.to", "voe.cc", "lauradaydo", "v-o-e"],
        run: voe::extract,
    },
    HostAdapter {
        name: "vidmoly",
        domains: &["vidmoly", "vidoba", "flashtoro"],
        run: vidmoly::extract,
    },
    HostAdapter {
        name: "mixdrop",
        domains: &["mixdrop", "mxdrop"],
        run: mixdrop::extract,
    },
    HostAdapter {
        name: "streamtape",
        domains: &["streamtape", "strtape", "streamta.pe", "shavetape"],
        run: streamtape::extract,
    },
    HostAdapter {
        name: "doodstream",
        domains: &["dood", "ds2play", "d000d", "d0000d", "dooood", "doody"],
        run: doodstream::extract,
    },
    HostAdapter {
        name: "okru",
        domains: &["ok.ru", "odnoklassniki"],
        run: okru::extract,
    },
    HostAdapter {
        name: "vkvideo",
        domains: &["vk.com", "vkvideo"],
        run: vkvideo::extract,
    },
    HostAdapter {
        name: "dsvplay",
        domains: &["dsvplay"],
        run: dsvplay::extract,
    },
    HostAdapter {
        name: "okprime",
        domains: &["okprime", "larooza", "laroza", "film77", "vidspeed", "abstream"],
        run: okprime::extract,
    },
];

pub fn adapter_for(host: &str) -> Option<&'static HostAdapter> {
    REGISTRY.iter().find(|a| a.matches(host))
}

pub struct ExtractorEngine {
    cache: Arc<PersistentCache>,
}

impl ExtractorEngine {
    pub fn new(cache: Arc<PersistentCache>) -> Self {
        Self { cache }
    }

    /// Resolve one embed URL. A memoized result short-circuits the whole
    /// pipeline; extraction failures yield `None`, never an error.
    pub async fn extract(&self, embed_url: &str) -> Option<ResolvedStream> {
        if let Some(hit) = self.cache.get_as::<ResolvedStream>(embed_url).await {
            debug!("extractor cache hit for {embed_url}");
            return Some(hit);
        }

        let resolved = self.extract_at(embed_url, 0).await?;
        self.cache
            .set_json(embed_url, &resolved, settings().stream_cache_ttl)
            .await;
        Some(resolved)
    }

    /// Depth-aware entry point; adapters re-enter here when an embed page
    /// turns out to wrap yet another host.
    pub fn extract_at<'a>(&'a self, url: &'a str, depth: usize) -> BoxFuture<'a, Option<ResolvedStream>> {
        Box::pin(async move {
            if depth > MAX_DEPTH {
                warn!("extraction depth exceeded at {url}");
                return None;
            }

            let host = Url::parse(url).ok()?.host_str()?.to_lowercase();

            if let Some(adapter) = adapter_for(&host) {
                match (adapter.run)(self, url, depth).await {
                    Ok(Some(stream)) => {
                        debug!("{} resolved {url}", adapter.name);
                        return Some(stream);
                    }
                    Ok(None) => debug!("{} found nothing for {url}", adapter.name),
                    Err(err) => warn!("{} failed for {url}: {err:#}", adapter.name),
                }
            }

            match generic::extract(self, url, depth).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("generic extraction failed for {url}: {err:#}");
                    None
                }
            }
        })
    }

    /// Resolve every server of one details object concurrently. Slow or dead
    /// hosts hit the per-server timeout and come back as `Failed` entries;
    /// nothing is dropped and siblings are unaffected.
    pub async fn resolve_servers(&self, servers: &[ServerRef]) -> Vec<ResolvedServer> {
        let tasks = servers.iter().map(|server| async move {
            let outcome =
                tokio::time::timeout(settings().extract_timeout, self.extract(&server.embed_url))
                    .await;

            let (status, stream) = match outcome {
                Ok(Some(stream)) => (ServerStatus::Ok, Some(stream)),
                Ok(None) => (ServerStatus::Failed, None),
                Err(_) => {
                    warn!("server {} timed out", server.name);
                    (ServerStatus::Failed, None)
                }
            };

            ResolvedServer {
                name: server.name.clone(),
                embed_url: server.embed_url.clone(),
                status,
                stream,
            }
        });

        join_all(tasks).await
    }
}

/// GET an embed page with an explicit referer. Returns the body and the URL
/// the host actually served after HTTP redirects.
pub(crate) async fn fetch_embed_page(url: &str, referer: &str) -> anyhow::Result<(String, String)> {
    let response = utils::create_client()
        .get(url)
        .header("Referer", referer)
        .send()
        .await?;
    anyhow::ensure!(
        response.status().is_success(),
        "status {} from {url}",
        response.status()
    );
    let final_url = response.url().to_string();
    let body = response.text().await?;
    Ok((body, final_url))
}

pub(crate) fn is_ad_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    settings().ad_keywords.iter().any(|k| lower.contains(k))
}

pub(crate) fn fix_protocol_relative(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

/// `window.location` assignment pointing at an absolute URL.
pub(crate) fn find_js_redirect(body: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"window\.location(?:\.href)?\s*=\s*["'](https?://[^"']+)["']"#).unwrap()
    })
    .captures(body)
    .map(|c| c[1].to_string())
}

/// First non-ad iframe on the page.
pub(crate) fn find_inner_iframe(body: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<iframe[^>]+src=["'](https?://[^"']+)["']"#).unwrap())
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .find(|src| !is_ad_url(src))
}

/// Append every level of packed JS the page contains, up to `max_levels`
/// rounds, so later scans see the deobfuscated source too.
pub(crate) fn unpack_all(body: &str, max_levels: usize) -> String {
    static PACKED: OnceLock<Regex> = OnceLock::new();
    let packed_re = PACKED.get_or_init(|| {
        Regex::new(r#"(?s)eval\(function\(p,a,c,k,e,.+?split\(['"]\|['"]\)\)"#).unwrap()
    });

    let mut all_text = body.to_string();
    for _ in 0..max_levels {
        if !packerjs::detect(&all_text) {
            break;
        }

        let mut new_text = String::new();
        for m in packed_re.find_iter(&all_text) {
            if let Ok(unpacked) = packerjs::unpack(m.as_str()) {
                new_text.push_str(&unpacked);
                new_text.push('\n');
            }
        }

        if new_text.is_empty() || all_text.contains(new_text.trim_end()) {
            break;
        }
        all_text.push('\n');
        all_text.push_str(&new_text);
    }
    all_text
}

/// First direct `.m3u8` (preferred) or `.mp4` literal that is not an ad URL.
/// JSON-embedded URLs arrive with escaped slashes, so those are undone before
/// the scan.
pub(crate) fn find_media_url(text: &str) -> Option<String> {
    static M3U8: OnceLock<Regex> = OnceLock::new();
    static MP4: OnceLock<Regex> = OnceLock::new();

    let m3u8 = M3U8.get_or_init(|| Regex::new(r#"https?://[^"'\s\\]+\.m3u8[^"'\s\\]*"#).unwrap());
    let mp4 = MP4.get_or_init(|| Regex::new(r#"https?://[^"'\s\\]+\.mp4[^"'\s\\]*"#).unwrap());

    let text = text.replace("\\/", "/");
    for re in [m3u8, mp4] {
        if let Some(url) = re
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .find(|u| !is_ad_url(u))
        {
            return Some(url);
        }
    }
    None
}
