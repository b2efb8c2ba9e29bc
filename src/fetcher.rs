//! Mirror-aware page fetching.
//!
//! A supplier owns one [`MirrorFetcher`]. Every page request goes through it:
//! the fetcher tries the requested URL, replays the path against the other
//! known mirrors when it fails, follows soft (meta-refresh / JS) redirects up
//! to a small depth, and as a last resort for home and category pages runs
//! search-engine domain discovery to find where the site moved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

use crate::cache::{self, PersistentCache};
use crate::settings::settings;
use crate::utils;

const SOFT_REDIRECT_DEPTH: usize = 3;
const DISCOVERY_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("all mirrors exhausted")]
    AllMirrorsExhausted,
    #[error("domain discovery failed")]
    DiscoveryFailed,
}

/// Ordered list of known-good domains for one site. The front entry is the
/// current primary; successful fetches promote the answering domain there.
pub struct MirrorSet {
    domains: Mutex<Vec<String>>,
}

impl MirrorSet {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            domains: Mutex::new(domains),
        }
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.domains.lock().await.clone()
    }

    pub async fn primary(&self) -> Option<String> {
        self.domains.lock().await.first().cloned()
    }

    /// Move a domain that just answered to the front so later calls try it
    /// before the dead ones.
    pub async fn promote(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(pos) = domains.iter().position(|d| d == domain) {
            if pos > 0 {
                let d = domains.remove(pos);
                info!("mirror promoted to primary: {d}");
                domains.insert(0, d);
            }
        }
    }

    /// Register a freshly discovered domain as the new primary.
    pub async fn insert_front(&self, domain: String) {
        let mut domains = self.domains.lock().await;
        domains.retain(|d| d != &domain);
        domains.insert(0, domain);
    }
}

/// How to recognize a site once its old domains are gone: the search query
/// that surfaces it and body substrings that only its pages contain.
pub struct DiscoveryProfile {
    pub query: &'static str,
    pub fingerprints: &'static [&'static str],
}

pub struct MirrorFetcher {
    mirrors: MirrorSet,
    discovery: Option<DiscoveryProfile>,
    cache: Arc<PersistentCache>,
    semaphore: Semaphore,
    last_discovery: Mutex<Option<Instant>>,
}

impl MirrorFetcher {
    pub fn new(
        mirrors: Vec<String>,
        discovery: Option<DiscoveryProfile>,
        cache: Arc<PersistentCache>,
    ) -> Self {
        Self {
            mirrors: MirrorSet::new(mirrors),
            discovery,
            cache,
            semaphore: Semaphore::new(settings().fetch_concurrency),
            last_discovery: Mutex::new(None),
        }
    }

    pub fn mirrors(&self) -> &MirrorSet {
        &self.mirrors
    }

    /// Current primary domain, used by suppliers to build absolute URLs.
    pub async fn base_url(&self) -> String {
        self.mirrors.primary().await.unwrap_or_default()
    }

    /// Fetch a page with mirror failover and the HTML response cache.
    /// Returns the body and the URL that actually answered.
    pub async fn fetch_html(&self, url: &str) -> Result<(String, String), FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::AllMirrorsExhausted)?;

        if let Some(body) = self.cache.get_as::<String>(&cache::html_key(url)).await {
            debug!("html cache hit for {url}");
            return Ok((body, url.to_string()));
        }

        let snapshot = self.mirrors.snapshot().await;
        let targets = build_targets(url, &snapshot);
        let mirrored = targets.len() > 1;

        match self.fetch_targets(targets).await {
            Ok((body, final_url)) => {
                if let Some(domain) = origin_of(&final_url) {
                    self.mirrors.promote(&domain).await;
                }
                self.cache
                    .set_json(&cache::html_key(url), &body, settings().html_cache_ttl)
                    .await;
                Ok((body, final_url))
            }
            Err(err) if mirrored => {
                warn!("all mirrors failed for {url}: {err}");
                self.fetch_via_discovery(url).await
            }
            Err(err) => Err(err),
        }
    }

    /// One-off fetch with an explicit referer, used for embed pages. No
    /// mirror failover, but soft redirects are still followed.
    pub async fn fetch_embed(&self, url: &str, referer: &str) -> Result<(String, String), FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::AllMirrorsExhausted)?;

        let mut current = url.to_string();
        for _ in 0..=SOFT_REDIRECT_DEPTH {
            let body = self.get_once(&current, Some(referer)).await?;
            match parse_soft_redirect(&body, &current) {
                Some(next) if next != current => current = next,
                _ => return Ok((body, current)),
            }
        }
        Err(FetchError::AllMirrorsExhausted)
    }

    /// Form POST used by AJAX server endpoints. Failures map into the same
    /// taxonomy as GETs.
    pub async fn post_form(
        &self,
        url: &str,
        referer: &str,
        form: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::AllMirrorsExhausted)?;

        let response = utils::create_json_client()
            .post(url)
            .header("Referer", referer)
            .form(form)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.text().await.map_err(classify_reqwest_error)
    }

    async fn fetch_targets(&self, targets: Vec<String>) -> Result<(String, String), FetchError> {
        let mut queue = targets;
        let mut redirects = 0;
        let mut last_error = FetchError::AllMirrorsExhausted;

        let mut idx = 0;
        while idx < queue.len() {
            let target = queue[idx].clone();
            idx += 1;

            match self.get_once(&target, None).await {
                Ok(body) => {
                    if let Some(next) = parse_soft_redirect(&body, &target) {
                        if redirects < SOFT_REDIRECT_DEPTH {
                            redirects += 1;
                            debug!("soft redirect {target} -> {next}");
                            if !queue.contains(&next) {
                                queue.insert(idx, next);
                            }
                            continue;
                        }
                        warn!("soft redirect depth exceeded at {target}");
                        continue;
                    }
                    return Ok((body, target));
                }
                Err(err) => {
                    debug!("fetch failed for {target}: {err}");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    async fn get_once(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let mut request = utils::create_client().get(url);
        if let Some(referer) = referer {
            request = request.header("Referer", referer);
        }

        let response = tokio::time::timeout(settings().fetch_timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.text().await.map_err(classify_reqwest_error)
    }

    /// Last resort for mirrored pages: look the site up on a search engine,
    /// verify candidates against the fingerprint list and retry the original
    /// path on the first confirmed domain.
    async fn fetch_via_discovery(&self, url: &str) -> Result<(String, String), FetchError> {
        let Some(profile) = &self.discovery else {
            return Err(FetchError::AllMirrorsExhausted);
        };

        let mut last = self.last_discovery.lock().await;
        if matches!(*last, Some(at) if at.elapsed() < DISCOVERY_COOLDOWN) {
            return Err(FetchError::AllMirrorsExhausted);
        }
        *last = Some(Instant::now());

        info!("all mirrors down, starting domain discovery");
        let domain = self
            .discover_domain(profile)
            .await
            .ok_or(FetchError::DiscoveryFailed)?;

        info!("discovery confirmed new domain {domain}");
        self.mirrors.insert_front(domain.clone()).await;

        let retry = rebase_url(url, &domain).ok_or(FetchError::DiscoveryFailed)?;
        let body = self.get_once(&retry, None).await?;
        self.cache
            .set_json(&cache::html_key(url), &body, settings().html_cache_ttl)
            .await;
        Ok((body, retry))
    }

    async fn discover_domain(&self, profile: &DiscoveryProfile) -> Option<String> {
        let search_url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(profile.query)
        );
        let page = self.get_once(&search_url, None).await.ok()?;

        for candidate in parse_search_results(&page).into_iter().take(3) {
            let Some(domain) = origin_of(&candidate) else {
                continue;
            };
            debug!("testing candidate domain {domain}");

            let Ok(body) = self.get_once(&domain, None).await else {
                continue;
            };
            let lower = body.to_lowercase();
            if profile
                .fingerprints
                .iter()
                .any(|fp| lower.contains(&fp.to_lowercase()))
            {
                return Some(domain);
            }
        }
        None
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::AllMirrorsExhausted
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

fn authority_of(url: &str) -> Option<(String, Option<u16>)> {
    let parsed = Url::parse(url).ok()?;
    Some((parsed.host_str()?.to_string(), parsed.port()))
}

/// The requested URL first, then the same path replayed on every other
/// mirror. URLs outside the mirror set get no failover.
fn build_targets(url: &str, mirrors: &[String]) -> Vec<String> {
    let mut targets = vec![url.to_string()];

    let Some(authority) = authority_of(url) else {
        return targets;
    };
    let Ok(parsed) = Url::parse(url) else {
        return targets;
    };

    if !mirrors
        .iter()
        .any(|m| authority_of(m).as_ref() == Some(&authority))
    {
        return targets;
    }

    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }

    for mirror in mirrors {
        if authority_of(mirror).as_ref() == Some(&authority) {
            continue;
        }
        if let Ok(joined) = Url::parse(mirror).and_then(|base| base.join(&path)) {
            targets.push(joined.to_string());
        }
    }
    targets
}

fn rebase_url(url: &str, domain: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }
    Url::parse(domain).ok()?.join(&path).ok().map(String::from)
}

/// Meta-refresh tag or a `window.location` assignment in the body. Relative
/// targets resolve against the page URL.
pub fn parse_soft_redirect(body: &str, page_url: &str) -> Option<String> {
    static META_REFRESH: OnceLock<Regex> = OnceLock::new();
    static JS_LOCATION: OnceLock<Regex> = OnceLock::new();

    let meta = META_REFRESH.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]+http-equiv=["']?refresh["']?[^>]+content=["']?\d+;\s*url=([^"'>]+)"#,
        )
        .unwrap()
    });
    let js = JS_LOCATION.get_or_init(|| {
        Regex::new(r#"window\.location(?:\.href)?\s*=\s*["']([^"']+)["']"#).unwrap()
    });

    let target = meta
        .captures(body)
        .or_else(|| js.captures(body))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())?;

    if target.starts_with("http") {
        Some(target)
    } else {
        Url::parse(page_url).ok()?.join(&target).ok().map(String::from)
    }
}

/// Result anchors from a DuckDuckGo HTML results page. Redirect wrappers
/// carry the real URL in a `uddg` query parameter.
pub fn parse_search_results(html: &str) -> Vec<String> {
    static RESULT: OnceLock<Selector> = OnceLock::new();
    let selector = RESULT.get_or_init(|| Selector::parse(".result__a").unwrap());

    const SOCIAL: &[&str] = &["facebook", "twitter", "instagram", "youtube", "pinterest"];

    let doc = Html::parse_document(html);
    let mut candidates = Vec::new();

    for anchor in doc.select(selector) {
        let Some(href) = anchor.attr("href") else {
            continue;
        };

        let resolved = if href.contains("uddg=") {
            let absolute = if href.starts_with("//") {
                format!("https:{href}")
            } else {
                href.to_string()
            };
            Url::parse(&absolute)
                .ok()
                .and_then(|u| {
                    u.query_pairs()
                        .find(|(k, _)| k == "uddg")
                        .map(|(_, v)| v.into_owned())
                })
                .unwrap_or_default()
        } else {
            href.to_string()
        };

        if resolved.starts_with("http") && !SOCIAL.iter().any(|s| resolved.contains(s)) {
            candidates.push(resolved);
        }
    }
    candidates
}
