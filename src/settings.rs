use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Runtime tuning knobs. Everything here can be overridden from the
/// environment so the pipeline adapts to upstream changes without a rebuild.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Seconds a cached listing/search page stays fresh.
    pub html_cache_ttl: u64,
    /// Seconds a cached details object stays fresh.
    pub details_cache_ttl: u64,
    /// Seconds a resolved stream stays fresh; hosts rotate signed URLs, so
    /// keep this short.
    pub stream_cache_ttl: u64,
    /// Per-request timeout for page fetches.
    pub fetch_timeout: Duration,
    /// Per-embed timeout when resolving all servers of one details object.
    pub extract_timeout: Duration,
    /// Upper bound on concurrent fetches per supplier.
    pub fetch_concurrency: usize,
    /// Hosts never returned as servers (ad redirectors, file lockers known to
    /// serve malware popups).
    pub unsafe_domains: Vec<String>,
    /// Keyword fragments that disqualify a scanned URL as an ad/tracker.
    pub ad_keywords: Vec<String>,
    /// Where the durable cache file lives.
    pub cache_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            html_cache_ttl: 3600,
            details_cache_ttl: 3600 * 12,
            stream_cache_ttl: 3600,
            fetch_timeout: Duration::from_secs(10),
            extract_timeout: Duration::from_secs(5),
            fetch_concurrency: 50,
            unsafe_domains: UNSAFE_DOMAINS.iter().map(|s| s.to_string()).collect(),
            ad_keywords: AD_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            cache_file: "cache/suppliers_cache.json".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(v) = env_u64("MOVIDO_HTML_CACHE_TTL") {
            settings.html_cache_ttl = v;
        }
        if let Some(v) = env_u64("MOVIDO_DETAILS_CACHE_TTL") {
            settings.details_cache_ttl = v;
        }
        if let Some(v) = env_u64("MOVIDO_STREAM_CACHE_TTL") {
            settings.stream_cache_ttl = v;
        }
        if let Some(v) = env_u64("MOVIDO_FETCH_TIMEOUT") {
            settings.fetch_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("MOVIDO_EXTRACT_TIMEOUT") {
            settings.extract_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("MOVIDO_FETCH_CONCURRENCY") {
            settings.fetch_concurrency = v.clamp(1, 256) as usize;
        }
        if let Ok(v) = env::var("MOVIDO_CACHE_FILE") {
            settings.cache_file = v;
        }
        if let Some(list) = env_list("MOVIDO_UNSAFE_DOMAINS") {
            settings.unsafe_domains = list;
        }
        if let Some(list) = env_list("MOVIDO_AD_KEYWORDS") {
            settings.ad_keywords = list;
        }

        settings
    }
}

pub fn settings() -> &'static Settings {
    static SETTINGS: OnceLock<Settings> = OnceLock::new();
    SETTINGS.get_or_init(Settings::from_env)
}

/// Per-supplier mirror list override: `MOVIDO_MIRRORS_LAROOZA=a.com,b.com`.
pub fn mirrors_override(supplier: &str) -> Option<Vec<String>> {
    env_list(&format!("MOVIDO_MIRRORS_{}", supplier.to_uppercase()))
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let list: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

const UNSAFE_DOMAINS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "adf.ly",
    "bc.vc",
    "adfoc.us",
    "shorte.st",
    "ouo.io",
    "clicksfly.com",
    "katfile.com",
    "pixeldrain.com",
    "rockfile.co",
    "gaza.20",
];

const AD_KEYWORDS: &[&str] = &[
    "track",
    "pixel",
    "ads",
    "loading",
    "placeholder",
    "advertisement",
    "promo",
    "popup",
    "popunder",
    "popad",
    "click",
    "tracker",
    "analytics",
    "stat",
    "beacon",
    "affiliate",
    "banner",
    "doubleclick",
    "googlesyndication",
    "google-analytics",
    "googletagmanager",
    "facebook",
    "twitter",
    "google",
    "amazon-adsystem",
    "pubmatic",
    "taboola",
    "outbrain",
    "revcontent",
    "adnxs",
    "aaxads",
    "zedo",
    "exoclick",
    "popads",
    "popcash",
    "propellerads",
    "onclickads",
    "realsrv",
    "juicyads",
    "melbet",
    "1xbet",
    "mostbet",
    "bet365",
    "tapbit",
    "okx",
    "cryptoad",
    "smartcpm",
    "clickunder",
    "adtarget",
    "traffic",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert!(s.stream_cache_ttl <= s.html_cache_ttl);
        assert!(s.extract_timeout < s.fetch_timeout);
        assert!(s.unsafe_domains.iter().any(|d| d == "bit.ly"));
        assert!(s.ad_keywords.iter().any(|k| k == "doubleclick"));
    }
}
