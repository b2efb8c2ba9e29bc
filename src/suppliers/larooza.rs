//! Larooza scraper. Listing pages are PHP-era markup (`video.php?vid=`),
//! servers hide behind `data-embed-url` attributes, embedded players and a
//! separate download page; some series keep the real hosts one level deeper
//! inside `play.php`/`embed.php` pages.

use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::debug;
use reqwest::Url;
use scraper::Html;

use super::ContentSupplier;
use crate::cache;
use crate::fetcher::{DiscoveryProfile, MirrorFetcher};
use crate::models::{
    episode_sort_key, ContentDetails, ContentItem, ContentKind, DownloadLink, EpisodeRef, ServerRef,
};
use crate::settings::{mirrors_override, settings};
use crate::static_selector;
use crate::utils::html::{self, DomProcessor};
use crate::utils::{self, codec, text};

const NAME: &str = "Larooza";
const SOURCE: &str = "larooza";

const MIRRORS: &[&str] = &[
    "https://larooza.hair",
    "https://larooza.top",
    "https://q.larozavideo.net",
    "https://larooza.mom",
    "https://larooza.site",
    "https://larooza.lol",
    "https://larooza.cfd",
    "https://larooza.video",
    "https://larooza.bond",
];

const DISCOVERY: DiscoveryProfile = DiscoveryProfile {
    query: "موقع لاروزا فيديو الأصلي",
    fingerprints: &["laro", "video.php", "br-movies"],
};

/// Category id exposed to clients -> the site's own `cat` parameter.
const CATEGORIES: &[(&str, &str)] = &[
    ("arabic-movies", "arabic-movies33"),
    ("english-movies", "all_movies_13"),
    ("indian-movies", "indian-movies9"),
    ("anime-movies", "anime-movies-7"),
    ("dubbed-movies", "7-aflammdblgh"),
    ("turkish-movies", "8-aflam3isk"),
    ("turkish-series", "turkish-3isk-seriess47"),
    ("arabic-series", "arabic-series46"),
    ("english-series", "english-series10"),
    ("indian-series", "11indian-series"),
    ("asian-movies", "6-asian-movies"),
    ("ramadan-2025", "13-ramadan-2025"),
    ("ramadan-2024", "28-ramadan-2024"),
    ("tv-programs", "tv-programs12"),
    ("plays", "masrh-5"),
    ("anime-series", "6-anime-series"),
];

/// Download entries pointing at one of these hosts are real players and get
/// promoted into the servers list.
const VIDEO_HOSTS: &[&str] = &[
    "voe", "ok.ru", "vk.com", "vidmoly", "dood", "filemoon", "mixdrop", "upstream", "vidoza",
    "okprime", "mp4upload", "uploady",
];

fn fetcher() -> &'static MirrorFetcher {
    static FETCHER: OnceLock<MirrorFetcher> = OnceLock::new();
    FETCHER.get_or_init(|| {
        let mirrors = mirrors_override(NAME)
            .unwrap_or_else(|| MIRRORS.iter().map(|s| s.to_string()).collect());
        MirrorFetcher::new(mirrors, Some(DISCOVERY), cache::shared().clone())
    })
}

pub struct LaroozaContentSupplier;

impl Default for LaroozaContentSupplier {
    fn default() -> Self {
        Self {}
    }
}

impl ContentSupplier for LaroozaContentSupplier {
    fn get_categories(&self) -> Vec<String> {
        CATEGORIES.iter().map(|(id, _)| id.to_string()).collect()
    }

    async fn fetch_home(&self, page: u16) -> Result<Vec<ContentItem>, anyhow::Error> {
        let base = fetcher().base_url().await;
        let (body, final_url) = fetcher()
            .fetch_html(&format!("{base}/newvideos1.php?page={page}"))
            .await?;
        Ok(parse_listing(&body, &final_url))
    }

    async fn fetch_category(
        &self,
        id: String,
        page: u16,
    ) -> Result<Vec<ContentItem>, anyhow::Error> {
        // Unknown ids pass through, the site accepts raw cat parameters too.
        let cat = CATEGORIES
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, cat)| *cat)
            .unwrap_or(id.as_str());

        let base = fetcher().base_url().await;
        let (body, final_url) = fetcher()
            .fetch_html(&format!("{base}/category.php?cat={cat}&page={page}"))
            .await?;
        Ok(parse_listing(&body, &final_url))
    }

    async fn search(&self, query: String) -> Result<Vec<ContentItem>, anyhow::Error> {
        let base = fetcher().base_url().await;
        let (body, final_url) = fetcher()
            .fetch_html(&format!(
                "{base}/search.php?keywords={}",
                urlencoding::encode(&query)
            ))
            .await?;
        Ok(parse_listing(&body, &final_url))
    }

    async fn fetch_details(&self, id: String) -> Result<ContentDetails, anyhow::Error> {
        let url = codec::decode_id(&id)?;
        let (body, page_url) = fetcher().fetch_html(&url).await?;

        let title = parse_title(&body);
        let kind = detect_kind(&title);

        let mut servers = parse_servers(&body, &page_url);

        // Some series park the real hosts one page deeper. Follow internal
        // embeds once, merge what they contain, then drop the internal links.
        let mut internal: Vec<String> = servers
            .iter()
            .filter(|s| is_internal_embed(&s.embed_url))
            .map(|s| s.embed_url.clone())
            .collect();
        if servers.is_empty() && page_url.contains("video.php") {
            internal.push(page_url.replace("video.php", "play.php"));
        }
        for inner_url in internal {
            match fetcher().fetch_embed(&inner_url, &page_url).await {
                Ok((inner_body, inner_final)) => {
                    servers.extend(parse_servers(&inner_body, &inner_final));
                }
                Err(err) => debug!("internal embed {inner_url} failed: {err}"),
            }
        }
        servers.retain(|s| !is_internal_embed(&s.embed_url));

        let episodes = if kind == ContentKind::Series {
            parse_episodes(&body, &page_url)
        } else {
            Vec::new()
        };

        let download_links = self.fetch_downloads(&page_url).await;
        for dl in &download_links {
            let lower = dl.url.to_lowercase();
            if VIDEO_HOSTS.iter().any(|h| lower.contains(h)) {
                let name = dl.quality.split(" لل").next().unwrap_or_default().trim();
                servers.push(ServerRef {
                    name: name.to_string(),
                    embed_url: dl.url.clone(),
                });
            }
        }

        Ok(ContentDetails {
            id,
            title,
            description: parse_description(&body),
            poster: parse_poster(&body, &page_url),
            kind,
            source: SOURCE.to_string(),
            episodes,
            servers: finalize_servers(servers),
            download_links,
        })
    }
}

impl LaroozaContentSupplier {
    /// The download page lives at `download.php` next to the watch page.
    /// Missing pages are normal for fresh uploads.
    async fn fetch_downloads(&self, page_url: &str) -> Vec<DownloadLink> {
        let candidates = [
            page_url.replace("video.php", "download.php"),
            page_url.replace("play.php", "download.php"),
        ];

        for candidate in candidates {
            if candidate == page_url {
                continue;
            }
            match fetcher().fetch_html(&candidate).await {
                Ok((body, final_url)) => {
                    let links = parse_downloads(&body, &final_url);
                    if !links.is_empty() {
                        return links;
                    }
                }
                Err(err) => debug!("no download page at {candidate}: {err}"),
            }
        }
        Vec::new()
    }
}

pub(crate) fn parse_listing(html: &str, base: &str) -> Vec<ContentItem> {
    let doc = Html::parse_document(html);
    let mut items: IndexMap<String, ContentItem> = IndexMap::new();

    let cards = doc.select(static_selector!(
        ".thumbnail, .pm-li-video, .video-block, .movie-item, .video-card, .item, .pm-video-thumb, .video-post"
    ));
    for card in cards {
        let anchor = if card.value().name() == "a" {
            Some(card)
        } else {
            card.select(static_selector!("a[href]")).next()
        };
        let Some(anchor) = anchor else { continue };
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        push_listing_item(&mut items, base, href, &card, &anchor);
    }

    // Sparse pages on some mirrors render plain video links without cards.
    if items.len() < 5 {
        for anchor in doc.select(static_selector!("a[href*='video.php?vid=']")) {
            let Some(href) = anchor.attr("href") else {
                continue;
            };
            push_listing_item(&mut items, base, href, &anchor, &anchor);
        }
    }

    items.into_values().collect()
}

fn push_listing_item(
    items: &mut IndexMap<String, ContentItem>,
    base: &str,
    href: &str,
    card: &scraper::ElementRef,
    anchor: &scraper::ElementRef,
) {
    const SKIP: &[&str] = &["facebook", "twitter", "whatsapp", "telegram", "login", "register"];
    let lower = href.to_lowercase();
    if SKIP.iter().any(|s| lower.contains(s)) {
        return;
    }

    let url = utils::absolutize(base, href);
    if items.contains_key(&url) {
        return;
    }

    let raw_title = anchor
        .attr("title")
        .map(str::to_string)
        .unwrap_or_else(|| card.text().collect::<Vec<_>>().join(" "));
    let title = text::clean_title(&raw_title);
    if title.len() < 2 {
        return;
    }

    let src = card_poster_processor().process(card);
    let poster = if src.is_empty() {
        String::new()
    } else {
        utils::proxy_image_url(&utils::absolutize(base, &src))
    };

    const SERIES_HINTS: &[&str] = &["series", "moslslat", "drama", "episode", "season"];
    let kind = if SERIES_HINTS.iter().any(|h| url.to_lowercase().contains(h)) {
        ContentKind::Series
    } else {
        ContentKind::Movie
    };

    items.insert(
        url.clone(),
        ContentItem {
            id: codec::encode_id(&url),
            title,
            poster,
            kind,
            source: SOURCE.to_string(),
        },
    );
}

const POSTER_ATTRS: &[&str] = &["data-echo", "data-src", "src"];

fn card_poster_processor() -> &'static dyn DomProcessor<String> {
    static POSTER: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    POSTER
        .get_or_init(|| html::attr_cascade("img", POSTER_ATTRS))
        .as_ref()
}

fn title_processor() -> &'static dyn DomProcessor<String> {
    static TITLE: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    TITLE.get_or_init(|| html::full_text_value("h1")).as_ref()
}

fn parse_title(page: &str) -> String {
    let doc = Html::parse_document(page);
    title_processor().process(&doc.root_element())
}

pub(crate) fn detect_kind(title: &str) -> ContentKind {
    const SERIES_WORDS: &[&str] = &["حلقة", "مسلسل", "موسم"];
    if SERIES_WORDS.iter().any(|w| title.contains(w)) {
        ContentKind::Series
    } else {
        ContentKind::Movie
    }
}

fn description_processor() -> &'static dyn DomProcessor<String> {
    static DESC: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    DESC.get_or_init(|| {
        html::map_value(
            |t: String| text::rebrand(&t),
            html::full_text_value(".story, .desc, .entry-content"),
        )
    })
    .as_ref()
}

fn parse_description(page: &str) -> String {
    let doc = Html::parse_document(page);
    description_processor().process(&doc.root_element())
}

fn page_poster_processor() -> &'static dyn DomProcessor<String> {
    static POSTER: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    POSTER
        .get_or_init(|| {
            html::first_of(vec![
                html::attr_cascade(
                    ".pm-series-brief .pm-poster-img img, .content-series-page .pm-poster-img img, #content .pm-poster-img img, .pm-video-thumb img, #video-posters img, .movie-poster img, .poster img",
                    POSTER_ATTRS,
                ),
                html::attr_cascade("#content img", POSTER_ATTRS),
            ])
        })
        .as_ref()
}

fn parse_poster(page: &str, base: &str) -> String {
    let doc = Html::parse_document(page);
    let src = page_poster_processor().process(&doc.root_element());
    if src.is_empty() {
        String::new()
    } else {
        utils::proxy_image_url(&utils::absolutize(base, &src))
    }
}

#[derive(Default)]
struct EpisodeAccumulator {
    episodes: Vec<EpisodeRef>,
    seen_numbers: HashSet<u32>,
    seen_urls: HashSet<String>,
}

impl EpisodeAccumulator {
    fn push(&mut self, base: &str, href: &str, label: &str) {
        if href.is_empty() || href.contains("select-ep") || href.contains('#') {
            return;
        }
        let url = utils::absolutize(base, href);
        if !self.seen_urls.insert(url.clone()) {
            return;
        }
        let number = text::first_number(label);
        if number > 0 && !self.seen_numbers.insert(number) {
            return;
        }
        self.episodes.push(EpisodeRef {
            id: codec::encode_id(&url),
            title: text::clean_title(label),
            episode: number,
            url,
        });
    }
}

pub(crate) fn parse_episodes(html: &str, base: &str) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(html);
    let mut acc = EpisodeAccumulator::default();

    // Season dropdowns are the standard layout.
    for option in doc.select(static_selector!("select.episodeoption option")) {
        let href = option.attr("value").unwrap_or_default();
        let label = option.text().collect::<String>();
        acc.push(base, href, label.trim());
    }

    if acc.episodes.is_empty() {
        let anchors = doc.select(static_selector!(
            ".EpisodesList a, .episodes-list a, .series-episodes a, #episodes a, .episode-item a"
        ));
        for anchor in anchors {
            let href = anchor.attr("href").unwrap_or_default();
            if href.contains("javascript") {
                continue;
            }
            const WATCH_PATHS: &[&str] = &["video.php", "play.php", "watch.php"];
            if !WATCH_PATHS.iter().any(|p| href.contains(p)) {
                continue;
            }
            let label = anchor.text().collect::<String>();
            acc.push(base, href, label.trim());
        }
    }

    let mut episodes = acc.episodes;
    episodes.sort_by_key(episode_sort_key);
    episodes
}

pub(crate) fn parse_servers(html: &str, page_url: &str) -> Vec<ServerRef> {
    let doc = Html::parse_document(html);
    let mut found: IndexMap<String, ServerRef> = IndexMap::new();

    let mut add = |label: &str, href: &str| {
        if href.is_empty() || href == "#" || href.contains("javascript") {
            return;
        }
        let url = utils::absolutize(page_url, href);
        let key = normalize_server_url(&url);
        if found.contains_key(&key) {
            return;
        }

        let clean = text::sanitize_text(
            &label
                .replace("سيرفر", "")
                .replace("مشاهدة", "")
                .replace("Server", ""),
        );
        let name = if clean.len() < 2 || clean.chars().all(|c| c.is_ascii_digit()) {
            host_label(&url)
        } else {
            clean
        };
        found.insert(key, ServerRef { name, embed_url: url });
    };

    for el in doc.select(static_selector!("[data-embed-url]")) {
        let label = el.text().collect::<String>();
        add(label.trim(), el.attr("data-embed-url").unwrap_or_default());
    }

    for el in doc.select(static_selector!(".WatchList li, .server-item, .servers-list li")) {
        let href = el
            .attr("data-embed-url")
            .or_else(|| el.attr("data-url"))
            .map(str::to_string)
            .or_else(|| {
                el.select(static_selector!("a[href]"))
                    .next()
                    .and_then(|a| a.attr("href"))
                    .map(str::to_string)
            });
        if let Some(href) = href {
            let label = el.text().collect::<String>();
            add(label.trim(), &href);
        }
    }

    const IFRAME_NOISE: &[&str] = &["ads", "google", "facebook", "analytics", "counter"];
    for el in doc.select(static_selector!("iframe[src]")) {
        let src = el.attr("src").unwrap_or_default();
        let lower = src.to_lowercase();
        if !IFRAME_NOISE.iter().any(|k| lower.contains(k)) {
            add("", src);
        }
    }

    for el in doc.select(static_selector!("a[href]")) {
        let href = el.attr("href").unwrap_or_default();
        let lower = href.to_lowercase();
        if VIDEO_HOSTS.iter().any(|h| lower.contains(h)) {
            let label = el.text().collect::<String>();
            add(label.trim(), href);
        }
    }

    found.into_values().collect()
}

pub(crate) fn parse_downloads(html: &str, page_url: &str) -> Vec<DownloadLink> {
    const MARKERS: &[&str] = &["download", "تحميل", "720", "1080", "480", "mp4", "mkv"];

    let doc = Html::parse_document(html);
    let mut links: Vec<DownloadLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for anchor in doc.select(static_selector!("a[href^='http']")) {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        let label = text::sanitize_text(&anchor.text().collect::<String>());
        let haystack = format!("{} {}", label.to_lowercase(), href.to_lowercase());
        if !MARKERS.iter().any(|m| haystack.contains(m)) {
            continue;
        }
        if is_internal_host(href) || !seen.insert(href.to_string()) {
            continue;
        }

        let quality = text::rebrand(&text::clean_title(&label.replace("اضغط هنا للتحميل", "")));
        links.push(DownloadLink {
            quality: if quality.is_empty() {
                host_label(href)
            } else {
                quality
            },
            url: utils::absolutize(page_url, href),
        });
    }
    links
}

/// Blocklist, de-duplication by normalized URL and uniform display names, in
/// one stable pass.
pub(crate) fn finalize_servers(servers: Vec<ServerRef>) -> Vec<ServerRef> {
    let mut unique: IndexMap<String, ServerRef> = IndexMap::new();
    for server in servers {
        let lower = server.embed_url.to_lowercase();
        if settings().unsafe_domains.iter().any(|d| lower.contains(d)) {
            continue;
        }
        unique
            .entry(normalize_server_url(&server.embed_url))
            .or_insert(server);
    }

    unique
        .into_values()
        .enumerate()
        .map(|(idx, server)| {
            let name = if server.name.len() < 2 || server.name.chars().all(|c| c.is_ascii_digit())
            {
                host_label(&server.embed_url)
            } else {
                server.name
            };
            ServerRef {
                name: format!("Server {} - {}", idx + 1, name),
                embed_url: server.embed_url,
            }
        })
        .collect()
}

/// Comparison key for de-duplication: scheme-insensitive host+path without
/// query or trailing slash.
pub(crate) fn normalize_server_url(url: &str) -> String {
    url.to_lowercase()
        .split('?')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn host_label(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            host.trim_start_matches("www.")
                .split('.')
                .next()
                .unwrap_or_default()
                .to_uppercase()
        })
        .filter(|label| label.len() >= 2)
        .unwrap_or_else(|| "VIDEO".to_string())
}

fn is_internal_embed(url: &str) -> bool {
    let lower = url.to_lowercase();
    (lower.contains("embed.php") || lower.contains("play.php")) && is_internal_host(&lower)
}

fn is_internal_host(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("larooza") || lower.contains("laroza")
}
