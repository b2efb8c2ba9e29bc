//! Anime4Up scraper. Cards come in half a dozen widget layouts with lazy
//! loaded posters, episode lists are paginated, and a series page does not
//! carry servers itself; they live on the episode pages.

use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html};

use super::ContentSupplier;
use crate::cache;
use crate::fetcher::MirrorFetcher;
use crate::models::{
    episode_sort_key, ContentDetails, ContentItem, ContentKind, DownloadLink, EpisodeRef, ServerRef,
};
use crate::settings::{mirrors_override, settings};
use crate::static_selector;
use crate::utils::html::{self, DomProcessor};
use crate::utils::{self, codec, text};

const NAME: &str = "Anime4Up";
const SOURCE: &str = "anime4up";

const MIRRORS: &[&str] = &["https://4r.2qk9x7b.shop"];

/// "قائمة الانمي", percent-encoded the way the site links it.
const ANIME_LIST_PATH: &str = "/%d9%82%d8%a7%d8%a6%d9%85%d8%a9-%d8%a7%d9%84%d8%a7%d9%86%d9%85%d9%8a";

/// Lazy loaders stash the real poster in data attributes and leave a blank
/// `src`, so order matters.
const POSTER_ATTRS: &[&str] = &[
    "data-image",
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-lzy-src",
    "data-lzy",
    "src",
];

/// Episode pagination safety limit.
const MAX_EPISODE_PAGES: usize = 20;

fn fetcher() -> &'static MirrorFetcher {
    static FETCHER: OnceLock<MirrorFetcher> = OnceLock::new();
    FETCHER.get_or_init(|| {
        let mirrors = mirrors_override(NAME)
            .unwrap_or_else(|| MIRRORS.iter().map(|s| s.to_string()).collect());
        MirrorFetcher::new(mirrors, None, cache::shared().clone())
    })
}

pub struct Anime4UpContentSupplier;

impl Default for Anime4UpContentSupplier {
    fn default() -> Self {
        Self {}
    }
}

impl ContentSupplier for Anime4UpContentSupplier {
    fn get_categories(&self) -> Vec<String> {
        vec!["anime-list".to_string()]
    }

    async fn fetch_home(&self, page: u16) -> Result<Vec<ContentItem>, anyhow::Error> {
        let base = fetcher().base_url().await;
        let url = if page > 1 {
            format!("{base}{ANIME_LIST_PATH}/page/{page}/")
        } else {
            base.clone()
        };
        let (body, final_url) = fetcher().fetch_html(&url).await?;
        Ok(parse_cards(&body, &final_url))
    }

    async fn fetch_category(
        &self,
        id: String,
        page: u16,
    ) -> Result<Vec<ContentItem>, anyhow::Error> {
        anyhow::ensure!(id == "anime-list", "unknown category: {id}");

        let base = fetcher().base_url().await;
        let (body, final_url) = fetcher()
            .fetch_html(&format!("{base}{ANIME_LIST_PATH}/page/{page}/"))
            .await?;
        Ok(parse_cards(&body, &final_url))
    }

    async fn search(&self, query: String) -> Result<Vec<ContentItem>, anyhow::Error> {
        let base = fetcher().base_url().await;
        let (body, final_url) = fetcher()
            .fetch_html(&format!("{base}/?s={}", urlencoding::encode(&query)))
            .await?;
        Ok(parse_cards(&body, &final_url))
    }

    async fn fetch_details(&self, id: String) -> Result<ContentDetails, anyhow::Error> {
        let url = codec::decode_id(&id)?;
        let (body, page_url) = fetcher().fetch_html(&url).await?;

        let mut details = if page_url.contains("/episode/") {
            self.episode_page_details(&body, &page_url).await
        } else {
            self.anime_page_details(&body, &page_url).await
        };

        details.id = id;
        details.source = SOURCE.to_string();
        details.servers.retain(|s| {
            let lower = s.embed_url.to_lowercase();
            !settings().unsafe_domains.iter().any(|d| lower.contains(d))
        });

        // Movies are published through the same templates.
        let lowered = format!("{} {}", details.title.to_lowercase(), page_url.to_lowercase());
        if lowered.contains("movie") || details.title.contains("فيلم") {
            details.kind = ContentKind::Movie;
        }

        Ok(details)
    }
}

impl Anime4UpContentSupplier {
    /// An episode page has the servers; episodes list, description and poster
    /// come from the parent anime page when it is linked.
    async fn episode_page_details(&self, body: &str, page_url: &str) -> ContentDetails {
        let mut details = ContentDetails {
            id: String::new(),
            title: parse_episode_title(body),
            description: String::new(),
            poster: String::new(),
            kind: ContentKind::Anime,
            source: String::new(),
            episodes: Vec::new(),
            servers: parse_servers(body),
            download_links: parse_downloads(body, page_url),
        };

        if let Some(anime_url) = find_parent_anime_link(body, page_url) {
            match fetcher().fetch_html(&anime_url).await {
                Ok((anime_body, anime_final)) => {
                    details.episodes = self.collect_episodes(&anime_body, &anime_final).await;
                    details.description = parse_story(&anime_body);
                    details.poster = parse_page_poster(&anime_body, &anime_final);
                }
                Err(err) => debug!("parent anime page {anime_url} failed: {err}"),
            }
        }
        if details.episodes.is_empty() {
            details.episodes = self.collect_episodes(body, page_url).await;
        }
        details
    }

    async fn anime_page_details(&self, body: &str, page_url: &str) -> ContentDetails {
        let mut details = ContentDetails {
            id: String::new(),
            title: parse_anime_title(body),
            description: parse_story(body),
            poster: parse_page_poster(body, page_url),
            kind: ContentKind::Anime,
            source: String::new(),
            episodes: Vec::new(),
            servers: Vec::new(),
            download_links: Vec::new(),
        };

        details.episodes = self.collect_episodes(body, page_url).await;

        if let Some(first) = details.episodes.first() {
            match fetcher().fetch_html(&first.url).await {
                Ok((ep_body, ep_final)) => {
                    details.servers = parse_servers(&ep_body);
                    details.download_links = parse_downloads(&ep_body, &ep_final);
                }
                Err(err) => debug!("first episode {} failed: {err}", first.url),
            }
        }
        // Movies often carry the player on the main page instead.
        if details.servers.is_empty() {
            details.servers = parse_servers(body);
        }
        if details.download_links.is_empty() {
            details.download_links = parse_downloads(body, page_url);
        }
        details
    }

    /// Episodes plus pagination: follow the `next` page link until it runs
    /// out, repeats, or stops adding anything.
    async fn collect_episodes(&self, body: &str, page_url: &str) -> Vec<EpisodeRef> {
        let mut episodes = parse_episodes(body, page_url);
        let mut seen_urls: HashSet<String> = episodes.iter().map(|e| e.url.clone()).collect();
        let mut visited: HashSet<String> = HashSet::from([page_url.to_string()]);
        let mut next = find_next_page(body, page_url);

        for _ in 0..MAX_EPISODE_PAGES {
            let Some(page) = next.take() else { break };
            if !visited.insert(page.clone()) {
                break;
            }

            let (page_body, page_final) = match fetcher().fetch_html(&page).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    debug!("episode page {page} failed: {err}");
                    break;
                }
            };

            let mut added = false;
            for episode in parse_episodes(&page_body, &page_final) {
                if seen_urls.insert(episode.url.clone()) {
                    episodes.push(episode);
                    added = true;
                }
            }
            if !added {
                break;
            }
            next = find_next_page(&page_body, &page_final);
        }

        episodes.sort_by_key(episode_sort_key);
        episodes
    }
}

pub(crate) fn parse_cards(html: &str, base: &str) -> Vec<ContentItem> {
    let doc = Html::parse_document(html);
    let mut items: IndexMap<String, ContentItem> = IndexMap::new();

    let cards = doc.select(static_selector!(
        ".hover.ehover6, .lucodeia-widget-item, .col-6.image, .pinned-card, .anime-card, .anime-item, .anime-card-container"
    ));
    for card in cards {
        let anchor = card
            .select(static_selector!("a.overlay, a.image"))
            .next()
            .or_else(|| {
                if card.value().name() == "a" {
                    Some(card)
                } else {
                    card.select(static_selector!("a[href]")).next()
                }
            });
        let Some(anchor) = anchor else { continue };
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        let url = utils::absolutize(base, href);

        let mut title = anchor
            .attr("aria-label")
            .or_else(|| anchor.attr("title"))
            .map(str::to_string)
            .or_else(|| {
                card.select(static_selector!("h3, .title, .anime-title, .anime-card-title h3"))
                    .next()
                    .map(|node| node.text().collect::<String>())
            })
            .or_else(|| {
                let text = anchor.text().collect::<String>();
                (!text.trim().is_empty()).then_some(text)
            })
            .map(|t| text::sanitize_text(&t.replace("انمي", "")))
            .unwrap_or_default();
        if title.chars().count() < 2 {
            continue;
        }

        let badge = card
            .select(static_selector!(".badge.light-soft, .quality, .ep-num"))
            .next()
            .map(|node| text::sanitize_text(&node.text().collect::<String>()))
            .unwrap_or_default();
        if !badge.is_empty() && !title.contains(&badge) {
            title = format!("{title} {badge}");
        }

        let id = codec::encode_id(&url);
        items.entry(id.clone()).or_insert_with(|| ContentItem {
            id,
            title,
            poster: extract_poster(&card, base),
            kind: ContentKind::Anime,
            source: SOURCE.to_string(),
        });
    }

    items.into_values().collect()
}

/// Poster attribute cascade over the usual lazy-loader spots, falling back to
/// an inline `background-image`.
fn poster_processor() -> &'static dyn DomProcessor<String> {
    static POSTER: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    POSTER
        .get_or_init(|| {
            html::first_of(vec![
                html::attr_cascade(
                    ".thumbnail.img-responsive, .anime-thumbnail img, .poster img, .image img, .hover img, img",
                    POSTER_ATTRS,
                ),
                html::extract_value(|el| {
                    let styled = std::iter::once(*el).chain(el.select(static_selector!(
                        ".image, .poster, .img, .thumbnail, .hover, a[style*='background-image'], div[style*='background-image']"
                    )));
                    for node in styled {
                        if let Some(url) = node.attr("style").and_then(style_background_url) {
                            if !html::is_placeholder(&url) {
                                return url;
                            }
                        }
                    }
                    String::new()
                }),
            ])
        })
        .as_ref()
}

pub(crate) fn extract_poster(card: &ElementRef, base: &str) -> String {
    let poster = poster_processor().process(card);
    if poster.is_empty() {
        return String::new();
    }
    let cleaned = poster
        .split(['?', ' '])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if cleaned.len() < 10 {
        return String::new();
    }
    utils::proxy_image_url(&utils::absolutize(base, &cleaned))
}

fn style_background_url(style: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\s*\(\s*["']?(.*?)["']?\s*\)"#).unwrap())
        .captures(style)
        .map(|c| c[1].to_string())
}

fn parse_episode_title(page: &str) -> String {
    static TITLE: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    let processor = TITLE.get_or_init(|| html::full_text_value(".episode-title, h1"));

    let doc = Html::parse_document(page);
    let title = processor.process(&doc.root_element());
    if title.is_empty() {
        "Episode".to_string()
    } else {
        title
    }
}

fn parse_anime_title(page: &str) -> String {
    static TITLE: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    let processor = TITLE.get_or_init(|| html::full_text_value(".anime-details-title, h1"));

    let doc = Html::parse_document(page);
    processor.process(&doc.root_element())
}

fn parse_story(page: &str) -> String {
    static STORY: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    let processor = STORY.get_or_init(|| {
        html::map_value(|t: String| text::rebrand(&t), html::full_text_value(".anime-story"))
    });

    let doc = Html::parse_document(page);
    processor.process(&doc.root_element())
}

fn parse_page_poster(page: &str, base: &str) -> String {
    let doc = Html::parse_document(page);
    let scope = doc
        .select(static_selector!(".anime-thumbnail"))
        .next()
        .unwrap_or_else(|| doc.root_element());
    extract_poster(&scope, base)
}

pub(crate) fn find_parent_anime_link(page: &str, base: &str) -> Option<String> {
    static LINK: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    let processor = LINK.get_or_init(|| {
        html::attr_value(
            ".anime-page-link a, a[href*='/anime/'], .breadcrumb a[href*='/anime/']",
            "href",
        )
    });

    let doc = Html::parse_document(page);
    let href = processor.process(&doc.root_element());
    (!href.is_empty()).then(|| utils::absolutize(base, &href))
}

pub(crate) fn parse_episodes(html: &str, base: &str) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(html);
    let mut episodes = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let anchors = doc.select(static_selector!(
        "ul#ULEpisodesList li a, .all-episodes-list a, a.badge.light-soft, .pinned-card a.image, .episodes-list-content a.image, .episodes-list-content .info a, .episodes-card-container a"
    ));
    for anchor in anchors {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        if !href.contains("/episode/") {
            continue;
        }
        let url = utils::absolutize(base, href);
        if !seen.insert(url.clone()) {
            continue;
        }

        let label = text::sanitize_text(&anchor.text().collect::<String>());
        let search_text = format!("{label} {}", anchor.attr("title").unwrap_or_default());
        let number = text::first_number(&search_text);

        episodes.push(EpisodeRef {
            id: codec::encode_id(&url),
            title: if label.is_empty() {
                format!("الحلقة {number}")
            } else {
                label
            },
            episode: number,
            url,
        });
    }
    episodes
}

pub(crate) fn find_next_page(page: &str, base: &str) -> Option<String> {
    static NEXT: OnceLock<Box<dyn DomProcessor<String>>> = OnceLock::new();
    let processor =
        NEXT.get_or_init(|| html::attr_value("a.page-numbers.next, a.next.page-numbers", "href"));

    let doc = Html::parse_document(page);
    let href = processor.process(&doc.root_element());
    (!href.is_empty()).then(|| utils::absolutize(base, &href))
}

pub(crate) fn parse_servers(html: &str) -> Vec<ServerRef> {
    let doc = Html::parse_document(html);
    let mut servers: IndexMap<String, ServerRef> = IndexMap::new();

    let nodes = doc.select(static_selector!(
        "ul#episode-servers li a, ul#episode-servers li, ul#episode-watch-list li, ul#show-tabs li, .watch-servers ul li, .episodes-card-container a[data-id]"
    ));
    for node in nodes {
        let mut url = node
            .attr("data-watch")
            .or_else(|| node.attr("data-url"))
            .or_else(|| node.attr("href"))
            .map(str::to_string);
        let mut name = text::sanitize_text(&node.text().collect::<String>());

        if url.is_none() && node.value().name() == "li" {
            if let Some(a) = node.select(static_selector!("a")).next() {
                url = a
                    .attr("data-watch")
                    .or_else(|| a.attr("data-url"))
                    .or_else(|| a.attr("href"))
                    .map(str::to_string);
                name = text::sanitize_text(&a.text().collect::<String>());
            }
        }

        let Some(url) = url else { continue };
        if url.is_empty() || url == "#" || url.contains("javascript") {
            continue;
        }
        let url = if let Some(rest) = url.strip_prefix("//") {
            format!("https://{rest}")
        } else {
            url
        };

        if name.is_empty() {
            name = format!("Server {}", servers.len() + 1);
        }
        servers
            .entry(url.clone())
            .or_insert(ServerRef { name, embed_url: url });
    }

    servers.into_values().collect()
}

pub(crate) fn parse_downloads(html: &str, base: &str) -> Vec<DownloadLink> {
    let doc = Html::parse_document(html);
    let mut links = Vec::new();

    if let Some(container) = doc
        .select(static_selector!("#download, .download-links, .download-list"))
        .next()
    {
        for row in container.select(static_selector!("tr")) {
            let Some(anchor) = row.select(static_selector!("a[href]")).next() else {
                continue;
            };
            let Some(href) = anchor.attr("href") else {
                continue;
            };
            if href.contains("javascript") {
                continue;
            }

            let server = row
                .select(static_selector!(".server, .td-server"))
                .next()
                .map(|n| text::sanitize_text(&n.text().collect::<String>()))
                .unwrap_or_default();
            let quality = row
                .select(static_selector!(".quality, .td-quality, .badge"))
                .next()
                .map(|n| text::sanitize_text(&n.text().collect::<String>()))
                .unwrap_or_default();

            let label = text::sanitize_text(&format!("{server} {quality}"));
            links.push(DownloadLink {
                quality: if label.is_empty() {
                    text::sanitize_text(&anchor.text().collect::<String>())
                } else {
                    label
                },
                url: utils::absolutize(base, href),
            });
        }

        if links.is_empty() {
            for anchor in container.select(static_selector!("a[href]")) {
                let Some(href) = anchor.attr("href") else {
                    continue;
                };
                if href.contains("javascript") {
                    continue;
                }
                links.push(DownloadLink {
                    quality: text::sanitize_text(&anchor.text().collect::<String>()),
                    url: utils::absolutize(base, href),
                });
            }
        }
    }

    if links.is_empty() {
        let rows = doc.select(static_selector!(
            ".download-list table tr, .episodes-download table tr, table[role='table'] tr"
        ));
        for row in rows {
            let anchor = row
                .select(static_selector!(
                    "a.btn, a[href*='/d/'], a[href*='mega'], a[href*='mp4upload']"
                ))
                .next();
            let Some(anchor) = anchor else { continue };
            if let Some(href) = anchor.attr("href") {
                links.push(DownloadLink {
                    quality: text::sanitize_text(&anchor.text().collect::<String>()),
                    url: utils::absolutize(base, href),
                });
            }
        }
    }

    links
}
