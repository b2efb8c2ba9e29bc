//! Inbound boundary for the HTTP layer.
//!
//! Thin async functions over the supplier registry and the extractor engine.
//! Everything returned here is the plain data model, ready to serialize;
//! details objects are cached by opaque id so repeat views skip the scrape.

use std::sync::OnceLock;

use log::debug;

use crate::cache;
use crate::extractors::ExtractorEngine;
use crate::models::{ContentDetails, ContentItem, ResolvedServer, ResolvedStream, ServerRef};
use crate::settings::settings;
use crate::suppliers::{get_supplier, ContentSupplier};

pub use crate::suppliers::available_suppliers;

fn engine() -> &'static ExtractorEngine {
    static ENGINE: OnceLock<ExtractorEngine> = OnceLock::new();
    ENGINE.get_or_init(|| ExtractorEngine::new(cache::shared().clone()))
}

pub async fn list_home(supplier: &str, page: u16) -> anyhow::Result<Vec<ContentItem>> {
    get_supplier(supplier)?.fetch_home(page).await
}

pub async fn list_category(
    supplier: &str,
    category: &str,
    page: u16,
) -> anyhow::Result<Vec<ContentItem>> {
    get_supplier(supplier)?
        .fetch_category(category.to_string(), page)
        .await
}

pub async fn search(supplier: &str, query: &str) -> anyhow::Result<Vec<ContentItem>> {
    get_supplier(supplier)?.search(query.to_string()).await
}

/// Details by opaque id, served from the cache when fresh.
pub async fn get_details(supplier: &str, id: &str) -> anyhow::Result<ContentDetails> {
    let key = cache::details_key(id);
    if let Some(hit) = cache::shared().get_as::<ContentDetails>(&key).await {
        debug!("details cache hit for {id}");
        return Ok(hit);
    }

    let details = get_supplier(supplier)?.fetch_details(id.to_string()).await?;
    cache::shared()
        .set_json(&key, &details, settings().details_cache_ttl)
        .await;
    Ok(details)
}

/// Resolve one embed URL to a playable stream. `None` means every strategy
/// came up empty; the caller shows the raw embed as a manual fallback.
pub async fn resolve_stream(embed_url: &str) -> Option<ResolvedStream> {
    engine().extract(embed_url).await
}

/// Resolve every server of a details object concurrently. The output keeps
/// the input order and length; dead servers come back as `Failed` entries.
pub async fn resolve_servers(servers: &[ServerRef]) -> Vec<ResolvedServer> {
    engine().resolve_servers(servers).await
}
