mod tests;

// suppliers
mod anime4up;
mod arabseed;
mod larooza;

use anime4up::Anime4UpContentSupplier;
use arabseed::ArabSeedContentSupplier;
use larooza::LaroozaContentSupplier;

use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use strum::VariantNames;
use strum_macros::{EnumIter, EnumString, VariantNames};

use crate::models::{ContentDetails, ContentItem};

#[enum_dispatch]
pub trait ContentSupplier {
    /// Category ids this supplier understands, resolvable by `fetch_category`.
    fn get_categories(&self) -> Vec<String>;
    async fn fetch_home(&self, page: u16) -> Result<Vec<ContentItem>, anyhow::Error>;
    async fn fetch_category(
        &self,
        id: String,
        page: u16,
    ) -> Result<Vec<ContentItem>, anyhow::Error>;
    async fn search(&self, query: String) -> Result<Vec<ContentItem>, anyhow::Error>;
    async fn fetch_details(&self, id: String) -> Result<ContentDetails, anyhow::Error>;
}

#[enum_dispatch(ContentSupplier)]
#[derive(EnumIter, EnumString, VariantNames)]
pub enum AllContentSuppliers {
    #[strum(serialize = "Larooza")]
    LaroozaContentSupplier,
    #[strum(serialize = "ArabSeed")]
    ArabSeedContentSupplier,
    #[strum(serialize = "Anime4Up")]
    Anime4UpContentSupplier,
}

pub fn available_suppliers() -> Vec<String> {
    AllContentSuppliers::VARIANTS
        .iter()
        .map(|&s| s.to_owned())
        .collect()
}

pub fn get_supplier(name: &str) -> Result<AllContentSuppliers, anyhow::Error> {
    AllContentSuppliers::from_str(name).map_err(|err| err.into())
}
