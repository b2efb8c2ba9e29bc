//! Small combinator layer over `scraper` for declarative page processing.
//!
//! Mirror sites render the same logical page with different markup, so most
//! fields are described as a prioritized list of selector candidates; the
//! first non-empty, non-placeholder match wins.

use scraper::{ElementRef, Selector};

/// Lazily parsed CSS selector for scrapers that query the document directly
/// instead of through a processor.
#[macro_export]
macro_rules! static_selector {
    ($sel:literal) => {{
        static SELECTOR: std::sync::OnceLock<scraper::Selector> = std::sync::OnceLock::new();
        SELECTOR.get_or_init(|| scraper::Selector::parse($sel).unwrap())
    }};
}

pub trait DomProcessor<T>: Sync + Send {
    fn process(&self, el: &ElementRef) -> T;
}

pub struct TextValue {
    scope: Selector,
    all_nodes: bool,
}

impl DomProcessor<String> for TextValue {
    fn process(&self, el: &ElementRef) -> String {
        el.select(&self.scope)
            .next()
            .map(|e| {
                if self.all_nodes {
                    e.text().collect::<Vec<_>>().join("")
                } else {
                    e.text().next().unwrap_or_default().to_string()
                }
            })
            .map(|t| crate::utils::text::sanitize_text(&t))
            .unwrap_or_default()
    }
}

pub fn text_value(selectors: &str) -> Box<dyn DomProcessor<String>> {
    Box::new(TextValue {
        scope: Selector::parse(selectors).unwrap(),
        all_nodes: false,
    })
}

pub fn full_text_value(selectors: &str) -> Box<dyn DomProcessor<String>> {
    Box::new(TextValue {
        scope: Selector::parse(selectors).unwrap(),
        all_nodes: true,
    })
}

pub struct AttrValue {
    scope: Selector,
    attr: &'static str,
}

impl DomProcessor<String> for AttrValue {
    fn process(&self, el: &ElementRef) -> String {
        el.select(&self.scope)
            .next()
            .and_then(|e| e.attr(self.attr))
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

pub fn attr_value(selectors: &str, attr: &'static str) -> Box<dyn DomProcessor<String>> {
    Box::new(AttrValue {
        scope: Selector::parse(selectors).unwrap(),
        attr,
    })
}

/// Try each sub-processor in priority order and accept the first result that
/// is non-empty and does not look like a lazy-loader placeholder.
pub struct FirstOf {
    candidates: Vec<Box<dyn DomProcessor<String>>>,
}

impl DomProcessor<String> for FirstOf {
    fn process(&self, el: &ElementRef) -> String {
        for candidate in &self.candidates {
            let value = candidate.process(el);
            if !value.is_empty() && !is_placeholder(&value) {
                return value;
            }
        }
        String::new()
    }
}

pub fn first_of(candidates: Vec<Box<dyn DomProcessor<String>>>) -> Box<dyn DomProcessor<String>> {
    Box::new(FirstOf { candidates })
}

pub fn is_placeholder(value: &str) -> bool {
    value.starts_with("data:image") || value.contains("spacer.gif") || value.contains("placeholder")
}

/// First non-placeholder value among several attributes of one element; lazy
/// loaders keep the real image in `data-*` attributes and a blank in `src`.
pub struct AttrCascade {
    scope: Selector,
    attrs: &'static [&'static str],
}

impl DomProcessor<String> for AttrCascade {
    fn process(&self, el: &ElementRef) -> String {
        for e in el.select(&self.scope) {
            for attr in self.attrs {
                if let Some(value) = e.attr(attr) {
                    if !value.is_empty() && !is_placeholder(value) {
                        return value.to_string();
                    }
                }
            }
        }
        String::new()
    }
}

pub fn attr_cascade(
    selectors: &str,
    attrs: &'static [&'static str],
) -> Box<dyn DomProcessor<String>> {
    Box::new(AttrCascade {
        scope: Selector::parse(selectors).unwrap(),
        attrs,
    })
}

pub struct MapValue<In, Out> {
    map: Box<dyn Fn(In) -> Out + Sync + Send>,
    inner: Box<dyn DomProcessor<In>>,
}

impl<In, Out> DomProcessor<Out> for MapValue<In, Out> {
    fn process(&self, el: &ElementRef) -> Out {
        (self.map)(self.inner.process(el))
    }
}

pub fn map_value<In, Out, F>(map: F, inner: Box<dyn DomProcessor<In>>) -> Box<dyn DomProcessor<Out>>
where
    F: Fn(In) -> Out + Sync + Send + 'static,
    In: 'static,
    Out: 'static,
{
    Box::new(MapValue {
        map: Box::new(map),
        inner,
    })
}

pub struct ItemsProcessor<Item> {
    scope: Selector,
    item: Box<dyn DomProcessor<Item>>,
}

impl<Item> DomProcessor<Vec<Item>> for ItemsProcessor<Item> {
    fn process(&self, el: &ElementRef) -> Vec<Item> {
        el.select(&self.scope)
            .map(|e| self.item.process(&e))
            .collect()
    }
}

pub fn items_processor<Item: 'static>(
    scope: &str,
    item: Box<dyn DomProcessor<Item>>,
) -> Box<dyn DomProcessor<Vec<Item>>> {
    Box::new(ItemsProcessor {
        scope: Selector::parse(scope).unwrap(),
        item,
    })
}

pub struct ExtractValue<Out> {
    extract: Box<dyn Fn(&ElementRef) -> Out + Sync + Send>,
}

impl<Out> DomProcessor<Out> for ExtractValue<Out> {
    fn process(&self, el: &ElementRef) -> Out {
        (self.extract)(el)
    }
}

pub fn extract_value<Out, F>(extract: F) -> Box<dyn DomProcessor<Out>>
where
    F: Fn(&ElementRef) -> Out + Sync + Send + 'static,
    Out: 'static,
{
    Box::new(ExtractValue {
        extract: Box::new(extract),
    })
}
