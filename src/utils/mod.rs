pub mod codec;
pub mod html;
pub mod text;
pub mod unpack;

use std::{sync::OnceLock, time::Duration};

use reqwest::{
    header::{self, HeaderMap},
    ClientBuilder,
};

pub fn get_user_agent<'a>() -> &'a str {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
}

/// Shared browser-shaped client. Upstream sites fingerprint requests, so the
/// header block has to look like a real Chrome navigation.
pub fn create_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        let mut headers = get_default_headers();
        headers.insert(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .parse()
                .unwrap(),
        );

        create_client_builder()
            .default_headers(headers)
            .build()
            .unwrap()
    })
}

/// Client for AJAX endpoints that answer JSON or HTML fragments.
pub fn create_json_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        let mut headers = get_default_headers();
        headers.insert(header::ACCEPT, "application/json, text/plain, */*".parse().unwrap());
        headers.insert("X-Requested-With", "XMLHttpRequest".parse().unwrap());

        create_client_builder()
            .default_headers(headers)
            .build()
            .unwrap()
    })
}

pub fn create_client_builder() -> ClientBuilder {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(30))
        .user_agent(get_user_agent())
        .danger_accept_invalid_certs(true)
        .cookie_store(true)
}

pub fn get_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::default();

    headers.insert(header::ACCEPT_ENCODING, "gzip, deflate, br".parse().unwrap());
    headers.insert(
        header::ACCEPT_LANGUAGE,
        "ar,en-US;q=0.9,en;q=0.8".parse().unwrap(),
    );
    headers.insert(header::CACHE_CONTROL, "no-cache".parse().unwrap());
    headers.insert(header::PRAGMA, "no-cache".parse().unwrap());
    headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, "1".parse().unwrap());
    headers
}

/// Rewrite a poster/image URL to go through the external image proxy, so the
/// client never hits a referer-blocking CDN directly.
pub fn proxy_image_url(url: &str) -> String {
    format!("/proxy/image?url={}", urlencoding::encode(url))
}

/// Resolve a scraped href against the page it came from. Protocol-relative
/// links get https, absolute links pass through.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    reqwest::Url::parse(base)
        .ok()
        .and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolutize_handles_all_href_shapes() {
        let base = "https://a.example/watch/item/";
        assert_eq!(absolutize(base, "https://b.example/x"), "https://b.example/x");
        assert_eq!(absolutize(base, "//cdn.example/p.jpg"), "https://cdn.example/p.jpg");
        assert_eq!(absolutize(base, "/video.php?vid=1"), "https://a.example/video.php?vid=1");
        assert_eq!(absolutize(base, "ep-2/"), "https://a.example/watch/item/ep-2/");
    }

    #[test]
    fn image_proxy_encodes_query() {
        assert_eq!(
            proxy_image_url("https://cdn.example/p.jpg?s=1&t=2"),
            "/proxy/image?url=https%3A%2F%2Fcdn.example%2Fp.jpg%3Fs%3D1%26t%3D2"
        );
    }
}
