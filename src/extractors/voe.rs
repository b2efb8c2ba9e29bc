//! VOE player pages ship the stream URL as a multi-stage ciphertext inside a
//! `application/json` script tag. The sibling script sometimes carries a list
//! of noise patterns that have to be stripped between stages.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;
use reqwest::Url;

use super::{fetch_embed_page, find_media_url, ExtractorEngine};
use crate::models::ResolvedStream;
use crate::utils::codec;

const ALT_DOMAINS: &[&str] = &["voe.sx", "voe.un", "voe.to", "voe.cc", "voe.am"];

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        static ID_RE: OnceLock<Regex> = OnceLock::new();
        let Some(id) = ID_RE
            .get_or_init(|| Regex::new(r"/(?:e|d)/([a-zA-Z0-9]+)").unwrap())
            .captures(url)
            .map(|c| c[1].to_string())
        else {
            return Ok(None);
        };

        for domain in ALT_DOMAINS {
            let embed_url = format!("https://{domain}/e/{id}");
            let Ok((body, final_url)) = fetch_embed_page(&embed_url, url).await else {
                continue;
            };

            let payload = find_payload(&body);
            let luts = match &payload {
                Some((_, Some(script_src))) => {
                    let script_url = resolve_relative(&final_url, script_src);
                    match fetch_embed_page(&script_url, &final_url).await {
                        Ok((script, _)) => find_luts(&script),
                        Err(_) => None,
                    }
                }
                _ => None,
            };

            if let Some((ciphertext, _)) = &payload {
                if let Some(source) = decode_payload(ciphertext, luts.as_deref()) {
                    debug!("voe decoded source on {domain}");
                    return Ok(Some(ResolvedStream::from_url(source, &final_url)));
                }
            }

            // last resort: any direct media literal on the page
            if let Some(media) = find_media_url(&body) {
                return Ok(Some(ResolvedStream::from_url(media, &final_url)));
            }
        }
        Ok(None)
    })
}

/// Ciphertext plus, when present, the sibling script URL that holds the
/// noise-pattern list.
fn find_payload(body: &str) -> Option<(String, Option<String>)> {
    static WITH_SCRIPT: OnceLock<Regex> = OnceLock::new();
    static PAYLOAD_ONLY: OnceLock<Regex> = OnceLock::new();

    let with_script = WITH_SCRIPT.get_or_init(|| {
        Regex::new(r#"(?s)json">\["([^"]+)"\]</script>\s*<script\s*src="([^"]+)""#).unwrap()
    });
    if let Some(caps) = with_script.captures(body) {
        return Some((caps[1].to_string(), Some(caps[2].to_string())));
    }

    let payload_only =
        PAYLOAD_ONLY.get_or_init(|| Regex::new(r#"json">\["([^"]+)"\]</script>"#).unwrap());
    payload_only
        .captures(body)
        .map(|caps| (caps[1].to_string(), None))
}

/// The LUT literal looks like `['@$','^^',...]`, short non-word chunks.
fn find_luts(script: &str) -> Option<String> {
    static LUT_RE: OnceLock<Regex> = OnceLock::new();
    LUT_RE
        .get_or_init(|| Regex::new(r"(\[(?:'\W{2}'[,\]]){1,9})").unwrap())
        .find(script)
        .map(|m| m.as_str().to_string())
}

fn resolve_relative(base: &str, href: &str) -> String {
    Url::parse(base)
        .ok()
        .and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}

/// Full cipher: ROT13 the letters, strip LUT noise, then
/// base64 -> char-3 -> reverse -> base64 -> JSON with a `source` field.
pub fn decode_payload(ciphertext: &str, luts: Option<&str>) -> Option<String> {
    let mut txt = rot13(ciphertext);
    if let Some(luts) = luts {
        txt = strip_luts(&txt, luts);
    }

    let stage1 = codec::decode_base64_text(&txt)?;
    let shifted: String = stage1.chars().map(|c| shift_char(c, -3)).collect();
    let reversed: String = shifted.chars().rev().collect();
    let json_text = codec::decode_base64_text(&reversed)?;

    let value: serde_json::Value = serde_json::from_str(&json_text).ok()?;
    value
        .get("source")
        .and_then(|s| s.as_str())
        .map(String::from)
}

fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            other => other,
        })
        .collect()
}

/// Remove every literal chunk listed in the LUT array from the text.
fn strip_luts(text: &str, luts: &str) -> String {
    let inner = luts
        .trim_start_matches("['")
        .trim_end_matches(']')
        .trim_end_matches('\'');

    let mut out = text.to_string();
    for chunk in inner.split("','") {
        if !chunk.is_empty() {
            out = out.replace(chunk, "");
        }
    }
    out
}

fn shift_char(c: char, delta: i32) -> char {
    char::from_u32((c as i32 + delta).max(0) as u32).unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    // inverse of decode_payload, minus the LUT noise
    fn encode_payload(source_json: &str) -> String {
        let b64: String = STANDARD.encode(source_json);
        let reversed: String = b64.chars().rev().collect();
        let shifted: String = reversed.chars().map(|c| shift_char(c, 3)).collect();
        rot13(&STANDARD.encode(shifted))
    }

    #[test]
    fn rot13_is_an_involution() {
        let s = "Hello, WORLD! 123 +/=";
        assert_eq!(rot13(&rot13(s)), s);
    }

    #[test]
    fn payload_round_trips_through_all_stages() {
        let json = r#"{"source":"https://cdn.example/master.m3u8","quality":"1080"}"#;
        let ct = encode_payload(json);
        assert_eq!(
            decode_payload(&ct, None).unwrap(),
            "https://cdn.example/master.m3u8"
        );
    }

    #[test]
    fn lut_noise_is_stripped_before_decoding() {
        let json = r#"{"source":"https://cdn.example/v.mp4"}"#;
        let clean = encode_payload(json);
        // inject noise chunks that the LUT list names
        let noisy = clean
            .char_indices()
            .flat_map(|(i, c)| {
                if i % 7 == 3 {
                    vec!['@', '$', c]
                } else {
                    vec![c]
                }
            })
            .collect::<String>();

        assert_eq!(
            decode_payload(&noisy, Some("['@$']")).unwrap(),
            "https://cdn.example/v.mp4"
        );
    }

    #[test]
    fn payload_is_found_with_and_without_script() {
        let with = r#"<script type="application/json">["CIPHER"]</script> <script src="/js/app.js"></script>"#;
        assert_eq!(
            find_payload(with).unwrap(),
            ("CIPHER".to_string(), Some("/js/app.js".to_string()))
        );

        let without = r#"<script type="application/json">["CIPHER"]</script>"#;
        assert_eq!(find_payload(without).unwrap(), ("CIPHER".to_string(), None));
    }

    #[test]
    fn lut_list_is_found_in_sibling_script() {
        let script = r"var MKGMa=window;function t(){};var luts=['@$','^^','~@'];t();";
        assert_eq!(find_luts(script).unwrap(), "['@$','^^','~@']");
        assert_eq!(find_luts("var x = ['not-a-lut'];"), None);
    }

    #[test]
    fn script_payload_feeds_lut_stripping() {
        let json = r#"{"source":"https://cdn.example/s.m3u8"}"#;
        let noisy = format!("^^{}^^", encode_payload(json));
        let luts = find_luts("prelude; var l = ['^^']; coda").unwrap();
        assert_eq!(
            decode_payload(&noisy, Some(luts.as_str())).unwrap(),
            "https://cdn.example/s.m3u8"
        );
    }

    #[test]
    fn garbage_payload_decodes_to_nothing() {
        assert_eq!(decode_payload("!!!", None), None);
    }
}
