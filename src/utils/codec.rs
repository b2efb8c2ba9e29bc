//! Reversible identifier encoding and lenient payload decoding.

use anyhow::{anyhow, Context};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};

/// Encode a source URL into the opaque, URL-safe id exposed to clients.
pub fn encode_id(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Decode an opaque id back to the source URL. Accepts ids produced with or
/// without padding and with either base64 alphabet, since ids round-trip
/// through query strings and older clients.
pub fn decode_id(id: &str) -> anyhow::Result<String> {
    let bytes = decode_base64_relaxed(id).ok_or_else(|| anyhow!("malformed id: {id}"))?;
    String::from_utf8(bytes).context("id does not decode to utf-8")
}

/// Base64 decode tolerating both alphabets and missing padding.
fn decode_base64_relaxed(token: &str) -> Option<Vec<u8>> {
    let normalized: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let mut padded = normalized;
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    STANDARD.decode(padded).ok()
}

/// Decode a base64 token to text, replacing invalid bytes. Obfuscated player
/// payloads frequently embed raw bytes inside otherwise-textual blobs.
pub fn decode_base64_text(token: &str) -> Option<String> {
    let bytes = decode_base64_relaxed(token)?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Recover text hidden in `\xNN` escape runs, another obfuscation layer some
/// player pages use. Returns all decoded runs of at least `min_len` escapes.
pub fn decode_hex_runs(src: &str, min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = src;

    while let Some(start) = rest.find("\\x") {
        let run = &rest[start..];
        let mut hex_digits = String::new();
        let mut consumed = 0;

        let bytes = run.as_bytes();
        while consumed + 4 <= run.len()
            && &run[consumed..consumed + 2] == "\\x"
            && bytes[consumed + 2].is_ascii_hexdigit()
            && bytes[consumed + 3].is_ascii_hexdigit()
        {
            hex_digits.push_str(&run[consumed + 2..consumed + 4]);
            consumed += 4;
        }

        if hex_digits.len() / 2 >= min_len {
            if let Ok(decoded) = hex::decode(&hex_digits) {
                out.push(String::from_utf8_lossy(&decoded).into_owned());
            }
        }

        rest = &rest[start + consumed.max(2)..];
    }

    out
}
