//! Reverses Dean Edwards' P.A.C.K.E.R transform: the payload is the original
//! source with every identifier replaced by its base-N index into a
//! pipe-delimited symbol table.

use std::{fmt, sync::OnceLock};

use regex::{Captures, Regex, RegexBuilder};

#[derive(Debug)]
pub struct UnpackError {
    message: &'static str,
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unpack error: {}", self.message)
    }
}

impl std::error::Error for UnpackError {}

pub fn detect(source: &str) -> bool {
    source
        .replace(' ', "")
        .contains("eval(function(p,a,c,k,e,")
}

/// Unpack one packed script. Symbol-table entries that are missing or empty
/// leave the token unchanged, matching the runtime decoder's behavior.
pub fn unpack(source: &str) -> Result<String, UnpackError> {
    static WORD: OnceLock<Regex> = OnceLock::new();

    let args = extract_args(source)?;

    let payload = args.payload.replace("\\\\", "\\").replace("\\'", "'");
    let restored = WORD
        .get_or_init(|| Regex::new(r"\b\w+\b").unwrap())
        .replace_all(&payload, |cap: &Captures| {
            let word = cap.get(0).unwrap().as_str();
            match unbase(word, args.radix) {
                Some(idx) if idx < args.symtab.len() && !args.symtab[idx].is_empty() => {
                    args.symtab[idx].to_string()
                }
                _ => word.to_string(),
            }
        });

    Ok(restored.into_owned())
}

struct PackerArgs<'a> {
    payload: &'a str,
    symtab: Vec<&'a str>,
    radix: u64,
}

fn extract_args(source: &str) -> Result<PackerArgs<'_>, UnpackError> {
    static LONG_FORM: OnceLock<Regex> = OnceLock::new();
    static SHORT_FORM: OnceLock<Regex> = OnceLock::new();

    let juicers = [
        LONG_FORM.get_or_init(|| {
            RegexBuilder::new(
                r"}\('(.*)', *(\d+|\[\]), *(\d+), *'(.*)'\.split\('\|'\), *(\d+), *(.*)\)\)",
            )
            .dot_matches_new_line(true)
            .build()
            .unwrap()
        }),
        SHORT_FORM.get_or_init(|| {
            RegexBuilder::new(r"}\('(.*)', *(\d+|\[\]), *(\d+), *'(.*)'\.split\('\|'\)")
                .dot_matches_new_line(true)
                .build()
                .unwrap()
        }),
    ];

    for juicer in juicers {
        let args = juicer.captures(source).and_then(|caps| {
            let payload = caps.get(1)?.as_str();

            let radix_str = caps.get(2)?.as_str();
            let radix = if radix_str == "[]" {
                62
            } else {
                radix_str.parse::<u64>().ok()?
            };

            let count = caps.get(3)?.as_str().parse::<usize>().ok()?;
            let symtab: Vec<_> = caps.get(4)?.as_str().split('|').collect();
            if symtab.len() != count {
                return None;
            }

            Some(PackerArgs {
                payload,
                symtab,
                radix,
            })
        });

        if let Some(args) = args {
            return Ok(args);
        }
    }

    Err(UnpackError {
        message: "unrecognized p.a.c.k.e.r argument structure",
    })
}

const ALPHABET_62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Positional base-N decode of one token. Bases up to 36 use the standard
/// lowercase digits, 37..=62 the mixed-case packer alphabet.
fn unbase(token: &str, radix: u64) -> Option<usize> {
    if (2..=36).contains(&radix) {
        return usize::from_str_radix(&token.to_lowercase(), radix as u32).ok();
    }

    let mut value: u64 = 0;
    for ch in token.chars() {
        let digit = ALPHABET_62.find(ch)? as u64;
        if digit >= radix {
            return None;
        }
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKED_BASE4: &str = concat!(
        "eval(function(p,a,c,k,e,r){e=String;if(!''.replace(/^/,String))",
        "{while(c--)r[c]=k[c]||c;k=[function(e){return r[e]}];e=function()",
        "{return'\\w+'};c=1};while(c--)if(k[c])p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c]);",
        "return p}('1 0=2;3(0)',4,4,'x|var|5|alert'.split('|'),0,{}))"
    );

    // base 62, two-character token "1c" = 62 + 12 = 74
    const PACKED_BASE62: &str = concat!(
        "eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);",
        "return p}('0.1(\"2\")',62,3,'console|log|hello'.split('|')))"
    );

    #[test]
    fn detects_packed_source() {
        assert!(detect(PACKED_BASE4));
        assert!(!detect("var x = 1;"));
    }

    #[test]
    fn extracts_arguments() {
        let args = extract_args(PACKED_BASE4).unwrap();
        assert_eq!(args.payload, "1 0=2;3(0)");
        assert_eq!(args.symtab, ["x", "var", "5", "alert"]);
        assert_eq!(args.radix, 4);
    }

    #[test]
    fn unpacks_base4_sample() {
        assert_eq!(unpack(PACKED_BASE4).unwrap(), "var x=5;alert(x)");
    }

    #[test]
    fn unpacks_base62_sample() {
        assert_eq!(unpack(PACKED_BASE62).unwrap(), r#"console.log("hello")"#);
    }

    #[test]
    fn unbase_handles_multidigit_base62() {
        assert_eq!(unbase("10", 62), Some(62));
        assert_eq!(unbase("1c", 62), Some(74));
        assert_eq!(unbase("z", 62), Some(35));
        assert_eq!(unbase("Z", 62), Some(61));
    }

    #[test]
    fn missing_symtab_entry_leaves_token() {
        // index 2 is empty in the table; the literal "2" must survive
        let packed = concat!(
            "eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);",
            "return p}('1 0=2',10,3,'x|var|'.split('|')))"
        );
        assert_eq!(unpack(packed).unwrap(), "var x=2");
    }
}
