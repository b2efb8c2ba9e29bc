//! Mixdrop hides `MDCore.wurl` behind one level of packed JS.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;

use super::{fetch_embed_page, fix_protocol_relative, unpack_all, ExtractorEngine};
use crate::models::{MediaType, ResolvedStream};

pub fn extract<'a>(
    _engine: &'a ExtractorEngine,
    url: &'a str,
    _depth: usize,
) -> BoxFuture<'a, anyhow::Result<Option<ResolvedStream>>> {
    Box::pin(async move {
        let embed_url = url.replace("/f/", "/e/");
        let (body, final_url) = fetch_embed_page(&embed_url, url).await?;
        let all_text = unpack_all(&body, 2);

        Ok(find_wurl(&all_text).map(|wurl| ResolvedStream {
            url: wurl,
            media_type: MediaType::Mp4,
            headers: [("Referer".to_string(), final_url)].into(),
        }))
    })
}

fn find_wurl(text: &str) -> Option<String> {
    static MDCORE: OnceLock<Regex> = OnceLock::new();
    static VARS: OnceLock<Regex> = OnceLock::new();

    MDCORE
        .get_or_init(|| Regex::new(r#"MDCore\.wurl\s*=\s*["']([^"']+)["']"#).unwrap())
        .captures(text)
        .or_else(|| {
            VARS.get_or_init(|| {
                Regex::new(r#"(?:wurl|vfile|v_url|vsrc)\s*[:=]\s*["']([^"']+)["']"#).unwrap()
            })
            .captures(text)
        })
        .map(|c| fix_protocol_relative(&c[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::unpack::packerjs;

    #[test]
    fn wurl_is_protocol_fixed() {
        let text = r#"MDCore.wurl = "//s-delivery40.mxcontent.net/v/abc.mp4?s=x&e=1";"#;
        assert_eq!(
            find_wurl(text).unwrap(),
            "https://s-delivery40.mxcontent.net/v/abc.mp4?s=x&e=1"
        );
    }

    #[test]
    fn wurl_survives_unpacking() {
        // token 0 -> MDCore, 1 -> wurl
        let packed = concat!(
            "eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);",
            "return p}('0.1=\"//host.example/v.mp4\";',10,2,'MDCore|wurl'.split('|')))"
        );
        assert!(packerjs::detect(packed));
        let all_text = unpack_all(packed, 2);
        assert_eq!(find_wurl(&all_text).unwrap(), "https://host.example/v.mp4");
    }
}
