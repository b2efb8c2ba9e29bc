use std::sync::OnceLock;

use regex::Regex;

pub fn sanitize_text(text: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let re = WS.get_or_init(|| Regex::new(r"[\n\t\s]+").unwrap());

    re.replace_all(text, " ").trim().to_string()
}

/// First number appearing in the text; episode labels bury it between Arabic
/// words ("الحلقة 12 مترجمة").
pub fn first_number(text: &str) -> u32 {
    static NUM: OnceLock<Regex> = OnceLock::new();
    let re = NUM.get_or_init(|| Regex::new(r"(\d+)").unwrap());

    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Marketing filler and source brands scrubbed out of titles.
const TITLE_NOISE: &[&str] = &[
    "مشاهدة",
    "فيلم",
    "كامل",
    "مترجم",
    "اون لاين",
    "تحميل",
    "بجودة",
    "عالية",
    "اضغط هنا",
    "HD",
    "لاروزا",
    "Laroza",
    "عرب سيد",
    "ArabSeed",
    "انمي",
];

/// Strip noise words and upstream branding from a scraped title.
pub fn clean_title(title: &str) -> String {
    let mut out = title.to_string();
    for noise in TITLE_NOISE {
        out = out.replace(noise, "");
    }
    sanitize_text(&out).trim_matches(['-', ' ']).to_string()
}

/// Replace upstream site branding inside free text (descriptions keep their
/// words otherwise).
pub fn rebrand(text: &str) -> String {
    static BRANDS: &[&str] = &["عرب سيد", "ArabSeed", "لاروزا", "Laroza", "LMINA", "lmina"];
    let mut out = text.to_string();
    for brand in BRANDS {
        out = out.replace(brand, "MOVIDO");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_noise_and_dashes() {
        assert_eq!(
            clean_title("مشاهدة فيلم The Batman مترجم اون لاين - "),
            "The Batman"
        );
    }

    #[test]
    fn first_number_finds_episode() {
        assert_eq!(first_number("الحلقة 12 مترجمة"), 12);
        assert_eq!(first_number("no digits"), 0);
    }

    #[test]
    fn rebrand_replaces_all_brands() {
        assert_eq!(rebrand("حصريا على لاروزا و ArabSeed"), "حصريا على MOVIDO و MOVIDO");
    }
}
