use crate::models::{ContentKind, ServerRef};
use crate::suppliers::arabseed;
use crate::suppliers::{get_supplier, ContentSupplier};

const NAME: &str = "ArabSeed";

const LISTING_PAGE: &str = r#"
<html><body>
  <a class="movie__block" href="/مسلسل-الاختيار-الحلقة-5/" title="مسلسل الاختيار الحلقة 5">
    <img data-src="https://cdn.asd.homes/covers/ekhteyar.jpg" src="data:image/gif;base64,R0lGOD">
    <h3>الاختيار</h3>
  </a>
  <a class="movie__block" href="/film-dune-2/" title="فيلم Dune 2 مترجم">
    <div class="poster" style="background-image: url('https://cdn.asd.homes/covers/dune2.jpg')"></div>
    <h3>Dune 2</h3>
  </a>
  <a class="movie__block" href="/category/turkish-series-2/" title="تركي">تركي</a>
</body></html>"#;

#[test]
fn should_parse_listing_cards() {
    let items = arabseed::parse_listing(LISTING_PAGE, "https://m2.arabseed.one/recently/");

    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "مسلسل الاختيار الحلقة 5");
    assert_eq!(items[0].kind, ContentKind::Series);
    assert_eq!(items[0].source, "arabseed");
    assert!(items[0].poster.contains("ekhteyar.jpg"));

    assert_eq!(items[1].title, "Dune 2");
    assert_eq!(items[1].kind, ContentKind::Movie);
}

#[test]
fn should_find_ajax_tokens_in_scripts() {
    let html = r#"<script>var psot_id = 4821; var csrf_token = "tkn-99";</script>"#;
    let (post_id, csrf) = arabseed::find_ajax_tokens(html).unwrap();
    assert_eq!(post_id, "4821");
    assert_eq!(csrf, "tkn-99");
}

#[test]
fn should_find_ajax_tokens_in_markup() {
    let html = r#"
      <meta name="csrf-token" content="markup-token">
      <input name="post_id" value="777">"#;
    let (post_id, csrf) = arabseed::find_ajax_tokens(html).unwrap();
    assert_eq!(post_id, "777");
    assert_eq!(csrf, "markup-token");
}

#[test]
fn missing_tokens_yield_none() {
    assert!(arabseed::find_ajax_tokens("<html><body>plain page</body></html>").is_none());
}

#[test]
fn qualities_are_padded_and_sorted_desc() {
    let single = r#"<ul class="qualities__list"><li data-quality="720"></li></ul>"#;
    assert_eq!(arabseed::parse_qualities(single), vec!["1080", "720", "480"]);

    let full = r#"
      <ul class="qualities__list">
        <li data-quality="480"></li>
        <li data-quality="1080"></li>
        <li data-quality="720"></li>
      </ul>"#;
    assert_eq!(arabseed::parse_qualities(full), vec!["1080", "720", "480"]);
}

#[test]
fn should_parse_server_fragment() {
    let fragment = r#"
      <ul>
        <li data-server="3" data-link="https://m2.arabseed.one/play?url=aHR0cHM6Ly92b2Uuc3gvZS9hYmM">سيرفر المشاهدة</li>
        <li data-server="5"></li>
      </ul>"#;
    let entries = arabseed::parse_server_fragment(fragment);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].server_id, "3");
    assert_eq!(entries[0].label, "سيرفر المشاهدة");
    assert!(entries[0].data_link.is_some());
    assert_eq!(entries[1].label, "سيرفر 5");
    assert!(entries[1].data_link.is_none());
}

#[test]
fn decodes_data_link_variants() {
    let base = "https://m2.arabseed.one/watch/";

    // base64-wrapped target in the url query parameter
    let wrapped = "https://m2.arabseed.one/play?url=aHR0cHM6Ly92b2Uuc3gvZS9hYmM";
    assert_eq!(
        arabseed::decode_data_link(wrapped, base).unwrap(),
        "https://voe.sx/e/abc"
    );

    // direct URL passes through
    assert_eq!(
        arabseed::decode_data_link("https://dood.wf/e/xyz", base).unwrap(),
        "https://dood.wf/e/xyz"
    );

    // relative path resolves against the page
    assert_eq!(
        arabseed::decode_data_link("/embed/55", base).unwrap(),
        "https://m2.arabseed.one/embed/55"
    );

    assert!(arabseed::decode_data_link("", base).is_none());
}

#[test]
fn rank_orders_by_trust_and_filters_junk() {
    let servers = vec![
        ServerRef {
            name: "Unknown".into(),
            embed_url: "https://example-host.net/e/1".into(),
        },
        ServerRef {
            name: "OK".into(),
            embed_url: "https://ok.ru/videoembed/1".into(),
        },
        ServerRef {
            name: "YouTube".into(),
            embed_url: "https://youtube.com/embed/1".into(),
        },
        ServerRef {
            name: "Short".into(),
            embed_url: "https://bit.ly/3xYz".into(),
        },
        ServerRef {
            name: "Popup".into(),
            embed_url: "https://popads.example/zone".into(),
        },
        ServerRef {
            name: "OK again".into(),
            embed_url: "https://OK.ru/videoembed/1 ".into(),
        },
    ];
    let ranked = arabseed::rank_servers(servers);

    let names: Vec<&str> = ranked.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["YouTube", "OK", "Unknown"]);
}

#[test]
fn trust_tiers_are_ordered() {
    assert!(arabseed::trust_score("https://larozavideo.net/v/1") > arabseed::trust_score("https://vimeo.com/1"));
    assert!(arabseed::trust_score("https://vimeo.com/1") > arabseed::trust_score("https://ok.ru/1"));
    assert!(arabseed::trust_score("https://ok.ru/1") > arabseed::trust_score("https://streamwish.to/1"));
    assert!(arabseed::trust_score("https://streamwish.to/1") > arabseed::trust_score("https://mp4upload.com/1"));
    assert!(arabseed::trust_score("https://mp4upload.com/1") > arabseed::trust_score("https://whoever.example/1"));
}

#[test]
fn should_parse_downloads_with_wrapped_links() {
    let html = r#"
      <div>
        <a class="download__item" href="https://m2.arabseed.one/l/aHR0cHM6Ly9jZG4uZXhhbXBsZS9maWxtLm1wNA">
          <h4>1080p</h4>
        </a>
        <a class="download__item" href="https://files.example/direct.mp4"><span>720p</span></a>
      </div>"#;
    let links = arabseed::parse_downloads(html);

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].quality, "1080p");
    assert_eq!(links[0].url, "https://cdn.example/film.mp4");
    assert_eq!(links[1].quality, "720p");
    assert_eq!(links[1].url, "https://files.example/direct.mp4");
}

#[test]
fn should_parse_episodes_sorted() {
    let html = r#"
      <div class="episodes__list">
        <a href="/ep-10/">الحلقة 10</a>
        <a href="/ep-2/">الحلقة 2</a>
      </div>"#;
    let episodes = arabseed::parse_episodes(html, "https://m2.arabseed.one/series/x/");

    let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
    assert_eq!(numbers, vec![2, 10]);
    assert_eq!(episodes[0].title, "الحلقة 2");
}

#[test]
fn should_expose_categories() {
    let sup = get_supplier(NAME).unwrap();
    let categories = sup.get_categories();
    assert!(categories.iter().any(|c| c == "foreign-movies"));
    assert!(categories.iter().any(|c| c == "turkish-series"));
}
