use crate::models::{ContentKind, ServerRef};
use crate::suppliers::larooza;
use crate::suppliers::{get_supplier, ContentSupplier};

const NAME: &str = "Larooza";

const LISTING_PAGE: &str = r#"
<html><body>
  <div class="pm-li-video">
    <a href="/video.php?vid=abc123" title="مشاهدة فيلم The Batman مترجم اون لاين">
      <img src="data:image/gif;base64,R0lGOD" data-echo="/uploads/batman.jpg">
    </a>
  </div>
  <div class="pm-li-video">
    <a href="/moslslat/video.php?vid=ser9" title="مسلسل الحفرة الحلقة 12">
      <img data-echo="https://cdn.larooza.hair/hafra.jpg">
    </a>
  </div>
  <div class="pm-li-video">
    <a href="/video.php?vid=abc123" title="مشاهدة فيلم The Batman مترجم">
      <img data-echo="/uploads/batman.jpg">
    </a>
  </div>
  <div class="pm-li-video">
    <a href="https://facebook.com/larooza" title="تابعنا على فيسبوك"></a>
  </div>
</body></html>"#;

#[test]
fn should_parse_listing_cards() {
    let items = larooza::parse_listing(LISTING_PAGE, "https://larooza.hair/newvideos1.php?page=1");

    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "The Batman");
    assert_eq!(items[0].kind, ContentKind::Movie);
    assert_eq!(items[0].source, "larooza");
    assert!(items[0].poster.starts_with("/proxy/image?url="));
    assert!(items[0].poster.contains("batman.jpg"));

    assert_eq!(items[1].kind, ContentKind::Series);
}

#[test]
fn should_parse_sparse_listing_without_cards() {
    let html = r#"
      <ul>
        <li><a href="video.php?vid=x1" title="مشاهدة فيلم First">First</a></li>
        <li><a href="video.php?vid=x2" title="مشاهدة فيلم Second">Second</a></li>
      </ul>"#;
    let items = larooza::parse_listing(html, "https://larooza.hair/search.php?keywords=f");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "First");
    assert_eq!(items[1].title, "Second");
}

#[test]
fn single_iframe_page_yields_one_server() {
    let html = r#"
      <html><body>
        <h1>مشاهدة فيلم Test</h1>
        <iframe src="https://voe.sx/e/abc123"></iframe>
      </body></html>"#;
    let servers = larooza::parse_servers(html, "https://larooza.hair/video.php?vid=1");

    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].embed_url, "https://voe.sx/e/abc123");
}

#[test]
fn should_parse_watch_list_servers() {
    let html = r##"
      <div class="WatchList">
        <ul>
          <li data-embed-url="https://voe.sx/e/abc">سيرفر 1</li>
          <li data-embed-url="https://dood.wf/e/xyz">Dood HD</li>
          <li data-embed-url="#">معطل</li>
        </ul>
      </div>
      <iframe src="https://googleads.example/frame"></iframe>"##;
    let servers = larooza::parse_servers(html, "https://larooza.hair/video.php?vid=1");

    assert_eq!(servers.len(), 2);
    // Numeric labels fall back to the host name.
    assert_eq!(servers[0].name, "VOE");
    assert_eq!(servers[0].embed_url, "https://voe.sx/e/abc");
    assert_eq!(servers[1].name, "Dood HD");
}

#[test]
fn finalize_dedups_blocks_and_numbers_servers() {
    let servers = vec![
        ServerRef {
            name: String::new(),
            embed_url: "https://voe.sx/e/abc".into(),
        },
        ServerRef {
            name: "Voe".into(),
            embed_url: "https://voe.sx/e/abc?t=2".into(),
        },
        ServerRef {
            name: "Short".into(),
            embed_url: "https://bit.ly/3xYz".into(),
        },
        ServerRef {
            name: "Dood HD".into(),
            embed_url: "https://dood.wf/e/xyz".into(),
        },
    ];
    let finalized = larooza::finalize_servers(servers);

    assert_eq!(finalized.len(), 2);
    assert_eq!(finalized[0].name, "Server 1 - VOE");
    assert_eq!(finalized[0].embed_url, "https://voe.sx/e/abc");
    assert_eq!(finalized[1].name, "Server 2 - Dood HD");
}

#[test]
fn should_parse_episode_dropdown_sorted() {
    let html = r#"
      <select class="episodeoption">
        <option value="select-ep">اختر الحلقة</option>
        <option value="video.php?vid=e2">الحلقة 2</option>
        <option value="video.php?vid=e1">الحلقة 1</option>
        <option value="video.php?vid=sp">حلقة خاصة</option>
      </select>"#;
    let episodes = larooza::parse_episodes(html, "https://larooza.hair/video.php?vid=s");

    let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
    assert_eq!(numbers, vec![1, 2, 0]);
    assert_eq!(episodes[0].url, "https://larooza.hair/video.php?vid=e1");
}

#[test]
fn episode_anchors_are_used_when_no_dropdown_exists() {
    let html = r#"
      <div class="EpisodesList">
        <a href="video.php?vid=e3">الحلقة 3</a>
        <a href="video.php?vid=e1">الحلقة 1</a>
        <a href="video.php?vid=e1b">الحلقة 1 مكررة</a>
        <a href="/pages/dmca.php">DMCA</a>
        <a href="javascript:void(0)">المزيد</a>
      </div>"#;
    let episodes = larooza::parse_episodes(html, "https://larooza.hair/video.php?vid=s");

    let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(episodes[0].url, "https://larooza.hair/video.php?vid=e1");
}

#[test]
fn should_parse_download_links() {
    let html = r#"
      <div>
        <a href="https://mp4upload.com/f/123">تحميل بجودة 720p</a>
        <a href="https://larooza.hair/download.php?vid=1">تحميل مباشر</a>
        <a href="https://other.example/about">About us</a>
      </div>"#;
    let links = larooza::parse_downloads(html, "https://larooza.hair/download.php?vid=1");

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].quality, "720p");
    assert_eq!(links[0].url, "https://mp4upload.com/f/123");
}

#[test]
fn detects_series_by_title_words() {
    assert_eq!(larooza::detect_kind("مسلسل الحفرة"), ContentKind::Series);
    assert_eq!(larooza::detect_kind("الحلقة 3 مترجمة"), ContentKind::Series);
    assert_eq!(larooza::detect_kind("The Batman"), ContentKind::Movie);
}

#[test]
fn normalizes_server_urls_for_dedup() {
    assert_eq!(
        larooza::normalize_server_url("HTTPS://Voe.sx/e/ABC/?t=1"),
        "https://voe.sx/e/abc"
    );
    assert_eq!(larooza::host_label("https://www.dood.wf/e/x"), "DOOD");
    assert_eq!(larooza::host_label("not a url"), "VIDEO");
}

#[test]
fn should_expose_categories() {
    let sup = get_supplier(NAME).unwrap();
    let categories = sup.get_categories();
    assert!(categories.iter().any(|c| c == "arabic-movies"));
    assert!(categories.iter().any(|c| c == "turkish-series"));
}
