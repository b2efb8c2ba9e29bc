use crate::models::ContentKind;
use crate::suppliers::anime4up;
use crate::suppliers::{get_supplier, ContentSupplier};

const NAME: &str = "Anime4Up";

const LISTING_PAGE: &str = r#"
<html><body>
  <div class="anime-card-container">
    <a class="overlay" href="/anime/one-piece/" aria-label="انمي One Piece"></a>
    <img class="thumbnail img-responsive" src="data:image/gif;base64,R0lGOD" data-src="https://cdn.example/op.jpg">
    <div class="badge light-soft">الحلقة 52</div>
  </div>
  <div class="anime-card">
    <a href="/anime/naruto/">Naruto</a>
    <div class="image" style="background-image: url('https://cdn.example/naruto.jpg');"></div>
  </div>
  <div class="anime-card">
    <a href="/anime/naruto/">Naruto</a>
  </div>
</body></html>"#;

#[test]
fn should_parse_listing_cards() {
    let items = anime4up::parse_cards(LISTING_PAGE, "https://4r.2qk9x7b.shop/");

    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "One Piece الحلقة 52");
    assert_eq!(items[0].kind, ContentKind::Anime);
    assert_eq!(items[0].source, "anime4up");
    assert!(items[0].poster.contains("op.jpg"));

    assert_eq!(items[1].title, "Naruto");
    // Poster recovered from the inline background-image.
    assert!(items[1].poster.contains("naruto.jpg"));
}

#[test]
fn placeholder_posters_are_dropped() {
    let html = r#"
      <div class="anime-card">
        <a href="/anime/bleach/">Bleach</a>
        <img src="data:image/gif;base64,R0lGOD">
      </div>"#;
    let items = anime4up::parse_cards(html, "https://4r.2qk9x7b.shop/");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].poster, "");
}

#[test]
fn should_parse_episode_list_sorted_and_deduped() {
    let html = r#"
      <ul id="ULEpisodesList">
        <li><a href="/episode/one-piece-3/">الحلقة 3</a></li>
        <li><a href="/episode/one-piece-1/">الحلقة 1</a></li>
        <li><a href="/episode/one-piece-1/">الحلقة 1</a></li>
        <li><a href="/anime/one-piece/">الرئيسية</a></li>
      </ul>"#;
    let episodes = anime4up::parse_episodes(html, "https://4r.2qk9x7b.shop/anime/one-piece/");

    assert_eq!(episodes.len(), 2);
    let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
    assert_eq!(numbers, vec![3, 1]);
    assert_eq!(
        episodes[0].url,
        "https://4r.2qk9x7b.shop/episode/one-piece-3/"
    );
}

#[test]
fn should_parse_watch_servers() {
    let html = r##"
      <ul id="episode-servers">
        <li><a data-watch="https://voe.sx/e/x">VOE - FHD</a></li>
        <li><a href="//dood.wf/e/y">Dood</a></li>
        <li><a href="#">قريبا</a></li>
      </ul>"##;
    let servers = anime4up::parse_servers(html);

    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].name, "VOE - FHD");
    assert_eq!(servers[0].embed_url, "https://voe.sx/e/x");
    assert_eq!(servers[1].embed_url, "https://dood.wf/e/y");
}

#[test]
fn should_parse_download_table() {
    let html = r#"
      <div id="download">
        <table>
          <tr>
            <td class="server">Mp4upload</td>
            <td class="quality">1080p</td>
            <td><a href="https://mp4upload.com/f/1">تحميل</a></td>
          </tr>
          <tr>
            <td class="server">Mega</td>
            <td class="quality">720p</td>
            <td><a href="https://mega.nz/file/2">تحميل</a></td>
          </tr>
        </table>
      </div>"#;
    let links = anime4up::parse_downloads(html, "https://4r.2qk9x7b.shop/episode/x/");

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].quality, "Mp4upload 1080p");
    assert_eq!(links[0].url, "https://mp4upload.com/f/1");
    assert_eq!(links[1].quality, "Mega 720p");
}

#[test]
fn download_container_without_rows_uses_direct_links() {
    let html = r#"
      <div class="download-links">
        <a href="https://mega.nz/file/9">Mega 1080p</a>
      </div>"#;
    let links = anime4up::parse_downloads(html, "https://4r.2qk9x7b.shop/episode/x/");

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].quality, "Mega 1080p");
}

#[test]
fn finds_parent_anime_and_next_page_links() {
    let html = r#"
      <div class="anime-page-link"><a href="/anime/one-piece/">ون بيس</a></div>
      <a class="page-numbers next" href="/anime/one-piece/page/2/">»</a>"#;
    let base = "https://4r.2qk9x7b.shop/episode/one-piece-3/";

    assert_eq!(
        anime4up::find_parent_anime_link(html, base).unwrap(),
        "https://4r.2qk9x7b.shop/anime/one-piece/"
    );
    assert_eq!(
        anime4up::find_next_page(html, base).unwrap(),
        "https://4r.2qk9x7b.shop/anime/one-piece/page/2/"
    );
}

#[test]
fn should_expose_categories() {
    let sup = get_supplier(NAME).unwrap();
    assert_eq!(sup.get_categories(), vec!["anime-list"]);
}
