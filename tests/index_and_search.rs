//! Full indexing and search against a mock site

use sitesearch::commands::{
    cmd_index_page, cmd_search, cmd_start_indexing, cmd_statistics, SearchOptions, Services,
};
use sitesearch::config::{Config, SiteConfig};
use sitesearch::store::SiteStatus;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount(server: &MockServer, page_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
        .mount(server)
        .await;
}

async fn services_for(server: &MockServer, tmp: &TempDir) -> Services {
    let mut config = Config {
        sites: vec![SiteConfig::new(server.uri(), "Pets")],
        ..Config::default()
    };
    config.crawl.rate_limit_per_host = 1000.0;
    config.crawl.timeout_secs = 5;
    config.paths.db_file = tmp.path().join("index.db");
    Services::open(config).await.unwrap()
}

#[tokio::test]
async fn test_index_then_search() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        r#"<html><head><title>Pets</title></head><body>
           <p>Welcome. Read about <a href="/cats">cats</a> and <a href="/dogs">dogs</a>.</p>
           </body></html>"#,
    )
    .await;
    mount(
        &server,
        "/cats",
        r#"<html><head><title>Cats</title></head><body>
           <h1>Cats</h1><p>Cats sleep all day. Some cats chase dogs.</p>
           </body></html>"#,
    )
    .await;
    mount(
        &server,
        "/dogs",
        r#"<html><head><title>Dogs</title></head><body>
           <p>Dogs bark at the mailman.</p>
           </body></html>"#,
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let services = services_for(&server, &tmp).await;

    // Searching before anything was indexed is a precondition failure
    let early = cmd_search(&services, "cats", SearchOptions::default())
        .await
        .unwrap();
    assert!(!early.result);

    assert!(cmd_start_indexing(&services).await.unwrap().result);
    services.coordinator.wait().await;

    let stats = cmd_statistics(&services).await.unwrap();
    assert_eq!(stats.total.pages, 3);
    assert_eq!(stats.detailed[0].status, Some(SiteStatus::Indexed));

    let response = cmd_search(&services, "cat dog", SearchOptions::default())
        .await
        .unwrap();
    assert!(response.result);
    let data = response.data.unwrap();
    // Only the welcome page and the cats page mention both words
    assert_eq!(response.count, Some(2));
    assert_eq!(data[0].uri, "/cats");
    assert_eq!(data[0].title, "Cats");
    assert_eq!(data[0].relevance, 1.0);
    assert!(data[0].snippet.contains("<b>"));
    assert!(data.iter().all(|d| d.relevance > 0.0 && d.relevance <= 1.0));

    let site_only = cmd_search(
        &services,
        "bark",
        SearchOptions {
            site: Some(format!("{}/", server.uri())),
            ..SearchOptions::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(site_only.count, Some(1));
    assert_eq!(site_only.data.unwrap()[0].uri, "/dogs");

    let nothing = cmd_search(&services, "giraffe", SearchOptions::default())
        .await
        .unwrap();
    assert!(nothing.result);
    assert_eq!(nothing.count, Some(0));
}

#[tokio::test]
async fn test_single_page_reindex_replaces_contributions() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/news",
        "<html><body><p>Parrots talk.</p></body></html>",
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let services = services_for(&server, &tmp).await;
    let url = format!("{}/news", server.uri());

    assert!(cmd_index_page(&services, &url, true).await.unwrap().result);
    assert!(cmd_index_page(&services, &url, true).await.unwrap().result);

    let found = cmd_search(&services, "parrot", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(found.count, Some(1));

    let site = services
        .store
        .get_site_by_url(&server.uri())
        .await
        .unwrap()
        .unwrap();
    let lemmas = services.store.lemmas_by_sites(&[site.id]).await.unwrap();
    assert!(lemmas.iter().all(|l| l.frequency == 1));

    let outside = cmd_index_page(&services, "https://elsewhere.example/page", true)
        .await
        .unwrap();
    assert!(!outside.result);
}
