use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use nsrl_sync::workdir::part_path;
use nsrl_sync::{ArtifactFetcher, Credentials, FetchError, FetchOutcome, SourceDescriptor};
use nsrl_sync_http::HttpFetcher;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const BODY: &[u8] = b"\"SHA-1\",\"MD5\"\n\"AA\",\"BB\"\n";
const PUBLISHED: &str = "Sat, 01 Jun 2024 00:00:00 GMT";

fn published() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn source_for(server: &MockServer) -> SourceDescriptor {
    SourceDescriptor::new("flat", format!("{}/rds/NSRLFile.txt", server.uri()))
}

async fn mount_head(server: &MockServer, last_modified: &str) {
    Mock::given(method("HEAD"))
        .and(path("/rds/NSRLFile.txt"))
        .respond_with(ResponseTemplate::new(200).insert_header("Last-Modified", last_modified))
        .mount(server)
        .await;
}

async fn mount_get(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rds/NSRLFile.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", PUBLISHED)
                .set_body_bytes(BODY),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn downloads_when_never_updated() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &target, None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Updated {
            last_modified: Some(published())
        }
    );
    assert_eq!(std::fs::read(&target).unwrap(), BODY);
    assert!(!part_path(&target).exists());
}

#[tokio::test]
async fn first_fetch_skips_the_head_probe() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();

    HttpFetcher::new()
        .fetch(&source_for(&server), &dir.path().join("flat.txt"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn older_remote_is_not_downloaded() {
    let server = MockServer::start().await;
    mount_head(&server, PUBLISHED).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");
    let previous = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &target, Some(previous))
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::NotModified);
    assert!(!target.exists());
}

#[tokio::test]
async fn equal_timestamps_count_as_not_modified() {
    let server = MockServer::start().await;
    mount_head(&server, PUBLISHED).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &dir.path().join("flat.txt"), Some(published()))
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::NotModified);
}

#[tokio::test]
async fn newer_remote_is_downloaded_conditionally() {
    let server = MockServer::start().await;
    mount_head(&server, PUBLISHED).await;
    Mock::given(method("GET"))
        .and(path("/rds/NSRLFile.txt"))
        .and(|request: &Request| {
            request
                .headers
                .get("If-Modified-Since")
                .and_then(|v| v.to_str().ok())
                == Some("Mon, 01 Jan 2024 00:00:00 GMT")
        })
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");
    let previous = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &target, Some(previous))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Updated { .. }));
    assert_eq!(std::fs::read(&target).unwrap(), BODY);
}

#[tokio::test]
async fn unanswered_head_falls_back_to_conditional_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header_exists("If-Modified-Since"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &dir.path().join("flat.txt"), Some(published()))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Updated { .. }));
}

#[tokio::test]
async fn get_not_modified_wins_over_head() {
    let server = MockServer::start().await;
    mount_head(&server, "Wed, 01 Jan 2025 00:00:00 GMT").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &target, Some(published()))
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::NotModified);
    assert!(!target.exists());
    assert!(!part_path(&target).exists());
}

#[tokio::test]
async fn unparsable_last_modified_is_treated_as_unknown() {
    let server = MockServer::start().await;
    mount_head(&server, "sometime last week").await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = HttpFetcher::new()
        .fetch(&source_for(&server), &dir.path().join("flat.txt"), Some(published()))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Updated { .. }));
}

#[tokio::test]
async fn sends_basic_auth_on_head_and_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Wed, 01 Jan 2025 00:00:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let mut source = source_for(&server);
    source.credentials = Some(Credentials {
        username: "user".into(),
        password: "pass".into(),
    });

    HttpFetcher::new()
        .fetch(&source, &dir.path().join("flat.txt"), Some(published()))
        .await
        .unwrap();
}

#[tokio::test]
async fn sends_custom_headers_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-Api-Key", "secret"))
        .and(header_exists("User-Agent"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let mut source = source_for(&server);
    source.headers.insert("X-Api-Key".into(), "secret".into());

    HttpFetcher::new()
        .fetch(&source, &dir.path().join("flat.txt"), None)
        .await
        .unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("User-Agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("nsrl-sync/"));
}

#[tokio::test]
async fn error_status_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");

    let result = HttpFetcher::new()
        .fetch(&source_for(&server), &target, None)
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
    assert!(!target.exists());
}

#[tokio::test]
async fn slow_server_times_out_without_leaving_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(BODY)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");

    let result = HttpFetcher::with_timeout(Duration::from_millis(200))
        .fetch(&source_for(&server), &target, None)
        .await;

    assert!(matches!(result, Err(FetchError::Timeout { .. })));
    assert!(!target.exists());
    assert!(!part_path(&target).exists());
}

#[tokio::test]
async fn replaces_a_stale_target() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");
    std::fs::write(&target, b"left over from an earlier run").unwrap();

    HttpFetcher::new()
        .fetch(&source_for(&server), &target, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), BODY);
}

#[tokio::test]
async fn invalid_proxy_is_a_client_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut source = source_for(&server);
    source.proxy = Some("http://proxy.invalid:99999".into());

    let result = HttpFetcher::new()
        .fetch(&source, &dir.path().join("flat.txt"), None)
        .await;

    assert!(matches!(result, Err(FetchError::Client { .. })));
}

#[tokio::test]
async fn invalid_header_is_a_client_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut source = source_for(&server);
    source.headers.insert("Bad Header".into(), "x".into());

    let result = HttpFetcher::new()
        .fetch(&source, &dir.path().join("flat.txt"), None)
        .await;

    assert!(matches!(result, Err(FetchError::Client { .. })));
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens on the discard port of loopback.
    let source = SourceDescriptor::new("flat", "http://127.0.0.1:9/NSRLFile.txt");

    let result = HttpFetcher::with_timeout(Duration::from_secs(2))
        .fetch(&source, &dir.path().join("flat.txt"), None)
        .await;

    assert!(matches!(result, Err(FetchError::Network { .. } | FetchError::Timeout { .. })));
}

#[tokio::test]
async fn proxy_applies_only_to_the_source_that_names_it() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rds/NSRLFile.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&proxy)
        .await;
    let direct = MockServer::start().await;
    mount_get(&direct).await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = HttpFetcher::new();

    // The host does not resolve, so only the proxy can answer.
    let mut proxied = SourceDescriptor::new("proxied", "http://nsrl.invalid/rds/NSRLFile.txt");
    proxied.proxy = Some(proxy.uri());
    fetcher
        .fetch(&proxied, &dir.path().join("proxied.txt"), None)
        .await
        .unwrap();

    fetcher
        .fetch(&source_for(&direct), &dir.path().join("flat.txt"), None)
        .await
        .unwrap();

    assert_eq!(proxy.received_requests().await.unwrap().len(), 1);
    assert_eq!(direct.received_requests().await.unwrap().len(), 1);
    assert_eq!(std::fs::read(dir.path().join("proxied.txt")).unwrap(), BODY);
}

#[tokio::test]
async fn ca_certificates_accumulate_without_duplicates() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");
    let fetcher = HttpFetcher::new();
    assert_eq!(fetcher.trusted_certificates(), 0);

    let mut first = source_for(&server);
    first.ca_cert = Some(include_str!("fixtures/ca_one.pem").into());
    fetcher.fetch(&first, &target, None).await.unwrap();
    fetcher.fetch(&first, &target, None).await.unwrap();
    assert_eq!(fetcher.trusted_certificates(), 1);

    let mut second = source_for(&server);
    second.ca_cert = Some(include_str!("fixtures/ca_two.pem").into());
    fetcher.fetch(&second, &target, None).await.unwrap();
    assert_eq!(fetcher.trusted_certificates(), 2);

    // A source without its own certificate keeps the earlier ones.
    fetcher.fetch(&source_for(&server), &target, None).await.unwrap();
    assert_eq!(fetcher.trusted_certificates(), 2);
}

#[tokio::test]
async fn ignoring_tls_errors_still_fetches() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("flat.txt");
    let fetcher = HttpFetcher::new();

    let mut insecure = source_for(&server);
    insecure.ignore_ssl_errors = true;
    let outcome = fetcher.fetch(&insecure, &target, None).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Updated { .. }));

    fetcher.fetch(&source_for(&server), &target, None).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
