use shortlink_core::shortener::{
    HttpShortener, ShortenError, ShortenerProvider, MAX_RESPONSE_BYTES,
};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "startoken123";
const LONG_URL: &str = "https://example.com/page";

fn shortener(server: &MockServer) -> HttpShortener {
    HttpShortener::new(format!("{}/api", server.uri()), Duration::from_secs(5))
}

#[tokio::test]
async fn short_link_is_trimmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("api", TOKEN))
        .and(query_param("url", LONG_URL))
        .and(query_param("format", "text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  https://short.ly/abc\r\n"))
        .expect(1)
        .mount(&server)
        .await;

    let short_url = shortener(&server)
        .shorten(TOKEN, LONG_URL)
        .await
        .expect("shortened");
    assert_eq!(short_url, "https://short.ly/abc");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    let huge = format!("https://short.ly/{}", "a".repeat(MAX_RESPONSE_BYTES));
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(huge))
        .expect(1)
        .mount(&server)
        .await;

    let result = shortener(&server).shorten(TOKEN, LONG_URL).await;
    assert!(
        matches!(result, Err(ShortenError::UnexpectedPayload(ref msg)) if msg.contains("exceeds")),
        "{result:?}"
    );
}

#[tokio::test]
async fn body_at_the_limit_is_accepted() {
    let server = MockServer::start().await;
    let prefix = "https://short.ly/";
    let exact = format!("{prefix}{}", "b".repeat(MAX_RESPONSE_BYTES - prefix.len()));
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(exact.clone()))
        .mount(&server)
        .await;

    let short_url = shortener(&server)
        .shorten(TOKEN, LONG_URL)
        .await
        .expect("shortened");
    assert_eq!(short_url, exact);
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = shortener(&server).shorten(TOKEN, LONG_URL).await;
    assert!(matches!(result, Err(ShortenError::Api { status: 503 })), "{result:?}");
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("https://short.ly/late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let shortener = HttpShortener::new(format!("{}/api", server.uri()), Duration::from_millis(200));
    let result = shortener.shorten(TOKEN, LONG_URL).await;
    assert!(matches!(result, Err(ShortenError::Timeout(_))), "{result:?}");
}
