use brspplayer::{HttpProbe, ReachabilityProbe};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_head_success_is_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/ok.mp3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let probe = HttpProbe::new(reqwest::Client::new());
    assert!(probe.probe(&format!("{}/ok.mp3", server.uri())).await);
}

#[tokio::test]
async fn test_error_status_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(reqwest::Client::new());
    assert!(!probe.probe(&format!("{}/missing.mp3", server.uri())).await);
}

#[tokio::test]
async fn test_network_failure_is_unreachable() {
    let server = MockServer::start().await;
    let url = format!("{}/song.mp3", server.uri());
    drop(server);

    let probe = HttpProbe::new(reqwest::Client::new());
    assert!(!probe.probe(&url).await);
    assert!(!probe.probe("not a url").await);
}

#[tokio::test]
async fn test_slow_server_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(reqwest::Client::new()).with_timeout(Duration::from_millis(100));
    assert!(!probe.probe(&format!("{}/slow.mp3", server.uri())).await);
}
