mod common;

use common::{client_with, drain, signed_in_record};
use ngoconnect_client::{
    ApiRequest, ErrorKind, SessionEvent, SessionState, TerminationReason, TokenRecord, TokenStore,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DONATIONS: &str = "/api/user/profile/donations/";
const REFRESH: &str = "/api/user/token/refresh/";

#[tokio::test]
async fn test_current_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_with(&server, signed_in_record("T1", Some("R1")));
    let donations = client.donations().mine().await.unwrap();
    assert!(donations.is_empty());
}

#[tokio::test]
async fn test_no_token_sends_no_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/campaigns/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"slug": "clean-water", "title": "Clean Water", "status": "ACTIVE"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_with(&server, TokenRecord::default());
    let campaigns = client.campaigns().list(None).await.unwrap();
    assert_eq!(campaigns[0].slug, "clean-water");
}

#[test_log::test(tokio::test)]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "T2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "campaign_title": "Flood Relief", "amount": "2500.00", "status": "Completed"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", Some("R1")));
    let mut events = client.session().subscribe();

    let donations = client.donations().mine().await.unwrap();
    assert_eq!(donations[0].campaign_label(), "Flood Relief");

    let record = tokens.load().await.unwrap();
    assert_eq!(record.access_token.as_deref(), Some("T2"));
    assert_eq!(record.refresh_token.as_deref(), Some("R1"));
    assert_eq!(drain(&mut events), vec![SessionEvent::TokenRefreshed]);
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "T2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "User is inactive"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", Some("R1")));
    let err = client.donations().mine().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(err.user_message(), "User is inactive");
    // the second rejection is surfaced, not treated as a dead session
    assert_eq!(tokens.load().await.unwrap().access_token.as_deref(), Some("T2"));
}

#[test_log::test(tokio::test)]
async fn test_failed_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::profile_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token is blacklisted",
            "code": "token_not_valid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", Some("R1")));
    assert_eq!(client.session().initialize().await.unwrap(), SessionState::Authenticated);
    let mut events = client.session().subscribe();

    let err = client.donations().mine().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    assert!(tokens.load().await.unwrap().is_empty());
    assert_eq!(client.session().state().await, SessionState::Anonymous);
    assert!(client.session().profile().await.is_none());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoginRequired {
            reason: TerminationReason::RefreshFailed
        }]
    );
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_refresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DONATIONS))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "T2"})))
        .expect(0)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", None));
    let mut events = client.session().subscribe();

    let err = client.donations().mine().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(tokens.load().await.unwrap().is_empty());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoginRequired {
            reason: TerminationReason::NoRefreshToken
        }]
    );
}

#[test_log::test(tokio::test)]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "T2", "refresh": "R2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", Some("R1")));
    let donations = client.donations();
    let volunteers = client.volunteers();

    let (first, second) = tokio::join!(donations.mine(), volunteers.time_logs());
    assert!(first.is_ok());
    assert!(second.is_ok());

    let record = tokens.load().await.unwrap();
    assert_eq!(record.access_token.as_deref(), Some("T2"));
    assert_eq!(record.refresh_token.as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_other_failures_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/campaigns/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, tokens) = client_with(&server, signed_in_record("T1", Some("R1")));
    let err = client.campaigns().get("missing").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.user_message(), "Not found.");
    assert_eq!(tokens.load().await.unwrap(), signed_in_record("T1", Some("R1")));
}

#[tokio::test]
async fn test_raw_send_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/projects/campaigns/old-drive/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (client, _) = client_with(&server, signed_in_record("T1", Some("R1")));
    let response = client
        .gateway()
        .send(ApiRequest::delete("/api/projects/campaigns/old-drive/"))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 204);
    assert!(response.is_empty());
}
