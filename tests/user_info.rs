use std::{sync::Arc, time::Duration};

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use oidc_session::{
    client::Client,
    core::{
        endpoint::{Platform, SecurityProfile, SslPinning},
        session::{parameters::*, SessionUpdate},
    },
    Error,
};
use serde_json::json;


use mock::{id_token, signed_in, MockHttpClient, Reply};

const USERINFO: &str = "https://auth-testing.iduruguay.gub.uy/oidc/v1/userinfo";

fn claims() -> serde_json::Value {
    json!({
        "sub": "5485",
        "name": "Juan Pérez",
        "given_name": "Juan",
        "family_name": "Pérez",
        "nickname": "uy-ci-1234567",
        "uid": "uy-ci-1234567",
        "email": "juan@example.com",
        "email_verified": true,
    })
}

#[tokio::test]
async fn returns_all_claims() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(200, claims())));
    let client = signed_in(&http);
    let before = client.get_parameters();

    let user_info = client.get_user_info().await.unwrap();

    assert_eq!(user_info.subject(), Some("5485"));
    assert_eq!(
        serde_json::to_value(&user_info).unwrap(),
        json!({
            "message": { "errorCode": 0, "errorDescription": "" },
            "errorCode": 0,
            "errorDescription": "",
            "sub": "5485",
            "name": "Juan Pérez",
            "given_name": "Juan",
            "family_name": "Pérez",
            "nickname": "uy-ci-1234567",
            "uid": "uy-ci-1234567",
            "email": "juan@example.com",
            "email_verified": true,
        })
    );

    let calls = http.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].uri, USERINFO);
    assert_eq!(
        calls[0].headers[AUTHORIZATION],
        "Bearer c9747e3173544b7b870d48aeafa0f661"
    );
    assert_eq!(
        calls[0].headers[CONTENT_TYPE],
        "application/x-www-form-urlencoded;charset=UTF-8"
    );
    assert_eq!(calls[0].headers[ACCEPT], "application/json");
    assert_eq!(
        calls[0].security,
        SecurityProfile {
            disable_all_security: false,
            pk_pinning: false,
            ssl_pinning: SslPinning::Certs(vec!["certificate".into()]),
        }
    );

    assert_eq!(client.get_parameters(), before);
    assert_eq!(client.lock_acquisitions(), 1);
}

#[tokio::test]
async fn production_uses_unpinned_endpoint() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(200, claims())));
    let client = signed_in(&http);
    client
        .set_parameters(SessionUpdate::new().with(Production(true)))
        .unwrap();

    client.get_user_info().await.unwrap();

    let calls = http.calls();
    assert_eq!(calls[0].uri, "https://auth.iduruguay.gub.uy/oidc/v1/userinfo");
    assert_eq!(calls[0].security, SecurityProfile::unpinned());
}

#[tokio::test]
async fn sandbox_on_ios_pins_public_key() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(200, claims())));
    let client = Client::builder()
        .with_http_client(http.clone())
        .with_platform(Platform::Ios)
        .build()
        .unwrap();
    client
        .set_parameters(
            SessionUpdate::new()
                .with(AccessToken::from("accessToken"))
                .with(IdToken::from(id_token("5485"))),
        )
        .unwrap();

    client.get_user_info().await.unwrap();

    assert!(http.calls()[0].security.pk_pinning);
}

#[tokio::test]
async fn missing_tokens_fail_without_a_request() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(200, claims())));
    let client = mock::client(&http);

    assert_eq!(client.get_user_info().await.unwrap_err(), Error::InvalidToken);

    client
        .set_parameters(SessionUpdate::new().with(AccessToken::from("accessToken")))
        .unwrap();
    assert_eq!(
        client.get_user_info().await.unwrap_err(),
        Error::InvalidIdToken
    );

    assert!(http.calls().is_empty());
    assert_eq!(client.lock_acquisitions(), 2);
}

#[tokio::test]
async fn invalid_token_challenge() {
    let http = Arc::new(MockHttpClient::new(Reply::Reject(Some(
        r#"error="invalid_token", error_description="The access token provided is expired, revoked, malformed, or invalid for other reasons""#,
    ))));
    let client = signed_in(&http);

    assert_eq!(client.get_user_info().await.unwrap_err(), Error::InvalidToken);
}

#[tokio::test]
async fn other_rejections_fail_the_request() {
    for challenge in [Some(r#"error="invalid_request""#), None] {
        let http = Arc::new(MockHttpClient::new(Reply::Reject(challenge)));
        let client = signed_in(&http);
        assert_eq!(
            client.get_user_info().await.unwrap_err(),
            Error::FailedRequest
        );
    }
}

#[tokio::test]
async fn non_ok_status_fails_the_request() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(204, claims())));
    let client = signed_in(&http);

    assert_eq!(
        client.get_user_info().await.unwrap_err(),
        Error::FailedRequest
    );
}

#[tokio::test]
async fn malformed_body_fails_the_request() {
    let http = Arc::new(MockHttpClient::new(Reply::Body(200, b"<html>".to_vec())));
    let client = signed_in(&http);

    assert_eq!(
        client.get_user_info().await.unwrap_err(),
        Error::FailedRequest
    );
}

#[tokio::test]
async fn missing_subject() {
    for body in [json!({ "sub": "" }), json!({ "name": "N" }), json!([])] {
        let http = Arc::new(MockHttpClient::new(Reply::Json(200, body)));
        let client = signed_in(&http);
        assert_eq!(client.get_user_info().await.unwrap_err(), Error::InvalidSub);
    }

    let http = Arc::new(MockHttpClient::new(Reply::Body(200, Vec::new())));
    let client = signed_in(&http);
    assert_eq!(client.get_user_info().await.unwrap_err(), Error::InvalidSub);
}

#[tokio::test]
async fn subject_mismatch() {
    let http = Arc::new(MockHttpClient::new(Reply::Json(
        200,
        json!({ "sub": "9999", "name": "N" }),
    )));
    let client = signed_in(&http);
    let before = client.get_parameters();

    assert_eq!(client.get_user_info().await.unwrap_err(), Error::InvalidToken);
    assert_eq!(client.get_parameters(), before);
}

#[tokio::test]
async fn timeout_releases_the_lock() {
    let http = Arc::new(MockHttpClient::new(Reply::Hang));
    let client = Client::builder()
        .with_http_client(http.clone())
        .with_platform(Platform::Android)
        .with_request_timeout(Duration::from_millis(20))
        .build()
        .unwrap();
    client
        .set_parameters(
            SessionUpdate::new()
                .with(AccessToken::from("accessToken"))
                .with(IdToken::from(id_token("5485"))),
        )
        .unwrap();

    assert_eq!(
        client.get_user_info().await.unwrap_err(),
        Error::FailedRequest
    );
    assert_eq!(
        client.get_user_info().await.unwrap_err(),
        Error::FailedRequest
    );
    assert_eq!(client.lock_acquisitions(), 2);
    assert_eq!(http.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_overlap() {
    let http = Arc::new(
        MockHttpClient::new(Reply::Json(200, claims())).with_delay(Duration::from_millis(10)),
    );
    let client = signed_in(&http);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_user_info().await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(http.calls().len(), 8);
    assert_eq!(http.max_in_flight(), 1);
    assert_eq!(client.lock_acquisitions(), 8);
}

#[tokio::test]
async fn clients_sharing_a_session_share_its_lock() {
    let http = Arc::new(
        MockHttpClient::new(Reply::Json(200, claims())).with_delay(Duration::from_millis(50)),
    );
    let first = signed_in(&http);
    let second = Client::builder()
        .with_http_client(http.clone())
        .with_session_store(first.session().clone())
        .with_platform(Platform::Android)
        .build()
        .unwrap();

    let (a, b) = tokio::join!(first.get_user_info(), second.get_user_info());
    a.unwrap();
    b.unwrap();

    assert_eq!(http.calls().len(), 2);
    assert_eq!(http.max_in_flight(), 1);
    assert_eq!(first.lock_acquisitions(), 2);
    assert_eq!(second.lock_acquisitions(), 2);
}
