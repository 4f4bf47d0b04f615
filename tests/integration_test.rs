use mockito::{Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use thecity::http::fetch_entity;
use thecity::models::{Group, User};
use thecity::{Client, Config, Entity, ErrorKind, Transport};

fn transport_for(server: &ServerGuard) -> Arc<dyn Transport> {
    let config = Config::default()
        .api_url(server.url())
        .unwrap()
        .user_token("token");
    Arc::new(Client::new(config).unwrap())
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_fetch_user() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/users/42")
        .match_header("x-city-user-token", "token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "id": 42,
                "first": "Ada",
                "last": "Lovelace",
                "admin": true,
                "primary_address": {"city": "Fort Worth", "zipcode": "76102"},
                "profile_picture_url": "https://images.example.org/42.png"
            }"#,
        )
        .create_async()
        .await;

    let user: User = fetch_entity(transport_for(&server), "/users/42")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(user.full_name().as_deref(), Some("Ada Lovelace"));
    assert!(user.has_admin());
    assert_eq!(user.primary_address().zipcode(), Some(json!("76102")));
    assert_eq!(
        user.primary_address().user().and_then(|u| u.get("id").cloned()),
        Some(json!(42))
    );
    assert!(user.primary_campus().is_null());
    assert_eq!(user.profile_picture_uri(), user.profile_picture_url());
    assert_eq!(user.get("first").unwrap(), Some(json!("Ada")));
    assert_eq!(user.get("password").unwrap(), None);
    assert_eq!(user.base().client().unwrap().api_url(), server.url());
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_error_with_rate_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/groups/7")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_header("X-City-RateLimit-Limit-By-Ip", "2000")
        .with_header("X-City-RateLimit-Remaining-By-Ip", "0")
        .with_body(r#"{"errors": [{"message": "Rate limit exceeded\n", "code": 88}]}"#)
        .create_async()
        .await;

    let err = fetch_entity::<Group>(transport_for(&server), "/groups/7")
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.kind(), ErrorKind::TooManyRequests);
    assert_eq!(err.message(), "Rate limit exceeded");
    assert_eq!(err.code(), Some(88));
    assert_eq!(err.rate_limit().limit(), Some(2000));
    assert_eq!(err.rate_limit().remaining(), Some(0));
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_error_without_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/groups")
        .with_status(503)
        .create_async()
        .await;

    let err = fetch_entity::<Group>(transport_for(&server), "/groups")
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.message(), "");
    assert_eq!(err.code(), None);
    assert!(err.rate_limit().limit().is_none());
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_single_error_message() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/users/1")
        .with_status(401)
        .with_body(r#"{"error": "Invalid user token"}"#)
        .create_async()
        .await;

    let err = fetch_entity::<User>(transport_for(&server), "/users/1")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.to_string(), "Invalid user token");
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_empty_success_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/users/1")
        .with_status(200)
        .create_async()
        .await;

    let user: User = fetch_entity(transport_for(&server), "/users/1")
        .await
        .unwrap();

    assert!(user.attrs().is_empty());
    assert_eq!(user.id(), None);
    assert!(!user.is_null());
}

#[test]
fn test_registry_is_complete() {
    let registry = ErrorKind::registry();
    for status in [400, 401, 403, 404, 406, 422, 429, 500, 502, 503, 504] {
        let kind = registry.get(&status).copied().unwrap();
        assert_eq!(kind.http_status_code(), Some(status));
    }
    assert_eq!(registry.len(), 11);
}
