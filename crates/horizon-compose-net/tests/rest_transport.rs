//! RestTransport against a local mock server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use horizon_compose_core::{BuildSession, ContainerSpec, RequestParams, Transport, TransportError};
use horizon_compose_net::{NetworkError, RestTransport};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_sends_query_pairs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("page", "2"))
        .and(query_param("order[]", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}]})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = RestTransport::builder(server.uri()).build().unwrap();
    let mut params = RequestParams::new();
    params.push("page", "2");
    params.push("order[]", "name.asc");

    let body = transport.get("/orders".into(), params).await.unwrap();
    assert_eq!(body, json!({"data": [{"id": 1}]}));
}

#[tokio::test]
async fn test_writes_send_json_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(body_json(json!({"name": "Ada"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/customers/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/customers/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let transport = RestTransport::builder(server.uri()).json_api().build().unwrap();
    let created = transport
        .post("/customers".into(), json!({"name": "Ada"}))
        .await
        .unwrap();
    assert_eq!(created["id"], 7);

    let updated = transport
        .put("/customers/7".into(), json!({"name": "Ada L."}))
        .await
        .unwrap();
    assert_eq!(updated["id"], 7);

    let deleted = transport.delete("/customers/7".into()).await.unwrap();
    assert!(deleted.is_null());
}

#[tokio::test]
async fn test_error_status_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Invalid name"})),
        )
        .mount(&server)
        .await;

    let transport = RestTransport::builder(server.uri()).build().unwrap();
    let err = transport
        .post("/customers".into(), json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::HttpStatus {
            status: 422,
            message: Some("Invalid name".into()),
        }
    );
}

#[tokio::test]
async fn test_invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let transport = RestTransport::builder(server.uri()).build().unwrap();
    let err = transport
        .get("/broken".into(), RequestParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn test_auth_and_default_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer token123"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keyed"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let bearer = RestTransport::builder(server.uri())
        .bearer_auth("token123")
        .json_api()
        .build()
        .unwrap();
    bearer.get("/me".into(), RequestParams::new()).await.unwrap();

    let keyed = RestTransport::builder(server.uri())
        .api_key("X-API-Key", "secret")
        .build()
        .unwrap();
    keyed.get("/keyed".into(), RequestParams::new()).await.unwrap();
}

#[tokio::test]
async fn test_interceptors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let seen = Arc::new(AtomicU32::new(0));
    let counter = seen.clone();
    let transport = RestTransport::builder(server.uri())
        .add_request_interceptor(|request| {
            request
                .headers
                .insert("x-tenant", http::HeaderValue::from_static("acme"));
        })
        .add_response_interceptor(move |status, _body| {
            counter.fetch_add(1, Ordering::SeqCst);
            if status == 200 {
                Ok(())
            } else {
                Err(NetworkError::Rejected(status.to_string()))
            }
        })
        .build()
        .unwrap();

    transport.get("/orders".into(), RequestParams::new()).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    let rejecting = RestTransport::builder(server.uri())
        .add_request_interceptor(|request| {
            request
                .headers
                .insert("x-tenant", http::HeaderValue::from_static("acme"));
        })
        .add_response_interceptor(|_, body| {
            if body["data"].as_array().is_some_and(Vec::is_empty) {
                Err(NetworkError::Rejected("empty".into()))
            } else {
                Ok(())
            }
        })
        .build()
        .unwrap();
    let err = rejecting
        .get("/orders".into(), RequestParams::new())
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Request("Response rejected: empty".into()));
}

#[tokio::test]
async fn test_datasource_fetches_through_rest_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1}, {"id": 2}],
            "pagination": {"total": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = RestTransport::builder(server.uri()).json_api().build().unwrap();
    let session = BuildSession::builder().transport(Arc::new(transport)).build();
    let spec = ContainerSpec::from_value(json!({
        "name": "orders",
        "widgets": [{"name": "grid", "datasource": {"route": "/orders", "lazyLoad": false, "limit": 5}}]
    }))
    .unwrap();

    let container = session.open_container(&spec).await.unwrap();
    let grid = container.datasource("grid").unwrap();
    assert_eq!(grid.data().len(), 2);
    assert_eq!(grid.last_page(), 3);
}
