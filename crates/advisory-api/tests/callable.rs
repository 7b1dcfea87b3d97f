//! Router-level tests for the `sendAdvisory` callable, driven through
//! `tower::ServiceExt::oneshot` against in-memory SQLite and a live dispatcher.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

use advisory_api::router;
use advisory_api::state::AppStateInner;
use advisory_db::Database;
use advisory_gateway::dispatcher::{BroadcastMessage, Dispatcher};
use advisory_types::api::Claims;

const SECRET: &str = "test-secret";

struct TestApp {
    app: axum::Router,
    db: Arc<Database>,
    rx: broadcast::Receiver<BroadcastMessage>,
}

fn test_app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new();
    let rx = dispatcher.receiver();
    let state = AppStateInner::init(db.clone(), dispatcher, SECRET.into());
    TestApp {
        app: router(state),
        db,
        rx,
    }
}

fn call(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/sendAdvisory")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn token(secret: &str) -> String {
    let claims = Claims {
        sub: Uuid::new_v4(),
        username: "extension-officer".into(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn stored_messages(db: &Database) -> Vec<String> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT message FROM advisories ORDER BY created_at")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
    .unwrap()
}

#[tokio::test]
async fn trimmed_advisory_is_stored_and_broadcast() {
    let TestApp { app, db, mut rx } = test_app();

    let resp = app
        .oneshot(call(r#"{"data":{"message":"  Flood warning tonight  "}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, serde_json::json!({ "result": { "success": true } }));

    assert_eq!(stored_messages(&db), vec!["Flood warning tonight"]);

    let msg = rx.try_recv().expect("notification should be published");
    assert_eq!(msg.topic.as_deref(), Some("advisories"));
    let event: serde_json::Value = serde_json::from_str(&msg.json).unwrap();
    assert_eq!(event["data"]["notification"]["title"], "Farming Advisory");
    assert_eq!(event["data"]["notification"]["body"], "Flood warning tonight");
    assert_eq!(event["data"]["data"], serde_json::json!({ "type": "advisory" }));
    assert!(rx.try_recv().is_err(), "exactly one broadcast");
}

#[tokio::test]
async fn empty_messages_fail_without_side_effects() {
    for body in [
        r#"{"data":{"message":""}}"#,
        r#"{"data":{}}"#,
        r#"{"data":{"message":"   "}}"#,
        r#"{"data":{"message":null}}"#,
        r#"{"data":{"message":false}}"#,
        r#"{"data":{"message":0}}"#,
        r#"{"data":{"message":"\ufeff"}}"#,
    ] {
        let TestApp { app, db, mut rx } = test_app();

        let resp = app.oneshot(call(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({ "error": { "status": "INVALID_ARGUMENT", "message": "Message is empty." } }),
            "body {}",
            body
        );

        assert_eq!(db.count_advisories().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn malformed_envelope_is_bad_request() {
    for body in [r#"{}"#, r#"not json"#, r#"{"data":{"message":42}}"#] {
        let TestApp { app, db, .. } = test_app();

        let resp = app.oneshot(call(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let json = json_body(resp).await;
        assert_eq!(json["error"]["status"], "INVALID_ARGUMENT");
        assert_eq!(json["error"]["message"], "Bad Request");
        assert_eq!(db.count_advisories().unwrap(), 0);
    }
}

#[tokio::test]
async fn missing_content_type_is_bad_request() {
    let TestApp { app, .. } = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/sendAdvisory")
        .body(Body::from(r#"{"data":{"message":"hi"}}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn valid_bearer_token_is_accepted() {
    let TestApp { app, db, .. } = test_app();

    let mut req = call(r#"{"data":{"message":"Locust sighting near east field"}}"#);
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token(SECRET)).parse().unwrap(),
    );

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(db.count_advisories().unwrap(), 1);
}

#[tokio::test]
async fn bad_bearer_token_is_unauthenticated() {
    for value in [format!("Bearer {}", token("wrong-secret")), "Basic abc".to_string()] {
        let TestApp { app, db, mut rx } = test_app();

        let mut req = call(r#"{"data":{"message":"Hail expected"}}"#);
        req.headers_mut()
            .insert(header::AUTHORIZATION, value.parse().unwrap());

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"]["status"], "UNAUTHENTICATED");
        assert_eq!(db.count_advisories().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn identical_calls_create_two_records() {
    let TestApp { app, db, mut rx } = test_app();

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(call(r#"{"data":{"message":"Irrigate before noon"}}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(stored_messages(&db), vec!["Irrigate before noon", "Irrigate before noon"]);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn health_reports_ok() {
    let TestApp { app, .. } = test_app();

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}
