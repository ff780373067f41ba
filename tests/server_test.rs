//! Router tests: requests go through the full axum stack via `oneshot`.

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rand::Rng;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use multidata_classifier::schema::Instance;
use multidata_classifier::server::{Endpoint, ErrorBody, HealthResponse, router};
use multidata_classifier::{
    Classification, Classifier, ClassifierError, ClassifierSchemas, Gateway, StubPredictor,
};

fn model_router() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let (gender, relationship) = common::write_models(dir.path());
    let schemas = ClassifierSchemas::bundled().unwrap();
    let gateway = Gateway::load(schemas, &gender, &relationship).unwrap();
    (router(Arc::new(gateway), Endpoint::Features), dir)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn values(fill: &str) -> Value {
    json!(vec![fill; common::feature_count()])
}

#[tokio::test]
async fn classifies_a_full_vector() {
    let (app, _dir) = model_router();

    let (status, body) = send(&app, post("/classification", values("10.3").to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        json!({ "gender": "female", "relationship": "in a relationship" })
    );

    let (status, body) = send(&app, post("/classification", values("0.4").to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let result: Classification = serde_json::from_slice(&body).unwrap();
    assert_eq!(result, Classification::new(None, "male", "single"));
}

#[tokio::test]
async fn placeholders_are_accepted_and_id_is_echoed() {
    let (app, _dir) = model_router();

    let mut features = vec!["10.1".to_string(); common::feature_count()];
    features[0] = String::new();
    features[3] = "?".to_string();
    let body = serde_json::to_string(&features).unwrap();

    let (status, body) = send(&app, post("/classification?id=user-1", body)).await;
    assert_eq!(status, StatusCode::OK);
    let result: Classification = serde_json::from_slice(&body).unwrap();
    assert_eq!(result.id.as_deref(), Some("user-1"));
    assert_eq!(result.gender, "female");
}

#[tokio::test]
async fn all_unknown_values_yield_empty_labels() {
    let (app, _dir) = model_router();

    let (status, body) = send(&app, post("/classification", values("?").to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let result: Classification = serde_json::from_slice(&body).unwrap();
    assert_eq!(result, Classification::new(None, "", ""));
}

#[tokio::test]
async fn wrong_length_is_a_bad_request() {
    let (app, _dir) = model_router();

    for body in [json!(["1.0", "2.5"]), json!([]), json!(vec!["1"; common::feature_count() + 1])] {
        let (status, body) = send(&app, post("/classification", body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "BAD_REQUEST");
        assert!(error.message.unwrap().contains("expected"));
    }
}

#[tokio::test]
async fn non_numeric_value_is_a_bad_request() {
    let (app, _dir) = model_router();

    let mut features = vec!["1.0".to_string(); common::feature_count()];
    features[2] = "abc".to_string();
    let body = serde_json::to_string(&features).unwrap();

    let (status, body) = send(&app, post("/classification", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(error.message.unwrap().contains("abc"));
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (app, _dir) = model_router();

    for body in ["not json", "{\"values\": []}", "[1, 2, 3]", "[null]"] {
        let (status, _) = send(&app, post("/classification", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
    }
}

#[tokio::test]
async fn stub_route_is_not_mounted_with_models() {
    let (app, _dir) = model_router();
    let (status, _) = send(&app, get("/classification?id=1")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn stub_answers_with_the_default_result() {
    let app = router(Arc::new(StubPredictor), Endpoint::Stub);

    let (status, body) = send(&app, get("/classification?id=abc")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        json!({ "id": "abc", "gender": "female", "relationship": "single" })
    );

    let (status, body) = send(&app, get("/classification")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({ "gender": "female", "relationship": "single" }));
    assert!(json.get("id").is_none());

    let (status, _) = send(&app, post("/classification", "[]")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn health_reports_mode_and_width() {
    let (app, _dir) = model_router();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.mode, "models");
    assert_eq!(health.features, Some(common::feature_count()));

    let stub = router(Arc::new(StubPredictor), Endpoint::Stub);
    let (_, body) = send(&stub, get("/health")).await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.mode, "stub");
    assert_eq!(health.features, None);
}

struct Broken;

impl Classifier for Broken {
    fn classify(&self, _instance: &Instance<'_>) -> Result<Option<usize>, ClassifierError> {
        Err(ClassifierError::Prediction("model exploded".to_string()))
    }
}

#[tokio::test]
async fn classifier_failure_is_an_opaque_server_error() {
    let schemas = ClassifierSchemas::bundled().unwrap();
    let gender = common::fit(&schemas.gender);
    let gateway = Gateway::new(schemas, Box::new(gender), Box::new(Broken));
    let app = router(Arc::new(gateway), Endpoint::Features);

    let (status, body) = send(&app, post("/classification", values("1").to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code, "INTERNAL_ERROR");
    assert_eq!(error.message, None);
}

#[tokio::test]
async fn concurrent_requests_agree() {
    let (app, _dir) = model_router();

    let mut rng = rand::rng();
    let requests: Vec<String> = (0..8)
        .map(|_| {
            let features: Vec<String> = (0..common::feature_count())
                .map(|_| format!("{:.3}", rng.random_range(0.0..12.0)))
                .collect();
            serde_json::to_string(&features).unwrap()
        })
        .collect();

    let mut expected = Vec::new();
    for body in &requests {
        let (status, body) = send(&app, post("/classification", body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        expected.push(body);
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        for (i, body) in requests.iter().enumerate() {
            let app = app.clone();
            let body = body.clone();
            handles.push(tokio::spawn(async move {
                (i, send(&app, post("/classification", body)).await)
            }));
        }
    }
    for handle in handles {
        let (i, (status, body)) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected[i]);
    }
}

#[tokio::test]
async fn huge_values_give_the_same_answer_every_time() {
    let (app, _dir) = model_router();

    let body = values("1e308").to_string();
    let (status, first) = send(&app, post("/classification", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let result: Classification = serde_json::from_slice(&first).unwrap();
    assert_eq!(result, Classification::new(None, "", ""));

    for _ in 0..100 {
        let (_, again) = send(&app, post("/classification", body.clone())).await;
        assert_eq!(again, first);
    }
}
