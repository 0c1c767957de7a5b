//! API routes

pub mod medication;

use axum::{extract::DefaultBodyLimit, Router};
use medication_domain::MedicationServicePort;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dto::medication::{ErrorResponse, MedicationInput, MedicationResponse},
    handlers, AppState,
};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::medication::create_medication_handler,
        handlers::medication::get_medication_handler,
        health_handler
    ),
    components(
        schemas(MedicationInput, MedicationResponse, ErrorResponse)
    ),
    tags(
        (name = "medication", description = "Medication record endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Medication API",
        version = "0.1.0",
        description = "Stores medication records per owner with conditional writes"
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: MedicationServicePort + 'static,
{
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(medication::routes::<S>())
        .route("/health", axum::routing::get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    ),
    tag = "health"
)]
async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, HeaderValue, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use medication_domain::MedicationService;
    use medication_store::{InMemoryTable, MedicationStore};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    type TestService = MedicationService<MedicationStore<InMemoryTable>>;

    fn app() -> Router {
        let store = MedicationStore::with_engine(InMemoryTable::new());
        let state: AppState<TestService> = AppState {
            service: Arc::new(MedicationService::with_repository(store)),
        };
        create_router(state)
    }

    fn put(id: &str, owner: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("PUT")
            .uri(format!("/v1/medication/{}", id))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(owner) = owner {
            builder = builder.header("X-Med-Owner", owner);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(id: &str, owner: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(format!("/v1/medication/{}", id));
        if let Some(owner) = owner {
            builder = builder.header("X-Med-Owner", owner);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const BODY: &str = r#"{"name":"my name","dosage":"dosage 500mg","form":"Tablet"}"#;

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let app = app();

        let response = app.clone().oneshot(put("42", Some("owner"), BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: MedicationResponse = json(response).await;
        assert_eq!(created.id, "42");
        assert_eq!(created.form, "tablet");
        assert!(!created.version.is_empty());

        let response = app.clone().oneshot(get("42", Some("owner"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found: MedicationResponse = json(response).await;
        assert_eq!(found.version, created.version);
        assert_eq!(found.name, "my name");

        let response = app.oneshot(get("42", Some("owner2"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let app = app();

        let response = app.clone().oneshot(put("some%20id", None, BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(put("some%20id", None, BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.error, "already exists");

        // No header means the default owner
        let response = app
            .oneshot(get("some%20id", Some("default-owner")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_input_is_bad_request() {
        let app = app();

        let long_id = "x".repeat(64);
        let response = app.clone().oneshot(put(&long_id, None, BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(put("42", None, r#"{"name":"a","dosage":"b","form":"powder"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.error, "<powder> is not a valid form");

        let response = app
            .clone()
            .oneshot(put("42", None, r#"{"name":"","dosage":"b","form":"liquid"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(put("42", None, "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_id_limit_counts_bytes() {
        let app = app();

        // 32 characters, 64 bytes
        let response = app
            .clone()
            .oneshot(put(&"%C3%A9".repeat(32), None, BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(put(&"x".repeat(63), None, BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_non_ascii_owner_header_is_accepted() {
        let app = app();
        let owner = HeaderValue::from_bytes("žofia".as_bytes()).unwrap();

        let request = Request::builder()
            .method("PUT")
            .uri("/v1/medication/42")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Med-Owner", owner.clone())
            .body(Body::from(BODY))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = Request::builder()
            .uri("/v1/medication/42")
            .header("X-Med-Owner", owner)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Scoped to that owner, not the default one
        let response = app.oneshot(get("42", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let doc: serde_json::Value = json(response).await;
        assert!(doc["paths"]["/v1/medication/{id}"]["put"].is_object());
    }
}
