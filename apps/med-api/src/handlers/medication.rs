//! Medication handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use medication_domain::{Identity, MedicationError, MedicationServicePort};
use tracing::{error, info, warn};

use crate::{
    dto::medication::{ErrorResponse, MedicationInput, MedicationResponse},
    AppState,
};

/// Header carrying the owner until real authentication exists
pub const OWNER_HEADER: &str = "x-med-owner";

/// Owner used when the request carries no owner header
pub const DEFAULT_OWNER: &str = "default-owner";

/// Longest accepted id, in bytes of UTF-8
const MAX_ID_BYTES: usize = 63;

/// Handle medication creation
#[utoipa::path(
    put,
    path = "/v1/medication/{id}",
    params(
        ("id" = String, Path, description = "Medication id, 1 to 63 bytes"),
        ("X-Med-Owner" = Option<String>, Header, description = "Owner of the record, defaults to default-owner")
    ),
    request_body = MedicationInput,
    responses(
        (status = 201, description = "Medication created", body = MedicationResponse),
        (status = 400, description = "Bad request - invalid id or body", body = ErrorResponse),
        (status = 409, description = "Conflict - medication already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "medication"
)]
pub async fn create_medication_handler<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<MedicationInput>, JsonRejection>,
) -> Response
where
    S: MedicationServicePort + 'static,
{
    let identity = match resolve_identity(&headers, id) {
        Ok(identity) => identity,
        Err(message) => return bad_request(message),
    };

    let data = match payload {
        Ok(Json(input)) => input.into_data(),
        Err(rejection) => Err(rejection.body_text()),
    };
    let data = match data {
        Ok(data) => data,
        Err(message) => return bad_request(message),
    };

    info!(owner = %identity.owner, id = %identity.id, "Received create medication request");

    match state.service.create_medication(&identity, data).await {
        Ok(medication) => {
            info!(
                owner = %identity.owner,
                id = %identity.id,
                version = %medication.version,
                "Medication created"
            );
            (
                StatusCode::CREATED,
                Json(MedicationResponse::from(medication)),
            )
                .into_response()
        }
        Err(err) => error_response(&identity, err),
    }
}

/// Handle medication lookup
#[utoipa::path(
    get,
    path = "/v1/medication/{id}",
    params(
        ("id" = String, Path, description = "Medication id, 1 to 63 bytes"),
        ("X-Med-Owner" = Option<String>, Header, description = "Owner of the record, defaults to default-owner")
    ),
    responses(
        (status = 200, description = "Medication found", body = MedicationResponse),
        (status = 400, description = "Bad request - invalid id", body = ErrorResponse),
        (status = 404, description = "Medication not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "medication"
)]
pub async fn get_medication_handler<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: MedicationServicePort + 'static,
{
    let identity = match resolve_identity(&headers, id) {
        Ok(identity) => identity,
        Err(message) => return bad_request(message),
    };

    match state.service.get_medication(&identity).await {
        Ok(medication) => (StatusCode::OK, Json(MedicationResponse::from(medication))).into_response(),
        Err(err) => error_response(&identity, err),
    }
}

/// Build the identity from the owner header and the path id
fn resolve_identity(headers: &HeaderMap, id: String) -> Result<Identity, String> {
    if id.is_empty() {
        return Err("id must not be empty".to_string());
    }
    if id.len() > MAX_ID_BYTES {
        return Err(format!("id must be at most {} bytes", MAX_ID_BYTES));
    }

    // Any header value is accepted; invalid UTF-8 is replaced rather than rejected
    let owner = headers
        .get(OWNER_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .filter(|owner| !owner.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER.to_string());

    Ok(Identity::new(owner, id))
}

fn bad_request(message: String) -> Response {
    warn!(error = %message, "Rejected request");
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

fn error_response(identity: &Identity, err: MedicationError) -> Response {
    let (status, message) = match &err {
        MedicationError::BadInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        MedicationError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
        MedicationError::AlreadyExists => (StatusCode::CONFLICT, "already exists".to_string()),
        MedicationError::VersionConflict => {
            (StatusCode::CONFLICT, "modified concurrently".to_string())
        }
        MedicationError::MissingOwner | MedicationError::Internal { .. } => {
            error!(
                owner = %identity.owner,
                id = %identity.id,
                error = ?err,
                "Medication request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "something went wrong".to_string(),
            )
        }
    };

    (status, Json(ErrorResponse { error: message })).into_response()
}
