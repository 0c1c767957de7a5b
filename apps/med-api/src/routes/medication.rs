//! Medication routes

use axum::{routing::put, Router};
use medication_domain::MedicationServicePort;

use crate::{
    handlers::medication::{create_medication_handler, get_medication_handler},
    AppState,
};

/// Create medication routes
pub fn routes<S>() -> Router<AppState<S>>
where
    S: MedicationServicePort + 'static,
{
    Router::new().route(
        "/v1/medication/:id",
        put(create_medication_handler::<S>).get(get_medication_handler::<S>),
    )
}
