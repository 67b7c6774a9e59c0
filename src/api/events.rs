use crate::api::{
    AppState,
    error::AppError,
    request::ValidatedPath,
    response::ok,
    schema::IntegratorPath,
};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};

/// `GET /events/{integrator}`: every stored fee event for one integrator,
/// oldest block first. No match is an empty list, not an error.
pub async fn events_by_integrator(
    State(state): State<AppState>,
    ValidatedPath(path): ValidatedPath<IntegratorPath>,
) -> Response {
    tracing::info!(integrator = %path.integrator, "Getting events for integrator");
    match state.store.find_by_integrator(&path.integrator).await {
        Ok(events) => {
            tracing::debug!(count = events.len(), "Integrator query result");
            ok(events)
        }
        Err(e) => {
            tracing::error!(error = %e, integrator = %path.integrator, "Integrator query failed");
            AppError::from(e).into_response()
        }
    }
}
