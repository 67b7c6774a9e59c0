use super::schema::{Validate, ValidationError};
use crate::api::error::AppError;
use crate::api::request_id_header;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

fn extract_request_id(headers: &HeaderMap) -> &str {
    headers
        .get(request_id_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Path parameters deserialized into `T` and passed through `Validate`.
pub struct ValidatedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    T: Validate<Err = ValidationError>
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    S: Send + Sync + 'static,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send
    {
        async move {
            let rid = extract_request_id(&parts.headers).to_string();
            let Path(val) = Path::<T>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    tracing::debug!(target = "extractor", extractor = "ValidatedPath", error = %e, request_id = %rid, "path deserialize failed");
                    AppError::Validation("invalid path params".into())
                        .into_response()
                })?;
            match val.validate() {
                Ok(v) => Ok(ValidatedPath(v)),
                Err(e) => {
                    tracing::debug!(target = "extractor", extractor = "ValidatedPath", error = %e.0, request_id = %rid, "path validation failed");
                    Err(AppError::InvalidIntegrator(e.0).into_response())
                }
            }
        }
    }
}
