//! Entity extractor for Axum.
//!
//! Authentication happens upstream. The deployment's proxy forwards the
//! authenticated entity in the `x-entity-id` header.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use lucy_core::EntityId;

/// Header carrying the caller's entity id.
pub const ENTITY_HEADER: &str = "x-entity-id";

/// Extractor requiring an identified entity.
pub struct RequireEntity(pub EntityId);

impl<S> FromRequestParts<S> for RequireEntity
where
    S: Send + Sync,
{
    type Rejection = EntityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ENTITY_HEADER)
            .ok_or(EntityRejection::Missing)?;
        let raw = value.to_str().map_err(|_| EntityRejection::Invalid)?;
        let entity = EntityId::new(raw).map_err(|_| EntityRejection::Invalid)?;
        Ok(RequireEntity(entity))
    }
}

/// Rejection type for [`RequireEntity`].
#[derive(Debug, PartialEq, Eq)]
pub enum EntityRejection {
    Missing,
    Invalid,
}

impl IntoResponse for EntityRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Missing => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Self::Invalid => (StatusCode::UNAUTHORIZED, "Invalid entity id").into_response(),
        }
    }
}
