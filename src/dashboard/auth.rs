//! Owner context supplied by the auth layer in front of the API

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::handlers::HandlerError;
use crate::error::PlannerError;

/// Header carrying the authenticated owner id
pub const OWNER_HEADER: &str = "x-owner-id";

/// The authenticated owner of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerContext(pub String);

impl OwnerContext {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject an explicit `?owner=` naming someone else
    pub fn check_query(&self, requested: Option<&str>) -> Result<(), PlannerError> {
        match requested {
            Some(owner) if owner != self.0 => Err(PlannerError::Unauthorized),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OwnerContext {
    type Rejection = HandlerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(PlannerError::Unauthorized)?;

        Ok(OwnerContext(owner.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_owner_must_match() {
        let owner = OwnerContext("alice".to_string());
        assert!(owner.check_query(None).is_ok());
        assert!(owner.check_query(Some("alice")).is_ok());
        assert!(matches!(
            owner.check_query(Some("bob")),
            Err(PlannerError::Unauthorized)
        ));
    }
}
