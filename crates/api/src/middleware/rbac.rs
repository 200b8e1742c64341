//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! meet the minimum requirement. Lifecycle actions are not gated here; the
//! permission table decides those.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use salon_core::error::CoreError;
use salon_core::roles::Role;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `owner` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn owner_only(RequireOwner(user): RequireOwner) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireOwner(pub AuthUser);

impl FromRequestParts<AppState> for RequireOwner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Owner {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Owner role required".into(),
            )));
        }
        Ok(RequireOwner(user))
    }
}

/// Requires `provider` or `owner` role. Rejects with 403 Forbidden otherwise.
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_staff() {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Provider or Owner role required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}

/// Requires the `client` role. Rejects with 403 Forbidden otherwise.
pub struct RequireClient(pub AuthUser);

impl FromRequestParts<AppState> for RequireClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Client {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Client role required".into(),
            )));
        }
        Ok(RequireClient(user))
    }
}
