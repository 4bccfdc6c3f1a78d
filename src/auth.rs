//! Authenticated-user collaborator, consumed read-only to derive admin rights.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Header carrying the user identifier, set by the upstream authentication gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's role, set by the upstream authentication gateway.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Free-form metadata attached to an authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Role compared against the configured admin role.
    pub role: Option<String>,
}

/// User currently authenticated with the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Identifier assigned by the authentication gateway.
    pub id: Option<String>,
    /// Metadata carrying the user's role.
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    /// User carrying only a role, mostly handy for tests and static sessions.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            id: None,
            user_metadata: UserMetadata {
                role: Some(role.into()),
            },
        }
    }
}

/// Source of the current authenticated user, read fresh on every call.
pub trait AuthContext: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;
}

impl AuthContext for AuthUser {
    fn current_user(&self) -> Option<AuthUser> {
        Some(self.clone())
    }
}

impl AuthContext for Option<AuthUser> {
    fn current_user(&self) -> Option<AuthUser> {
        self.clone()
    }
}

/// Whether the user exposed by `auth` carries `admin_role`.
pub fn is_admin(auth: &dyn AuthContext, admin_role: &str) -> bool {
    auth.current_user()
        .and_then(|user| user.user_metadata.role)
        .is_some_and(|role| role == admin_role)
}

/// Per-request user extracted from the gateway headers; anonymous when they are absent.
#[derive(Debug, Clone, Default)]
pub struct RequestUser(pub Option<AuthUser>);

impl AuthContext for RequestUser {
    fn current_user(&self) -> Option<AuthUser> {
        self.0.clone()
    }
}

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let id = header(USER_ID_HEADER);
        let role = header(USER_ROLE_HEADER);
        if id.is_none() && role.is_none() {
            return Ok(Self(None));
        }

        Ok(Self(Some(AuthUser {
            id,
            user_metadata: UserMetadata { role },
        })))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[test]
    fn admin_requires_matching_role() {
        assert!(is_admin(&AuthUser::with_role("admin"), "admin"));
        assert!(!is_admin(&AuthUser::with_role("player"), "admin"));
        assert!(!is_admin(&AuthUser::default(), "admin"));
        assert!(!is_admin(&None::<AuthUser>, "admin"));
    }

    #[tokio::test]
    async fn request_user_reads_gateway_headers() {
        let (mut parts, ()) = Request::builder()
            .header(USER_ID_HEADER, "u-1")
            .header(USER_ROLE_HEADER, "admin")
            .body(())
            .unwrap()
            .into_parts();

        let RequestUser(user) = RequestUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        let user = user.unwrap();
        assert_eq!(user.id.as_deref(), Some("u-1"));
        assert_eq!(user.user_metadata.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn missing_headers_mean_anonymous() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        let user = RequestUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.current_user().is_none());
    }
}
