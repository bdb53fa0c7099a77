use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use crate::core::shared::enums::Role;
use crate::security::jwt::Claims;

/// Principal resolved from the bearer token.
///
/// `id` is a `users.id` for system accounts and a `volunteers.id` for
/// volunteers logging in with their e-mail; `volunteer_id` is set in both
/// cases whenever the principal acts as a volunteer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub volunteer_id: Option<String>,
    #[serde(skip)]
    pub anonymous: bool,
}

impl AuthenticatedUser {
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            name: "anonymous".to_string(),
            role: Role::Volunteer,
            volunteer_id: None,
            anonymous: true,
        }
    }

    pub fn from_claims(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            volunteer_id: claims.volunteer_id,
            anonymous: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.anonymous
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.is_authenticated() && self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn require_role(&self, role: Role) -> Result<(), AuthError> {
        self.require_any_role(&[role])
    }

    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), AuthError> {
        if roles.iter().any(|r| self.has_role(*r)) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }

    /// Volunteer identity for agenda operations, if the caller has one.
    pub fn acting_volunteer_id(&self) -> Option<&str> {
        if self.role != Role::Volunteer {
            return None;
        }
        self.volunteer_id.as_deref()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(user) if user.is_authenticated() => Ok(user.clone()),
            _ => Err(AuthError::MissingToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            id: "u1".into(),
            name: "Teste".into(),
            role,
            volunteer_id: None,
            anonymous: false,
        }
    }

    #[test]
    fn test_role_checks() {
        assert!(user(Role::Admin).require_role(Role::Admin).is_ok());
        assert!(user(Role::Staff).require_role(Role::Admin).is_err());
        assert!(user(Role::Staff)
            .require_any_role(&[Role::Admin, Role::Staff])
            .is_ok());
    }

    #[test]
    fn test_anonymous_has_no_role() {
        let anon = AuthenticatedUser::anonymous();
        assert!(!anon.is_authenticated());
        assert!(anon.require_role(Role::Volunteer).is_err());
    }

    #[test]
    fn test_acting_volunteer_requires_volunteer_role() {
        let mut staff = user(Role::Staff);
        staff.volunteer_id = Some("v1".into());
        assert!(staff.acting_volunteer_id().is_none());

        let mut volunteer = user(Role::Volunteer);
        volunteer.volunteer_id = Some("v1".into());
        assert_eq!(volunteer.acting_volunteer_id(), Some("v1"));
    }
}
