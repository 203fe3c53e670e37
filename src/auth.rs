//! Caller identity and declarative scope guards.
//!
//! Authentication itself (passwords, cookies, sessions) is the fronting auth
//! provider's job. By the time a request reaches this service, the provider
//! has asserted the caller's identity via trusted headers:
//! - `x-user-role`     – `admin` or `user` (required)
//! - `x-user-building` – building scope for non-admin callers (optional)
//! - `x-user-unit`     – unit scope for non-admin callers (optional)
//!
//! [`Caller`] is an axum extractor over those headers. Handlers express their
//! requirement declaratively with [`Caller::require_admin`],
//! [`Caller::authorize_unit`], or [`Caller::authorize_building`] instead of
//! comparing role strings inline, so the rules cannot drift between routes.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, models::Role};

// ---

/// Authenticated caller identity, as asserted by the auth provider.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub role: Role,
    pub building_id: Option<i64>,
    pub unit_id: Option<i64>,
}

impl Caller {
    /// Reject unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        // ---
        match self.role {
            Role::Admin => Ok(()),
            Role::User => Err(AppError::authorization("admin role required")),
        }
    }

    /// Reject unless the caller may access the given unit.
    ///
    /// Admins are unrestricted; a `user` caller is confined to its own unit.
    pub fn authorize_unit(&self, unit_id: i64) -> Result<(), AppError> {
        // ---
        match self.role {
            Role::Admin => Ok(()),
            Role::User if self.unit_id == Some(unit_id) => Ok(()),
            Role::User => Err(AppError::authorization("unit outside caller scope")),
        }
    }

    /// Reject unless the caller may access the given building.
    pub fn authorize_building(&self, building_id: i64) -> Result<(), AppError> {
        // ---
        match self.role {
            Role::Admin => Ok(()),
            Role::User if self.building_id == Some(building_id) => Ok(()),
            Role::User => Err(AppError::authorization("building outside caller scope")),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---

fn header_i64(parts: &Parts, name: &str) -> Result<Option<i64>, AppError> {
    // ---
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| AppError::authorization(format!("malformed {name} header")))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authorization("missing caller identity"))?;

        let role = match role {
            "admin" => Role::Admin,
            "user" => Role::User,
            other => {
                return Err(AppError::authorization(format!("unknown role: {other}")));
            }
        };

        Ok(Caller {
            role,
            building_id: header_i64(parts, "x-user-building")?,
            unit_id: header_i64(parts, "x-user-unit")?,
        })
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn admin() -> Caller {
        // ---
        Caller {
            role: Role::Admin,
            building_id: None,
            unit_id: None,
        }
    }

    fn occupant(building_id: i64, unit_id: i64) -> Caller {
        // ---
        Caller {
            role: Role::User,
            building_id: Some(building_id),
            unit_id: Some(unit_id),
        }
    }

    #[test]
    fn admin_is_unrestricted() {
        // ---
        let caller = admin();
        assert!(caller.require_admin().is_ok());
        assert!(caller.authorize_unit(7).is_ok());
        assert!(caller.authorize_building(3).is_ok());
    }

    #[test]
    fn user_is_confined_to_own_scope() {
        // ---
        let caller = occupant(3, 7);
        assert!(caller.require_admin().is_err());

        assert!(caller.authorize_unit(7).is_ok());
        assert!(caller.authorize_unit(8).is_err());

        assert!(caller.authorize_building(3).is_ok());
        assert!(caller.authorize_building(4).is_err());
    }

    #[test]
    fn unscoped_user_has_no_access() {
        // ---
        let caller = Caller {
            role: Role::User,
            building_id: None,
            unit_id: None,
        };
        assert!(caller.authorize_unit(1).is_err());
        assert!(caller.authorize_building(1).is_err());
    }
}
