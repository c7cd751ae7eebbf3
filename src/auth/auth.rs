use actix_web::error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ErrorInternalServerError("Config missing"))),
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        }))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/Admin only"))
        }
    }

    /// Manual check-in/out
    pub fn require_site_operator(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Hr | Role::SiteSupervisor) {
            Ok(())
        } else {
            Err(ErrorForbidden("Site supervisor/HR/Admin only"))
        }
    }

    /// Fingerprint scans, posted by terminals or on their behalf
    pub fn require_scanner(&self) -> actix_web::Result<()> {
        if matches!(
            self.role,
            Role::Admin | Role::Hr | Role::SiteSupervisor | Role::Device
        ) {
            Ok(())
        } else {
            Err(ErrorForbidden("Device or site staff only"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
        }
    }

    #[test]
    fn role_gates() {
        assert!(user(Role::Device).require_scanner().is_ok());
        assert!(user(Role::Device).require_site_operator().is_err());
        assert!(user(Role::SiteSupervisor).require_site_operator().is_ok());
        assert!(user(Role::SiteSupervisor).require_hr_or_admin().is_err());
        assert!(user(Role::Hr).require_hr_or_admin().is_ok());
        assert!(user(Role::Hr).require_admin().is_err());
        assert!(user(Role::Worker).require_scanner().is_err());
        assert!(user(Role::Admin).require_admin().is_ok());
    }
}
