use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::role::Role;

/// Access token claims shared with the identity service that issues them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Username
    pub sub: String,
    pub role: u8,
    pub exp: usize,
    pub jti: String,
}

/// Signs an HS256 access token. Tokens are normally issued by the identity
/// service; this is used by tooling and tests.
pub fn issue_token(
    user_id: u64,
    username: &str,
    role: Role,
    secret: &str,
    ttl_secs: usize,
) -> Result<String, Error> {
    let claims = Claims {
        user_id,
        sub: username.to_string(),
        role: role as u8,
        exp: Utc::now().timestamp() as usize + ttl_secs,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_the_same_secret_only() {
        let token = issue_token(7, "gate-a", Role::Device, "secret", 60).unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "gate-a");
        assert_eq!(Role::from_id(claims.role), Some(Role::Device));

        assert!(verify_token(&token, "other").is_err());
    }
}
