//! JWT HS256 authentication for `AUTH BEARER <jwt>`.

use crate::error::LeafError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims required on every leaf-link bearer token. Both fields are
/// mandatory: a token missing either fails to deserialize and is rejected.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verify a compact HS256 token against `secret`. Rejects any other signing
/// algorithm, and rejects tokens missing `sub` or `exp`.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims, LeafError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| LeafError::AuthFailed(e.to_string()))?;
    Ok(data.claims)
}

/// Sign a new bearer token for `sub`, expiring in `ttl_secs` seconds from
/// `now_unix`. `now_unix` is supplied by the caller (ambient time is kept
/// out of this crate so the function stays deterministic and testable).
pub fn sign(secret: &[u8], sub: &str, now_unix: u64, ttl_secs: u64) -> Result<String, LeafError> {
    let claims = Claims { sub: sub.to_string(), exp: (now_unix + ttl_secs) as usize };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| LeafError::AuthFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_valid_token() {
        let secret = b"topsecret";
        let token = sign(secret, "leaf-a", 1_000, 60).unwrap();
        let claims = verify(secret, &token).unwrap();
        assert_eq!(claims.sub, "leaf-a");
        assert_eq!(claims.exp, 1_060);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign(b"secret-a", "leaf-a", 1_000, 60).unwrap();
        assert!(verify(b"secret-b", &token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign(b"secret", "leaf-a", 0, 1).unwrap();
        // exp = 1, well in the past relative to validation's own clock.
        assert!(verify(b"secret", &token).is_err());
    }
}
