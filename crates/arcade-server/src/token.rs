//! Signed match tokens issued to matchmaking participants.
//!
//! A token is an HS256 JWT carrying the match id and an expiry, signed with
//! the server's session encryption key.

use arcade_core::ids::MatchId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct MatchClaims {
    /// Match id.
    mid: String,
    /// Expiry, seconds since the Unix epoch.
    exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("match token expired")]
    Expired,
    #[error("match token is invalid")]
    Invalid,
}

/// Sign a token for `match_id` valid until `expires_at` (Unix seconds).
pub fn issue_match_token(
    secret: &[u8],
    match_id: &MatchId,
    expires_at: u64,
) -> Result<String, TokenError> {
    let claims = MatchClaims {
        mid: match_id.to_string(),
        exp: expires_at,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| TokenError::Invalid)
}

/// Check a token's signature and expiry and return the match it names.
pub fn verify_match_token(secret: &[u8], token: &str) -> Result<MatchId, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);
    let data = decode::<MatchClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
    if data.claims.mid.is_empty() {
        return Err(TokenError::Invalid);
    }
    Ok(MatchId::from_raw(data.claims.mid))
}
