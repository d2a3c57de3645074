//! Unverified JWT claims decoding.
//!
//! The platform issues standard three-part JWTs. We only ever look at the
//! `exp` claim, and only to decide whether a proactive refresh is needed
//! before dispatch — authorization decisions stay server-side, so the
//! signature is deliberately not verified here.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    /// Expiry, seconds since epoch
    exp: i64,
}

/// Extract the expiry timestamp from a bearer token.
///
/// Returns `None` for anything that is not a decodable JWT with a numeric
/// `exp` claim.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

/// Whether the token should be treated as expired.
///
/// Fail-closed: a token that does not decode is expired.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        Some(exp) => exp <= now,
        None => true,
    }
}

/// Build an unsigned token with the given `exp` claim, for tests.
#[cfg(test)]
pub(crate) fn forge(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.forged-signature")
}
