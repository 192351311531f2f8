//! Bearer token validation.
//!
//! Tokens are JWTs issued by the OurSchool backend: three dot-separated
//! base64url segments whose payload carries an `exp` claim in seconds since
//! the Unix epoch. The signature is never checked here; the backend remains
//! the authority; these checks only decide whether a token is worth keeping.
//!
//! Every function is pure and never logs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// Number of dot-separated segments in a well-formed token.
const SEGMENT_COUNT: usize = 3;

/// Claims read from a token payload.
///
/// Each claim is read on its own; a claim of an unexpected type reads as
/// absent without affecting the others.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Subject (the username for OurSchool tokens)
    pub sub: Option<String>,
    /// Expiration as fractional seconds since the Unix epoch
    pub exp: Option<f64>,
}

impl Claims {
    fn from_payload(payload: &Map<String, Value>) -> Self {
        Self {
            sub: payload.get("sub").and_then(Value::as_str).map(str::to_string),
            exp: payload.get("exp").and_then(Value::as_f64),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.exp.filter(|exp| exp.is_finite())?;
        DateTime::from_timestamp_millis((exp * 1000.0) as i64)
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(segment).ok()
}

fn decode_json_object(segment: &str) -> Option<Map<String, Value>> {
    let bytes = decode_segment(segment)?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn split(token: &str) -> Option<[&str; SEGMENT_COUNT]> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some([header, payload, signature])
}

/// Check that a token has the expected segment and encoding shape.
pub fn is_structurally_valid(token: &str) -> bool {
    let Some([header, payload, signature]) = split(token) else {
        return false;
    };
    decode_json_object(header).is_some()
        && decode_json_object(payload).is_some()
        && decode_segment(signature).is_some()
}

/// Decode the payload claims of a structurally valid token.
pub fn decode_claims(token: &str) -> Option<Claims> {
    if !is_structurally_valid(token) {
        return None;
    }
    let [_, payload, _] = split(token)?;
    decode_json_object(payload).map(|payload| Claims::from_payload(&payload))
}

/// The embedded expiration instant, if the token carries a readable one.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode_claims(token)?.expires_at()
}

/// Whether the token has expired at `now`.
///
/// Fails open: a token whose expiration cannot be decoded counts as expired.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        Some(expiry) => now >= expiry,
        None => true,
    }
}

/// Time left before the token expires, zero for invalid or expired tokens.
pub fn time_remaining(token: &str, now: DateTime<Utc>) -> Duration {
    match expires_at(token) {
        Some(expiry) if expiry > now => expiry - now,
        _ => Duration::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    use crate::testing::{encode_segment, token_with_payload, token_expiring_at};

    #[test]
    fn test_structurally_valid_token() {
        let token = token_expiring_at(Utc::now() + Duration::minutes(30));
        assert!(is_structurally_valid(&token));
    }

    #[test]
    fn test_structurally_invalid_tokens() {
        let header = encode_segment(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = encode_segment(r#"{"sub":"alice","exp":1}"#);
        let signature = encode_segment("sig");

        assert!(!is_structurally_valid("")); // empty
        assert!(!is_structurally_valid("not-a-token")); // one segment
        assert!(!is_structurally_valid(&format!("{}.{}", header, payload))); // two segments
        assert!(!is_structurally_valid(&format!("{}.{}.{}.x", header, payload, signature))); // four
        assert!(!is_structurally_valid(&format!("{}..{}", header, signature))); // empty payload
        assert!(!is_structurally_valid(&format!("{}.{}.", header, payload))); // empty signature
        assert!(!is_structurally_valid(&format!("{}.{}.{}", header, "!!!", signature))); // bad charset
        assert!(!is_structurally_valid(&format!("{}.{}.{}\n", header, payload, signature))); // trailing newline

        // Payload decodes but is not a JSON object
        let array = encode_segment("[1,2,3]");
        assert!(!is_structurally_valid(&format!("{}.{}.{}", header, array, signature)));

        // Padded base64 is not the JWT encoding
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"sub":"a"}"#);
        assert!(padded.ends_with('='));
        assert!(!is_structurally_valid(&format!("{}.{}.{}", header, padded, signature)));
    }

    #[test]
    fn test_decode_claims() {
        let token = token_with_payload(r#"{"sub":"alice","exp":1700000000}"#);
        let claims = decode_claims(&token).expect("claims");
        assert_eq!(claims.sub.as_deref(), Some("alice"));
        assert_eq!(
            claims.expires_at(),
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn test_expiry_ignores_other_claim_types() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");
        let exp = (now + Duration::minutes(30)).timestamp();
        let numeric_sub = token_with_payload(&format!(r#"{{"sub":42,"exp":{}}}"#, exp));
        let object_sub = token_with_payload(&format!(r#"{{"sub":{{"id":1}},"exp":{}}}"#, exp));

        for token in [numeric_sub, object_sub] {
            assert!(is_structurally_valid(&token));
            assert!(!is_expired(&token, now));
            assert_eq!(time_remaining(&token, now), Duration::minutes(30));
            assert_eq!(decode_claims(&token).expect("claims").sub, None);
        }
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        assert!(!is_expired(&token_expiring_at(now + Duration::minutes(5)), now));
        assert!(is_expired(&token_expiring_at(now - Duration::minutes(5)), now));
    }

    #[test]
    fn test_is_expired_fails_open() {
        let now = Utc::now();
        assert!(is_expired("garbage", now));
        assert!(is_expired(&token_with_payload(r#"{"sub":"alice"}"#), now)); // no exp
        assert!(is_expired(&token_with_payload(r#"{"exp":"soon"}"#), now)); // wrong type
    }

    #[test]
    fn test_time_remaining() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");
        let token = token_expiring_at(now + Duration::minutes(20));
        assert_eq!(time_remaining(&token, now), Duration::minutes(20));

        let expired = token_expiring_at(now - Duration::seconds(1));
        assert_eq!(time_remaining(&expired, now), Duration::zero());
        assert_eq!(time_remaining("garbage", now), Duration::zero());
    }

    #[test]
    fn test_expired_iff_no_time_remaining() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");
        let offsets = [-3600, -1, 0, 1, 59, 900, 86_400];
        let mut tokens: Vec<String> = offsets
            .iter()
            .map(|secs| token_expiring_at(now + Duration::seconds(*secs)))
            .collect();
        tokens.push("garbage".to_string());
        tokens.push(token_with_payload(r#"{"sub":"alice"}"#));

        for token in &tokens {
            assert_eq!(
                !is_expired(token, now),
                time_remaining(token, now) > Duration::zero(),
                "token {}",
                token
            );
        }
    }
}
