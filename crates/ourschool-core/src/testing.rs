//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};

use crate::auth::{User, UserRole};
use crate::clock::Clock;
use crate::session::TokenRenewer;

pub(crate) fn encode_segment(raw: &str) -> String {
    URL_SAFE_NO_PAD.encode(raw)
}

pub(crate) fn token_with_payload(payload: &str) -> String {
    format!(
        "{}.{}.{}",
        encode_segment(r#"{"alg":"HS256","typ":"JWT"}"#),
        encode_segment(payload),
        encode_segment("not-a-real-signature")
    )
}

pub(crate) fn token_expiring_at(expiry: DateTime<Utc>) -> String {
    token_with_payload(&format!(r#"{{"sub":"alice","exp":{}}}"#, expiry.timestamp()))
}

/// Token expiring `lifetime` after the clock's now, distinguished by `jti`.
pub(crate) fn issue_token(clock: &dyn Clock, lifetime: Duration, jti: usize) -> String {
    let expiry = clock.now() + lifetime;
    token_with_payload(&format!(
        r#"{{"sub":"alice","exp":{},"jti":{}}}"#,
        expiry.timestamp(),
        jti
    ))
}

pub(crate) fn sample_user() -> User {
    User {
        id: 1,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Nguyen".to_string(),
        role: UserRole::Admin,
        is_active: true,
        parent_id: None,
        grade_level: None,
    }
}

/// Renewer that issues fresh tokens, optionally after a delay.
pub(crate) struct IssuingRenewer {
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    delay: std::time::Duration,
    calls: AtomicUsize,
}

impl IssuingRenewer {
    pub(crate) fn new(clock: Arc<dyn Clock>, lifetime: Duration) -> Self {
        Self {
            clock,
            lifetime,
            delay: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRenewer for IssuingRenewer {
    async fn renew(&self, _token: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(issue_token(self.clock.as_ref(), self.lifetime, call))
    }
}

/// Renewer whose backend always rejects the credential.
#[derive(Default)]
pub(crate) struct FailingRenewer {
    calls: AtomicUsize,
}

impl FailingRenewer {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRenewer for FailingRenewer {
    async fn renew(&self, _token: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("Unauthorized - token may be expired"))
    }
}
