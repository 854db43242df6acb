//! Signed bearer tokens
//!
//! A token is `base64url(claims JSON) "." base64url(BLAKE3 keyed hash)`, keyed
//! by a key derived from the site secret. Claims carry the identity, an
//! optional space-separated scope and an expiry timestamp.

use crate::cache::{Clock, SystemClock};
use crate::error::{PublError, Result, TokenError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const KEY_CONTEXT: &str = "publ bearer token signing key v1";

/// Scope that marks a token as a redeemable ticket
pub const TICKET_SCOPE: &str = "ticket";

/// Verified token contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity URL
    pub me: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Expiry as a Unix timestamp
    pub expires: i64,
}

impl TokenClaims {
    pub fn scopes(&self) -> BTreeSet<String> {
        parse_scopes(self.scope.as_deref())
    }
}

/// Response to a ticket redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: &'static str,
    pub me: String,
    pub expires_in: u64,
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Split a space-separated scope string
pub fn parse_scopes(scope: Option<&str>) -> BTreeSet<String> {
    scope
        .map(|scope| scope.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn join_scopes(scopes: &BTreeSet<String>) -> Option<String> {
    if scopes.is_empty() {
        None
    } else {
        Some(scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" "))
    }
}

/// Issues and verifies bearer tokens
pub struct TokenSigner {
    key: [u8; 32],
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sign a token for `me`, valid for `lifetime`
    pub fn get_token(&self, me: &str, lifetime: Duration, scope: Option<&str>) -> Result<String> {
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            me: me.to_string(),
            scope: scope.filter(|s| !s.trim().is_empty()).map(str::to_string),
            expires: self.clock.now().timestamp().saturating_add(lifetime),
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| PublError::Internal(format!("Failed to encode token: {}", e)))?;
        let signature = blake3::keyed_hash(&self.key, &payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.as_bytes())
        ))
    }

    /// Verify a token and return its claims
    pub fn parse_token(&self, token: &str) -> Result<TokenClaims> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let signature: [u8; 32] = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?
            .try_into()
            .map_err(|_| TokenError::Malformed)?;

        // blake3::Hash equality is constant-time
        if blake3::keyed_hash(&self.key, &payload) != blake3::Hash::from(signature) {
            warn!("Got token with a bad signature");
            return Err(TokenError::BadSignature.into());
        }

        let claims: TokenClaims = serde_json::from_slice(&payload).map_err(|e| {
            warn!("Got token parse error: {}", e);
            TokenError::Malformed
        })?;

        if claims.expires < self.clock.now().timestamp() {
            info!("Got expired token for {}", claims.me);
            return Err(TokenError::Expired.into());
        }

        Ok(claims)
    }

    /// Issue a ticket: a short-lived token carrying the ticket scope
    pub fn issue_ticket(&self, subject: &str, lifetime: Duration, scope: Option<&str>) -> Result<String> {
        let mut scopes = parse_scopes(scope);
        scopes.insert(TICKET_SCOPE.to_string());
        self.get_token(subject, lifetime, join_scopes(&scopes).as_deref())
    }

    /// Exchange a ticket for an access token and a refresh token
    pub fn redeem_ticket(&self, ticket: &str, token_lifetime: Duration) -> Result<TokenGrant> {
        let claims = self.parse_token(ticket)?;
        info!("Redeeming ticket for {}; scopes={:?}", claims.me, claims.scope);

        let mut scopes = claims.scopes();
        if !scopes.remove(TICKET_SCOPE) {
            return Err(PublError::InvalidInput(format!(
                "Missing '{}' scope",
                TICKET_SCOPE
            )));
        }
        let scope = join_scopes(&scopes);

        Ok(TokenGrant {
            access_token: self.get_token(&claims.me, token_lifetime, scope.as_deref())?,
            token_type: "Bearer",
            me: claims.me.clone(),
            expires_in: token_lifetime.as_secs(),
            refresh_token: self.get_token(&claims.me, token_lifetime, claims.scope.as_deref())?,
            scope,
        })
    }
}
