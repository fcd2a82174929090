//! Client Credential Resolution
//!
//! Validates the opaque credential a client presents at connect time and
//! resolves it to an identity and subscription tier. Tokens are HS256
//! JWTs minted by the account backend; this service only verifies and
//! reads them - user management lives elsewhere.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::application::ports::{AuthError, ResolvedClient, TierResolver};
use crate::domain::tier::Tier;

// =============================================================================
// Claims
// =============================================================================

/// JWT claims issued by the account backend.
#[derive(Debug, Deserialize)]
struct Claims {
    /// User identity.
    sub: String,
    /// Subscription tier name.
    tier: String,
    /// Elevated role, if any.
    #[serde(default)]
    role: Option<String>,
    /// Expiry (validated by jsonwebtoken).
    #[allow(dead_code)]
    exp: usize,
}

// =============================================================================
// JWT Resolver
// =============================================================================

/// [`TierResolver`] backed by HS256 JWT validation.
pub struct JwtTierResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTierResolver {
    /// Create a resolver for the given shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TierResolver for JwtTierResolver {
    async fn resolve(&self, credential: &str) -> Result<ResolvedClient, AuthError> {
        let token = decode::<Claims>(credential, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        let claims = token.claims;
        let tier = Tier::from_str_case_insensitive(&claims.tier)
            .ok_or_else(|| AuthError::UnknownTier(claims.tier.clone()))?;

        Ok(ResolvedClient {
            identity: claims.sub,
            tier,
            role: claims.role,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
