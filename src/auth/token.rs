//! Access and refresh token primitives.
//!
//! Access tokens are HS256 JWTs with issuer/audience pinning. Refresh
//! tokens are opaque 64-byte random values; the store only ever sees their
//! SHA-256 hash.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::error;
use uuid::Uuid;

use super::{AuthConfig, AuthError};
use crate::store::Account;

const REFRESH_TOKEN_BYTES: usize = 64;

/// Claims carried by an access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    /// Unique token id; two tokens for the same account never share one.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    /// Parse the subject back into an account id.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] when the subject is not a UUID.
    pub fn account_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.signing_key().expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer().to_string(),
            audience: config.audience().to_string(),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes()),
        }
    }

    /// Sign a fresh access token for the account.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if signing fails.
    pub fn issue_access_token(&self, account: &Account) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            given_name: account.first_name.clone(),
            family_name: account.last_name.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.unix_timestamp(),
            exp: (now + self.access_ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|err| {
            error!("failed to sign access token: {err}");
            AuthError::Internal
        })
    }

    /// Mint a new opaque refresh token. The raw value goes to the client;
    /// callers hash it before it reaches the store.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the system RNG fails.
    pub fn issue_refresh_token(&self) -> Result<String, AuthError> {
        crate::store::generate_token(REFRESH_TOKEN_BYTES).map_err(AuthError::from_store)
    }

    /// Validate an access token in full, expiry included.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] for any validation failure.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation(true))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Extract the principal from a possibly expired access token.
    ///
    /// Signature, algorithm, issuer, and audience are all still enforced;
    /// only the expiry check is skipped. This is the first half of the
    /// refresh flow: the pair (expired access token, live refresh token)
    /// must both check out before rotation.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] for any failure other than expiry.
    pub fn principal_from_expired_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation(false))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = validate_exp;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("unit-test-signing-key"),
            "https://app.example.com".to_string(),
        )
        .with_issuer("https://auth.example.com".to_string())
        .with_audience("example-clients".to_string())
    }

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email_confirmed: true,
            refresh_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
            last_login_at: None,
        }
    }

    fn expired_token(service: &TokenService, secret: &str, account: &Account) -> String {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            given_name: account.first_name.clone(),
            family_name: account.last_name.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: (now - Duration::hours(2)).unix_timestamp(),
            exp: (now - Duration::hours(1)).unix_timestamp(),
            iss: service.issuer.clone(),
            aud: service.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<(), AuthError> {
        let service = TokenService::new(&config());
        let account = account();
        let token = service.issue_access_token(&account)?;
        let claims = service.verify_access_token(&token)?;
        assert_eq!(claims.account_id()?, account.id);
        assert_eq!(claims.email, account.email);
        assert_eq!(claims.iss, "https://auth.example.com");
        Ok(())
    }

    #[test]
    fn two_tokens_never_share_a_jti() -> Result<(), AuthError> {
        let service = TokenService::new(&config());
        let account = account();
        let first = service.verify_access_token(&service.issue_access_token(&account)?)?;
        let second = service.verify_access_token(&service.issue_access_token(&account)?)?;
        assert_ne!(first.jti, second.jti);
        Ok(())
    }

    #[test]
    fn expired_token_still_yields_principal() {
        let service = TokenService::new(&config());
        let account = account();
        let token = expired_token(&service, "unit-test-signing-key", &account);

        // Full verification rejects it...
        assert!(matches!(
            service.verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
        // ...but the refresh path can still read the principal.
        let claims = service.principal_from_expired_token(&token).unwrap();
        assert_eq!(claims.account_id().unwrap(), account.id);
    }

    #[test]
    fn expired_token_path_still_checks_signature() {
        let service = TokenService::new(&config());
        let account = account();
        let forged = expired_token(&service, "some-other-key", &account);
        assert!(matches!(
            service.principal_from_expired_token(&forged),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn issuer_and_audience_are_pinned() -> Result<(), AuthError> {
        let service = TokenService::new(&config());
        let other = TokenService::new(
            &AuthConfig::new(
                SecretString::from("unit-test-signing-key"),
                "https://app.example.com".to_string(),
            )
            .with_issuer("https://rogue.example.com".to_string())
            .with_audience("example-clients".to_string()),
        );
        let token = other.issue_access_token(&account())?;
        assert!(matches!(
            service.verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.principal_from_expired_token(&token),
            Err(AuthError::InvalidToken)
        ));
        Ok(())
    }

    #[test]
    fn refresh_tokens_are_opaque_and_unique() -> Result<(), AuthError> {
        let service = TokenService::new(&config());
        let first = service.issue_refresh_token()?;
        let second = service.issue_refresh_token()?;
        assert_ne!(first, second);
        // 64 random bytes in unpadded url-safe base64.
        assert_eq!(first.len(), 86);
        Ok(())
    }
}
