//! Stateless token codec
//!
//! Signs and verifies the platform's access and refresh tokens. Tokens
//! are self-contained HS256 JWTs; validity is defined purely by signature
//! and expiry, never by a server-side list, and issued tokens are never
//! persisted.
//!
//! Access and refresh tokens are signed with distinct secrets so a leaked
//! access-token secret cannot mint refresh tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{Error, account::AccountId, error::TokenError};

/// Access tokens live for one hour.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

/// Refresh tokens live for seven days.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

/// Which signing secret a token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Access,
    Refresh,
}

/// The claim bundle carried by both token classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id.
    pub sub: String,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl TokenClaims {
    pub fn account_id(&self) -> AccountId {
        AccountId::new(&self.sub)
    }
}

/// The identity fields a token is minted from.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
}

impl From<&TokenClaims> for TokenIdentity {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            account_id: claims.account_id(),
            username: claims.username.clone(),
            email: claims.email.clone(),
            avatar_url: claims.avatar_url.clone(),
        }
    }
}

/// An access/refresh pair issued on successful signin or linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        }
    }

    /// Issue a one-hour access token.
    pub fn issue_access(&self, identity: &TokenIdentity) -> Result<String, Error> {
        self.issue(identity, KeyClass::Access)
    }

    /// Issue a seven-day refresh token.
    pub fn issue_refresh(&self, identity: &TokenIdentity) -> Result<String, Error> {
        self.issue(identity, KeyClass::Refresh)
    }

    /// Issue both tokens for the same identity.
    pub fn issue_pair(&self, identity: &TokenIdentity) -> Result<TokenPair, Error> {
        Ok(TokenPair {
            access_token: self.issue_access(identity)?,
            refresh_token: self.issue_refresh(identity)?,
        })
    }

    fn issue(&self, identity: &TokenIdentity, key_class: KeyClass) -> Result<String, Error> {
        let now = Utc::now();
        let ttl = match key_class {
            KeyClass::Access => ACCESS_TOKEN_TTL,
            KeyClass::Refresh => REFRESH_TOKEN_TTL,
        };

        let claims = TokenClaims {
            sub: identity.account_id.as_str().to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let key = match key_class {
            KeyClass::Access => &self.access_encoding,
            KeyClass::Refresh => &self.refresh_encoding,
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| Error::Token(TokenError::Malformed(e.to_string())))
    }

    /// Verify a token against the given key class and return its claims.
    pub fn verify(&self, token: &str, key_class: KeyClass) -> Result<TokenClaims, Error> {
        let key = match key_class {
            KeyClass::Access => &self.access_decoding,
            KeyClass::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; the default 60s leeway would let stale tokens through.
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::Token(TokenError::Expired),
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                Error::Token(TokenError::BadSignature)
            }
            _ => Error::Token(TokenError::Malformed(e.to_string())),
        })?;

        Ok(data.claims)
    }

    /// Mint a fresh access token from a refresh token.
    ///
    /// The refresh token's claims are trusted as of issuance time; there
    /// is no store round trip, so a username or avatar changed since then
    /// stays stale until the next signin.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, Error> {
        let claims = self.verify(refresh_token, KeyClass::Refresh)?;
        self.issue_access(&TokenIdentity::from(&claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"test_access_secret_not_for_production_use";
    const REFRESH_SECRET: &[u8] = b"test_refresh_secret_not_for_production_use";

    fn codec() -> TokenCodec {
        TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET)
    }

    fn identity() -> TokenIdentity {
        TokenIdentity {
            account_id: AccountId::new_random(),
            username: "foo".to_string(),
            email: "a@x.com".to_string(),
            avatar_url: "https://static.wicket.dev/avatars/default.png".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let codec = codec();
        let identity = identity();

        let token = codec.issue_access(&identity).unwrap();
        let claims = codec.verify(&token, KeyClass::Access).unwrap();

        assert_eq!(claims.sub, identity.account_id.as_str());
        assert_eq!(claims.username, "foo");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL.num_seconds());
    }

    #[test]
    fn test_key_classes_are_not_interchangeable() {
        let codec = codec();
        let access = codec.issue_access(&identity()).unwrap();
        let refresh = codec.issue_refresh(&identity()).unwrap();

        // An access token must not verify as a refresh token and vice versa.
        assert!(matches!(
            codec.verify(&access, KeyClass::Refresh),
            Err(Error::Token(TokenError::BadSignature))
        ));
        assert!(matches!(
            codec.verify(&refresh, KeyClass::Access),
            Err(Error::Token(TokenError::BadSignature))
        ));
    }

    #[test]
    fn test_expired_is_distinct_from_bad_signature() {
        let codec = codec();
        let identity = identity();

        // Hand-roll an already expired access token with the right secret.
        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.account_id.as_str().to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET),
        )
        .unwrap();

        assert!(matches!(
            codec.verify(&token, KeyClass::Access),
            Err(Error::Token(TokenError::Expired))
        ));
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();
        assert!(matches!(
            codec.verify("not.a.jwt", KeyClass::Access),
            Err(Error::Token(TokenError::Malformed(_)))
        ));
    }

    #[test]
    fn test_refresh_preserves_claims() {
        let codec = codec();
        let identity = identity();

        let refresh_token = codec.issue_refresh(&identity).unwrap();
        let access_token = codec.refresh(&refresh_token).unwrap();

        let refresh_claims = codec.verify(&refresh_token, KeyClass::Refresh).unwrap();
        let access_claims = codec.verify(&access_token, KeyClass::Access).unwrap();

        assert_eq!(access_claims.sub, refresh_claims.sub);
        assert_eq!(access_claims.username, refresh_claims.username);
        assert_eq!(access_claims.email, refresh_claims.email);
        assert_eq!(access_claims.avatar_url, refresh_claims.avatar_url);
    }

    #[test]
    fn test_refresh_rejects_access_token() {
        let codec = codec();
        let access_token = codec.issue_access(&identity()).unwrap();

        assert!(matches!(
            codec.refresh(&access_token),
            Err(Error::Token(TokenError::BadSignature))
        ));
    }
}
