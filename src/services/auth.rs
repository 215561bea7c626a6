use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during login or token validation
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Unknown or mismatched login session")]
    InvalidSession,

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Access-token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// An issued access token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub token_type: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 access-token issuer and validator
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<AccessGrant, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))?;

        Ok(AccessGrant {
            access_token,
            token_type: "bearer".to_string(),
            subject: claims.sub,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify an `Authorization` header value of the form `Bearer <token>`
    pub fn verify_bearer(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|h| {
                h.strip_prefix("Bearer ")
                    .or_else(|| h.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("missing bearer token".to_string()))?;
        self.verify(token)
    }
}

/// One-time code sent to the user after a password check
#[derive(Debug, Clone, PartialEq)]
pub struct OtpChallenge {
    pub session_token: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub const CODE_DIGITS: usize = 6;

    pub fn generate(now: DateTime<Utc>, ttl: Duration) -> Self {
        let random = uuid::Uuid::new_v4().as_u128();
        let code = format!("{:06}", random % 1_000_000);

        Self {
            session_token: uuid::Uuid::new_v4().simple().to_string(),
            code,
            expires_at: now + ttl,
        }
    }
}

/// Login waiting for its one-time code
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSession {
    pub subject: String,
    pub challenge: OtpChallenge,
}

/// Two-step login: password, then one-time code
///
/// Driven by the embedding application, which owns credential checks and code
/// delivery and passes the code lifetime on each password step. The service's
/// own routes only verify the access tokens this flow ends with.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoginState {
    #[default]
    Unauthenticated,
    PasswordVerified(PendingSession),
    Authenticated(AccessGrant),
}

impl LoginState {
    fn name(&self) -> &'static str {
        match self {
            LoginState::Unauthenticated => "unauthenticated",
            LoginState::PasswordVerified(_) => "awaiting verification code",
            LoginState::Authenticated(_) => "authenticated",
        }
    }

    /// Record the outcome of the credential check
    ///
    /// On success, moves to `PasswordVerified` and returns the challenge the
    /// caller must deliver to the user.
    pub fn submit_password(
        &mut self,
        subject: &str,
        password_ok: bool,
        now: DateTime<Utc>,
        code_ttl: Duration,
    ) -> Result<OtpChallenge, AuthError> {
        if !matches!(self, LoginState::Unauthenticated) {
            return Err(AuthError::InvalidTransition {
                action: "submit a password",
                state: self.name(),
            });
        }
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        let challenge = OtpChallenge::generate(now, code_ttl);
        *self = LoginState::PasswordVerified(PendingSession {
            subject: subject.to_string(),
            challenge: challenge.clone(),
        });
        Ok(challenge)
    }

    /// Check the one-time code; a wrong or expired code leaves the state unchanged
    pub fn submit_code(
        &mut self,
        session_token: &str,
        code: &str,
        now: DateTime<Utc>,
        tokens: &TokenService,
    ) -> Result<&AccessGrant, AuthError> {
        let pending = match self {
            LoginState::PasswordVerified(pending) => pending,
            other => {
                return Err(AuthError::InvalidTransition {
                    action: "submit a verification code",
                    state: other.name(),
                })
            }
        };

        if pending.challenge.session_token != session_token {
            return Err(AuthError::InvalidSession);
        }
        if now > pending.challenge.expires_at {
            return Err(AuthError::CodeExpired);
        }
        if pending.challenge.code != code.trim() {
            return Err(AuthError::InvalidCode);
        }

        let grant = tokens.issue(&pending.subject, now)?;
        *self = LoginState::Authenticated(grant);
        match self {
            LoginState::Authenticated(grant) => Ok(grant),
            _ => Err(AuthError::InvalidSession),
        }
    }

    /// Abandon the login from any state
    pub fn cancel(&mut self) {
        *self = LoginState::Unauthenticated;
    }

    pub fn access_grant(&self) -> Option<&AccessGrant> {
        match self {
            LoginState::Authenticated(grant) => Some(grant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(30))
    }

    #[test]
    fn test_full_login_flow() {
        let now = Utc::now();
        let mut state = LoginState::default();

        let challenge = state
            .submit_password("user@example.com", true, now, Duration::minutes(10))
            .unwrap();
        assert_eq!(challenge.code.len(), OtpChallenge::CODE_DIGITS);
        assert!(matches!(state, LoginState::PasswordVerified(_)));

        let grant = state
            .submit_code(&challenge.session_token, &challenge.code, now, &tokens())
            .unwrap()
            .clone();
        assert_eq!(grant.token_type, "bearer");

        let claims = tokens().verify(&grant.access_token).unwrap();
        assert_eq!(claims.sub, "user@example.com");
    }

    #[test]
    fn test_wrong_password_stays_unauthenticated() {
        let mut state = LoginState::default();
        let result = state.submit_password("user@example.com", false, Utc::now(), Duration::minutes(10));

        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert_eq!(state, LoginState::Unauthenticated);
    }

    #[test]
    fn test_wrong_code_does_not_advance() {
        let now = Utc::now();
        let mut state = LoginState::default();
        let challenge = state
            .submit_password("user@example.com", true, now, Duration::minutes(10))
            .unwrap();

        let wrong = if challenge.code == "000000" { "111111" } else { "000000" };
        let result = state.submit_code(&challenge.session_token, wrong, now, &tokens());

        assert_eq!(result.err(), Some(AuthError::InvalidCode));
        assert!(matches!(state, LoginState::PasswordVerified(_)));
    }

    #[test]
    fn test_expired_code_rejected() {
        let now = Utc::now();
        let mut state = LoginState::default();
        let challenge = state
            .submit_password("user@example.com", true, now, Duration::minutes(10))
            .unwrap();

        let later = now + Duration::minutes(11);
        let result = state.submit_code(&challenge.session_token, &challenge.code, later, &tokens());

        assert_eq!(result.err(), Some(AuthError::CodeExpired));
        assert!(state.access_grant().is_none());
    }

    #[test]
    fn test_cancel_returns_to_start() {
        let mut state = LoginState::default();
        state
            .submit_password("user@example.com", true, Utc::now(), Duration::minutes(10))
            .unwrap();

        state.cancel();
        assert_eq!(state, LoginState::Unauthenticated);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued = Utc::now() - Duration::hours(2);
        let grant = tokens().issue("user@example.com", issued).unwrap();

        assert!(matches!(
            tokens().verify(&grant.access_token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_bearer_header_parsing() {
        let service = tokens();
        let grant = service.issue("user@example.com", Utc::now()).unwrap();
        let header = format!("Bearer {}", grant.access_token);

        assert!(service.verify_bearer(Some(&header)).is_ok());
        assert!(service.verify_bearer(None).is_err());
        assert!(service.verify_bearer(Some("Basic abc")).is_err());
    }
}
