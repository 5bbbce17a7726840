use chrono::SecondsFormat;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crm_core::{ServiceError, new_id, now_rfc3339};
use crm_sql::Value;

use crate::model::{Claims, Session, SignIn, TokenKind, TokenPair, User};
use crate::service::AuthService;
use crate::service::password::verify_password;

impl AuthService {
    /// Check credentials and issue a token pair.
    ///
    /// Unknown email, wrong password and deactivated account all produce the
    /// same 401 so that callers can't probe which emails exist.
    pub fn sign_in(&self, input: SignIn) -> Result<TokenPair, ServiceError> {
        let invalid = || ServiceError::Unauthorized("invalid email or password".into());

        let (mut user, hash) = self.find_credentials(&input.email)?.ok_or_else(invalid)?;
        if !verify_password(&input.password, &hash) || !user.active {
            tracing::warn!(email = %user.email, "rejected sign-in");
            return Err(invalid());
        }

        let now = now_rfc3339();
        user.last_sign_in_at = Some(now.clone());
        user.updated_at = now;
        self.save_user(&user)?;

        self.issue_tokens(&user)
    }

    /// Issue a JWT token pair (access + refresh) for a user.
    ///
    /// Creates a session record; both tokens carry its id.
    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let session_id = new_id();
        let now = chrono::Utc::now();
        let access_exp = now + chrono::Duration::seconds(self.config.access_token_ttl);
        let refresh_exp = now + chrono::Duration::seconds(self.config.refresh_token_ttl);

        let claims = |kind, exp: chrono::DateTime<chrono::Utc>| Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            sid: session_id.clone(),
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let access_token = self.sign(&claims(TokenKind::Access, access_exp))?;
        let refresh_token = self.sign(&claims(TokenKind::Refresh, refresh_exp))?;

        let session = Session {
            id: session_id,
            user_id: user.id.clone(),
            issued_at: now.to_rfc3339_opts(SecondsFormat::Micros, true),
            expires_at: refresh_exp.to_rfc3339_opts(SecondsFormat::Micros, true),
            revoked: false,
        };
        self.records.insert("sessions", &session.id, &session, &[
            ("user_id", Value::Text(session.user_id.clone())),
            ("revoked", Value::bool(false)),
            ("created_at", Value::Text(session.issued_at.clone())),
            ("expires_at", Value::Text(session.expires_at.clone())),
        ])?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_ttl,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, ServiceError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("JWT encode failed: {}", e)))
    }

    /// Verify a JWT of the expected kind.
    /// Returns the claims if the signature, expiry and session are all valid.
    pub fn verify_token(&self, token: &str, kind: TokenKind) -> Result<Claims, ServiceError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

        let claims = token_data.claims;
        if claims.kind != kind {
            return Err(ServiceError::Unauthorized(format!(
                "expected {} token",
                if kind == TokenKind::Access { "an access" } else { "a refresh" }
            )));
        }

        // A missing session means the user was deleted.
        match self.records.find::<Session>("sessions", &claims.sid)? {
            Some(session) if !session.revoked => Ok(claims),
            _ => Err(ServiceError::Unauthorized("session has been revoked".into())),
        }
    }

    /// Exchange a refresh token for a new pair, revoking the old session.
    pub fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.verify_token(refresh_token, TokenKind::Refresh)?;

        let user = self
            .records
            .find::<User>("users", &claims.sub)?
            .ok_or_else(|| ServiceError::Unauthorized("user not found".into()))?;
        if !user.active {
            return Err(ServiceError::Unauthorized("user is deactivated".into()));
        }

        self.revoke_session(&claims.sid)?;
        self.issue_tokens(&user)
    }

    /// Revoke a session (both of its tokens become invalid).
    pub fn revoke_session(&self, session_id: &str) -> Result<(), ServiceError> {
        let mut session: Session = self.records.get("sessions", session_id)?;
        session.revoked = true;
        self.records.update("sessions", session_id, &session, &[
            ("revoked", Value::bool(true)),
        ])
    }

    /// Revoke all of a user's live sessions, optionally sparing one.
    /// Returns how many were revoked.
    pub fn revoke_user_sessions(&self, user_id: &str, except: Option<&str>) -> Result<u64, ServiceError> {
        let n = self.records.sql().exec(
            "UPDATE sessions
             SET revoked = 1, data = json_set(data, '$.revoked', json('true'))
             WHERE user_id = ?1 AND revoked = 0 AND id != ?2",
            &[
                Value::Text(user_id.to_string()),
                Value::Text(except.unwrap_or_default().to_string()),
            ],
        )?;
        Ok(n)
    }
}
