//! One-time password issue/verify flows for account verification and
//! password resets. Codes are six digits, short-lived, single-use, and
//! stored only as SHA-256 digests.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::otp_token::{self, Entity as OtpTokenEntity},
    errors::ServiceError,
};

const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Verify,
    Reset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Reset => "reset",
        }
    }
}

/// A freshly issued code. The plaintext code exists only in this value;
/// delivery to the user happens outside this service.
#[derive(Debug)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[derive(Clone)]
pub struct OtpService {
    db: Arc<DatabaseConnection>,
    ttl_secs: i64,
}

impl OtpService {
    pub fn new(db: Arc<DatabaseConnection>, ttl_secs: u64) -> Self {
        Self {
            db,
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Issues a new code for the user and purpose. Any still-pending codes
    /// for the same user and purpose are invalidated first.
    #[instrument(skip(self), fields(user_id = %user_id, purpose = purpose.as_str()))]
    pub async fn issue(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<IssuedOtp, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let pending = OtpTokenEntity::find()
            .filter(otp_token::Column::UserId.eq(user_id))
            .filter(otp_token::Column::Purpose.eq(purpose.as_str()))
            .filter(otp_token::Column::Used.eq(false))
            .all(db)
            .await?;
        for token in pending {
            let mut active: otp_token::ActiveModel = token.into();
            active.used = Set(true);
            active.update(db).await?;
        }

        let code = generate_code();
        let expires_at = now + ChronoDuration::seconds(self.ttl_secs);

        otp_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            purpose: Set(purpose.as_str().to_string()),
            code_hash: Set(hash_code(&code)),
            attempts: Set(0),
            used: Set(false),
            expires_at: Set(expires_at),
            created_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(user_id = %user_id, purpose = purpose.as_str(), "OTP code issued");

        Ok(IssuedOtp { code, expires_at })
    }

    /// Verifies a code for the user and purpose, consuming it on success.
    /// Failed attempts are counted; the code is dead after MAX_ATTEMPTS.
    #[instrument(skip(self, code), fields(user_id = %user_id, purpose = purpose.as_str()))]
    pub async fn verify(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let token = OtpTokenEntity::find()
            .filter(otp_token::Column::UserId.eq(user_id))
            .filter(otp_token::Column::Purpose.eq(purpose.as_str()))
            .filter(otp_token::Column::Used.eq(false))
            .order_by_desc(otp_token::Column::CreatedAt)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InvalidInput("No pending code for this account".to_string()))?;

        if token.expires_at < now {
            return Err(ServiceError::InvalidInput("Code has expired".to_string()));
        }

        if token.attempts >= MAX_ATTEMPTS {
            return Err(ServiceError::Forbidden(
                "Too many failed attempts; request a new code".to_string(),
            ));
        }

        if token.code_hash != hash_code(code) {
            let attempts = token.attempts + 1;
            let mut active: otp_token::ActiveModel = token.into();
            active.attempts = Set(attempts);
            active.update(db).await?;
            return Err(ServiceError::InvalidInput("Incorrect code".to_string()));
        }

        let mut active: otp_token::ActiveModel = token.into();
        active.used = Set(true);
        active.update(db).await?;

        info!(user_id = %user_id, purpose = purpose.as_str(), "OTP code verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_is_stable_and_hex_encoded() {
        let a = hash_code("123456");
        let b = hash_code("123456");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_code("123457"));
    }
}
