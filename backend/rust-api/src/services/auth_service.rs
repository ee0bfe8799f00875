use crate::metrics::{record_redis_operation, LOGIN_ATTEMPTS_TOTAL};
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{AuthResponse, LoginRequest, SignupRequest, User, UserProfile, UserRole};
use crate::services::connect_redis;
use anyhow::{anyhow, Context};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use thiserror::Error;

pub const MAX_FAILED_LOGINS: u32 = 5;
pub const LOCKOUT_SECONDS: u64 = 900;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts. Try again in 15 minutes")]
    Locked,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct AuthService {
    mongo: Database,
    redis: redis::Client,
    jwt_service: JwtService,
    token_ttl_seconds: i64,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn lockout_key(email: &str) -> String {
    format!("failed_login:{}", email)
}

impl AuthService {
    pub fn new(
        mongo: Database,
        redis: redis::Client,
        jwt_service: JwtService,
        token_ttl_seconds: i64,
    ) -> Self {
        Self {
            mongo,
            redis,
            jwt_service,
            token_ttl_seconds,
        }
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.mongo.collection::<User>("users")
    }

    /// Hash a password using bcrypt with cost 12
    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<AuthResponse, AccountError> {
        let email = normalize_email(&req.email);

        if self.user_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let now = Utc::now();
        let mut user = User {
            id: None,
            email,
            password_hash: self.hash_password(&req.password)?,
            name: req.name.trim().to_string(),
            role: UserRole::User,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .users()
            .insert_one(&user)
            .await
            .context("Failed to insert user")?;
        let user_id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted user ID"))?;
        user.id = Some(user_id);

        tracing::info!(user_id = %user_id, email = %user.email, "User registered");
        self.issue(user_id, user)
    }

    pub async fn login(
        &self,
        req: LoginRequest,
        ip: &str,
    ) -> Result<AuthResponse, AccountError> {
        let email = normalize_email(&req.email);

        if self.check_failed_attempts(&email).await {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["locked"]).inc();
            tracing::warn!(email = %email, ip = %ip, "Login refused: account temporarily locked");
            return Err(AccountError::Locked);
        }

        let user = match self.user_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.increment_failed_attempts(&email).await;
                LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
                return Err(AccountError::InvalidCredentials);
            }
        };

        if !self.verify_password(&req.password, &user.password_hash)? {
            let attempts = self.increment_failed_attempts(&email).await;
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            tracing::warn!(
                email = %email,
                ip = %ip,
                attempts = ?attempts,
                "Failed login attempt: invalid password"
            );
            return Err(AccountError::InvalidCredentials);
        }

        self.clear_failed_attempts(&email).await;
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();

        let user_id = user.id.ok_or_else(|| anyhow!("User ID not found"))?;
        tracing::info!(user_id = %user_id, ip = %ip, "Successful login");
        self.issue(user_id, user)
    }

    fn issue(&self, user_id: ObjectId, user: User) -> Result<AuthResponse, AccountError> {
        let claims = JwtClaims::for_user(&user_id, &user, self.token_ttl_seconds);
        let token = self
            .jwt_service
            .generate_token(&claims)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))?;

        Ok(AuthResponse {
            success: true,
            token,
            user: UserProfile::from(user),
        })
    }

    /// Invalidates every token issued to the user so far.
    pub async fn logout(&self, user_id: ObjectId) -> Result<(), AccountError> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$inc": { "tokenVersion": 1 },
                    "$set": { "updatedAt": mongodb::bson::DateTime::now() },
                },
            )
            .await
            .context("Failed to bump token version")?;

        if result.matched_count == 0 {
            return Err(AccountError::UserNotFound);
        }
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn get_user(&self, user_id: ObjectId) -> Result<User, AccountError> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .ok_or(AccountError::UserNotFound)
    }

    pub async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.users()
            .find_one(doc! { "email": email })
            .await
            .context("Failed to query user")
    }

    /// True once `MAX_FAILED_LOGINS` failures are recorded within the
    /// lockout window. Redis failures never lock anyone out.
    pub async fn check_failed_attempts(&self, email: &str) -> bool {
        let result: anyhow::Result<Option<u32>> = async {
            let mut conn = connect_redis(&self.redis).await?;
            redis::cmd("GET")
                .arg(lockout_key(email))
                .query_async(&mut conn)
                .await
                .context("Failed to query failed login attempts")
        }
        .await;

        record_redis_operation("get", result.is_ok());
        match result {
            Ok(count) => count.unwrap_or(0) >= MAX_FAILED_LOGINS,
            Err(e) => {
                tracing::warn!(error = %e, "Lockout check skipped");
                false
            }
        }
    }

    /// Returns the failure count, or None when Redis is unreachable.
    pub async fn increment_failed_attempts(&self, email: &str) -> Option<u32> {
        let key = lockout_key(email);
        let result: anyhow::Result<u32> = async {
            let mut conn = connect_redis(&self.redis).await?;
            let count: u32 = redis::cmd("INCR")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .context("Failed to increment failed login attempts")?;

            if count == 1 {
                redis::cmd("EXPIRE")
                    .arg(&key)
                    .arg(LOCKOUT_SECONDS)
                    .query_async::<()>(&mut conn)
                    .await
                    .context("Failed to set TTL for failed login attempts")?;
            }
            Ok(count)
        }
        .await;

        record_redis_operation("incr", result.is_ok());
        result
            .map_err(|e| tracing::warn!(error = %e, "Failed login not recorded"))
            .ok()
    }

    pub async fn clear_failed_attempts(&self, email: &str) {
        let result: anyhow::Result<()> = async {
            let mut conn = connect_redis(&self.redis).await?;
            redis::cmd("DEL")
                .arg(lockout_key(email))
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to clear failed login attempts")
        }
        .await;

        record_redis_operation("del", result.is_ok());
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed login counter not cleared");
        }
    }
}
