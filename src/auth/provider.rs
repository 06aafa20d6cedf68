use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{generate_jwt, validate_jwt, Actor, Claims, JwtError, Role};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User is banned: {0}")]
    Banned(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

/// Account as exposed by the auth engine. Credentials never leave it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub banned: bool,
    pub ban_reason: Option<String>,
    pub ban_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Active ban, treating an elapsed expiry as lifted
    pub fn active_ban(&self, now: DateTime<Utc>) -> Option<BanInfo> {
        if !self.banned {
            return None;
        }
        match self.ban_expires {
            Some(expires) if expires <= now => None,
            _ => Some(BanInfo {
                reason: self.ban_reason.clone(),
                expires_at: self.ban_expires,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanInfo {
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanInfo {
    pub fn describe(&self) -> String {
        self.reason.clone().unwrap_or_else(|| "No reason given".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

/// The external authentication engine.
///
/// Credential verification, session issuance, role and ban semantics all live
/// behind this trait; the API only routes to it.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn register(&self, email: &str, name: &str, password: &str) -> Result<UserAccount, AuthError>;

    async fn validate_credentials(&self, email: &str, password: &str) -> Result<UserAccount, AuthError>;

    async fn issue_session(&self, user: &UserAccount) -> Result<Session, AuthError>;

    async fn verify_session(&self, token: &str) -> Result<Actor, AuthError>;

    async fn check_role(&self, user_id: Uuid, role: Role) -> Result<bool, AuthError>;

    async fn check_ban(&self, user_id: Uuid) -> Result<Option<BanInfo>, AuthError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError>;

    async fn list_users(&self) -> Result<Vec<UserAccount>, AuthError>;

    async fn ban_user(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<UserAccount, AuthError>;

    async fn unban_user(&self, user_id: Uuid) -> Result<UserAccount, AuthError>;

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<UserAccount, AuthError>;
}

struct StoredUser {
    account: UserAccount,
    password_digest: String,
}

/// Process-local auth engine used for development and tests
#[derive(Clone)]
pub struct InMemoryAuthProvider {
    users: Arc<RwLock<HashMap<Uuid, StoredUser>>>,
    jwt_secret: String,
    session_hours: u64,
}

impl InMemoryAuthProvider {
    pub fn new(jwt_secret: impl Into<String>, session_hours: u64) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            jwt_secret: jwt_secret.into(),
            session_hours,
        }
    }

    /// Create an admin account, used for the bootstrap admin
    pub async fn seed_admin(&self, email: &str, name: &str, password: &str) -> Result<UserAccount, AuthError> {
        let account = self.register(email, name, password).await?;
        self.set_role(account.id, Role::Admin).await
    }

    fn digest(user_id: Uuid, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn update<F>(&self, user_id: Uuid, f: F) -> Result<UserAccount, AuthError>
    where
        F: FnOnce(&mut UserAccount) + Send,
    {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
        f(&mut stored.account);
        Ok(stored.account.clone())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn register(&self, email: &str, name: &str, password: &str) -> Result<UserAccount, AuthError> {
        let email = normalize_email(email);
        let mut users = self.users.write().await;

        if users.values().any(|u| u.account.email == email) {
            return Err(AuthError::EmailTaken(email));
        }

        let id = Uuid::new_v4();
        let account = UserAccount {
            id,
            email,
            name: name.trim().to_string(),
            role: Role::User,
            banned: false,
            ban_reason: None,
            ban_expires: None,
            created_at: Utc::now(),
        };

        users.insert(
            id,
            StoredUser {
                account: account.clone(),
                password_digest: Self::digest(id, password),
            },
        );
        Ok(account)
    }

    async fn validate_credentials(&self, email: &str, password: &str) -> Result<UserAccount, AuthError> {
        let email = normalize_email(email);
        let users = self.users.read().await;

        let stored = users
            .values()
            .find(|u| u.account.email == email)
            .ok_or(AuthError::InvalidCredentials)?;

        if stored.password_digest != Self::digest(stored.account.id, password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(stored.account.clone())
    }

    async fn issue_session(&self, user: &UserAccount) -> Result<Session, AuthError> {
        let claims = Claims::new(user.id, user.email.clone(), user.role, self.session_hours);
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        let token = generate_jwt(&claims, &self.jwt_secret)?;

        Ok(Session {
            token,
            expires_in: self.session_hours * 3600,
            expires_at,
        })
    }

    async fn verify_session(&self, token: &str) -> Result<Actor, AuthError> {
        let claims = validate_jwt(token, &self.jwt_secret)?;
        Ok(Actor::from(claims))
    }

    async fn check_role(&self, user_id: Uuid, role: Role) -> Result<bool, AuthError> {
        let users = self.users.read().await;
        let stored = users.get(&user_id).ok_or(AuthError::UserNotFound)?;
        Ok(stored.account.role == role)
    }

    async fn check_ban(&self, user_id: Uuid) -> Result<Option<BanInfo>, AuthError> {
        let users = self.users.read().await;
        let stored = users.get(&user_id).ok_or(AuthError::UserNotFound)?;
        Ok(stored.account.active_ban(Utc::now()))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, AuthError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).map(|u| u.account.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.account.email == email)
            .map(|u| u.account.clone()))
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, AuthError> {
        let users = self.users.read().await;
        let mut accounts: Vec<UserAccount> = users.values().map(|u| u.account.clone()).collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(accounts)
    }

    async fn ban_user(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<UserAccount, AuthError> {
        self.update(user_id, |account| {
            account.banned = true;
            account.ban_reason = reason;
            account.ban_expires = expires_at;
        })
        .await
    }

    async fn unban_user(&self, user_id: Uuid) -> Result<UserAccount, AuthError> {
        self.update(user_id, |account| {
            account.banned = false;
            account.ban_reason = None;
            account.ban_expires = None;
        })
        .await
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<UserAccount, AuthError> {
        self.update(user_id, |account| account.role = role).await
    }
}
