//! Admin registration and credential checks.

use super::{ServiceError, ServiceResult, required};
use crate::{db::is_unique_violation, models::admin::Admin};
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::LazyLock;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

#[derive(Debug, Deserialize)]
pub struct RegisterAdmin {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginAdmin {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AdminService {
    db: SqlitePool,
    bcrypt_cost: u32,
}

impl AdminService {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Cheaper hashing for tests.
    #[cfg(test)]
    pub fn with_cost(db: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, name, email, password_hash, created_at, updated_at
             FROM admins WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(admin)
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, name, email, password_hash, created_at, updated_at
             FROM admins WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(admin)
    }

    pub async fn register(&self, req: RegisterAdmin) -> ServiceResult<Admin> {
        self.create(req, false).await
    }

    /// Register the first admin. The emptiness check and the insert are a
    /// single statement, so of two racing requests only one gets in.
    pub async fn register_first(&self, req: RegisterAdmin) -> ServiceResult<Admin> {
        self.create(req, true).await
    }

    async fn create(&self, req: RegisterAdmin, only_if_empty: bool) -> ServiceResult<Admin> {
        let (Some(name), Some(email), Some(password)) = (
            required(req.name),
            required(req.email).map(|e| e.to_lowercase()),
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(ServiceError::Validation(
                "Please provide name, email, and password".into(),
            ));
        };

        if name.chars().count() > MAX_NAME_LEN {
            return Err(ServiceError::Validation(format!(
                "Name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        validate_email(&email)?;
        validate_password(&password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Admin already exists".into()));
        }

        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| ServiceError::Hash(err.to_string()))?
            .map_err(|err| ServiceError::Hash(err.to_string()))?;

        let now = Utc::now();
        let admin = Admin {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let sql = if only_if_empty {
            "INSERT INTO admins (id, name, email, password_hash, created_at, updated_at)
             SELECT ?, ?, ?, ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM admins)"
        } else {
            "INSERT INTO admins (id, name, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)"
        };
        let result = sqlx::query(sql)
            .bind(admin.id)
            .bind(&admin.name)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .bind(admin.created_at)
            .bind(admin.updated_at)
            .execute(&self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ServiceError::Conflict("Admin already exists".into())
                } else {
                    ServiceError::Sqlx(err)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::Unauthorized(
                "An admin already exists; registration requires authentication".into(),
            ));
        }

        tracing::info!(admin_id = %admin.id, "registered admin");
        Ok(admin)
    }

    /// Check credentials. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, req: LoginAdmin) -> ServiceResult<Admin> {
        let (Some(email), Some(password)) = (
            required(req.email).map(|e| e.to_lowercase()),
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(ServiceError::Validation(
                "Please provide email and password".into(),
            ));
        };

        let invalid = || ServiceError::Unauthorized("Invalid email or password".into());
        let admin = self.find_by_email(&email).await?.ok_or_else(invalid)?;

        let hash = admin.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| ServiceError::Hash(err.to_string()))?
            .map_err(|err| ServiceError::Hash(err.to_string()))?;

        if matches { Ok(admin) } else { Err(invalid()) }
    }
}

fn validate_email(email: &str) -> ServiceResult<()> {
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        return Err(ServiceError::Validation("Invalid email format".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(ServiceError::Validation(
            "Password must contain both letters and numbers".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn register_req(email: &str, password: &str) -> RegisterAdmin {
        RegisterAdmin {
            name: Some("Dewi".into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginAdmin {
        LoginAdmin {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_hashes_password() {
        let admins = AdminService::with_cost(test_pool().await, 4);

        let admin = admins
            .register(register_req("  Admin@Shop.ID ", "hunter22x"))
            .await
            .unwrap();

        assert_eq!(admin.email, "admin@shop.id");
        assert_ne!(admin.password_hash, "hunter22x");
        assert_eq!(admins.count().await.unwrap(), 1);
        assert!(admins.find_by_id(admin.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let admins = AdminService::with_cost(test_pool().await, 4);
        admins
            .register(register_req("admin@shop.id", "hunter22x"))
            .await
            .unwrap();

        let err = admins
            .register(register_req("ADMIN@shop.id", "another1pass"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let admins = AdminService::with_cost(test_pool().await, 4);

        let missing = RegisterAdmin {
            name: None,
            email: Some("a@b.co".into()),
            password: Some("hunter22x".into()),
        };
        assert!(matches!(
            admins.register(missing).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            admins.register(register_req("not-an-email", "hunter22x")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            admins.register(register_req("a@b.co", "short1")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            admins.register(register_req("a@b.co", "lettersonly")).await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(admins.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let admins = AdminService::with_cost(test_pool().await, 4);
        let registered = admins
            .register(register_req("admin@shop.id", "hunter22x"))
            .await
            .unwrap();

        let admin = admins
            .login(login_req("Admin@shop.id", "hunter22x"))
            .await
            .unwrap();
        assert_eq!(admin.id, registered.id);

        assert!(matches!(
            admins.login(login_req("admin@shop.id", "wrong-pass1")).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            admins.login(login_req("nobody@shop.id", "hunter22x")).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn only_one_racing_first_registration_succeeds() {
        let admins = AdminService::with_cost(test_pool().await, 4);

        let (first, second) = tokio::join!(
            admins.register_first(register_req("dewi@shop.id", "hunter22x")),
            admins.register_first(register_req("budi@shop.id", "hunter33y")),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(ServiceError::Unauthorized(_))))
        );
        assert_eq!(admins.count().await.unwrap(), 1);
    }
}
