use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::error::AuthError;
use crate::auth::repo_types::Principal;

/// Storage seam for principals. The production implementation is Postgres;
/// tests and `AppState::fake()` use the in-memory one.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Point lookup by the unique, case-sensitive email key.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError>;

    /// Overwrite the stored digest for one principal. Returns `false` when
    /// no row matched, in which case nothing was written.
    async fn update_password(&self, email: &str, digest: &str) -> Result<bool, AuthError>;
}

/// Postgres-backed principal store.
pub struct PgPrincipalStore {
    db: PgPool,
}

impl PgPrincipalStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, email, name, password_hash, role, created_at
            FROM principals
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(principal)
    }

    async fn update_password(&self, email: &str, digest: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE principals
            SET password_hash = $2
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(digest)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store keyed by email. Backs unit tests and the fake app state.
#[derive(Default)]
pub struct MemoryPrincipalStore {
    principals: RwLock<HashMap<String, Principal>>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .expect("principal map lock")
            .insert(principal.email.clone(), principal);
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        Ok(self
            .principals
            .read()
            .expect("principal map lock")
            .get(email)
            .cloned())
    }

    async fn update_password(&self, email: &str, digest: &str) -> Result<bool, AuthError> {
        let mut principals = self.principals.write().expect("principal map lock");
        match principals.get_mut(email) {
            Some(principal) => {
                principal.password_hash = Some(digest.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
