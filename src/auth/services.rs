pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::error::AuthError;
use crate::auth::password;
use crate::auth::repo::PrincipalStore;
use crate::auth::repo_types::Principal;
use crate::config::JwtConfig;
use crate::state::AppState;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Hash a plaintext on a blocking worker. bcrypt at cost 10 takes tens of
/// milliseconds, long enough to stall the request executor if run inline.
pub async fn hash_password(plain: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| {
            error!(error = %e, "hash worker task failed");
            AuthError::Hash(e.to_string())
        })?
        .map_err(|e| {
            error!(error = %e, "bcrypt hash error");
            AuthError::Hash(e.to_string())
        })
}

/// Verify a plaintext against a stored digest on a blocking worker.
///
/// `Err(MalformedDigest)` means the stored digest did not parse; the mismatch
/// case is `Ok(false)`.
pub async fn verify_password(plain: String, digest: String) -> Result<bool, AuthError> {
    let result = tokio::task::spawn_blocking(move || password::verify_password(&plain, &digest))
        .await
        .map_err(|e| {
            error!(error = %e, "verify worker task failed");
            AuthError::Hash(e.to_string())
        })?;

    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            error!(error = %e, "stored digest failed to parse");
            Err(AuthError::MalformedDigest)
        }
    }
}

/// Check a presented credential against the stored principal record.
///
/// Unknown email, absent digest, malformed digest, and plain mismatch all
/// collapse to `InvalidCredentials`, so the login boundary cannot leak which
/// one happened. The detailed cause is logged before collapsing.
pub async fn verify_login(
    store: &dyn PrincipalStore,
    email: &str,
    plain: &str,
) -> Result<Principal, AuthError> {
    let principal = match store.find_by_email(email).await? {
        Some(p) => p,
        None => {
            warn!(email = %email, "login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let digest = match principal.password_hash.clone() {
        Some(d) => d,
        None => {
            error!(principal_id = %principal.id, "principal has no stored digest");
            return Err(AuthError::InvalidCredentials);
        }
    };

    match verify_password(plain.to_string(), digest).await {
        Ok(true) => {
            debug!(principal_id = %principal.id, "credential verified");
            Ok(principal)
        }
        Ok(false) => {
            warn!(principal_id = %principal.id, "login with wrong password");
            Err(AuthError::InvalidCredentials)
        }
        // Logged with detail above; the caller sees a plain auth failure.
        Err(AuthError::MalformedDigest) => Err(AuthError::InvalidCredentials),
        Err(e) => Err(e),
    }
}

/// Overwrite a principal's digest. This is the only sanctioned credential
/// mutation path; the admin route and the operator command both land here.
pub async fn reset_password(
    store: &dyn PrincipalStore,
    email: &str,
    new_plain: &str,
) -> Result<(), AuthError> {
    let digest = hash_password(new_plain.to_string()).await?;
    if store.update_password(email, &digest).await? {
        info!(email = %email, "password reset");
        Ok(())
    } else {
        Err(AuthError::NotFound)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, principal: &Principal, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(principal_id = %principal.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, principal: &Principal) -> anyhow::Result<String> {
        self.sign_with_kind(principal, TokenKind::Access)
    }
    pub fn sign_refresh(&self, principal: &Principal) -> anyhow::Result<String> {
        self.sign_with_kind(principal, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(principal_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod credential_tests {
    use super::*;
    use crate::auth::repo::MemoryPrincipalStore;
    use crate::auth::repo_types::Role;
    use uuid::Uuid;

    fn principal(email: &str, digest: Option<String>, role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: email.into(),
            name: "Test Principal".into(),
            password_hash: digest,
            role,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn store_with(principals: Vec<Principal>) -> MemoryPrincipalStore {
        let store = MemoryPrincipalStore::new();
        for p in principals {
            store.insert(p);
        }
        store
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_password() {
        let digest = password::hash_password("Hunter!22").unwrap();
        let store = store_with(vec![principal("a@b.com", Some(digest), Role::Admin)]);

        let found = verify_login(&store, "a@b.com", "Hunter!22")
            .await
            .expect("login should succeed");
        assert_eq!(found.email, "a@b.com");
        assert_eq!(found.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let digest = password::hash_password("Hunter!22").unwrap();
        let store = store_with(vec![principal("a@b.com", Some(digest), Role::User)]);

        let err = verify_login(&store, "a@b.com", "Hunter!23").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_rejects_unknown_email_indistinguishably() {
        let digest = password::hash_password("Hunter!22").unwrap();
        let store = store_with(vec![principal("a@b.com", Some(digest), Role::User)]);

        let unknown = verify_login(&store, "nobody@b.com", "Hunter!22")
            .await
            .unwrap_err();
        let wrong = verify_login(&store, "a@b.com", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_fails_closed_when_digest_missing() {
        let store = store_with(vec![principal("a@b.com", None, Role::Admin)]);

        let err = verify_login(&store, "a@b.com", "anything").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_fails_closed_on_malformed_digest() {
        let store = store_with(vec![principal(
            "a@b.com",
            Some("plaintext-left-by-an-old-import".into()),
            Role::User,
        )]);

        let err = verify_login(&store, "a@b.com", "anything").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn reset_password_swaps_which_plaintext_verifies() {
        let old_digest = password::hash_password("Old!23").unwrap();
        let store = store_with(vec![principal("a@b.com", Some(old_digest), Role::Admin)]);

        reset_password(&store, "a@b.com", "New!45")
            .await
            .expect("reset should succeed");

        assert!(verify_login(&store, "a@b.com", "Old!23").await.is_err());
        assert!(verify_login(&store, "a@b.com", "New!45").await.is_ok());
    }

    #[tokio::test]
    async fn reset_password_for_unknown_email_is_not_found_and_writes_nothing() {
        let store = store_with(vec![]);

        let err = reset_password(&store, "ghost@b.com", "New!45").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
        assert!(store.find_by_email("ghost@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_verifications_are_consistent() {
        let digest = password::hash_password("Sh@red-digest-1").unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let digest = digest.clone();
            let plain = if i % 2 == 0 { "Sh@red-digest-1" } else { "nope" };
            tasks.push(tokio::spawn(async move {
                verify_password(plain.to_string(), digest).await.unwrap()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            let matched = task.await.expect("task should not panic");
            assert_eq!(matched, i % 2 == 0);
        }
    }
}
