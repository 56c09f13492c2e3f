use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicPrincipal, RefreshRequest, ResetPasswordRequest,
            ResetPasswordResponse,
        },
        error::AuthError,
        extractors::{AdminUser, AuthUser},
        services::{self, JwtKeys},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/principals/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (axum::http::StatusCode, String)> {
    // The email is the lookup key and is used verbatim (case-sensitive);
    // only its shape is checked here.
    if !services::is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((axum::http::StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let principal =
        match services::verify_login(state.store.as_ref(), &payload.email, &payload.password).await
        {
            Ok(p) => p,
            Err(e) => {
                match &e {
                    AuthError::InvalidCredentials => {
                        warn!(email = %payload.email, "login rejected")
                    }
                    other => error!(error = %other, "login failed"),
                }
                return Err((e.status(), e.public_message().to_string()));
            }
        };

    let keys = JwtKeys::from_ref(&state);
    let access_token = match keys.sign_access(&principal) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign access failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };
    let refresh_token = match keys.sign_refresh(&principal) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign refresh failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(principal_id = %principal.id, email = %principal.email, "principal logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        principal: PublicPrincipal::from(&principal),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (axum::http::StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (axum::http::StatusCode::UNAUTHORIZED, format!("{}", e)))?;

    // Reload so a role change or deletion since sign time takes effect.
    let principal = match state.store.find_by_email(&claims.email).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            warn!(principal_id = %claims.sub, "refresh for vanished principal");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Principal not found".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((e.status(), e.public_message().to_string()));
        }
    };

    let access_token = keys
        .sign_access(&principal)
        .map_err(|e| (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let refresh_token = keys
        .sign_refresh(&principal)
        .map_err(|e| (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        principal: PublicPrincipal::from(&principal),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicPrincipal>, (axum::http::StatusCode, String)> {
    let principal = match state.store.find_by_email(&claims.email).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            warn!(principal_id = %claims.sub, "token for vanished principal");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Principal not found".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((e.status(), e.public_message().to_string()));
        }
    };

    Ok(Json(PublicPrincipal::from(&principal)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, (axum::http::StatusCode, String)> {
    // No strength policy is enforced beyond non-emptiness.
    if payload.new_password.is_empty() {
        warn!("reset with empty password");
        return Err((
            axum::http::StatusCode::BAD_REQUEST,
            "Password must not be empty".into(),
        ));
    }

    match services::reset_password(state.store.as_ref(), &payload.email, &payload.new_password)
        .await
    {
        Ok(()) => {
            info!(admin = %admin.email, email = %payload.email, "password reset by admin");
            Ok(Json(ResetPasswordResponse {
                email: payload.email,
                updated: true,
            }))
        }
        Err(e) => {
            match &e {
                AuthError::NotFound => warn!(email = %payload.email, "reset for unknown email"),
                other => error!(error = %other, "reset failed"),
            }
            Err((e.status(), e.public_message().to_string()))
        }
    }
}

#[cfg(test)]
mod handler_tests {
    use super::*;
    use crate::auth::password;
    use crate::auth::repo::MemoryPrincipalStore;
    use crate::auth::repo_types::{Principal, Role};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn seeded_state(principals: Vec<Principal>) -> AppState {
        let store = MemoryPrincipalStore::new();
        for p in principals {
            store.insert(p);
        }
        let fake = AppState::fake();
        AppState::from_parts(fake.db.clone(), Arc::new(store), fake.config.clone())
    }

    fn principal(email: &str, plain: &str, role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: email.into(),
            name: "Test Principal".into(),
            password_hash: Some(password::hash_password(plain).unwrap()),
            role,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn login_issues_tokens_for_valid_credentials() {
        let state = seeded_state(vec![principal("admin@shop.example", "Adm1n!pass", Role::Admin)]);

        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "admin@shop.example".into(),
                password: "Adm1n!pass".into(),
            }),
        )
        .await
        .expect("login should succeed");

        assert!(!response.access_token.is_empty());
        assert!(!response.refresh_token.is_empty());
        assert_eq!(response.principal.role, Role::Admin);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&response.access_token).expect("token verifies");
        assert_eq!(claims.email, "admin@shop.example");
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_collapses_unknown_email_and_wrong_password() {
        let state = seeded_state(vec![principal("admin@shop.example", "Adm1n!pass", Role::Admin)]);

        let unknown = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ghost@shop.example".into(),
                password: "Adm1n!pass".into(),
            }),
        )
        .await
        .unwrap_err();

        let wrong = login(
            State(state),
            Json(LoginRequest {
                email: "admin@shop.example".into(),
                password: "wrong".into(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, wrong);
    }

    #[tokio::test]
    async fn login_is_case_sensitive_on_email() {
        let state = seeded_state(vec![principal("Admin@shop.example", "Adm1n!pass", Role::Admin)]);

        let err = login(
            State(state),
            Json(LoginRequest {
                email: "admin@shop.example".into(),
                password: "Adm1n!pass".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reset_password_updates_the_stored_digest() {
        let state = seeded_state(vec![
            principal("admin@shop.example", "Adm1n!pass", Role::Admin),
            principal("editor@shop.example", "Old!23", Role::User),
        ]);
        let keys = JwtKeys::from_ref(&state);
        let admin_claims = {
            let admin = state
                .store
                .find_by_email("admin@shop.example")
                .await
                .unwrap()
                .unwrap();
            let token = keys.sign_access(&admin).unwrap();
            keys.verify(&token).unwrap()
        };

        let response = reset_password(
            State(state.clone()),
            AdminUser(admin_claims),
            Json(ResetPasswordRequest {
                email: "editor@shop.example".into(),
                new_password: "New!45".into(),
            }),
        )
        .await
        .expect("reset should succeed");
        assert!(response.updated);

        assert!(
            services::verify_login(state.store.as_ref(), "editor@shop.example", "Old!23")
                .await
                .is_err()
        );
        assert!(
            services::verify_login(state.store.as_ref(), "editor@shop.example", "New!45")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn reset_password_for_unknown_email_is_404() {
        let state = seeded_state(vec![principal("admin@shop.example", "Adm1n!pass", Role::Admin)]);
        let keys = JwtKeys::from_ref(&state);
        let admin = state
            .store
            .find_by_email("admin@shop.example")
            .await
            .unwrap()
            .unwrap();
        let token = keys.sign_access(&admin).unwrap();
        let claims = keys.verify(&token).unwrap();

        let err = reset_password(
            State(state),
            AdminUser(claims),
            Json(ResetPasswordRequest {
                email: "ghost@shop.example".into(),
                new_password: "New!45".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
