//! 路由配置

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::auth::auth_middleware;
use super::handlers;
use super::state::AppState;

/// 需要认证的业务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(handlers::sign_in))
        .route("/users/me", get(handlers::get_me))
        .route(
            "/checkins",
            post(handlers::create_checkin).get(handlers::list_checkins),
        )
        .route("/checkins/contents", get(handlers::content_checkin_counts))
        .route("/points", get(handlers::get_points))
        .route("/points/reconciliation", get(handlers::reconcile_points))
}

/// 构建带认证的完整路由
pub fn build_router(state: AppState) -> Router {
    api_routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::api::auth::{AuthUser, MockTokenVerifier};
    use crate::error::CheckinError;
    use crate::models::User;
    use crate::repository::MockIdentityResolver;
    use crate::service::{CheckinService, LedgerQueryService, PointPolicy};
    use crate::test_utils::InMemoryLedger;

    fn state_with(identity: MockIdentityResolver, ledger: InMemoryLedger) -> AppState {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|token| {
            if token == "good" {
                Ok(AuthUser {
                    external_id: "ext-1".into(),
                })
            } else {
                Err(CheckinError::Unauthorized("无效的 Token".into()))
            }
        });

        let ledger = Arc::new(ledger);
        AppState::new(
            Arc::new(CheckinService::new(
                ledger.clone(),
                ledger.clone(),
                PointPolicy::default(),
                Duration::from_secs(5),
            )),
            Arc::new(LedgerQueryService::new(ledger, 100)),
            Arc::new(identity),
            Arc::new(verifier),
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_returns_401() {
        let app = build_router(state_with(MockIdentityResolver::new(), InMemoryLedger::new()));
        let response = app
            .oneshot(Request::get("/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_token_returns_401() {
        let app = build_router(state_with(MockIdentityResolver::new(), InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::get("/users/me")
                    .header(header::AUTHORIZATION, "Bearer bad")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_in_created_returns_201() {
        let mut identity = MockIdentityResolver::new();
        identity.expect_sign_in().times(1).returning(|external_id| {
            Ok((
                User {
                    id: 1,
                    external_id: external_id.to_string(),
                    created_at: Utc::now(),
                },
                true,
            ))
        });

        let app = build_router(state_with(identity, InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::post("/auth/signin")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["created"], true);
        assert_eq!(json["user"]["external_id"], "ext-1");
    }

    #[tokio::test]
    async fn test_get_me_unknown_user_returns_404() {
        let mut identity = MockIdentityResolver::new();
        identity.expect_get_user().returning(|_| Ok(None));

        let app = build_router(state_with(identity, InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::get("/users/me")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_checkin_rejects_non_positive_place_id() {
        let mut identity = MockIdentityResolver::new();
        identity.expect_resolve_user().never();

        let app = build_router(state_with(identity, InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::post("/checkins")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"place_id":0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_checkin_rejects_malformed_json() {
        let app = build_router(state_with(MockIdentityResolver::new(), InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::post("/checkins")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkin_success_returns_award() {
        let ledger = InMemoryLedger::new();
        let user_id = ledger.add_user("ext-1");
        let place_id = ledger.add_place("鎌倉高校前駅");

        let mut identity = MockIdentityResolver::new();
        identity
            .expect_resolve_user()
            .returning(move |_| Ok(user_id));

        let app = build_router(state_with(identity, ledger.clone()));
        let response = app
            .oneshot(
                Request::post("/checkins")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"place_id":{place_id}}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["points_earned"], 600);
        assert_eq!(json["stamp_id"], 1);
        assert_eq!(json["total_points"], 600);
        assert_eq!(ledger.balance_of(user_id), Some(600));
    }
}
