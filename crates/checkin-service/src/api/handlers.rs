//! 打卡与积分接口

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use tracing::instrument;
use validator::Validate;

use super::auth::AuthUser;
use super::dto::{CheckinView, CreateCheckinRequest, CreateCheckinResponse, LimitQuery, SignInResponse};
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::models::{ContentCheckinCount, User};
use crate::service::{CheckinCommand, PointSummary, ReconciliationReport};

/// 登录
///
/// POST /auth/signin
///
/// 首次登录时创建用户并返回 201，之后返回 200
#[instrument(skip(state), fields(external_id = %auth.external_id))]
pub async fn sign_in(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<(StatusCode, Json<SignInResponse>)> {
    let (user, created) = state.identity.sign_in(&auth.external_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SignInResponse { user, created })))
}

/// 当前用户
///
/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    let user = state
        .identity
        .get_user(&auth.external_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("用户不存在: {}", auth.external_id)))?;
    Ok(Json(user))
}

/// 打卡
///
/// POST /checkins
#[instrument(skip(state, payload), fields(external_id = %auth.external_id))]
pub async fn create_checkin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateCheckinRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateCheckinResponse>)> {
    let Json(req) = payload?;
    req.validate()?;

    let user_id = state.identity.resolve_user(&auth.external_id).await?;
    let result = state
        .checkin_service
        .record_checkin(CheckinCommand::new(user_id, req.place_id))
        .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// 打卡历史
///
/// GET /checkins?limit=
pub async fn list_checkins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CheckinView>>> {
    let Query(query) = query?;
    let user_id = state.identity.resolve_user(&auth.external_id).await?;
    let records = state.query_service.list_checkins(user_id, query.limit).await?;
    Ok(Json(records.into_iter().map(CheckinView::from).collect()))
}

/// 按作品统计的打卡次数
///
/// GET /checkins/contents
pub async fn content_checkin_counts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ContentCheckinCount>>> {
    let user_id = state.identity.resolve_user(&auth.external_id).await?;
    Ok(Json(state.query_service.content_checkin_counts(user_id).await?))
}

/// 积分余额与最近流水
///
/// GET /points?limit=
pub async fn get_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<PointSummary>> {
    let Query(query) = query?;
    let user_id = state.identity.resolve_user(&auth.external_id).await?;
    Ok(Json(state.query_service.point_summary(user_id, query.limit).await?))
}

/// 余额对账
///
/// GET /points/reconciliation
pub async fn reconcile_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<ReconciliationReport>> {
    let user_id = state.identity.resolve_user(&auth.external_id).await?;
    Ok(Json(state.query_service.reconcile(user_id).await?))
}
