//! 应用状态

use std::sync::Arc;

use seichi_shared::config::AppConfig;
use sqlx::PgPool;

use super::auth::{JwtTokenVerifier, TokenVerifier};
use crate::repository::{IdentityResolver, PgLedgerStore, PlaceRepository, UserRepository};
use crate::service::{CheckinService, LedgerQueryService};

/// 各 handler 共享的状态
#[derive(Clone)]
pub struct AppState {
    pub checkin_service: Arc<CheckinService>,
    pub query_service: Arc<LedgerQueryService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(
        checkin_service: Arc<CheckinService>,
        query_service: Arc<LedgerQueryService>,
        identity: Arc<dyn IdentityResolver>,
        token_verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            checkin_service,
            query_service,
            identity,
            token_verifier,
        }
    }

    /// 基于 PostgreSQL 连接池装配全部依赖
    pub fn from_pool(pool: PgPool, config: &AppConfig) -> Self {
        let ledger = Arc::new(PgLedgerStore::new(pool.clone()));
        let places = Arc::new(PlaceRepository::new(pool.clone()));
        let users = Arc::new(UserRepository::new(pool));

        let checkin_service = Arc::new(CheckinService::from_config(
            ledger.clone(),
            places,
            &config.checkin,
        ));
        let query_service = Arc::new(LedgerQueryService::new(
            ledger,
            config.checkin.history_limit,
        ));

        Self::new(
            checkin_service,
            query_service,
            users,
            Arc::new(JwtTokenVerifier::new(&config.auth)),
        )
    }
}
