//! 圣地巡礼打卡服务
//!
//! 用户在作品关联的现实地点打卡，按访问历史发放积分和印章，
//! 积分以只追加的流水加单行余额的形式记账。
//!
//! # 模块
//!
//! - `models`: 用户、地点、打卡记录、积分余额与流水
//! - `repository`: PostgreSQL 数据访问与账本事务
//! - `service`: 奖励计算、打卡编排与只读查询
//! - `api`: HTTP 接口、令牌认证与错误映射
//!
//! # 技术栈
//!
//! - axum: HTTP 框架
//! - sqlx: PostgreSQL
//! - jsonwebtoken: 身份令牌校验

pub mod api;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod test_utils;

pub use error::{CheckinError, Result};
pub use service::{CheckinCommand, CheckinResult, CheckinService, LedgerQueryService};

/// 编译期嵌入的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
