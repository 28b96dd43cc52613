//! 服务层
//!
//! - `eligibility`: 积分与印章计算（纯函数）
//! - `checkin_service`: 打卡编排，唯一的账本写入口
//! - `query_service`: 账本只读查询

pub mod checkin_service;
pub mod dto;
pub mod eligibility;
pub mod query_service;

pub use checkin_service::CheckinService;
pub use dto::*;
pub use eligibility::{Award, PointPolicy, VisitHistory};
pub use query_service::LedgerQueryService;
