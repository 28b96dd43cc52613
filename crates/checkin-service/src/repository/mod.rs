//! 数据库仓储层
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 事务边界由服务层通过 [`LedgerStore::begin`] 决定
//! - 定义 trait 接口以支持替换存储和 mock 测试

mod checkin_repo;
mod ledger_store;
mod place_repo;
mod point_repo;
mod traits;
mod user_repo;

pub use checkin_repo::CheckinRepository;
pub use ledger_store::{PgLedgerStore, PgLedgerTransaction};
pub use place_repo::PlaceRepository;
pub use point_repo::PointRepository;
pub use traits::*;
pub use user_repo::UserRepository;
