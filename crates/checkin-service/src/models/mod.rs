//! 打卡服务领域模型

pub mod checkin;
pub mod enums;
pub mod place;
pub mod point;
pub mod user;

pub use checkin::{CheckinRecord, NewCheckin};
pub use enums::Stamp;
pub use place::{ContentCheckinCount, Place};
pub use point::{CHECKIN_REASON, NewPointHistory, PointBalance, PointHistoryEntry};
pub use user::User;
