//! 打卡服务枚举类型定义

use serde::{Deserialize, Serialize};

/// 印章
///
/// 里程碑打卡授予的印章。数据库与接口中以整数 id 存储：1 首次到访、2 第五次、3 第十次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Stamp {
    /// 首次到访该地点
    FirstVisit = 1,
    /// 第 5 次到访该地点
    FiveVisits = 2,
    /// 第 10 次到访该地点
    TenVisits = 3,
}

impl Stamp {
    /// 接口和存储使用的印章 id
    pub fn id(self) -> i32 {
        self as i32
    }

    /// 从印章 id 还原
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::FirstVisit),
            2 => Some(Self::FiveVisits),
            3 => Some(Self::TenVisits),
            _ => None,
        }
    }

    /// 用于日志和指标标签的名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstVisit => "first_visit",
            Self::FiveVisits => "five_visits",
            Self::TenVisits => "ten_visits",
        }
    }
}
