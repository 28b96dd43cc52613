//! 用户仓储
//!
//! 基于 PostgreSQL 的身份解析实现

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::traits::IdentityResolver;
use crate::error::{CheckinError, Result};
use crate::models::User;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, external_id, created_at FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 插入用户，已存在时不做任何修改
    ///
    /// 返回是否实际插入了新行
    async fn insert_if_absent(&self, external_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (external_id, created_at)
            VALUES ($1, NOW())
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl IdentityResolver for UserRepository {
    async fn resolve_user(&self, external_id: &str) -> Result<i64> {
        self.find_by_external_id(external_id)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| CheckinError::UserNotFound(external_id.to_string()))
    }

    async fn sign_in(&self, external_id: &str) -> Result<(User, bool)> {
        if external_id.trim().is_empty() {
            return Err(CheckinError::Validation("外部身份标识不能为空".to_string()));
        }

        // 并发首次登录时只有一个请求会插入成功，其余请求读到同一行
        let created = self.insert_if_absent(external_id).await?;
        let user = self
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                CheckinError::InvariantViolation(format!(
                    "用户写入后无法读取: external_id={}",
                    external_id
                ))
            })?;

        if created {
            info!(user_id = user.id, "新用户已创建");
        }

        Ok((user, created))
    }

    async fn get_user(&self, external_id: &str) -> Result<Option<User>> {
        self.find_by_external_id(external_id).await
    }
}
