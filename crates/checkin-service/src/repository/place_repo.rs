//! 地点仓储
//!
//! 只读访问外部登记的地点目录

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::PlaceCatalog;
use crate::error::Result;
use crate::models::Place;

pub struct PlaceRepository {
    pool: PgPool,
}

impl PlaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceCatalog for PlaceRepository {
    async fn place_exists(&self, place_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM places WHERE id = $1)")
            .bind(place_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn get_place(&self, place_id: i64) -> Result<Option<Place>> {
        let place = sqlx::query_as::<_, Place>(
            "SELECT id, content_id, name, address, created_at FROM places WHERE id = $1",
        )
        .bind(place_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(place)
    }
}
