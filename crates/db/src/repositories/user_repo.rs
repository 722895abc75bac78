//! Repository for the `users` table. The account registry itself is owned
//! elsewhere; this side only reads what the lifecycle checks need.

use sqlx::PgPool;

use seco_core::types::DbId;

use crate::models::UserRow;

const COLUMNS: &str = "id, name, email, status";

pub struct UserRepo;

impl UserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
