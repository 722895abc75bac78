//! User account row.

use sqlx::FromRow;

use seco_core::store::UserAccount;
use seco_core::types::DbId;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub status: String,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        UserAccount {
            id: row.id,
            name: row.name,
            email: row.email,
            status: row.status,
        }
    }
}
