//! Environment row and its mapping to the domain document.

use sqlx::types::Json;
use sqlx::FromRow;

use seco_core::round::{RcrCandidate, Round};
use seco_core::status::EnvironmentStatus;
use seco_core::types::{DbId, Timestamp};
use seco_core::{CoreError, Environment, MiningSpec};

/// A row from the `environments` table. Structured payloads live in JSONB
/// columns; the status is stored as its string code.
#[derive(Debug, Clone, FromRow)]
pub struct EnvironmentRow {
    pub id: DbId,
    pub name: String,
    pub owner_id: DbId,
    pub status: String,
    pub mining: Json<MiningSpec>,
    pub mining_data: Option<serde_json::Value>,
    pub topic_data: Option<serde_json::Value>,
    pub definition_data: Json<Round>,
    pub priority_data: Option<Json<Round>>,
    pub final_rcr: Option<Json<RcrCandidate>>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EnvironmentRow {
    /// Convert to the domain document. Fails on a status code the current
    /// build does not know, which indicates a schema/code mismatch.
    pub fn into_domain(self) -> Result<Environment, CoreError> {
        let status = EnvironmentStatus::parse(&self.status).ok_or_else(|| {
            CoreError::Storage(format!(
                "environment {} has unknown status {:?}",
                self.id, self.status
            ))
        })?;
        Ok(Environment {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            mining: self.mining.0,
            mining_data: self.mining_data,
            topic_data: self.topic_data,
            definition_round: self.definition_data.0,
            priority_round: self.priority_data.map(|j| j.0),
            final_rcr: self.final_rcr.map(|j| j.0),
            status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use seco_core::environment::{MiningFilters, MiningType};
    use seco_core::status::RoundKind;

    fn row(status: &str) -> EnvironmentRow {
        EnvironmentRow {
            id: 7,
            name: "dep-upgrades".into(),
            owner_id: 3,
            status: status.into(),
            mining: Json(MiningSpec {
                mining_type: MiningType::Repos,
                organization_name: None,
                repos: vec!["acme/widgets".into()],
                details: "issue mining".into(),
                filters: MiningFilters::default(),
            }),
            mining_data: None,
            topic_data: None,
            definition_data: Json(Round::new(RoundKind::Definition)),
            priority_data: None,
            final_rcr: None,
            version: 4,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_domain() {
        let env = row("topics_done").into_domain().unwrap();
        assert_eq!(env.id, 7);
        assert_eq!(env.status, EnvironmentStatus::TopicsDone);
        assert_eq!(env.version, 4);
        assert!(env.priority_round.is_none());
    }

    #[test]
    fn unknown_status_is_a_storage_error() {
        let err = row("paused").into_domain().unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
