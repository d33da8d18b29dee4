use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Named group referencing member users. No exposed endpoint reads or writes
/// membership; the store layer exists for collaborators that do.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Group {
    pub async fn create(
        db: &PgPool,
        name: &str,
        description: Option<&str>,
    ) -> Result<Group, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, members, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_name(db: &PgPool, name: &str) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            "SELECT id, name, description, members, created_at FROM groups WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(db)
        .await
    }

    pub async fn add_member(db: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE groups
               SET members = array_append(members, $2)
             WHERE id = $1 AND NOT ($2 = ANY(members))
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_serialization() {
        let member = Uuid::new_v4();
        let group = Group {
            id: Uuid::new_v4(),
            name: "algebra-cohort".into(),
            description: None,
            members: vec![member],
            created_at: OffsetDateTime::now_utc(),
        };
        let value: serde_json::Value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["name"], "algebra-cohort");
        assert_eq!(value["members"][0], member.to_string());
        assert!(value["description"].is_null());
    }
}
