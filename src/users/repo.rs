use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the store. The two maps are open-ended, keyed by topic;
/// they always deserialize to a map, empty until first write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub progress: Json<HashMap<String, f64>>,
    pub assignments: Json<HashMap<String, bool>>,
    pub created_at: OffsetDateTime,
}

/// Profile fields accepted by a partial update. `None` leaves the stored
/// value untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, first_name, last_name, \
                            gender, phone, profile_picture, progress, assignments, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    /// Partial update: COALESCE keeps the stored value wherever the caller
    /// passed None. Returns false when the id resolves to no record.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   gender = COALESCE($4, gender),
                   phone = COALESCE($5, phone),
                   profile_picture = COALESCE($6, profile_picture)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.gender.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.profile_picture.as_deref())
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_profile_picture(
        db: &PgPool,
        id: Uuid,
        key: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET profile_picture = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert one (topic, score) entry. A single-statement jsonb merge keeps
    /// the read-modify-write atomic per document; last write wins.
    pub async fn set_progress(
        db: &PgPool,
        id: Uuid,
        topic: &str,
        score: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET progress = progress || jsonb_build_object($2::text, $3::double precision)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(topic)
        .bind(score)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a topic's assignment complete. One-directional: this can only
    /// ever write `true`.
    pub async fn set_assignment_complete(
        db: &PgPool,
        id: Uuid,
        topic: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET assignments = assignments || jsonb_build_object($2::text, true)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(topic)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch both maps in one round trip.
    pub async fn progress_maps(
        db: &PgPool,
        id: Uuid,
    ) -> Result<Option<(HashMap<String, f64>, HashMap<String, bool>)>, sqlx::Error> {
        let row = sqlx::query_as::<_, (Json<HashMap<String, f64>>, Json<HashMap<String, bool>>)>(
            "SELECT progress, assignments FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|(progress, assignments)| (progress.0, assignments.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serialization_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: None,
            last_name: None,
            gender: None,
            phone: None,
            profile_picture: None,
            progress: Json(HashMap::new()),
            assignments: Json(HashMap::new()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("ada@example.com"));
    }

    #[sqlx::test]
    async fn duplicate_email_cannot_create_second_record(pool: PgPool) {
        User::create(&pool, "Ada", "ada@example.com", "hash-one")
            .await
            .expect("first create");
        let err = User::create(&pool, "Imposter", "ada@example.com", "hash-two")
            .await
            .expect_err("second create must fail");
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("expected unique violation, got {other:?}"),
        }
        let user = User::find_by_email(&pool, "ada@example.com")
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(user.name, "Ada");
    }

    #[sqlx::test]
    async fn progress_upsert_overwrites_not_merges(pool: PgPool) {
        let user = User::create(&pool, "Ada", "ada@example.com", "hash")
            .await
            .expect("create");

        assert!(User::set_progress(&pool, user.id, "algebra", 90.0)
            .await
            .expect("first write"));
        let (quizzes, _) = User::progress_maps(&pool, user.id)
            .await
            .expect("maps")
            .expect("record exists");
        assert_eq!(quizzes.get("algebra"), Some(&90.0));

        assert!(User::set_progress(&pool, user.id, "algebra", 95.0)
            .await
            .expect("second write"));
        let (quizzes, _) = User::progress_maps(&pool, user.id)
            .await
            .expect("maps")
            .expect("record exists");
        assert_eq!(quizzes.get("algebra"), Some(&95.0));
        assert_eq!(quizzes.len(), 1);
    }

    #[sqlx::test]
    async fn assignment_flag_is_idempotent(pool: PgPool) {
        let user = User::create(&pool, "Ada", "ada@example.com", "hash")
            .await
            .expect("create");

        assert!(User::set_assignment_complete(&pool, user.id, "quiz1")
            .await
            .expect("first write"));
        assert!(User::set_assignment_complete(&pool, user.id, "quiz1")
            .await
            .expect("repeat write"));

        let (quizzes, assignments) = User::progress_maps(&pool, user.id)
            .await
            .expect("maps")
            .expect("record exists");
        assert_eq!(assignments.get("quiz1"), Some(&true));
        assert_eq!(assignments.len(), 1);
        assert!(quizzes.is_empty());
    }

    #[sqlx::test]
    async fn partial_update_preserves_unset_fields(pool: PgPool) {
        let user = User::create(&pool, "Ada", "ada@example.com", "hash")
            .await
            .expect("create");

        User::update_profile(
            &pool,
            user.id,
            &ProfileUpdate {
                last_name: Some("B".into()),
                ..Default::default()
            },
        )
        .await
        .expect("set last name");

        User::update_profile(
            &pool,
            user.id,
            &ProfileUpdate {
                first_name: Some("A".into()),
                ..Default::default()
            },
        )
        .await
        .expect("set first name");

        let user = User::find_by_id(&pool, user.id)
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(user.first_name.as_deref(), Some("A"));
        assert_eq!(user.last_name.as_deref(), Some("B"));
    }

    #[sqlx::test]
    async fn writes_to_unknown_user_affect_nothing(pool: PgPool) {
        assert!(!User::set_progress(&pool, Uuid::new_v4(), "algebra", 1.0)
            .await
            .expect("query runs"));
        assert!(!User::set_assignment_complete(&pool, Uuid::new_v4(), "quiz1")
            .await
            .expect("query runs"));
    }

    #[test]
    fn empty_maps_render_as_objects() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            gender: None,
            phone: None,
            profile_picture: None,
            progress: Json(HashMap::new()),
            assignments: Json(HashMap::new()),
            created_at: OffsetDateTime::now_utc(),
        };
        let value: serde_json::Value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["progress"], serde_json::json!({}));
        assert_eq!(value["assignments"], serde_json::json!({}));
    }
}
