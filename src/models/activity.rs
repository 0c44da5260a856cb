use log::info;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::signup::{self, ParentColumn, Signup};
use crate::error::{Error, Result};
use crate::naming;
use crate::orm::{Db, Model};

pub const TABLE: &str = "activities";

/// A camp activity. Name and difficulty carry no validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, FromRow)]
pub struct Activity {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    name: Option<String>,
    difficulty: Option<i64>,
}

impl Activity {
    pub fn new(name: impl Into<String>, difficulty: i64) -> Self {
        Activity {
            id: None,
            name: Some(name.into()),
            difficulty: Some(difficulty),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn difficulty(&self) -> Option<i64> {
        self.difficulty
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn set_difficulty(&mut self, difficulty: i64) {
        self.difficulty = Some(difficulty);
    }

    /// Insert when unsaved (assigning the id), update otherwise.
    pub async fn save(&mut self, db: &Db) -> Result<()> {
        match self.id {
            None => {
                let sql = "INSERT INTO activities (name, difficulty) VALUES (?, ?)";
                db.trace(sql);
                let id = sqlx::query(sql)
                    .bind(&self.name)
                    .bind(self.difficulty)
                    .execute(db.pool())
                    .await?
                    .last_insert_rowid();
                self.id = Some(id);
                info!("Created activity {}", id);
            }
            Some(id) => {
                let sql = "UPDATE activities SET name = ?, difficulty = ? WHERE id = ?";
                db.trace(sql);
                let affected = sqlx::query(sql)
                    .bind(&self.name)
                    .bind(self.difficulty)
                    .bind(id)
                    .execute(db.pool())
                    .await?
                    .rows_affected();
                if affected == 0 {
                    return Err(Error::NotFound { table: TABLE, id });
                }
            }
        }
        Ok(())
    }

    pub async fn find(db: &Db, id: i64) -> Result<Option<Activity>> {
        let sql = "SELECT id, name, difficulty FROM activities WHERE id = ?";
        db.trace(sql);
        let activity = sqlx::query_as(sql).bind(id).fetch_optional(db.pool()).await?;
        Ok(activity)
    }

    pub async fn get(db: &Db, id: i64) -> Result<Activity> {
        Self::find(db, id)
            .await?
            .ok_or(Error::NotFound { table: TABLE, id })
    }

    pub async fn all(db: &Db) -> Result<Vec<Activity>> {
        let activities = db
            .fetch_all("SELECT id, name, difficulty FROM activities ORDER BY id")
            .await?;
        Ok(activities)
    }

    /// Delete the activity together with every signup referencing it, in
    /// one transaction. Returns the ids of the removed signups.
    pub async fn delete(db: &Db, id: i64) -> Result<Vec<i64>> {
        let mut tx = db.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM activities WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound { table: TABLE, id });
        }

        let removed = signup::delete_for_parent(&mut tx, ParentColumn::Activity, id).await?;
        sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            "Deleted activity {} and {} dependent signup(s)",
            id,
            removed.len()
        );
        Ok(removed)
    }

    /// Signups referencing this activity. Empty while unsaved.
    pub async fn signups(&self, db: &Db) -> Result<Vec<Signup>> {
        match self.id {
            Some(id) => Signup::for_parent(db, ParentColumn::Activity, id).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Model for Activity {
    fn table_name() -> &'static str {
        TABLE
    }

    fn create_table_sql() -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS activities (
    id INTEGER NOT NULL,
    name TEXT,
    difficulty INTEGER,
    CONSTRAINT {pk} PRIMARY KEY (id)
)",
            pk = naming::primary_key(TABLE),
        )
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "INTEGER".into()),
            ("name".into(), "TEXT".into()),
            ("difficulty".into(), "INTEGER".into()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateActivityRequest {
    pub name: Option<String>,
    pub difficulty: Option<i64>,
}

impl CreateActivityRequest {
    pub fn into_activity(self) -> Activity {
        Activity {
            id: None,
            name: self.name,
            difficulty: self.difficulty,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateActivityRequest {
    pub name: Option<String>,
    pub difficulty: Option<i64>,
}

impl UpdateActivityRequest {
    pub fn apply(self, activity: &mut Activity) {
        if let Some(name) = self.name {
            activity.set_name(name);
        }
        if let Some(difficulty) = self.difficulty {
            activity.set_difficulty(difficulty);
        }
    }
}
