use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection};

use super::activity::{self, Activity};
use super::camper::{self, Camper};
use crate::error::{Error, Result, ValidationError, invalid_column};
use crate::naming;
use crate::orm::{Db, Model};

pub const TABLE: &str = "signups";

const TIME_MESSAGE: &str = "Signup must have a time between 0 and 23.";

/// Rejects an absent time, zero, or anything outside `0..=23`.
///
/// Hour 0 is indistinguishable from "absent" under this rule, so midnight
/// signups are refused.
pub fn validate_time(time: Option<i64>) -> Result<i64, ValidationError> {
    match time {
        Some(time) if time != 0 && (0..=23).contains(&time) => Ok(time),
        _ => Err(ValidationError::new("time", TIME_MESSAGE)),
    }
}

/// Foreign-key column of a signup pointing at an owning parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentColumn {
    Camper,
    Activity,
}

impl ParentColumn {
    pub fn column(self) -> &'static str {
        match self {
            ParentColumn::Camper => "camper_id",
            ParentColumn::Activity => "activity_id",
        }
    }
}

/// A camper's signup for an activity at a given hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signup {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    time: i64,
    camper_id: Option<i64>,
    activity_id: Option<i64>,
}

impl<'r> FromRow<'r, SqliteRow> for Signup {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let time: Option<i64> = row.try_get("time")?;
        Ok(Signup {
            id: row.try_get("id")?,
            time: validate_time(time).map_err(|e| invalid_column("time", e))?,
            camper_id: row.try_get("camper_id")?,
            activity_id: row.try_get("activity_id")?,
        })
    }
}

impl Signup {
    pub fn new(time: i64, camper_id: i64, activity_id: i64) -> Result<Self, ValidationError> {
        Ok(Signup {
            id: None,
            time: validate_time(Some(time))?,
            camper_id: Some(camper_id),
            activity_id: Some(activity_id),
        })
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn camper_id(&self) -> Option<i64> {
        self.camper_id
    }

    pub fn activity_id(&self) -> Option<i64> {
        self.activity_id
    }

    pub fn set_time(&mut self, time: i64) -> Result<(), ValidationError> {
        self.time = validate_time(Some(time))?;
        Ok(())
    }

    pub fn set_camper_id(&mut self, camper_id: Option<i64>) {
        self.camper_id = camper_id;
    }

    pub fn set_activity_id(&mut self, activity_id: Option<i64>) {
        self.activity_id = activity_id;
    }

    /// Both parents must be assigned; whether they exist is left to the
    /// foreign-key constraints.
    pub async fn save(&mut self, db: &Db) -> Result<()> {
        let (Some(camper_id), Some(activity_id)) = (self.camper_id, self.activity_id) else {
            return Err(Error::Integrity(
                "signup must reference both a camper and an activity".to_string(),
            ));
        };
        match self.id {
            None => {
                let sql = "INSERT INTO signups (time, camper_id, activity_id) VALUES (?, ?, ?)";
                db.trace(sql);
                let id = sqlx::query(sql)
                    .bind(self.time)
                    .bind(camper_id)
                    .bind(activity_id)
                    .execute(db.pool())
                    .await?
                    .last_insert_rowid();
                self.id = Some(id);
                info!(
                    "Created signup {} (camper {}, activity {})",
                    id, camper_id, activity_id
                );
            }
            Some(id) => {
                let sql = "UPDATE signups SET time = ?, camper_id = ?, activity_id = ? WHERE id = ?";
                db.trace(sql);
                let affected = sqlx::query(sql)
                    .bind(self.time)
                    .bind(camper_id)
                    .bind(activity_id)
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

    pub async fn find(db: &Db, id: i64) -> Result<Option<Signup>> {
        let sql = "SELECT id, time, camper_id, activity_id FROM signups WHERE id = ?";
        db.trace(sql);
        let signup = sqlx::query_as(sql).bind(id).fetch_optional(db.pool()).await?;
        Ok(signup)
    }

    pub async fn get(db: &Db, id: i64) -> Result<Signup> {
        Self::find(db, id)
            .await?
            .ok_or(Error::NotFound { table: TABLE, id })
    }

    pub async fn all(db: &Db) -> Result<Vec<Signup>> {
        let signups = db
            .fetch_all("SELECT id, time, camper_id, activity_id FROM signups ORDER BY id")
            .await?;
        Ok(signups)
    }

    pub async fn delete(db: &Db, id: i64) -> Result<()> {
        let sql = "DELETE FROM signups WHERE id = ?";
        db.trace(sql);
        let affected = sqlx::query(sql)
            .bind(id)
            .execute(db.pool())
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(Error::NotFound { table: TABLE, id });
        }
        info!("Deleted signup {}", id);
        Ok(())
    }

    /// Signups whose `parent` column equals `parent_id`, oldest first.
    pub async fn for_parent(db: &Db, parent: ParentColumn, parent_id: i64) -> Result<Vec<Signup>> {
        let sql = format!(
            "SELECT id, time, camper_id, activity_id FROM signups WHERE {} = ? ORDER BY id",
            parent.column()
        );
        db.trace(&sql);
        let signups = sqlx::query_as(&sql)
            .bind(parent_id)
            .fetch_all(db.pool())
            .await?;
        Ok(signups)
    }

    pub async fn camper(&self, db: &Db) -> Result<Option<Camper>> {
        match self.camper_id {
            Some(id) => Camper::find(db, id).await,
            None => Ok(None),
        }
    }

    pub async fn activity(&self, db: &Db) -> Result<Option<Activity>> {
        match self.activity_id {
            Some(id) => Activity::find(db, id).await,
            None => Ok(None),
        }
    }
}

/// Cascade step of a parent delete: collect the dependent signup ids, then
/// remove them. Runs on the caller's transaction.
pub(crate) async fn delete_for_parent(
    conn: &mut SqliteConnection,
    parent: ParentColumn,
    parent_id: i64,
) -> Result<Vec<i64>> {
    let select = format!("SELECT id FROM signups WHERE {} = ?", parent.column());
    let ids: Vec<i64> = sqlx::query_scalar(&select)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    for &id in &ids {
        sqlx::query("DELETE FROM signups WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    debug!(
        "Cascade removed signups {:?} via {} = {}",
        ids,
        parent.column(),
        parent_id
    );
    Ok(ids)
}

#[async_trait::async_trait]
impl Model for Signup {
    fn table_name() -> &'static str {
        TABLE
    }

    fn create_table_sql() -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS signups (
    id INTEGER NOT NULL,
    time INTEGER,
    camper_id INTEGER,
    activity_id INTEGER,
    CONSTRAINT {pk} PRIMARY KEY (id),
    CONSTRAINT {fk_camper} FOREIGN KEY (camper_id) REFERENCES {campers} (id),
    CONSTRAINT {fk_activity} FOREIGN KEY (activity_id) REFERENCES {activities} (id)
);
CREATE INDEX IF NOT EXISTS {ix_camper} ON signups (camper_id);
CREATE INDEX IF NOT EXISTS {ix_activity} ON signups (activity_id)",
            pk = naming::primary_key(TABLE),
            fk_camper = naming::foreign_key(TABLE, "camper_id", camper::TABLE),
            fk_activity = naming::foreign_key(TABLE, "activity_id", activity::TABLE),
            campers = camper::TABLE,
            activities = activity::TABLE,
            ix_camper = naming::index(TABLE, "camper_id"),
            ix_activity = naming::index(TABLE, "activity_id"),
        )
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "INTEGER".into()),
            ("time".into(), "INTEGER".into()),
            ("camper_id".into(), "INTEGER".into()),
            ("activity_id".into(), "INTEGER".into()),
        ]
    }
}

/// Missing `time` fails validation; missing parents are caught on save.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSignupRequest {
    pub time: Option<i64>,
    pub camper_id: Option<i64>,
    pub activity_id: Option<i64>,
}

impl CreateSignupRequest {
    pub fn into_signup(self) -> Result<Signup, ValidationError> {
        Ok(Signup {
            id: None,
            time: validate_time(self.time)?,
            camper_id: self.camper_id,
            activity_id: self.activity_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSignupRequest {
    pub time: Option<i64>,
    pub camper_id: Option<i64>,
    pub activity_id: Option<i64>,
}

impl UpdateSignupRequest {
    /// Assigns the present fields. On rejection the signup is left as it was.
    pub fn apply(self, signup: &mut Signup) -> Result<(), ValidationError> {
        let mut updated = signup.clone();
        if let Some(time) = self.time {
            updated.set_time(time)?;
        }
        if self.camper_id.is_some() {
            updated.set_camper_id(self.camper_id);
        }
        if self.activity_id.is_some() {
            updated.set_activity_id(self.activity_id);
        }
        *signup = updated;
        Ok(())
    }
}
