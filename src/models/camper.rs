use log::info;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::activity::Activity;
use super::signup::{self, ParentColumn, Signup};
use crate::error::{Error, Result, ValidationError, invalid_column};
use crate::naming;
use crate::orm::{Db, Model};

pub const TABLE: &str = "campers";

pub const MIN_AGE: i64 = 8;
pub const MAX_AGE: i64 = 18;

const NAME_MESSAGE: &str = "Camper must have a name longer than 0 characters.";
const AGE_MESSAGE: &str = "Camper must have an age between 8 and 18 years old.";

/// Rejects an absent or empty name.
pub fn validate_name(name: Option<&str>) -> Result<&str, ValidationError> {
    match name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ValidationError::new("name", NAME_MESSAGE)),
    }
}

/// Rejects an absent age, zero, or anything outside `MIN_AGE..=MAX_AGE`.
pub fn validate_age(age: Option<i64>) -> Result<i64, ValidationError> {
    match age {
        Some(age) if age != 0 && (MIN_AGE..=MAX_AGE).contains(&age) => Ok(age),
        _ => Err(ValidationError::new("age", AGE_MESSAGE)),
    }
}

/// A camper. `name` and `age` can only hold validated values, including
/// when loaded from rows written outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Camper {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    name: String,
    age: i64,
}

impl<'r> FromRow<'r, SqliteRow> for Camper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let name: Option<String> = row.try_get("name")?;
        let age: Option<i64> = row.try_get("age")?;
        validate_name(name.as_deref()).map_err(|e| invalid_column("name", e))?;
        let age = validate_age(age).map_err(|e| invalid_column("age", e))?;
        Ok(Camper {
            id: row.try_get("id")?,
            name: name.unwrap_or_default(),
            age,
        })
    }
}

impl Camper {
    pub fn new(name: impl Into<String>, age: i64) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name(Some(&name))?;
        let age = validate_age(Some(age))?;
        Ok(Camper { id: None, name, age })
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> i64 {
        self.age
    }

    /// Leaves the camper untouched when the name is rejected.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        let name = name.into();
        validate_name(Some(&name))?;
        self.name = name;
        Ok(())
    }

    /// Leaves the camper untouched when the age is rejected.
    pub fn set_age(&mut self, age: i64) -> Result<(), ValidationError> {
        self.age = validate_age(Some(age))?;
        Ok(())
    }

    pub async fn save(&mut self, db: &Db) -> Result<()> {
        match self.id {
            None => {
                let sql = "INSERT INTO campers (name, age) VALUES (?, ?)";
                db.trace(sql);
                let id = sqlx::query(sql)
                    .bind(&self.name)
                    .bind(self.age)
                    .execute(db.pool())
                    .await?
                    .last_insert_rowid();
                self.id = Some(id);
                info!("Created camper {}", id);
            }
            Some(id) => {
                let sql = "UPDATE campers SET name = ?, age = ? WHERE id = ?";
                db.trace(sql);
                let affected = sqlx::query(sql)
                    .bind(&self.name)
                    .bind(self.age)
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

    pub async fn find(db: &Db, id: i64) -> Result<Option<Camper>> {
        let sql = "SELECT id, name, age FROM campers WHERE id = ?";
        db.trace(sql);
        let camper = sqlx::query_as(sql).bind(id).fetch_optional(db.pool()).await?;
        Ok(camper)
    }

    pub async fn get(db: &Db, id: i64) -> Result<Camper> {
        Self::find(db, id)
            .await?
            .ok_or(Error::NotFound { table: TABLE, id })
    }

    pub async fn all(db: &Db) -> Result<Vec<Camper>> {
        let campers = db
            .fetch_all("SELECT id, name, age FROM campers ORDER BY id")
            .await?;
        Ok(campers)
    }

    /// Delete the camper and its signups atomically; returns the removed signup ids.
    pub async fn delete(db: &Db, id: i64) -> Result<Vec<i64>> {
        let mut tx = db.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM campers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound { table: TABLE, id });
        }

        let removed = signup::delete_for_parent(&mut tx, ParentColumn::Camper, id).await?;
        sqlx::query("DELETE FROM campers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            "Deleted camper {} and {} dependent signup(s)",
            id,
            removed.len()
        );
        Ok(removed)
    }

    pub async fn signups(&self, db: &Db) -> Result<Vec<Signup>> {
        match self.id {
            Some(id) => Signup::for_parent(db, ParentColumn::Camper, id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Activities reached through this camper's signups, one per signup in
    /// signup order. Computed from the signups table on every call.
    pub async fn activities(&self, db: &Db) -> Result<Vec<Activity>> {
        let Some(id) = self.id else {
            return Ok(Vec::new());
        };
        let sql = "SELECT a.id, a.name, a.difficulty
            FROM signups s
            JOIN activities a ON a.id = s.activity_id
            WHERE s.camper_id = ?
            ORDER BY s.id";
        db.trace(sql);
        let activities = sqlx::query_as(sql).bind(id).fetch_all(db.pool()).await?;
        Ok(activities)
    }
}

#[async_trait::async_trait]
impl Model for Camper {
    fn table_name() -> &'static str {
        TABLE
    }

    fn create_table_sql() -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS campers (
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    age INTEGER,
    CONSTRAINT {pk} PRIMARY KEY (id)
)",
            pk = naming::primary_key(TABLE),
        )
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "INTEGER".into()),
            ("name".into(), "TEXT NOT NULL".into()),
            ("age".into(), "INTEGER".into()),
        ]
    }
}

/// Missing fields count as absent and fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCamperRequest {
    pub name: Option<String>,
    pub age: Option<i64>,
}

impl CreateCamperRequest {
    pub fn into_camper(self) -> Result<Camper, ValidationError> {
        validate_name(self.name.as_deref())?;
        let age = validate_age(self.age)?;
        Ok(Camper {
            id: None,
            name: self.name.unwrap_or_default(),
            age,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCamperRequest {
    pub name: Option<String>,
    pub age: Option<i64>,
}

impl UpdateCamperRequest {
    /// Assigns the present fields. On any rejection the camper is left as it was.
    pub fn apply(self, camper: &mut Camper) -> Result<(), ValidationError> {
        let mut updated = camper.clone();
        if let Some(name) = self.name {
            updated.set_name(name)?;
        }
        if let Some(age) = self.age {
            updated.set_age(age)?;
        }
        *camper = updated;
        Ok(())
    }
}
