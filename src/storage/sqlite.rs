//! SQLite storage backend
//!
//! The schema enforces `cat -> visit -> treatment` with `ON DELETE CASCADE`
//! and connections run with `PRAGMA foreign_keys = ON`. Child writes also
//! probe their parent inside the same transaction so a missing parent is
//! reported as a typed violation rather than a raw constraint error.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use super::traits::*;
use crate::constants::SQLITE_MAX_CONNECTIONS;
use crate::error::{Result, VetClinicError};

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS cats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL CHECK (age > 0),
        breed TEXT NOT NULL,
        weight INTEGER NOT NULL CHECK (weight > 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS visits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cat_id INTEGER NOT NULL REFERENCES cats (id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        reason TEXT NOT NULL,
        vet TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_visits_cat_id ON visits (cat_id)",
    r#"
    CREATE TABLE IF NOT EXISTS treatments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        visit_id INTEGER NOT NULL REFERENCES visits (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_treatments_visit_id ON treatments (visit_id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
];

const CAT_EXISTS: &str = "SELECT COUNT(*) FROM cats WHERE id = ?";
const VISIT_EXISTS: &str = "SELECT COUNT(*) FROM visits WHERE id = ?";
const TREATMENT_EXISTS: &str = "SELECT COUNT(*) FROM treatments WHERE id = ?";

const SELECT_CATS: &str =
    "SELECT id, name, age, breed, weight, created_at, updated_at FROM cats";
const SELECT_VISITS: &str =
    "SELECT id, cat_id, date, reason, vet, created_at, updated_at FROM visits";
const SELECT_TREATMENTS: &str =
    "SELECT id, visit_id, name, created_at, updated_at FROM treatments";
const SELECT_USERS: &str =
    "SELECT id, email, password_hash, role, created_at, updated_at FROM users";

#[derive(FromRow)]
struct CatRow {
    id: i64,
    name: String,
    age: u32,
    breed: String,
    weight: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CatRow> for Cat {
    fn from(row: CatRow) -> Self {
        Self {
            id: row.id as EntityId,
            name: row.name,
            age: row.age,
            breed: row.breed,
            weight: row.weight,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct VisitRow {
    id: i64,
    cat_id: i64,
    date: NaiveDate,
    reason: String,
    vet: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VisitRow> for Visit {
    fn from(row: VisitRow) -> Self {
        Self {
            id: row.id as EntityId,
            cat_id: row.cat_id as EntityId,
            date: row.date,
            reason: row.reason,
            vet: row.vet,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TreatmentRow {
    id: i64,
    visit_id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TreatmentRow> for Treatment {
    fn from(row: TreatmentRow) -> Self {
        Self {
            id: row.id as EntityId,
            visit_id: row.visit_id as EntityId,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id as EntityId,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.and_then(|role| role.parse().ok()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Ids past i64::MAX can never have been assigned, so they match no row
fn key(id: EntityId) -> i64 {
    i64::try_from(id).unwrap_or(-1)
}

fn db_error(err: sqlx::Error) -> VetClinicError {
    log::error!("SQLite call failed: {}", err);
    VetClinicError::StorageError(err.to_string())
}

fn not_found(entity: &str, id: EntityId) -> VetClinicError {
    VetClinicError::NotFound(format!("{} {} not found", entity, id))
}

fn missing_parent(
    entity: &'static str,
    parent: &'static str,
    parent_id: EntityId,
) -> VetClinicError {
    VetClinicError::ForeignKeyViolation {
        entity,
        parent,
        parent_id,
    }
}

fn email_conflict(email: &str) -> VetClinicError {
    VetClinicError::Conflict(format!("a user with email {} already exists", email))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

async fn exists(conn: &mut SqliteConnection, sql: &str, id: EntityId) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(sql)
        .bind(key(id))
        .fetch_one(conn)
        .await
        .map_err(db_error)?;
    Ok(count > 0)
}

async fn count(conn: &mut SqliteConnection, sql: &str, id: EntityId) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(sql)
        .bind(key(id))
        .fetch_one(conn)
        .await
        .map_err(db_error)?;
    Ok(usize::try_from(count).unwrap_or_default())
}

async fn treatments_of(
    conn: &mut SqliteConnection,
    visit_id: EntityId,
) -> Result<Vec<Treatment>> {
    let rows = sqlx::query_as::<_, TreatmentRow>(&format!(
        "{} WHERE visit_id = ? ORDER BY id",
        SELECT_TREATMENTS
    ))
    .bind(key(visit_id))
    .fetch_all(conn)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(Treatment::from).collect())
}

async fn visit_records(
    conn: &mut SqliteConnection,
    rows: Vec<VisitRow>,
) -> Result<Vec<VisitRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let visit = Visit::from(row);
        let treatments = treatments_of(&mut *conn, visit.id).await?;
        records.push(VisitRecord { visit, treatments });
    }
    Ok(records)
}

/// SQLite store backing every repository trait
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database at `url`, creating the file if needed, and applies the schema
    pub async fn connect(url: &str) -> Result<Self> {
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                VetClinicError::ConfigError(format!("invalid database URL {}: {}", url, e))
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        log::info!("Connected to SQLite database {}", url);
        Self::with_schema(pool).await
    }

    /// A private database living in memory until the store is dropped
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_error)?
            .foreign_keys(true);

        // Each connection to :memory: opens a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        Self::with_schema(pool).await
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(db_error)?;
        }
        log::debug!("SQLite schema ready");
        Ok(Self { pool })
    }

    /// Waits for open connections to finish and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatStorage for SqliteStore {
    async fn create_cat(&self, cat: NewCat) -> Result<Cat> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, CatRow>(
            "INSERT INTO cats (name, age, breed, weight, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id, name, age, breed, weight, created_at, updated_at",
        )
        .bind(&cat.name)
        .bind(cat.age)
        .bind(&cat.breed)
        .bind(cat.weight)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn list_cats(&self) -> Result<Vec<Cat>> {
        let rows = sqlx::query_as::<_, CatRow>(&format!("{} ORDER BY id", SELECT_CATS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Cat::from).collect())
    }

    async fn get_cat(&self, id: EntityId) -> Result<Cat> {
        sqlx::query_as::<_, CatRow>(&format!("{} WHERE id = ?", SELECT_CATS))
            .bind(key(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Cat::from)
            .ok_or_else(|| not_found("cat", id))
    }

    async fn get_cat_history(&self, id: EntityId) -> Result<CatHistory> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let cat = sqlx::query_as::<_, CatRow>(&format!("{} WHERE id = ?", SELECT_CATS))
            .bind(key(id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .map(Cat::from)
            .ok_or_else(|| not_found("cat", id))?;

        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "{} WHERE cat_id = ? ORDER BY id",
            SELECT_VISITS
        ))
        .bind(key(id))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;
        let visits = visit_records(&mut tx, rows).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(CatHistory { cat, visits })
    }

    async fn cat_exists(&self, id: EntityId) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        exists(&mut conn, CAT_EXISTS, id).await
    }

    async fn update_cat(&self, id: EntityId, cat: NewCat) -> Result<Cat> {
        sqlx::query_as::<_, CatRow>(
            "UPDATE cats SET name = ?, age = ?, breed = ?, weight = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, name, age, breed, weight, created_at, updated_at",
        )
        .bind(&cat.name)
        .bind(cat.age)
        .bind(&cat.breed)
        .bind(cat.weight)
        .bind(Utc::now())
        .bind(key(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Cat::from)
        .ok_or_else(|| not_found("cat", id))
    }

    async fn delete_cat(&self, id: EntityId) -> Result<CascadeSummary> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, CAT_EXISTS, id).await? {
            return Err(not_found("cat", id));
        }

        let summary = CascadeSummary {
            visits_removed: count(&mut tx, "SELECT COUNT(*) FROM visits WHERE cat_id = ?", id)
                .await?,
            treatments_removed: count(
                &mut tx,
                "SELECT COUNT(*) FROM treatments \
                 WHERE visit_id IN (SELECT id FROM visits WHERE cat_id = ?)",
                id,
            )
            .await?,
        };

        // Visits and treatments go with the cat through ON DELETE CASCADE
        sqlx::query("DELETE FROM cats WHERE id = ?")
            .bind(key(id))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(summary)
    }
}

#[async_trait]
impl VisitStorage for SqliteStore {
    async fn create_visit(&self, visit: NewVisit) -> Result<VisitRecord> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, CAT_EXISTS, visit.cat_id).await? {
            return Err(missing_parent("visit", "cat", visit.cat_id));
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, VisitRow>(
            "INSERT INTO visits (cat_id, date, reason, vet, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id, cat_id, date, reason, vet, created_at, updated_at",
        )
        .bind(key(visit.cat_id))
        .bind(visit.date)
        .bind(&visit.reason)
        .bind(&visit.vet)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                missing_parent("visit", "cat", visit.cat_id)
            } else {
                db_error(e)
            }
        })?;

        tx.commit().await.map_err(db_error)?;
        Ok(VisitRecord {
            visit: row.into(),
            treatments: Vec::new(),
        })
    }

    async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<VisitRecord>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let rows = match filter {
            VisitFilter::All => {
                sqlx::query_as::<_, VisitRow>(&format!("{} ORDER BY id", SELECT_VISITS))
                    .fetch_all(&mut *tx)
                    .await
            }
            VisitFilter::Vet(vet) => {
                sqlx::query_as::<_, VisitRow>(&format!(
                    "{} WHERE instr(lower(vet), ?) > 0 ORDER BY id",
                    SELECT_VISITS
                ))
                .bind(vet.to_lowercase())
                .fetch_all(&mut *tx)
                .await
            }
            VisitFilter::Reason(reason) => {
                sqlx::query_as::<_, VisitRow>(&format!(
                    "{} WHERE instr(lower(reason), ?) > 0 ORDER BY id",
                    SELECT_VISITS
                ))
                .bind(reason.to_lowercase())
                .fetch_all(&mut *tx)
                .await
            }
            VisitFilter::Date(date) => {
                sqlx::query_as::<_, VisitRow>(&format!(
                    "{} WHERE date = ? ORDER BY id",
                    SELECT_VISITS
                ))
                .bind(*date)
                .fetch_all(&mut *tx)
                .await
            }
        }
        .map_err(db_error)?;

        let records = visit_records(&mut tx, rows).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(records)
    }

    async fn get_visit(&self, id: EntityId) -> Result<VisitRecord> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let row = sqlx::query_as::<_, VisitRow>(&format!("{} WHERE id = ?", SELECT_VISITS))
            .bind(key(id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| not_found("visit", id))?;

        let visit = Visit::from(row);
        let treatments = treatments_of(&mut tx, visit.id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(VisitRecord { visit, treatments })
    }

    async fn visit_exists(&self, id: EntityId) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        exists(&mut conn, VISIT_EXISTS, id).await
    }

    async fn update_visit(&self, id: EntityId, visit: NewVisit) -> Result<VisitRecord> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, VISIT_EXISTS, id).await? {
            return Err(not_found("visit", id));
        }
        if !exists(&mut tx, CAT_EXISTS, visit.cat_id).await? {
            return Err(missing_parent("visit", "cat", visit.cat_id));
        }

        let row = sqlx::query_as::<_, VisitRow>(
            "UPDATE visits SET cat_id = ?, date = ?, reason = ?, vet = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, cat_id, date, reason, vet, created_at, updated_at",
        )
        .bind(key(visit.cat_id))
        .bind(visit.date)
        .bind(&visit.reason)
        .bind(&visit.vet)
        .bind(Utc::now())
        .bind(key(id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                missing_parent("visit", "cat", visit.cat_id)
            } else {
                db_error(e)
            }
        })?
        .ok_or_else(|| not_found("visit", id))?;

        let visit = Visit::from(row);
        let treatments = treatments_of(&mut tx, visit.id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(VisitRecord { visit, treatments })
    }

    async fn delete_visit(&self, id: EntityId) -> Result<CascadeSummary> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, VISIT_EXISTS, id).await? {
            return Err(not_found("visit", id));
        }

        let treatments_removed =
            count(&mut tx, "SELECT COUNT(*) FROM treatments WHERE visit_id = ?", id).await?;
        sqlx::query("DELETE FROM visits WHERE id = ?")
            .bind(key(id))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(CascadeSummary {
            visits_removed: 1,
            treatments_removed,
        })
    }
}

#[async_trait]
impl TreatmentStorage for SqliteStore {
    async fn create_treatment(&self, treatment: NewTreatment) -> Result<Treatment> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, VISIT_EXISTS, treatment.visit_id).await? {
            return Err(missing_parent("treatment", "visit", treatment.visit_id));
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, TreatmentRow>(
            "INSERT INTO treatments (visit_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, visit_id, name, created_at, updated_at",
        )
        .bind(key(treatment.visit_id))
        .bind(&treatment.name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                missing_parent("treatment", "visit", treatment.visit_id)
            } else {
                db_error(e)
            }
        })?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    async fn list_treatments(&self) -> Result<Vec<Treatment>> {
        let sql = format!("{} ORDER BY id", SELECT_TREATMENTS);
        let rows = sqlx::query_as::<_, TreatmentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Treatment::from).collect())
    }

    async fn get_treatment(&self, id: EntityId) -> Result<Treatment> {
        sqlx::query_as::<_, TreatmentRow>(&format!("{} WHERE id = ?", SELECT_TREATMENTS))
            .bind(key(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Treatment::from)
            .ok_or_else(|| not_found("treatment", id))
    }

    async fn list_visit_treatments(&self, visit_id: EntityId) -> Result<Vec<Treatment>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        treatments_of(&mut conn, visit_id).await
    }

    async fn update_treatment(&self, id: EntityId, treatment: NewTreatment) -> Result<Treatment> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if !exists(&mut tx, TREATMENT_EXISTS, id).await? {
            return Err(not_found("treatment", id));
        }
        if !exists(&mut tx, VISIT_EXISTS, treatment.visit_id).await? {
            return Err(missing_parent("treatment", "visit", treatment.visit_id));
        }

        let row = sqlx::query_as::<_, TreatmentRow>(
            "UPDATE treatments SET visit_id = ?, name = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, visit_id, name, created_at, updated_at",
        )
        .bind(key(treatment.visit_id))
        .bind(&treatment.name)
        .bind(Utc::now())
        .bind(key(id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                missing_parent("treatment", "visit", treatment.visit_id)
            } else {
                db_error(e)
            }
        })?
        .ok_or_else(|| not_found("treatment", id))?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    async fn delete_treatment(&self, id: EntityId) -> Result<()> {
        let result = sqlx::query("DELETE FROM treatments WHERE id = ?")
            .bind(key(id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(not_found("treatment", id));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStorage for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, password_hash, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, email, password_hash, role, created_at, updated_at",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.map(|role| role.as_str()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                email_conflict(&user.email)
            } else {
                db_error(e)
            }
        })?;
        Ok(row.into())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{} ORDER BY id", SELECT_USERS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn get_user(&self, id: EntityId) -> Result<UserRecord> {
        sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", SELECT_USERS))
            .bind(key(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(UserRecord::from)
            .ok_or_else(|| not_found("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE email = ?", SELECT_USERS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn update_user(&self, id: EntityId, update: UserUpdate) -> Result<UserRecord> {
        sqlx::query_as::<_, UserRow>(
            "UPDATE users SET email = ?, password_hash = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, email, password_hash, role, created_at, updated_at",
        )
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(Utc::now())
        .bind(key(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                email_conflict(&update.email)
            } else {
                db_error(e)
            }
        })?
        .map(UserRecord::from)
        .ok_or_else(|| not_found("user", id))
    }

    async fn delete_user(&self, id: EntityId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(key(id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(not_found("user", id));
        }
        Ok(())
    }
}
