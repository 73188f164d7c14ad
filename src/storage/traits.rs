//! Abstract storage interfaces for pluggable backends
//!
//! Each call is expected to be transactionally consistent on its own: a
//! cascading delete removes the parent and every descendant or nothing, and
//! a child insert re-checks its parent inside the same write.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::user::Role;
use crate::error::Result;

/// Primary key shared by every table
pub type EntityId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub id: EntityId,
    pub name: String,
    pub age: u32,
    pub breed: String,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable cat fields
#[derive(Debug, Clone, PartialEq)]
pub struct NewCat {
    pub name: String,
    pub age: u32,
    pub breed: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: EntityId,
    pub cat_id: EntityId,
    pub date: NaiveDate,
    pub reason: String,
    pub vet: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable visit fields
#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub cat_id: EntityId,
    pub date: NaiveDate,
    pub reason: String,
    pub vet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: EntityId,
    pub visit_id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable treatment fields
#[derive(Debug, Clone, PartialEq)]
pub struct NewTreatment {
    pub visit_id: EntityId,
    pub name: String,
}

/// A visit together with the treatments administered during it
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRecord {
    pub visit: Visit,
    pub treatments: Vec<Treatment>,
}

/// A cat with its full visit and treatment history
#[derive(Debug, Clone, PartialEq)]
pub struct CatHistory {
    pub cat: Cat,
    pub visits: Vec<VisitRecord>,
}

/// Rows removed alongside a parent by a cascading delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub visits_removed: usize,
    pub treatments_removed: usize,
}

/// Visit listing filters. Vet and reason match case-insensitive substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitFilter {
    All,
    Vet(String),
    Reason(String),
    Date(NaiveDate),
}

/// Stored account credentials
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: EntityId,
    pub email: String,
    pub password_hash: String,
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Option<Role>,
}

/// Account fields an update may change. The role is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub email: String,
    pub password_hash: String,
}

/// Cat storage interface
#[async_trait]
pub trait CatStorage: Send + Sync {
    async fn create_cat(&self, cat: NewCat) -> Result<Cat>;

    async fn list_cats(&self) -> Result<Vec<Cat>>;

    /// Get a cat by ID, `NotFound` when absent
    async fn get_cat(&self, id: EntityId) -> Result<Cat>;

    /// Get a cat with every visit and treatment below it
    async fn get_cat_history(&self, id: EntityId) -> Result<CatHistory>;

    /// Primary-key existence probe
    async fn cat_exists(&self, id: EntityId) -> Result<bool>;

    async fn update_cat(&self, id: EntityId, cat: NewCat) -> Result<Cat>;

    /// Delete a cat, its visits and their treatments in one transaction
    async fn delete_cat(&self, id: EntityId) -> Result<CascadeSummary>;
}

/// Visit storage interface
#[async_trait]
pub trait VisitStorage: Send + Sync {
    /// Insert a visit. Fails with `ForeignKeyViolation` if the cat is gone.
    async fn create_visit(&self, visit: NewVisit) -> Result<VisitRecord>;

    async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<VisitRecord>>;

    async fn get_visit(&self, id: EntityId) -> Result<VisitRecord>;

    /// Primary-key existence probe
    async fn visit_exists(&self, id: EntityId) -> Result<bool>;

    async fn update_visit(&self, id: EntityId, visit: NewVisit) -> Result<VisitRecord>;

    /// Delete a visit and its treatments in one transaction
    async fn delete_visit(&self, id: EntityId) -> Result<CascadeSummary>;
}

/// Treatment storage interface
#[async_trait]
pub trait TreatmentStorage: Send + Sync {
    /// Insert a treatment. Fails with `ForeignKeyViolation` if the visit is gone.
    async fn create_treatment(&self, treatment: NewTreatment) -> Result<Treatment>;

    async fn list_treatments(&self) -> Result<Vec<Treatment>>;

    async fn get_treatment(&self, id: EntityId) -> Result<Treatment>;

    async fn list_visit_treatments(&self, visit_id: EntityId) -> Result<Vec<Treatment>>;

    async fn update_treatment(&self, id: EntityId, treatment: NewTreatment) -> Result<Treatment>;

    async fn delete_treatment(&self, id: EntityId) -> Result<()>;
}

/// User credential storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Create a user, `Conflict` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    async fn get_user(&self, id: EntityId) -> Result<UserRecord>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn update_user(&self, id: EntityId, update: UserUpdate) -> Result<UserRecord>;

    async fn delete_user(&self, id: EntityId) -> Result<()>;
}
