//! In-memory storage implementation for development and testing
//!
//! All tables sit behind one lock, so every trait call runs as a single
//! transaction: cascades and parent re-checks can never interleave with
//! another writer.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::error::{Result, VetClinicError};

#[derive(Default)]
struct Sequences {
    cat: EntityId,
    visit: EntityId,
    treatment: EntityId,
    user: EntityId,
}

fn next(seq: &mut EntityId) -> EntityId {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct Tables {
    cats: BTreeMap<EntityId, Cat>,
    visits: BTreeMap<EntityId, Visit>,
    treatments: BTreeMap<EntityId, Treatment>,
    users: BTreeMap<EntityId, UserRecord>,
    sequences: Sequences,
}

impl Tables {
    fn treatments_of(&self, visit_id: EntityId) -> Vec<Treatment> {
        self.treatments
            .values()
            .filter(|t| t.visit_id == visit_id)
            .cloned()
            .collect()
    }

    fn visit_record(&self, visit: &Visit) -> VisitRecord {
        VisitRecord {
            visit: visit.clone(),
            treatments: self.treatments_of(visit.id),
        }
    }

    fn ensure_cat(&self, cat_id: EntityId, entity: &'static str) -> Result<()> {
        if self.cats.contains_key(&cat_id) {
            Ok(())
        } else {
            Err(VetClinicError::ForeignKeyViolation {
                entity,
                parent: "cat",
                parent_id: cat_id,
            })
        }
    }

    fn ensure_visit(&self, visit_id: EntityId) -> Result<()> {
        if self.visits.contains_key(&visit_id) {
            Ok(())
        } else {
            Err(VetClinicError::ForeignKeyViolation {
                entity: "treatment",
                parent: "visit",
                parent_id: visit_id,
            })
        }
    }

    /// Removes the given visits and every treatment hanging off them
    fn remove_visits(&mut self, visit_ids: &BTreeSet<EntityId>) -> CascadeSummary {
        let before = self.treatments.len();
        self.treatments.retain(|_, t| !visit_ids.contains(&t.visit_id));
        let treatments_removed = before - self.treatments.len();

        let before = self.visits.len();
        self.visits.retain(|id, _| !visit_ids.contains(id));

        CascadeSummary {
            visits_removed: before - self.visits.len(),
            treatments_removed,
        }
    }

    fn email_taken(&self, email: &str, except: Option<EntityId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-memory store backing every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &str, id: EntityId) -> VetClinicError {
    VetClinicError::NotFound(format!("{} {} not found", entity, id))
}

#[async_trait]
impl CatStorage for MemoryStore {
    async fn create_cat(&self, cat: NewCat) -> Result<Cat> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let stored = Cat {
            id: next(&mut tables.sequences.cat),
            name: cat.name,
            age: cat.age,
            breed: cat.breed,
            weight: cat.weight,
            created_at: now,
            updated_at: now,
        };
        tables.cats.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_cats(&self) -> Result<Vec<Cat>> {
        Ok(self.tables.read().await.cats.values().cloned().collect())
    }

    async fn get_cat(&self, id: EntityId) -> Result<Cat> {
        self.tables
            .read()
            .await
            .cats
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("cat", id))
    }

    async fn get_cat_history(&self, id: EntityId) -> Result<CatHistory> {
        let tables = self.tables.read().await;
        let cat = tables.cats.get(&id).cloned().ok_or_else(|| not_found("cat", id))?;
        let visits = tables
            .visits
            .values()
            .filter(|v| v.cat_id == id)
            .map(|v| tables.visit_record(v))
            .collect();
        Ok(CatHistory { cat, visits })
    }

    async fn cat_exists(&self, id: EntityId) -> Result<bool> {
        Ok(self.tables.read().await.cats.contains_key(&id))
    }

    async fn update_cat(&self, id: EntityId, cat: NewCat) -> Result<Cat> {
        let mut tables = self.tables.write().await;
        let stored = tables.cats.get_mut(&id).ok_or_else(|| not_found("cat", id))?;
        stored.name = cat.name;
        stored.age = cat.age;
        stored.breed = cat.breed;
        stored.weight = cat.weight;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_cat(&self, id: EntityId) -> Result<CascadeSummary> {
        let mut tables = self.tables.write().await;
        if tables.cats.remove(&id).is_none() {
            return Err(not_found("cat", id));
        }
        let visit_ids: BTreeSet<EntityId> = tables
            .visits
            .values()
            .filter(|v| v.cat_id == id)
            .map(|v| v.id)
            .collect();
        Ok(tables.remove_visits(&visit_ids))
    }
}

#[async_trait]
impl VisitStorage for MemoryStore {
    async fn create_visit(&self, visit: NewVisit) -> Result<VisitRecord> {
        let mut tables = self.tables.write().await;
        tables.ensure_cat(visit.cat_id, "visit")?;

        let now = Utc::now();
        let stored = Visit {
            id: next(&mut tables.sequences.visit),
            cat_id: visit.cat_id,
            date: visit.date,
            reason: visit.reason,
            vet: visit.vet,
            created_at: now,
            updated_at: now,
        };
        tables.visits.insert(stored.id, stored.clone());
        Ok(VisitRecord {
            visit: stored,
            treatments: Vec::new(),
        })
    }

    async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<VisitRecord>> {
        let tables = self.tables.read().await;
        let matches = |visit: &Visit| match filter {
            VisitFilter::All => true,
            VisitFilter::Vet(vet) => visit.vet.to_lowercase().contains(&vet.to_lowercase()),
            VisitFilter::Reason(reason) => visit
                .reason
                .to_lowercase()
                .contains(&reason.to_lowercase()),
            VisitFilter::Date(date) => visit.date == *date,
        };
        Ok(tables
            .visits
            .values()
            .filter(|v| matches(*v))
            .map(|v| tables.visit_record(v))
            .collect())
    }

    async fn get_visit(&self, id: EntityId) -> Result<VisitRecord> {
        let tables = self.tables.read().await;
        tables
            .visits
            .get(&id)
            .map(|v| tables.visit_record(v))
            .ok_or_else(|| not_found("visit", id))
    }

    async fn visit_exists(&self, id: EntityId) -> Result<bool> {
        Ok(self.tables.read().await.visits.contains_key(&id))
    }

    async fn update_visit(&self, id: EntityId, visit: NewVisit) -> Result<VisitRecord> {
        let mut tables = self.tables.write().await;
        if !tables.visits.contains_key(&id) {
            return Err(not_found("visit", id));
        }
        tables.ensure_cat(visit.cat_id, "visit")?;

        let updated = match tables.visits.get_mut(&id) {
            Some(stored) => {
                stored.cat_id = visit.cat_id;
                stored.date = visit.date;
                stored.reason = visit.reason;
                stored.vet = visit.vet;
                stored.updated_at = Utc::now();
                stored.clone()
            }
            None => return Err(not_found("visit", id)),
        };
        Ok(tables.visit_record(&updated))
    }

    async fn delete_visit(&self, id: EntityId) -> Result<CascadeSummary> {
        let mut tables = self.tables.write().await;
        if !tables.visits.contains_key(&id) {
            return Err(not_found("visit", id));
        }
        Ok(tables.remove_visits(&BTreeSet::from([id])))
    }
}

#[async_trait]
impl TreatmentStorage for MemoryStore {
    async fn create_treatment(&self, treatment: NewTreatment) -> Result<Treatment> {
        let mut tables = self.tables.write().await;
        tables.ensure_visit(treatment.visit_id)?;

        let now = Utc::now();
        let stored = Treatment {
            id: next(&mut tables.sequences.treatment),
            visit_id: treatment.visit_id,
            name: treatment.name,
            created_at: now,
            updated_at: now,
        };
        tables.treatments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_treatments(&self) -> Result<Vec<Treatment>> {
        Ok(self.tables.read().await.treatments.values().cloned().collect())
    }

    async fn get_treatment(&self, id: EntityId) -> Result<Treatment> {
        self.tables
            .read()
            .await
            .treatments
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("treatment", id))
    }

    async fn list_visit_treatments(&self, visit_id: EntityId) -> Result<Vec<Treatment>> {
        Ok(self.tables.read().await.treatments_of(visit_id))
    }

    async fn update_treatment(&self, id: EntityId, treatment: NewTreatment) -> Result<Treatment> {
        let mut tables = self.tables.write().await;
        if !tables.treatments.contains_key(&id) {
            return Err(not_found("treatment", id));
        }
        tables.ensure_visit(treatment.visit_id)?;

        let stored = tables
            .treatments
            .get_mut(&id)
            .ok_or_else(|| not_found("treatment", id))?;
        stored.visit_id = treatment.visit_id;
        stored.name = treatment.name;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_treatment(&self, id: EntityId) -> Result<()> {
        self.tables
            .write()
            .await
            .treatments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("treatment", id))
    }
}

#[async_trait]
impl UserStorage for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(VetClinicError::Conflict(format!(
                "a user with email {} already exists",
                user.email
            )));
        }

        let now = Utc::now();
        let stored = UserRecord {
            id: next(&mut tables.sequences.user),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn get_user(&self, id: EntityId) -> Result<UserRecord> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, id: EntityId, update: UserUpdate) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(not_found("user", id));
        }
        if tables.email_taken(&update.email, Some(id)) {
            return Err(VetClinicError::Conflict(format!(
                "a user with email {} already exists",
                update.email
            )));
        }

        let stored = tables.users.get_mut(&id).ok_or_else(|| not_found("user", id))?;
        stored.email = update.email;
        stored.password_hash = update.password_hash;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_user(&self, id: EntityId) -> Result<()> {
        self.tables
            .write()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("user", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cat(name: &str) -> NewCat {
        NewCat {
            name: name.to_string(),
            age: 3,
            breed: "Siamese".to_string(),
            weight: 4,
        }
    }

    fn visit(cat_id: EntityId, vet: &str, reason: &str) -> NewVisit {
        NewVisit {
            cat_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
            reason: reason.to_string(),
            vet: vet.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential_per_table() {
        let store = MemoryStore::new();
        let first = store.create_cat(cat("Tom")).await.unwrap();
        let second = store.create_cat(cat("Felix")).await.unwrap();
        let visit = store.create_visit(visit(first.id, "Dr. Who", "checkup")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(visit.visit.id, 1);
    }

    #[tokio::test]
    async fn test_store_rejects_orphan_visit() {
        let store = MemoryStore::new();
        let result = store.create_visit(visit(99, "Dr. Who", "checkup")).await;

        assert!(matches!(
            result,
            Err(VetClinicError::ForeignKeyViolation { parent: "cat", parent_id: 99, .. })
        ));
        assert!(store.find_visits(&VisitFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_visit_filters() {
        let store = MemoryStore::new();
        let tom = store.create_cat(cat("Tom")).await.unwrap();
        store.create_visit(visit(tom.id, "Dr. Martin", "Vaccination")).await.unwrap();
        store.create_visit(visit(tom.id, "Dr. Durand", "Limping")).await.unwrap();

        let by_vet = store.find_visits(&VisitFilter::Vet("martin".into())).await.unwrap();
        assert_eq!(by_vet.len(), 1);
        assert_eq!(by_vet[0].visit.vet, "Dr. Martin");

        let by_reason = store.find_visits(&VisitFilter::Reason("limp".into())).await.unwrap();
        assert_eq!(by_reason.len(), 1);

        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(store.find_visits(&VisitFilter::Date(date)).await.unwrap().len(), 2);
        let other = NaiveDate::from_ymd_opt(2024, 5, 18).unwrap();
        assert!(store.find_visits(&VisitFilter::Date(other)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_rows_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_cat(7, cat("Ghost")).await,
            Err(VetClinicError::NotFound(_))
        ));
        assert!(matches!(store.delete_treatment(7).await, Err(VetClinicError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let user = NewUser {
            email: "a@b.com".into(),
            password_hash: "hash".into(),
            role: None,
        };
        store.create_user(user.clone()).await.unwrap();
        assert!(matches!(store.create_user(user).await, Err(VetClinicError::Conflict(_))));
    }
}
