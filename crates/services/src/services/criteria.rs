//! Service for evaluation criteria and their per-class weight budget.

use std::sync::Arc;

use dashmap::DashMap;
use db::models::{
    class::Class,
    criterion::{CreateCriterion, Criterion, CriterionValues, UpdateCriterion},
    notification::NotificationKind,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use ts_rs::TS;
use utils::text::non_empty;
use uuid::Uuid;

use super::{
    notification::NotificationService,
    weights::{self, MAX_TOTAL_WEIGHT, WEIGHT_TOLERANCE, WeightError, WeightSummary},
};

#[derive(Debug, Error)]
pub enum CriterionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Weight(#[from] WeightError),
    #[error("{0}")]
    Validation(String),
    #[error("Class not found")]
    ClassNotFound,
    #[error("Criterion not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClassCriteria {
    pub class: Class,
    pub criteria: Vec<Criterion>,
    pub total_weight: f64,
    pub available_weight: f64,
}

fn validated(input: &CreateCriterion) -> Result<CriterionValues, CriterionError> {
    let name = input.name.trim();
    let Some(weight) = input.weight.filter(|_| !name.is_empty()) else {
        return Err(CriterionError::Validation(
            "Name and weight are required".to_string(),
        ));
    };
    Ok(CriterionValues {
        name: name.to_string(),
        weight,
        description: non_empty(input.description.as_deref()),
    })
}

struct ClassWriteGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    class_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ClassWriteGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.class_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Serializes criterion writes per class so the weight check and the write
/// observe the same state. The write itself is also guarded in SQL, which keeps
/// the bound even across processes sharing the database.
#[derive(Clone, Default)]
pub struct CriterionService {
    class_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CriterionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the class's write lock. The map entry is dropped again once
    /// no writer holds or waits for it.
    async fn lock_class(&self, class_id: Uuid) -> ClassWriteGuard<'_> {
        let lock = self.class_locks.entry(class_id).or_default().clone();
        ClassWriteGuard {
            locks: &self.class_locks,
            class_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked_classes(&self) -> usize {
        self.class_locks.len()
    }

    pub async fn list(
        &self,
        pool: &SqlitePool,
        class_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<ClassCriteria, CriterionError> {
        let class = Self::owned_class(pool, class_id, teacher_id).await?;
        let criteria = Criterion::find_by_class_id(pool, class_id).await?;
        let summary = WeightSummary::of(&criteria, class_id);
        Ok(ClassCriteria {
            class,
            criteria,
            total_weight: summary.total,
            available_weight: summary.available,
        })
    }

    pub async fn get(
        &self,
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Criterion, CriterionError> {
        Criterion::find_owned(pool, id, teacher_id)
            .await?
            .ok_or(CriterionError::NotFound)
    }

    pub async fn create(
        &self,
        pool: &SqlitePool,
        class_id: Uuid,
        teacher_id: Uuid,
        input: &CreateCriterion,
    ) -> Result<Criterion, CriterionError> {
        let values = validated(input)?;
        let class = Self::owned_class(pool, class_id, teacher_id).await?;

        let guard = self.lock_class(class_id).await;

        let snapshot = Criterion::find_by_class_id(pool, class_id).await?;
        weights::validate_new_weight(&snapshot, class_id, values.weight, None)?;

        let criterion = match Criterion::create_within_limit(pool, class_id, &values, Self::limit()).await? {
            Some(criterion) => criterion,
            None => return Err(Self::rejected(pool, class_id, None).await),
        };
        drop(guard);

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Success,
            &format!(
                "Criterion \"{}\" added to class \"{}\".",
                criterion.name, class.name
            ),
        )
        .await;
        info!(criterion_id = %criterion.id, class_id = %class_id, weight = criterion.weight, "Criterion created");
        Ok(criterion)
    }

    pub async fn update(
        &self,
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
        input: &UpdateCriterion,
    ) -> Result<Criterion, CriterionError> {
        let values = validated(input)?;
        let current = self.get(pool, id, teacher_id).await?;
        let class_id = current.class_id;
        let class = Self::owned_class(pool, class_id, teacher_id).await?;

        let guard = self.lock_class(class_id).await;

        let snapshot = Criterion::find_by_class_id(pool, class_id).await?;
        weights::validate_new_weight(&snapshot, class_id, values.weight, Some(id))?;

        let criterion =
            match Criterion::update_within_limit(pool, id, class_id, &values, Self::limit()).await? {
                Some(criterion) => criterion,
                None => return Err(Self::rejected(pool, class_id, Some(id)).await),
            };
        drop(guard);

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Info,
            &format!(
                "Criterion \"{}\" updated in class \"{}\".",
                criterion.name, class.name
            ),
        )
        .await;
        Ok(criterion)
    }

    pub async fn delete(
        &self,
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<(), CriterionError> {
        let criterion = self.get(pool, id, teacher_id).await?;
        let class = Self::owned_class(pool, criterion.class_id, teacher_id).await?;
        let guard = self.lock_class(criterion.class_id).await;
        Criterion::delete(pool, id).await?;
        drop(guard);

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Warning,
            &format!(
                "Criterion \"{}\" removed from class \"{}\".",
                criterion.name, class.name
            ),
        )
        .await;
        info!(criterion_id = %id, class_id = %criterion.class_id, "Criterion deleted");
        Ok(())
    }

    fn limit() -> f64 {
        MAX_TOTAL_WEIGHT + WEIGHT_TOLERANCE
    }

    /// Explains why the SQL guard refused a write, from a fresh snapshot. An
    /// update whose criterion vanished in the meantime is reported as missing.
    async fn rejected(pool: &SqlitePool, class_id: Uuid, excluding: Option<Uuid>) -> CriterionError {
        warn!(class_id = %class_id, "Criterion write rejected by weight guard");
        match Criterion::find_by_class_id(pool, class_id).await {
            Ok(snapshot)
                if excluding.is_some_and(|id| !snapshot.iter().any(|c| c.id == id)) =>
            {
                CriterionError::NotFound
            }
            Ok(snapshot) => {
                let available = weights::compute_available(&snapshot, class_id, excluding);
                CriterionError::Weight(WeightError::Exceeded {
                    current_sum: MAX_TOTAL_WEIGHT - available,
                    available,
                })
            }
            Err(e) => CriterionError::Database(e),
        }
    }

    async fn owned_class(
        pool: &SqlitePool,
        class_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Class, CriterionError> {
        Class::find_owned(pool, class_id, teacher_id)
            .await?
            .ok_or(CriterionError::ClassNotFound)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            class::CreateClass,
            notification::Notification,
            user::{User, UserRole},
        },
    };
    use tempfile::TempDir;

    use super::*;

    async fn setup(db: &DBService) -> (Uuid, Uuid) {
        let teacher = User::create(&db.pool, "Maria", "maria@edumanage.com", "hash", UserRole::Teacher)
            .await
            .unwrap();
        let class = Class::create(
            &db.pool,
            teacher.id,
            &CreateClass {
                name: "Turma A".to_string(),
                subject: "Matemática".to_string(),
                academic_year: "2024".to_string(),
            },
        )
        .await
        .unwrap();
        (teacher.id, class.id)
    }

    fn input(name: &str, weight: f64) -> CreateCriterion {
        CreateCriterion {
            name: name.to_string(),
            weight: Some(weight),
            description: None,
        }
    }

    #[tokio::test]
    async fn seventy_percent_scenario() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        service.create(&db.pool, class_id, teacher, &input("Provas", 40.0)).await.unwrap();
        service.create(&db.pool, class_id, teacher, &input("Trabalhos", 30.0)).await.unwrap();

        let err = service
            .create(&db.pool, class_id, teacher, &input("Extra", 35.0))
            .await
            .unwrap_err();
        match err {
            CriterionError::Weight(WeightError::Exceeded { current_sum, available }) => {
                assert_eq!(current_sum, 70.0);
                assert_eq!(available, 30.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        service.create(&db.pool, class_id, teacher, &input("Participação", 30.0)).await.unwrap();
        let listed = service.list(&db.pool, class_id, teacher).await.unwrap();
        assert_eq!(listed.criteria.len(), 3);
        assert_eq!(listed.total_weight, 100.0);
        assert_eq!(listed.available_weight, 0.0);
    }

    #[tokio::test]
    async fn validation_errors() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let missing = CreateCriterion {
            name: "Provas".to_string(),
            weight: None,
            description: None,
        };
        assert!(matches!(
            service.create(&db.pool, class_id, teacher, &missing).await,
            Err(CriterionError::Validation(_))
        ));
        assert!(matches!(
            service.create(&db.pool, class_id, teacher, &input("Provas", 120.0)).await,
            Err(CriterionError::Weight(WeightError::OutOfRange { .. }))
        ));
        assert!(matches!(
            service.create(&db.pool, Uuid::new_v4(), teacher, &input("Provas", 10.0)).await,
            Err(CriterionError::ClassNotFound)
        ));
    }

    #[tokio::test]
    async fn lowering_own_weight_is_never_blocked() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let provas = service.create(&db.pool, class_id, teacher, &input("Provas", 60.0)).await.unwrap();
        service.create(&db.pool, class_id, teacher, &input("Trabalhos", 40.0)).await.unwrap();

        let same = service.update(&db.pool, provas.id, teacher, &input("Provas", 60.0)).await.unwrap();
        assert_eq!(same.weight, 60.0);
        let lower = service.update(&db.pool, provas.id, teacher, &input("Provas", 20.0)).await.unwrap();
        assert_eq!(lower.weight, 20.0);
        assert!(matches!(
            service.update(&db.pool, provas.id, teacher, &input("Provas", 61.0)).await,
            Err(CriterionError::Weight(WeightError::Exceeded { .. }))
        ));
    }

    #[tokio::test]
    async fn delete_frees_the_weight() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let provas = service.create(&db.pool, class_id, teacher, &input("Provas", 100.0)).await.unwrap();
        assert!(service.create(&db.pool, class_id, teacher, &input("Extra", 1.0)).await.is_err());

        service.delete(&db.pool, provas.id, teacher).await.unwrap();
        let listed = service.list(&db.pool, class_id, teacher).await.unwrap();
        assert!(listed.criteria.is_empty());
        assert_eq!(listed.available_weight, 100.0);
        service.create(&db.pool, class_id, teacher, &input("Extra", 100.0)).await.unwrap();
    }

    #[tokio::test]
    async fn refused_update_of_a_vanished_criterion_is_not_found() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let provas = service.create(&db.pool, class_id, teacher, &input("Provas", 60.0)).await.unwrap();
        service.create(&db.pool, class_id, teacher, &input("Trabalhos", 40.0)).await.unwrap();
        Criterion::delete(&db.pool, provas.id).await.unwrap();

        assert!(matches!(
            CriterionService::rejected(&db.pool, class_id, Some(provas.id)).await,
            CriterionError::NotFound
        ));
        assert!(matches!(
            service.update(&db.pool, provas.id, teacher, &input("Provas", 70.0)).await,
            Err(CriterionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn class_locks_are_released_after_writes() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let provas = service.create(&db.pool, class_id, teacher, &input("Provas", 90.0)).await.unwrap();
        assert!(service.create(&db.pool, class_id, teacher, &input("Extra", 20.0)).await.is_err());
        service.update(&db.pool, provas.id, teacher, &input("Provas", 50.0)).await.unwrap();
        service.delete(&db.pool, provas.id, teacher).await.unwrap();

        assert_eq!(service.tracked_classes(), 0);
    }

    #[tokio::test]
    async fn only_the_acting_teacher_is_notified() {
        let db = DBService::new_in_memory().await.unwrap();
        let (maria, class_id) = setup(&db).await;
        let joao = User::create(&db.pool, "João", "joao@edumanage.com", "hash", UserRole::Teacher)
            .await
            .unwrap()
            .id;
        sqlx::query("INSERT INTO teacher_classes (teacher_id, class_id) VALUES (?, ?)")
            .bind(joao)
            .bind(class_id)
            .execute(&db.pool)
            .await
            .unwrap();
        let service = CriterionService::new();

        let provas = service.create(&db.pool, class_id, maria, &input("Provas", 40.0)).await.unwrap();
        service.update(&db.pool, provas.id, maria, &input("Provas", 50.0)).await.unwrap();
        service.delete(&db.pool, provas.id, maria).await.unwrap();

        let feed = Notification::find_for_user(&db.pool, maria, false, 10, 0).await.unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].kind, NotificationKind::Warning);
        assert_eq!(Notification::count_for_user(&db.pool, joao, false).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_creates_never_overflow() {
        // A file-backed database so writers use separate connections.
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("weights.sqlite").display());
        let db = DBService::new(&url).await.unwrap();
        let (teacher, class_id) = setup(&db).await;
        let service = CriterionService::new();

        let mut handles = Vec::new();
        for i in 0..10 {
            let (service, pool) = (service.clone(), db.pool.clone());
            handles.push(tokio::spawn(async move {
                service
                    .create(&pool, class_id, teacher, &input(&format!("C{i}"), 30.0))
                    .await
                    .is_ok()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 3);
        let listed = service.list(&db.pool, class_id, teacher).await.unwrap();
        assert!(listed.total_weight <= MAX_TOTAL_WEIGHT);
        assert_eq!(listed.total_weight, 90.0);
    }

    #[tokio::test]
    async fn separate_services_share_the_bound() {
        let db = DBService::new_in_memory().await.unwrap();
        let (teacher, class_id) = setup(&db).await;

        // Two independent services share no lock, as two processes would not.
        let first = CriterionService::new();
        let second = CriterionService::new();
        first.create(&db.pool, class_id, teacher, &input("Provas", 80.0)).await.unwrap();
        assert!(second.create(&db.pool, class_id, teacher, &input("Extra", 30.0)).await.is_err());
        assert_eq!(
            first.list(&db.pool, class_id, teacher).await.unwrap().total_weight,
            80.0
        );
    }
}
