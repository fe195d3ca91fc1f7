//! Service for classes owned by the calling teacher.

use db::models::{
    class::{Class, ClassFilter, ClassWithCounts, CreateClass, UpdateClass},
    criterion::Criterion,
    notification::NotificationKind,
    student::Student,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::notification::NotificationService;

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Class not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClassDetail {
    pub class: ClassWithCounts,
    pub students: Vec<Student>,
    pub criteria: Vec<Criterion>,
}

fn validated(input: &CreateClass) -> Result<CreateClass, ClassError> {
    let values = CreateClass {
        name: input.name.trim().to_string(),
        subject: input.subject.trim().to_string(),
        academic_year: input.academic_year.trim().to_string(),
    };
    if values.name.is_empty() || values.subject.is_empty() || values.academic_year.is_empty() {
        return Err(ClassError::Validation(
            "Name, subject and academic year are required".to_string(),
        ));
    }
    Ok(values)
}

pub struct ClassService;

impl ClassService {
    pub async fn list(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &ClassFilter,
    ) -> Result<Vec<ClassWithCounts>, ClassError> {
        Ok(Class::find_owned_by_teacher(pool, teacher_id, filter).await?)
    }

    pub async fn create(
        pool: &SqlitePool,
        teacher_id: Uuid,
        input: &CreateClass,
    ) -> Result<Class, ClassError> {
        let values = validated(input)?;
        let class = Class::create(pool, teacher_id, &values).await?;

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Success,
            &format!("Class \"{}\" created successfully!", class.name),
        )
        .await;
        info!(class_id = %class.id, teacher_id = %teacher_id, "Class created");
        Ok(class)
    }

    pub async fn get(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<ClassDetail, ClassError> {
        let class = Class::find_owned_with_counts(pool, id, teacher_id)
            .await?
            .ok_or(ClassError::NotFound)?;
        let students = Student::find_by_class_id(pool, id).await?;
        let criteria = Criterion::find_by_class_id(pool, id).await?;
        Ok(ClassDetail {
            class,
            students,
            criteria,
        })
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
        input: &UpdateClass,
    ) -> Result<Class, ClassError> {
        let values = validated(input)?;
        Class::find_owned(pool, id, teacher_id)
            .await?
            .ok_or(ClassError::NotFound)?;
        let class = Class::update(pool, id, &values).await?;

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Info,
            &format!("Class \"{}\" updated successfully!", class.name),
        )
        .await;
        Ok(class)
    }

    /// Removes the class with its criteria and enrollments.
    pub async fn delete(pool: &SqlitePool, id: Uuid, teacher_id: Uuid) -> Result<(), ClassError> {
        let class = Class::find_owned(pool, id, teacher_id)
            .await?
            .ok_or(ClassError::NotFound)?;
        Class::delete(pool, id).await?;

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Warning,
            &format!("Class \"{}\" was removed.", class.name),
        )
        .await;
        info!(class_id = %id, teacher_id = %teacher_id, "Class deleted");
        Ok(())
    }
}
