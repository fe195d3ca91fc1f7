//! Service for students visible to the calling teacher.
//!
//! A teacher sees a student when they created it or when it is enrolled in one
//! of their classes. Enrollment changes only ever touch the caller's own
//! classes.

use std::collections::HashSet;

use db::models::{
    class::Class,
    notification::NotificationKind,
    student::{CreateStudent, Student, StudentFilter, StudentValues, StudentWithClasses, UpdateStudent},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::text::non_empty;
use uuid::Uuid;

use super::{
    notification::NotificationService,
    uploads::{PhotoStore, PhotoUpload, UploadError},
};

#[derive(Debug, Error)]
pub enum StudentError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("{0}")]
    Validation(String),
    #[error("Student not found")]
    NotFound,
    #[error("Registration number {0} is already in use")]
    RegistrationTaken(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StudentDetail {
    pub student: Student,
    pub classes: Vec<Class>,
}

fn validated(input: &CreateStudent, current: Option<&Student>) -> Result<StudentValues, StudentError> {
    let name = input.name.trim();
    let registration_number = input.registration_number.trim();
    if name.is_empty() || registration_number.is_empty() {
        return Err(StudentError::Validation(
            "Name and registration number are required".to_string(),
        ));
    }
    let photo_url = match non_empty(input.photo_url.as_deref()) {
        Some(url) => Some(url),
        None => current.and_then(|s| s.photo_url.clone()),
    };
    Ok(StudentValues {
        name: name.to_string(),
        registration_number: registration_number.to_string(),
        email: non_empty(input.email.as_deref()),
        photo_url,
        status: input
            .status
            .or(current.map(|s| s.status))
            .unwrap_or_default(),
    })
}

fn map_unique(registration_number: &str) -> impl FnOnce(sqlx::Error) -> StudentError + '_ {
    move |e| {
        if db::is_unique_violation(&e) {
            StudentError::RegistrationTaken(registration_number.to_string())
        } else {
            StudentError::Database(e)
        }
    }
}

pub struct StudentService;

impl StudentService {
    pub async fn list(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &StudentFilter,
    ) -> Result<Vec<StudentWithClasses>, StudentError> {
        Ok(Student::find_accessible(pool, teacher_id, filter).await?)
    }

    pub async fn get(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<StudentDetail, StudentError> {
        let student = Self::find_accessible(pool, id, teacher_id).await?;
        let classes = Student::classes_owned_by(pool, id, teacher_id).await?;
        Ok(StudentDetail { student, classes })
    }

    pub async fn create(
        pool: &SqlitePool,
        teacher_id: Uuid,
        input: &CreateStudent,
    ) -> Result<Student, StudentError> {
        let values = validated(input, None)?;
        if Student::find_by_registration_number(pool, &values.registration_number)
            .await?
            .is_some()
        {
            return Err(StudentError::RegistrationTaken(values.registration_number));
        }

        let student = Student::create(pool, &values, teacher_id)
            .await
            .map_err(map_unique(&values.registration_number))?;

        if let Some(class_ids) = &input.class_ids {
            Self::enroll_in_owned_classes(pool, &student, teacher_id, class_ids).await?;
        }
        info!(student_id = %student.id, teacher_id = %teacher_id, "Student created");
        Ok(student)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
        input: &UpdateStudent,
    ) -> Result<Student, StudentError> {
        let current = Self::find_accessible(pool, id, teacher_id).await?;
        let values = validated(input, Some(&current))?;

        let holder = Student::find_by_registration_number(pool, &values.registration_number).await?;
        if holder.is_some_and(|other| other.id != id) {
            return Err(StudentError::RegistrationTaken(values.registration_number));
        }

        let student = Student::update(pool, id, &values)
            .await
            .map_err(map_unique(&values.registration_number))?;

        if let Some(class_ids) = &input.class_ids {
            Student::unlink_from_teacher_classes(pool, id, teacher_id).await?;
            Self::enroll_in_owned_classes(pool, &student, teacher_id, class_ids).await?;
        }

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Info,
            &format!("Student \"{}\" details were updated.", student.name),
        )
        .await;
        Ok(student)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, teacher_id: Uuid) -> Result<(), StudentError> {
        let student = Self::find_accessible(pool, id, teacher_id).await?;
        Student::delete(pool, id).await?;

        NotificationService::notify(
            pool,
            teacher_id,
            NotificationKind::Warning,
            &format!("Student \"{}\" was removed.", student.name),
        )
        .await;
        info!(student_id = %id, teacher_id = %teacher_id, "Student deleted");
        Ok(())
    }

    /// Stores the photo and points the student at it. Returns the public URL.
    pub async fn set_photo(
        pool: &SqlitePool,
        store: &PhotoStore,
        id: Uuid,
        teacher_id: Uuid,
        upload: PhotoUpload,
    ) -> Result<String, StudentError> {
        Self::find_accessible(pool, id, teacher_id).await?;
        let url = store.save_student_photo(id, upload).await?;
        Student::update_photo_url(pool, id, &url).await?;
        Ok(url)
    }

    async fn find_accessible(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Student, StudentError> {
        Student::find_accessible_by_id(pool, id, teacher_id)
            .await?
            .ok_or(StudentError::NotFound)
    }

    /// Links the student to each listed class the teacher owns; other ids are
    /// skipped.
    async fn enroll_in_owned_classes(
        pool: &SqlitePool,
        student: &Student,
        teacher_id: Uuid,
        class_ids: &[Uuid],
    ) -> Result<(), StudentError> {
        let mut seen = HashSet::new();
        for class_id in class_ids.iter().filter(|id| seen.insert(**id)) {
            let Some(class) = Class::find_owned(pool, *class_id, teacher_id).await? else {
                debug!(class_id = %class_id, teacher_id = %teacher_id, "Skipping class not owned by teacher");
                continue;
            };
            Student::link_to_class(pool, student.id, class.id).await?;
            NotificationService::notify(
                pool,
                teacher_id,
                NotificationKind::Info,
                &format!(
                    "Student \"{}\" was added to class \"{}\".",
                    student.name, class.name
                ),
            )
            .await;
        }
        Ok(())
    }
}
