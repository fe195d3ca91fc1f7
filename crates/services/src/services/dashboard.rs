//! Summary numbers for the teacher's landing page.

use db::models::{
    class::{Class, ClassWithCounts},
    criterion::Criterion,
    notification::Notification,
    student::{StatusCount, Student},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;
use uuid::Uuid;

const RECENT_CLASSES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardTotals {
    pub total_classes: i64,
    pub total_students: i64,
    pub total_criteria: i64,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardStats {
    pub stats: DashboardTotals,
    pub students_by_status: Vec<StatusCount>,
    pub recent_classes: Vec<ClassWithCounts>,
}

pub async fn stats_for(pool: &SqlitePool, teacher_id: Uuid) -> Result<DashboardStats, sqlx::Error> {
    let stats = DashboardTotals {
        total_classes: Class::count_for_teacher(pool, teacher_id).await?,
        total_students: Student::count_enrolled_for_teacher(pool, teacher_id).await?,
        total_criteria: Criterion::count_for_teacher(pool, teacher_id).await?,
        unread_notifications: Notification::count_for_user(pool, teacher_id, true).await?,
    };
    Ok(DashboardStats {
        stats,
        students_by_status: Student::count_by_status_for_teacher(pool, teacher_id).await?,
        recent_classes: Class::find_recent_for_teacher(pool, teacher_id, RECENT_CLASSES).await?,
    })
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            class::CreateClass,
            notification::NotificationKind,
            student::{StudentStatus, StudentValues},
            user::{User, UserRole},
        },
    };

    use super::*;

    #[tokio::test]
    async fn counts_distinct_students_across_classes() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = User::create(&db.pool, "Maria", "maria@edumanage.com", "hash", UserRole::Teacher)
            .await
            .unwrap()
            .id;
        let mut class_ids = Vec::new();
        for name in ["Turma A", "Turma B", "Turma C", "Turma D", "Turma E", "Turma F"] {
            let class = Class::create(
                &db.pool,
                maria,
                &CreateClass {
                    name: name.to_string(),
                    subject: "Matemática".to_string(),
                    academic_year: "2024".to_string(),
                },
            )
            .await
            .unwrap();
            class_ids.push(class.id);
        }
        let ana = Student::create(
            &db.pool,
            &StudentValues {
                name: "Ana".to_string(),
                registration_number: "2024001".to_string(),
                email: None,
                photo_url: None,
                status: StudentStatus::Active,
            },
            maria,
        )
        .await
        .unwrap();
        Student::link_to_class(&db.pool, ana.id, class_ids[0]).await.unwrap();
        Student::link_to_class(&db.pool, ana.id, class_ids[1]).await.unwrap();
        Notification::create(&db.pool, maria, NotificationKind::Info, "unread").await.unwrap();

        let dashboard = stats_for(&db.pool, maria).await.unwrap();
        assert_eq!(dashboard.stats.total_classes, 6);
        assert_eq!(dashboard.stats.total_students, 1);
        assert_eq!(dashboard.stats.total_criteria, 0);
        assert_eq!(dashboard.stats.unread_notifications, 1);
        assert_eq!(dashboard.students_by_status.len(), 1);
        assert_eq!(dashboard.students_by_status[0].total, 1);
        assert_eq!(dashboard.recent_classes.len(), 5);
        assert_eq!(dashboard.recent_classes[0].name, "Turma F");
    }
}
