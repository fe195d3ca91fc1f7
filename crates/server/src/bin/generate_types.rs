use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        utils::response::ApiResponse::<(), ()>::decl(),
        db::models::user::UserRole::decl(),
        db::models::user::User::decl(),
        db::models::user::CreateUser::decl(),
        db::models::class::Class::decl(),
        db::models::class::ClassWithCounts::decl(),
        db::models::class::CreateClass::decl(),
        db::models::class::ClassFilter::decl(),
        db::models::student::StudentStatus::decl(),
        db::models::student::Student::decl(),
        db::models::student::StudentClassRef::decl(),
        db::models::student::StudentWithClasses::decl(),
        db::models::student::CreateStudent::decl(),
        db::models::student::StudentFilter::decl(),
        db::models::student::StatusCount::decl(),
        db::models::criterion::Criterion::decl(),
        db::models::criterion::CreateCriterion::decl(),
        db::models::notification::NotificationKind::decl(),
        db::models::notification::Notification::decl(),
        db::models::notification::CreateNotification::decl(),
        services::services::auth::SessionUser::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::classes::ClassDetail::decl(),
        services::services::students::StudentDetail::decl(),
        services::services::criteria::ClassCriteria::decl(),
        services::services::weights::WeightAllocation::decl(),
        services::services::weights::WeightSummary::decl(),
        services::services::notification::NotificationQuery::decl(),
        services::services::notification::NotificationPage::decl(),
        services::services::dashboard::DashboardTotals::decl(),
        services::services::dashboard::DashboardStats::decl(),
        services::services::forms::FormResource::decl(),
        services::services::forms::SelectOption::decl(),
        services::services::forms::FieldKind::decl(),
        services::services::forms::FormField::decl(),
        services::services::forms::FormSchema::decl(),
        server::routes::auth::UserResponse::decl(),
        server::routes::classes::ClassListResponse::decl(),
        server::routes::classes::ClassResponse::decl(),
        server::routes::students::StudentListResponse::decl(),
        server::routes::students::StudentResponse::decl(),
        server::routes::students::PhotoResponse::decl(),
        server::routes::criteria::CriterionResponse::decl(),
        server::routes::notifications::NotificationResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("// This file was generated by `generate_types`. Do not edit it by hand.\n\n{body}\n")
}

fn main() -> std::io::Result<()> {
    let check_mode = env::args().any(|arg| arg == "--check");
    let path = env::var("TYPES_OUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("shared/types.ts"));
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&path).unwrap_or_default();
        if current == generated {
            println!("{} is up to date.", path.display());
            return Ok(());
        }
        eprintln!("{} is out of date. Run `cargo run --bin generate_types`.", path.display());
        std::process::exit(1);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, generated)?;
    println!("Wrote {}", path.display());
    Ok(())
}
