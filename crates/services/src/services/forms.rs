//! Declarative form schemas served to the frontend.
//!
//! Each field carries a [`FieldKind`] variant, so a renderer matches on the
//! kind instead of dispatching on loose type strings.

use db::models::{class::Class, student::StudentStatus};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::weights::{MAX_TOTAL_WEIGHT, round_weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FormResource {
    Class,
    Student,
    Criterion,
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl From<&Class> for SelectOption {
    fn from(class: &Class) -> Self {
        Self::new(class.id.to_string(), class.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Number { min: f64, max: f64, step: f64 },
    Textarea { rows: u32 },
    Select { options: Vec<SelectOption> },
    Avatar { accept: String },
    Badges { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub placeholder: Option<String>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub kind: FieldKind,
}

impl FormField {
    fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: false,
            placeholder: None,
            kind,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FormSchema {
    pub resource: FormResource,
    pub title: String,
    pub fields: Vec<FormField>,
}

/// Data some schemas need from the caller's account.
#[derive(Debug, Clone, Default)]
pub struct FormContext {
    pub classes: Vec<SelectOption>,
    /// Free weight of the class a criterion is being added to.
    pub available_weight: Option<f64>,
}

impl FormSchema {
    pub fn for_resource(resource: FormResource, ctx: &FormContext) -> Self {
        let (title, fields) = match resource {
            FormResource::Class => (
                "Class",
                vec![
                    FormField::new("name", "Class name", FieldKind::Text)
                        .required()
                        .placeholder("Ex: Turma A"),
                    FormField::new("subject", "Subject", FieldKind::Text)
                        .required()
                        .placeholder("Ex: Mathematics"),
                    FormField::new("academic_year", "Academic year", FieldKind::Text)
                        .required()
                        .placeholder("Ex: 2024"),
                ],
            ),
            FormResource::Student => (
                "Student",
                vec![
                    FormField::new(
                        "photo_url",
                        "Photo",
                        FieldKind::Avatar {
                            accept: "image/*".to_string(),
                        },
                    ),
                    FormField::new("name", "Full name", FieldKind::Text)
                        .required()
                        .placeholder("Ex: João Silva Santos"),
                    FormField::new("registration_number", "Registration number", FieldKind::Text)
                        .required()
                        .placeholder("Ex: 2024001"),
                    FormField::new("email", "Email", FieldKind::Email).placeholder("student@email.com"),
                    FormField::new(
                        "status",
                        "Status",
                        FieldKind::Select {
                            options: status_options(),
                        },
                    )
                    .required(),
                    FormField::new(
                        "class_ids",
                        "Classes",
                        FieldKind::Badges {
                            options: ctx.classes.clone(),
                        },
                    ),
                ],
            ),
            FormResource::Criterion => {
                let available = ctx.available_weight.unwrap_or(MAX_TOTAL_WEIGHT).max(0.0);
                let weight_label = match ctx.available_weight {
                    Some(_) => format!("Weight (%) - Available: {}%", round_weight(available)),
                    None => "Weight (%)".to_string(),
                };
                (
                    "Evaluation criterion",
                    vec![
                        FormField::new("name", "Criterion name", FieldKind::Text)
                            .required()
                            .placeholder("Ex: Exams, Assignments, Participation"),
                        FormField::new(
                            "weight",
                            &weight_label,
                            FieldKind::Number {
                                min: 0.0,
                                max: available,
                                step: 0.01,
                            },
                        )
                        .required()
                        .placeholder("Ex: 30"),
                        FormField::new("description", "Description", FieldKind::Textarea { rows: 3 })
                            .placeholder("Describe how this criterion is evaluated..."),
                    ],
                )
            }
            FormResource::Login => (
                "Sign in",
                vec![
                    FormField::new("email", "Email", FieldKind::Email).required(),
                    FormField::new("password", "Password", FieldKind::Password).required(),
                ],
            ),
            FormResource::Register => (
                "New user",
                vec![
                    FormField::new("name", "Name", FieldKind::Text).required(),
                    FormField::new("email", "Email", FieldKind::Email).required(),
                    FormField::new("password", "Password", FieldKind::Password).required(),
                    FormField::new(
                        "role",
                        "Role",
                        FieldKind::Select {
                            options: vec![
                                SelectOption::new("teacher", "Teacher"),
                                SelectOption::new("admin", "Administrator"),
                            ],
                        },
                    )
                    .required(),
                ],
            ),
        };

        Self {
            resource,
            title: title.to_string(),
            fields,
        }
    }
}

fn status_options() -> Vec<SelectOption> {
    [
        (StudentStatus::Active, "Active"),
        (StudentStatus::Inactive, "Inactive"),
        (StudentStatus::Locked, "Locked"),
    ]
    .into_iter()
    .map(|(status, label)| SelectOption::new(status.to_string(), label))
    .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn resources_parse_from_path_segments() {
        assert_eq!(FormResource::from_str("student").unwrap(), FormResource::Student);
        assert!(FormResource::from_str("grades").is_err());
    }

    #[test]
    fn student_badges_list_the_callers_classes() {
        let ctx = FormContext {
            classes: vec![SelectOption::new("c1", "Turma A")],
            available_weight: None,
        };
        let schema = FormSchema::for_resource(FormResource::Student, &ctx);
        let badges = schema
            .fields
            .iter()
            .find(|f| f.name == "class_ids")
            .unwrap();
        assert_eq!(
            badges.kind,
            FieldKind::Badges {
                options: vec![SelectOption::new("c1", "Turma A")]
            }
        );
        let status = schema.fields.iter().find(|f| f.name == "status").unwrap();
        match &status.kind {
            FieldKind::Select { options } => {
                let values: Vec<_> = options.iter().map(|o| o.value.as_str()).collect();
                assert_eq!(values, vec!["active", "inactive", "locked"]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn criterion_weight_is_capped_by_available() {
        let ctx = FormContext {
            classes: Vec::new(),
            available_weight: Some(30.0),
        };
        let schema = FormSchema::for_resource(FormResource::Criterion, &ctx);
        let weight = &schema.fields[1];
        assert_eq!(weight.label, "Weight (%) - Available: 30%");
        assert_eq!(
            weight.kind,
            FieldKind::Number {
                min: 0.0,
                max: 30.0,
                step: 0.01
            }
        );
    }

    #[test]
    fn field_kind_serializes_as_a_tag() {
        let field = FormField::new("description", "Description", FieldKind::Textarea { rows: 3 });
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "textarea");
        assert_eq!(json["rows"], 3);
        assert_eq!(json["name"], "description");
    }
}
