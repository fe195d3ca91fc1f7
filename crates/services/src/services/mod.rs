pub mod auth;
pub mod classes;
pub mod config;
pub mod criteria;
pub mod dashboard;
pub mod export;
pub mod forms;
pub mod notification;
pub mod students;
pub mod uploads;
pub mod weights;
