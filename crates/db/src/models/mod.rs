pub mod class;
pub mod criterion;
pub mod notification;
pub mod student;
pub mod user;
