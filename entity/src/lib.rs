//! sea-orm models for the school schema.

pub mod admin;
pub mod announcement;
pub mod assignment;
pub mod attendance;
pub mod class;
pub mod event;
pub mod exam;
pub mod grade;
pub mod lesson;
pub mod parent;
pub mod result;
pub mod student;
pub mod subject;
pub mod teacher;
pub mod teacher_subject;

mod enums;

pub use enums::{Day, Sex};
