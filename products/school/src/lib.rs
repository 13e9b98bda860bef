//! School domain operations.
//!
//! Every mutation goes through [`ActionGuard`], which decides from the
//! caller's [`Principal`](platform_authz::Principal) and the target row
//! whether the write may happen. Reads are narrowed by role inside the
//! queries in [`listing`], [`attendance`] and [`dashboard`].

pub mod attendance;
pub mod dashboard;
mod error;
mod guard;
pub mod listing;
mod ownership;
mod payload;
mod people;
mod persist;
pub mod schedule;

pub use attendance::{
    AttendanceBatch, AttendanceMark, AttendanceRecord, RosterEntry, class_roster,
    replace_attendance,
};
pub use dashboard::{Dashboard, dashboard};
pub use error::{ActionError, ActionResult};
pub use guard::{ActionGuard, Persisted};
pub use listing::{ITEM_PER_PAGE, Page};
pub use payload::{
    Action, AnnouncementInput, AssignmentInput, AttendanceInput, ClassInput, EventInput, ExamInput,
    Graded, LessonInput, ParentInput, Payload, ResultInput, StudentInput, SubjectInput, Target,
    TeacherInput,
};
