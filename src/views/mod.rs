//! UI-agnostic page models
//!
//! `invite_record` is the candidate page, `dashboard` the recruiter page.
//! Both return serializable models that a frontend renders as-is.

pub mod dashboard;
pub mod invite_record;

pub use dashboard::{Banner, DashboardAction, DashboardModel, DashboardView};
pub use invite_record::{
    available_actions, status_message, InviteRecordModel, InviteRecordView, PendingUpload,
    RecorderAction, UploadOutcome, INVALID_INVITE_MESSAGE,
};
