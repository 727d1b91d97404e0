//! Notification records and the dispatch rules deciding who gets told what
use super::directory::{Employee, LeaveType};
use super::error::WorkflowError;
use super::request::{LeaveRequest, TimeStamp};
use chrono::Utc;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone, Copy)]
pub enum NotificationKind {
    #[n(0)]
    Info,
    #[n(1)]
    Warning,
    #[n(2)]
    Success,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Notification {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub recipient_id: String,
    #[n(2)]
    pub message: String,
    #[n(3)]
    pub kind: NotificationKind,
    #[n(4)]
    pub read: bool,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub request_id: Option<String>,
}

impl Notification {
    pub fn storage_key(id: &str) -> Vec<u8> {
        [b"ntf:", id.as_bytes()].concat()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WorkflowError> {
        minicbor::to_vec(self).map_err(|e| WorkflowError::corrupt("notification", &self.id, e))
    }

    pub fn from_bytes(id: &str, bytes: &[u8]) -> Result<Self, WorkflowError> {
        minicbor::decode(bytes).map_err(|e| WorkflowError::corrupt("notification", id, e))
    }
}

/// A notification the dispatcher wants persisted. The service mints the id
/// and timestamp when it commits the transition.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// The transition a request just went through, as far as notifications care.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Submitted,
    Forwarded { next_approver: &'a str },
    FinalApproved,
    Rejected,
}

/// Decide which notifications a transition owes, and to whom. Pure: no ids,
/// no timestamps, no storage.
pub fn drafts_for(
    outcome: Outcome<'_>,
    request: &LeaveRequest,
    employee: &Employee,
    leave_type: &LeaveType,
    admin_id: Option<&str>,
) -> Vec<NotificationDraft> {
    let mut drafts = Vec::new();

    match outcome {
        Outcome::Submitted => {
            // a request that should carry evidence but doesn't reminds both
            // the requester and the administrative recipient
            if leave_type.category.requires_evidence() && request.attachment.is_none() {
                drafts.push(NotificationDraft {
                    recipient_id: employee.id.clone(),
                    message: format!(
                        "Your {} request from {} is awaiting a supporting document.",
                        leave_type.category.label(),
                        request.start_date,
                    ),
                    kind: NotificationKind::Warning,
                });
                if let Some(admin) = admin_id {
                    drafts.push(NotificationDraft {
                        recipient_id: admin.to_string(),
                        message: format!(
                            "{} submitted a {} request without a supporting document.",
                            employee.name,
                            leave_type.category.label(),
                        ),
                        kind: NotificationKind::Warning,
                    });
                }
            }
        }
        Outcome::Forwarded { next_approver } => {
            drafts.push(NotificationDraft {
                recipient_id: next_approver.to_string(),
                message: format!(
                    "A leave request from {} ({}, {} days) is awaiting your approval.",
                    employee.name,
                    leave_type.category.label(),
                    request.days,
                ),
                kind: NotificationKind::Info,
            });
        }
        Outcome::FinalApproved => {
            drafts.push(NotificationDraft {
                recipient_id: employee.id.clone(),
                message: "Your leave request has been approved by all approvers.".to_string(),
                kind: NotificationKind::Success,
            });
        }
        Outcome::Rejected => {
            drafts.push(NotificationDraft {
                recipient_id: employee.id.clone(),
                message: "Your leave request was rejected.".to_string(),
                kind: NotificationKind::Info,
            });
        }
    }

    drafts
}
