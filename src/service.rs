//! Service layer API for leave workflow operations
use super::audit::{self, AuditLogEntry};
use super::directory::{Department, Employee, LeaveType};
use super::error::WorkflowError;
use super::flow::ApprovalFlowRegistry;
use super::ledger;
use super::notify::{self, Notification, NotificationDraft, Outcome};
use super::request::{LeaveDraft, LeaveRequest, LeaveStatus, TimeStamp};
use super::utils;
use sled::Batch;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, abort,
};
use std::sync::Arc;

/// A decision an approver can take on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    Suspend,
}

pub struct LeaveService {
    instance: Arc<sled::Db>,
    flows: ApprovalFlowRegistry,
}

type TxResult<T> = Result<T, ConflictableTransactionError<WorkflowError>>;

impl LeaveService {
    pub fn new(instance: Arc<sled::Db>, flows: ApprovalFlowRegistry) -> Self {
        Self { instance, flows }
    }

    pub fn register_employee(&self, employee: &Employee) -> Result<(), WorkflowError> {
        employee.save(&self.instance)
    }

    pub fn register_department(&self, department: &Department) -> Result<(), WorkflowError> {
        department.save(&self.instance)
    }

    pub fn register_leave_type(&self, leave_type: &LeaveType) -> Result<(), WorkflowError> {
        leave_type.save(&self.instance)
    }

    /// Submit a new leave request, stamping the first approver of the
    /// requester's department chain.
    pub fn submit_request(&self, draft: LeaveDraft) -> Result<LeaveRequest, WorkflowError> {
        let days = draft.validate()?;

        let employee = Employee::load(&self.instance, &draft.employee_id)?;
        let leave_type = LeaveType::load(&self.instance, &draft.leave_type_id)?;

        // pre-flight allowance check, distinct from the debit at final approval
        if leave_type.category.affects_balance() {
            ledger::check_available(&employee, days)?;
        }

        let first_approver = self
            .flows
            .first_approver(&employee.department_id)
            .ok_or_else(|| WorkflowError::NoChainConfigured(employee.department_id.clone()))?;

        // the chain must point at a real employee before we stamp it
        Employee::load(&self.instance, first_approver)?;

        let request = LeaveRequest {
            id: utils::mint_id("req_"),
            employee_id: employee.id.clone(),
            leave_type_id: leave_type.id.clone(),
            start_date: draft.start_date.expect("validate checked the start date"),
            end_date: draft.end_date.expect("validate checked the end date"),
            days,
            reason: draft.reason.unwrap_or_default(),
            status: LeaveStatus::Pending {
                approver: first_approver.to_string(),
            },
            created_at: TimeStamp::new(),
            attachment: draft.attachment,
            was_debited: false,
        };

        let drafts = notify::drafts_for(
            Outcome::Submitted,
            &request,
            &employee,
            &leave_type,
            self.administrator_id()?.as_deref(),
        );

        // request and submission notifications land in one batch
        let mut batch = Batch::default();
        batch.insert(LeaveRequest::storage_key(&request.id), request.to_bytes()?);
        for notification in Self::mint_notifications(&request.id, drafts)? {
            batch.insert(
                Notification::storage_key(&notification.id),
                notification.to_bytes()?,
            );
        }
        self.instance.apply_batch(batch)?;

        tracing::info!(
            request = %request.id,
            employee = %employee.id,
            leave_type = %leave_type.id,
            days,
            "leave request submitted"
        );

        Ok(request)
    }

    /// Apply an approver's decision to a pending request.
    pub fn decide(
        &self,
        request_id: &str,
        acting_employee_id: &str,
        decision: Decision,
    ) -> Result<LeaveRequest, WorkflowError> {
        let result = self.instance.transaction(|tx| {
            let mut request = load_request_tx(tx, request_id)?;

            let approver = match &request.status {
                LeaveStatus::Pending { approver } => approver.clone(),
                status => {
                    return abort(WorkflowError::InvalidTransition {
                        request: request_id.to_string(),
                        status: status.to_string(),
                    });
                }
            };

            if approver != acting_employee_id {
                return abort(WorkflowError::NotAuthorizedApprover {
                    actor: acting_employee_id.to_string(),
                    request: request_id.to_string(),
                });
            }

            let mut employee = load_employee_tx(tx, &request.employee_id)?;
            let leave_type = load_leave_type_tx(tx, &request.leave_type_id)?;
            let actor = load_employee_tx(tx, acting_employee_id)?;

            let activity;
            let mut drafts = Vec::new();

            match decision {
                Decision::Approve => {
                    match self.flows.next_after(&employee.department_id, &approver) {
                        Some(next) => {
                            request.status = LeaveStatus::Pending {
                                approver: next.to_string(),
                            };
                            activity = format!(
                                "Approved and forwarded leave request from {} ({}, {} days).",
                                employee.name,
                                leave_type.category.label(),
                                request.days,
                            );
                            drafts = notify::drafts_for(
                                Outcome::Forwarded {
                                    next_approver: next,
                                },
                                &request,
                                &employee,
                                &leave_type,
                                None,
                            );
                        }
                        None => {
                            // the allowance debit must land before any audit
                            // or notification write is staged
                            if leave_type.category.affects_balance() {
                                if let Err(e) = ledger::debit(&mut employee, request.days) {
                                    return abort(e);
                                }
                                request.was_debited = true;
                                save_employee_tx(tx, &employee)?;
                            }
                            request.status = LeaveStatus::Approved;
                            activity = format!(
                                "Gave final approval to leave request from {} ({}, {} days).",
                                employee.name,
                                leave_type.category.label(),
                                request.days,
                            );
                            drafts = notify::drafts_for(
                                Outcome::FinalApproved,
                                &request,
                                &employee,
                                &leave_type,
                                None,
                            );
                        }
                    }
                }
                Decision::Reject => {
                    request.status = LeaveStatus::Rejected;
                    activity = format!(
                        "Rejected leave request from {} ({}, {} days).",
                        employee.name,
                        leave_type.category.label(),
                        request.days,
                    );
                    drafts = notify::drafts_for(
                        Outcome::Rejected,
                        &request,
                        &employee,
                        &leave_type,
                        None,
                    );
                }
                Decision::Suspend => {
                    request.status = LeaveStatus::Suspended;
                    activity = format!(
                        "Suspended leave request from {} ({}, {} days).",
                        employee.name,
                        leave_type.category.label(),
                        request.days,
                    );
                }
            }

            save_request_tx(tx, &request)?;
            append_audit_tx(tx, &actor.name, &activity)?;
            persist_drafts_tx(tx, &request.id, &drafts)?;

            Ok(request)
        });

        let outcome = unwrap_tx(result);
        match &outcome {
            Ok(request) => tracing::info!(
                request = %request.id,
                actor = %acting_employee_id,
                status = %request.status,
                "leave request decision committed"
            ),
            Err(e) => tracing::warn!(
                request = %request_id,
                actor = %acting_employee_id,
                error = %e,
                "leave request decision refused"
            ),
        }
        outcome
    }

    /// Cancel a request. Pending requests may be cancelled by the requester
    /// or an administrator; reversing an approved or suspended request takes
    /// an administrator presenting a fresh credential.
    pub fn cancel(
        &self,
        request_id: &str,
        acting_employee_id: &str,
        reauth_token: Option<&str>,
    ) -> Result<LeaveRequest, WorkflowError> {
        let result = self.instance.transaction(|tx| {
            let mut request = load_request_tx(tx, request_id)?;
            let actor = load_employee_tx(tx, acting_employee_id)?;
            let mut employee = load_employee_tx(tx, &request.employee_id)?;
            let leave_type = load_leave_type_tx(tx, &request.leave_type_id)?;

            match &request.status {
                LeaveStatus::Pending { .. } => {
                    if actor.id != request.employee_id && !actor.is_administrator() {
                        return abort(WorkflowError::NotAuthorizedApprover {
                            actor: acting_employee_id.to_string(),
                            request: request_id.to_string(),
                        });
                    }
                }
                LeaveStatus::Approved | LeaveStatus::Suspended => {
                    if !actor.is_administrator() {
                        return abort(WorkflowError::NotAuthorizedApprover {
                            actor: acting_employee_id.to_string(),
                            request: request_id.to_string(),
                        });
                    }
                    let presented = match reauth_token {
                        Some(token) => token,
                        None => return abort(WorkflowError::ReauthenticationFailed),
                    };
                    match &actor.credential_digest {
                        Some(digest) if sha256::digest(presented) == *digest => {}
                        _ => return abort(WorkflowError::ReauthenticationFailed),
                    }
                }
                status => {
                    return abort(WorkflowError::InvalidTransition {
                        request: request_id.to_string(),
                        status: status.to_string(),
                    });
                }
            }

            // only a request that actually drew down the allowance gets it
            // back; the flag keeps the credit exactly-once
            if request.was_debited {
                ledger::credit(&mut employee, request.days);
                request.was_debited = false;
                save_employee_tx(tx, &employee)?;
            }

            request.status = LeaveStatus::Cancelled;
            save_request_tx(tx, &request)?;
            append_audit_tx(
                tx,
                &actor.name,
                &format!(
                    "Cancelled leave request for {} ({}, {} days).",
                    employee.name,
                    leave_type.category.label(),
                    request.days,
                ),
            )?;

            Ok(request)
        });

        let outcome = unwrap_tx(result);
        match &outcome {
            Ok(request) => tracing::info!(
                request = %request.id,
                actor = %acting_employee_id,
                "leave request cancelled"
            ),
            Err(e) => tracing::warn!(
                request = %request_id,
                actor = %acting_employee_id,
                error = %e,
                "leave request cancellation refused"
            ),
        }
        outcome
    }

    pub fn get_employee(&self, employee_id: &str) -> Result<Employee, WorkflowError> {
        Employee::load(&self.instance, employee_id)
    }

    pub fn get_department(&self, department_id: &str) -> Result<Department, WorkflowError> {
        Department::load(&self.instance, department_id)
    }

    pub fn get_leave_type(&self, leave_type_id: &str) -> Result<LeaveType, WorkflowError> {
        LeaveType::load(&self.instance, leave_type_id)
    }

    pub fn get_request(&self, request_id: &str) -> Result<LeaveRequest, WorkflowError> {
        let bytes = self
            .instance
            .get(LeaveRequest::storage_key(request_id))?
            .ok_or_else(|| WorkflowError::missing("request", request_id))?;
        LeaveRequest::from_bytes(request_id, &bytes)
    }

    /// Pending requests waiting on the given approver, newest first.
    pub fn list_pending_for(&self, approver_id: &str) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let mut requests =
            self.scan_requests(|r| r.status.next_approver() == Some(approver_id))?;
        requests.sort_by(|a, b| {
            b.created_at
                .to_datetime_utc()
                .cmp(&a.created_at.to_datetime_utc())
        });
        Ok(requests)
    }

    /// Every request the given employee has submitted, newest first.
    pub fn history_for(&self, employee_id: &str) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let mut requests = self.scan_requests(|r| r.employee_id == employee_id)?;
        requests.sort_by(|a, b| {
            b.created_at
                .to_datetime_utc()
                .cmp(&a.created_at.to_datetime_utc())
        });
        Ok(requests)
    }

    pub fn balance_of(&self, employee_id: &str) -> Result<u32, WorkflowError> {
        Ok(Employee::load(&self.instance, employee_id)?.leave_balance)
    }

    /// Notifications addressed to the given employee, newest first.
    pub fn notifications_for(
        &self,
        recipient_id: &str,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let mut notifications = Vec::new();
        for item in self.instance.scan_prefix(b"ntf:") {
            let (key, value) = item?;
            let id = String::from_utf8_lossy(&key[4..]).to_string();
            let notification = Notification::from_bytes(&id, &value)?;
            if notification.recipient_id == recipient_id {
                notifications.push(notification);
            }
        }
        notifications.sort_by(|a, b| {
            b.created_at
                .to_datetime_utc()
                .cmp(&a.created_at.to_datetime_utc())
        });
        Ok(notifications)
    }

    pub fn mark_read(&self, notification_id: &str) -> Result<Notification, WorkflowError> {
        let bytes = self
            .instance
            .get(Notification::storage_key(notification_id))?
            .ok_or_else(|| WorkflowError::missing("notification", notification_id))?;
        let mut notification = Notification::from_bytes(notification_id, &bytes)?;
        notification.read = true;
        self.instance.insert(
            Notification::storage_key(notification_id),
            notification.to_bytes()?,
        )?;
        Ok(notification)
    }

    pub fn mark_all_read(&self, recipient_id: &str) -> Result<(), WorkflowError> {
        for notification in self.notifications_for(recipient_id)? {
            if !notification.read {
                self.mark_read(&notification.id)?;
            }
        }
        Ok(())
    }

    /// The most recent audit entries, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        audit::recent(&self.instance, limit)
    }

    fn scan_requests(
        &self,
        keep: impl Fn(&LeaveRequest) -> bool,
    ) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let mut out = Vec::new();
        for item in self.instance.scan_prefix(b"req:") {
            let (key, value) = item?;
            let id = String::from_utf8_lossy(&key[4..]).to_string();
            let request = LeaveRequest::from_bytes(&id, &value)?;
            if keep(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }

    /// The administrative recipient for system warnings: the first
    /// administrator on the roster, if any.
    fn administrator_id(&self) -> Result<Option<String>, WorkflowError> {
        for item in self.instance.scan_prefix(b"emp:") {
            let (key, value) = item?;
            let id = String::from_utf8_lossy(&key[4..]).to_string();
            let employee = Employee::from_bytes(&id, &value)?;
            if employee.is_administrator() {
                return Ok(Some(employee.id));
            }
        }
        Ok(None)
    }

    fn mint_notifications(
        request_id: &str,
        drafts: Vec<NotificationDraft>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        drafts
            .into_iter()
            .map(|draft| {
                Ok(Notification {
                    id: utils::mint_id("ntf_"),
                    recipient_id: draft.recipient_id,
                    message: draft.message,
                    kind: draft.kind,
                    read: false,
                    created_at: TimeStamp::new(),
                    request_id: Some(request_id.to_string()),
                })
            })
            .collect()
    }
}

fn unwrap_tx<T>(result: Result<T, TransactionError<WorkflowError>>) -> Result<T, WorkflowError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(WorkflowError::Storage(e)),
    }
}

fn load_request_tx(tx: &TransactionalTree, id: &str) -> TxResult<LeaveRequest> {
    let bytes = tx.get(LeaveRequest::storage_key(id))?.ok_or_else(|| {
        ConflictableTransactionError::Abort(WorkflowError::missing("request", id))
    })?;
    LeaveRequest::from_bytes(id, &bytes).map_err(ConflictableTransactionError::Abort)
}

fn save_request_tx(tx: &TransactionalTree, request: &LeaveRequest) -> TxResult<()> {
    let bytes = request
        .to_bytes()
        .map_err(ConflictableTransactionError::Abort)?;
    tx.insert(LeaveRequest::storage_key(&request.id), bytes)?;
    Ok(())
}

fn load_employee_tx(tx: &TransactionalTree, id: &str) -> TxResult<Employee> {
    let bytes = tx.get(Employee::storage_key(id))?.ok_or_else(|| {
        ConflictableTransactionError::Abort(WorkflowError::missing("employee", id))
    })?;
    Employee::from_bytes(id, &bytes).map_err(ConflictableTransactionError::Abort)
}

fn save_employee_tx(tx: &TransactionalTree, employee: &Employee) -> TxResult<()> {
    let bytes = employee
        .to_bytes()
        .map_err(ConflictableTransactionError::Abort)?;
    tx.insert(Employee::storage_key(&employee.id), bytes)?;
    Ok(())
}

fn load_leave_type_tx(tx: &TransactionalTree, id: &str) -> TxResult<LeaveType> {
    let bytes = tx.get(LeaveType::storage_key(id))?.ok_or_else(|| {
        ConflictableTransactionError::Abort(WorkflowError::missing("leave type", id))
    })?;
    minicbor::decode(&bytes).map_err(|e| {
        ConflictableTransactionError::Abort(WorkflowError::corrupt("leave type", id, e))
    })
}

fn append_audit_tx(tx: &TransactionalTree, actor: &str, activity: &str) -> TxResult<()> {
    let (uuid, id) = utils::mint_keyed_id("log_");
    let entry = AuditLogEntry {
        id,
        at: TimeStamp::new(),
        actor: actor.to_string(),
        activity: activity.to_string(),
    };
    let bytes = entry
        .to_bytes()
        .map_err(ConflictableTransactionError::Abort)?;
    tx.insert(AuditLogEntry::storage_key(uuid.as_bytes()), bytes)?;
    Ok(())
}

fn persist_drafts_tx(
    tx: &TransactionalTree,
    request_id: &str,
    drafts: &[NotificationDraft],
) -> TxResult<()> {
    for draft in drafts {
        let notification = Notification {
            id: utils::mint_id("ntf_"),
            recipient_id: draft.recipient_id.clone(),
            message: draft.message.clone(),
            kind: draft.kind,
            read: false,
            created_at: TimeStamp::new(),
            request_id: Some(request_id.to_string()),
        };
        let bytes = notification
            .to_bytes()
            .map_err(ConflictableTransactionError::Abort)?;
        tx.insert(Notification::storage_key(&notification.id), bytes)?;
    }
    Ok(())
}
