//! Leave request aggregate and its lifecycle states
use super::error::WorkflowError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::fmt;

/// Creation instant of a record.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Calendar day, used for leave start and end dates.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Day(NaiveDate);

impl Day {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for Day {
    fn from(value: NaiveDate) -> Self {
        Day(value)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%-d %b %Y"))
    }
}

impl<C> minicbor::Encode<C> for Day {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Day {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(Day)
            .ok_or(minicbor::decode::Error::message(
                "day count out of range for a calendar date",
            ))
    }
}

/// Lifecycle state of a leave request. The approver waiting on a pending
/// request is embedded in the variant, so terminal states cannot carry a
/// stale approver reference.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum LeaveStatus {
    #[n(0)]
    Pending {
        #[n(0)]
        approver: String,
    },
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Suspended,
    #[n(4)]
    Cancelled,
}

impl LeaveStatus {
    /// The employee whose decision the request is waiting on, if any.
    pub fn next_approver(&self) -> Option<&str> {
        match self {
            LeaveStatus::Pending { approver } => Some(approver),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeaveStatus::Pending { .. } => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Suspended => "suspended",
            LeaveStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The central aggregate: one employee's request for a span of leave.
///
/// `was_debited` records whether the balance ledger was ever debited for this
/// request. Cancellation credits the balance back iff this flag is set, which
/// keeps the credit exactly-once no matter which state the cancel runs from.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct LeaveRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub employee_id: String,
    #[n(2)]
    pub leave_type_id: String,
    #[n(3)]
    pub start_date: Day,
    #[n(4)]
    pub end_date: Day,
    #[n(5)]
    pub days: u32,
    #[n(6)]
    pub reason: String,
    #[n(7)]
    pub status: LeaveStatus,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub attachment: Option<String>,
    #[n(10)]
    pub was_debited: bool,
}

impl LeaveRequest {
    pub fn storage_key(id: &str) -> Vec<u8> {
        [b"req:", id.as_bytes()].concat()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WorkflowError> {
        minicbor::to_vec(self).map_err(|e| WorkflowError::corrupt("request", &self.id, e))
    }

    pub fn from_bytes(id: &str, bytes: &[u8]) -> Result<Self, WorkflowError> {
        minicbor::decode(bytes).map_err(|e| WorkflowError::corrupt("request", id, e))
    }
}

/// Draft of a leave request, built field by field before submission.
#[derive(Debug, Clone)]
pub struct LeaveDraft {
    pub employee_id: String,
    pub leave_type_id: String,
    pub start_date: Option<Day>,
    pub end_date: Option<Day>,
    pub days: Option<u32>,
    pub reason: Option<String>,
    pub attachment: Option<String>,
}

impl LeaveDraft {
    /// Construct a new draft object, filled in via the setters below
    pub fn new(employee_id: &str, leave_type_id: &str) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            leave_type_id: leave_type_id.to_string(),
            start_date: None,
            end_date: None,
            days: None,
            reason: None,
            attachment: None,
        }
    }
    pub fn starting(mut self, date: Day) -> Self {
        self.start_date = Some(date);
        self
    }
    pub fn ending(mut self, date: Day) -> Self {
        self.end_date = Some(date);
        self
    }
    /// Explicit day count. When not set, the count is the inclusive span
    /// between the start and end dates.
    pub fn lasting(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
    pub fn with_attachment(mut self, attachment: &str) -> Self {
        self.attachment = Some(attachment.to_string());
        self
    }

    /// Checks the date fields and day count, returning the effective number
    /// of requested days.
    pub fn validate(&self) -> Result<u32, WorkflowError> {
        let start = self
            .start_date
            .ok_or_else(|| WorkflowError::InvalidDateRange("start date is not set".into()))?;
        let end = self
            .end_date
            .ok_or_else(|| WorkflowError::InvalidDateRange("end date is not set".into()))?;

        if end < start {
            return Err(WorkflowError::InvalidDateRange(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }

        let span = (end.to_naive_date() - start.to_naive_date()).num_days() as u32 + 1;
        let days = self.days.unwrap_or(span);

        if days == 0 {
            return Err(WorkflowError::InvalidDateRange(
                "requested day count must be greater than zero".into(),
            ));
        }

        Ok(days)
    }
}
