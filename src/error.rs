#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("insufficient leave balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u32, available: u32 },
    #[error("no approval chain configured for department '{0}'")]
    NoChainConfigured(String),
    #[error("employee '{actor}' is not the current approver for request '{request}'")]
    NotAuthorizedApprover { actor: String, request: String },
    #[error("invalid transition: request '{request}' is {status}")]
    InvalidTransition { request: String, status: String },
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("reauthentication failed")]
    ReauthenticationFailed,
    #[error("no {kind} record found for id '{id}'")]
    MissingRecord { kind: &'static str, id: String },
    #[error("corrupt {kind} record for id '{id}': {detail}")]
    CorruptRecord {
        kind: &'static str,
        id: String,
        detail: String,
    },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
}

impl WorkflowError {
    pub fn missing(kind: &'static str, id: impl Into<String>) -> Self {
        Self::MissingRecord {
            kind,
            id: id.into(),
        }
    }

    pub fn corrupt(kind: &'static str, id: impl Into<String>, detail: impl ToString) -> Self {
        Self::CorruptRecord {
            kind,
            id: id.into(),
            detail: detail.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FlowConfigError {
    #[error("approval chain for department '{0}' is empty")]
    EmptyChain(String),
    #[error("approval chain for department '{department}' has {got} levels, maximum is {max}")]
    TooManyLevels {
        department: String,
        got: usize,
        max: usize,
    },
}
