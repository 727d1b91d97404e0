//! Per-department approval chains
use super::error::FlowConfigError;
use std::collections::HashMap;

/// Longest approval chain a department may configure.
pub const MAX_CHAIN_LEVELS: usize = 3;

/// Ordered approver identities per department. Configuration data, immutable
/// once the registry is handed to the service.
#[derive(Debug, Default, Clone)]
pub struct ApprovalFlowRegistry {
    chains: HashMap<String, Vec<String>>,
}

impl ApprovalFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ordered approver chain for a department. Chains are 1 to
    /// [`MAX_CHAIN_LEVELS`] entries long.
    pub fn with_chain(
        mut self,
        department_id: &str,
        approvers: &[&str],
    ) -> Result<Self, FlowConfigError> {
        if approvers.is_empty() {
            return Err(FlowConfigError::EmptyChain(department_id.to_string()));
        }
        if approvers.len() > MAX_CHAIN_LEVELS {
            return Err(FlowConfigError::TooManyLevels {
                department: department_id.to_string(),
                got: approvers.len(),
                max: MAX_CHAIN_LEVELS,
            });
        }

        self.chains.insert(
            department_id.to_string(),
            approvers.iter().map(|a| a.to_string()).collect(),
        );
        Ok(self)
    }

    pub fn chain_for(&self, department_id: &str) -> &[String] {
        self.chains
            .get(department_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_approver(&self, department_id: &str) -> Option<&str> {
        self.chain_for(department_id).first().map(String::as_str)
    }

    /// The chain entry immediately after `current`, or `None` when `current`
    /// is the last entry or not on the chain at all.
    pub fn next_after(&self, department_id: &str, current: &str) -> Option<&str> {
        let chain = self.chain_for(department_id);
        let pos = chain.iter().position(|a| a == current)?;
        chain.get(pos + 1).map(String::as_str)
    }
}
