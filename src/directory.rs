//! Employee, department and leave-type records
use super::error::WorkflowError;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone, Copy)]
pub enum Role {
    #[n(0)]
    Administrator,
    #[n(1)]
    Employee,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Employee {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub employee_no: String,
    #[n(3)]
    pub department_id: String,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub leave_balance: u32,
    #[n(6)]
    pub phone: Option<String>,
    #[n(7)]
    pub signature_ref: Option<String>,
    // lowercase-hex sha256 of the employee's credential, present when the
    // employee may authorize reversals
    #[n(8)]
    pub credential_digest: Option<String>,
}

impl Employee {
    pub fn is_administrator(&self) -> bool {
        matches!(self.role, Role::Administrator)
    }

    pub fn storage_key(id: &str) -> Vec<u8> {
        [b"emp:", id.as_bytes()].concat()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WorkflowError> {
        minicbor::to_vec(self).map_err(|e| WorkflowError::corrupt("employee", &self.id, e))
    }

    pub fn from_bytes(id: &str, bytes: &[u8]) -> Result<Self, WorkflowError> {
        minicbor::decode(bytes).map_err(|e| WorkflowError::corrupt("employee", id, e))
    }

    pub fn load(tree: &sled::Tree, id: &str) -> Result<Self, WorkflowError> {
        let bytes = tree
            .get(Self::storage_key(id))?
            .ok_or_else(|| WorkflowError::missing("employee", id))?;
        Self::from_bytes(id, &bytes)
    }

    pub fn save(&self, tree: &sled::Tree) -> Result<(), WorkflowError> {
        tree.insert(Self::storage_key(&self.id), self.to_bytes()?)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Department {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    // derived from the employee roster, not authoritative
    #[n(2)]
    pub employee_count: u32,
}

impl Department {
    pub fn storage_key(id: &str) -> Vec<u8> {
        [b"dept:", id.as_bytes()].concat()
    }

    pub fn load(tree: &sled::Tree, id: &str) -> Result<Self, WorkflowError> {
        let bytes = tree
            .get(Self::storage_key(id))?
            .ok_or_else(|| WorkflowError::missing("department", id))?;
        minicbor::decode(&bytes).map_err(|e| WorkflowError::corrupt("department", id, e))
    }

    pub fn save(&self, tree: &sled::Tree) -> Result<(), WorkflowError> {
        let bytes = minicbor::to_vec(self)
            .map_err(|e| WorkflowError::corrupt("department", &self.id, e))?;
        tree.insert(Self::storage_key(&self.id), bytes)?;
        Ok(())
    }
}

/// The leave category decides whether approval consumes the employee's
/// annual allowance and whether supporting evidence is expected.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone, Copy)]
pub enum LeaveCategory {
    #[n(0)]
    Annual,
    #[n(1)]
    Sick,
    #[n(2)]
    Maternity,
    #[n(3)]
    ImportantReason,
    #[n(4)]
    Unpaid,
    #[n(5)]
    Other,
}

impl LeaveCategory {
    /// Only annual leave is drawn down from the balance ledger.
    pub fn affects_balance(&self) -> bool {
        matches!(self, LeaveCategory::Annual)
    }

    /// Categories that expect a supporting document with the request.
    pub fn requires_evidence(&self) -> bool {
        matches!(self, LeaveCategory::Sick)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeaveCategory::Annual => "annual leave",
            LeaveCategory::Sick => "sick leave",
            LeaveCategory::Maternity => "maternity leave",
            LeaveCategory::ImportantReason => "important-reason leave",
            LeaveCategory::Unpaid => "unpaid leave",
            LeaveCategory::Other => "other leave",
        }
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct LeaveType {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub category: LeaveCategory,
}

impl LeaveType {
    pub fn storage_key(id: &str) -> Vec<u8> {
        [b"lt:", id.as_bytes()].concat()
    }

    pub fn load(tree: &sled::Tree, id: &str) -> Result<Self, WorkflowError> {
        let bytes = tree
            .get(Self::storage_key(id))?
            .ok_or_else(|| WorkflowError::missing("leave type", id))?;
        minicbor::decode(&bytes).map_err(|e| WorkflowError::corrupt("leave type", id, e))
    }

    pub fn save(&self, tree: &sled::Tree) -> Result<(), WorkflowError> {
        let bytes =
            minicbor::to_vec(self).map_err(|e| WorkflowError::corrupt("leave type", &self.id, e))?;
        tree.insert(Self::storage_key(&self.id), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_encoding() {
        let original = Employee {
            id: "emp_test".to_string(),
            name: "Budi Santoso".to_string(),
            employee_no: "199508172021011001".to_string(),
            department_id: "hr".to_string(),
            role: Role::Employee,
            leave_balance: 12,
            phone: None,
            signature_ref: None,
            credential_digest: None,
        };

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Employee = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn only_annual_affects_balance() {
        assert!(LeaveCategory::Annual.affects_balance());
        assert!(!LeaveCategory::Sick.affects_balance());
        assert!(!LeaveCategory::Maternity.affects_balance());
        assert!(!LeaveCategory::Unpaid.affects_balance());
    }

    #[test]
    fn only_sick_requires_evidence() {
        assert!(LeaveCategory::Sick.requires_evidence());
        assert!(!LeaveCategory::Annual.requires_evidence());
        assert!(!LeaveCategory::ImportantReason.requires_evidence());
    }
}
