use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Discord user reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discord role reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discord channel reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message already delivered through the gateway, kept so
/// the original offer DM can be found again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub u64);

/// Contract identifier with proper validation
///
/// Short decimal tokens, unique only among currently pending contracts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ValidationError::EmptyContractId);
        }

        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidContractId(id));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContractId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Validation errors for identifier types
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Contract ID cannot be empty")]
    #[diagnostic(code(gaffer::types::empty_contract_id))]
    EmptyContractId,

    #[error("Invalid contract ID: '{0}'")]
    #[diagnostic(
        code(gaffer::types::invalid_contract_id),
        help("Contract IDs are short decimal tokens, e.g. '483920'")
    )]
    InvalidContractId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_id_accepts_decimal_tokens() {
        let id = ContractId::new("483920").unwrap();
        assert_eq!(id.as_str(), "483920");
        assert_eq!(id.to_string(), "483920");
    }

    #[test]
    fn contract_id_rejects_empty() {
        assert_eq!(
            ContractId::new(""),
            Err(ValidationError::EmptyContractId)
        );
    }

    #[test]
    fn contract_id_rejects_non_decimal() {
        assert!(matches!(
            "abc123".parse::<ContractId>(),
            Err(ValidationError::InvalidContractId(_))
        ));
    }
}
