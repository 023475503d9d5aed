//! Configuration for the ledger components.
//!
//! Every field has a default matching the consortium's deployed policy, so a
//! YAML file only needs the keys it overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// YAML could not be parsed
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Values are inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Admission gate configuration
    pub admission: AdmissionConfig,
    /// Consortium voting configuration
    pub consortium: ConsortiumConfig,
    /// Audit configuration
    pub audit: AuditConfig,
}

impl LedgerConfig {
    /// Load and validate config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.admission.validate()?;
        self.consortium.validate()
    }
}

/// What admission does when a trial id is already on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionPolicy {
    /// Last write wins; history keeps the earlier versions
    #[default]
    Overwrite,
    /// Fail with a conflict
    Reject,
}

/// Admission gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Eligibility must contain at least one of these markers
    pub accepted_age_ranges: Vec<String>,
    /// Sentinel token proving the external bias check passed
    pub approval_token: String,
    /// Handling of an existing trial id
    pub resubmission: ResubmissionPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            accepted_age_ranges: vec![
                "18-65".to_string(),
                "18-40".to_string(),
                "All ages".to_string(),
            ],
            approval_token: "ML_APPROVED".to_string(),
            resubmission: ResubmissionPolicy::Overwrite,
        }
    }
}

impl AdmissionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.accepted_age_ranges.is_empty() {
            return Err(ConfigError::Invalid(
                "admission.accepted_age_ranges must not be empty".into(),
            ));
        }
        if self.accepted_age_ranges.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "admission.accepted_age_ranges must not contain blank markers".into(),
            ));
        }
        if self.approval_token.is_empty() {
            return Err(ConfigError::Invalid(
                "admission.approval_token must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Consortium voting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsortiumConfig {
    /// Organizations allowed to vote
    pub voter_orgs: BTreeSet<String>,
    /// Distinct approving organizations needed to approve
    pub approvals_required: usize,
    /// Total votes after which an unapproved request is rejected
    pub max_votes: usize,
    /// Request lifetime in calendar months
    pub request_ttl_months: u32,
    /// Refuse votes on pending requests past their expiry
    pub expire_stale_requests: bool,
}

impl Default for ConsortiumConfig {
    fn default() -> Self {
        Self {
            voter_orgs: ["RegulatorMSP", "SponsorMSP", "EthicsMSP", "Org1MSP"]
                .into_iter()
                .map(String::from)
                .collect(),
            approvals_required: 2,
            max_votes: 3,
            request_ttl_months: 1,
            expire_stale_requests: true,
        }
    }
}

impl ConsortiumConfig {
    /// Whether `org` may vote.
    pub fn is_voter(&self, org: &str) -> bool {
        self.voter_orgs.contains(org)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.approvals_required == 0 {
            return Err(ConfigError::Invalid(
                "consortium.approvals_required must be at least 1".into(),
            ));
        }
        if self.voter_orgs.len() < self.approvals_required {
            return Err(ConfigError::Invalid(format!(
                "consortium.voter_orgs lists {} organizations but {} distinct approvals are required",
                self.voter_orgs.len(),
                self.approvals_required
            )));
        }
        if self.max_votes < self.approvals_required {
            return Err(ConfigError::Invalid(format!(
                "consortium.max_votes ({}) is below approvals_required ({})",
                self.max_votes, self.approvals_required
            )));
        }
        if self.request_ttl_months == 0 {
            return Err(ConfigError::Invalid(
                "consortium.request_ttl_months must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Audit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Organizations allowed to read history and full dumps
    pub privileged_orgs: BTreeSet<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            privileged_orgs: ["RegulatorMSP", "Org1MSP"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AuditConfig {
    /// Whether `org` is privileged.
    pub fn is_privileged(&self, org: &str) -> bool {
        self.privileged_orgs.contains(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.admission.approval_token, "ML_APPROVED");
        assert_eq!(config.consortium.approvals_required, 2);
        assert_eq!(config.consortium.max_votes, 3);
        assert!(config.consortium.is_voter("EthicsMSP"));
        assert!(!config.consortium.is_voter("ResearchMSP"));
        assert!(config.audit.is_privileged("RegulatorMSP"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = LedgerConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = LedgerConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
consortium:
  voter_orgs: [RegulatorMSP, SponsorMSP]
admission:
  resubmission: reject
"#;
        let config = LedgerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.consortium.voter_orgs.len(), 2);
        assert_eq!(config.consortium.max_votes, 3);
        assert_eq!(config.admission.resubmission, ResubmissionPolicy::Reject);
        assert_eq!(config.admission.accepted_age_ranges.len(), 3);
    }

    #[test]
    fn test_unreachable_quorum_rejected() {
        let yaml = r#"
consortium:
  voter_orgs: [RegulatorMSP]
"#;
        assert!(matches!(
            LedgerConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_blank_marker_rejected() {
        let mut config = LedgerConfig::default();
        config.admission.accepted_age_ranges.push("  ".into());
        assert!(config.validate().is_err());
    }
}
