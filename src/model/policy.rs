//! Run-scoped policy constraints.

use serde::{Deserialize, Serialize};

/// Constraints checked both while ranking and again after content generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_max_applications")]
    pub max_applications_per_day: usize,
    #[serde(default = "default_min_match_threshold")]
    pub min_match_threshold: f64,
    #[serde(default)]
    pub blocked_companies: Vec<String>,
    #[serde(default)]
    pub blocked_role_types: Vec<String>,
    #[serde(default)]
    pub require_remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_location: Option<String>,
}

fn default_max_applications() -> usize {
    50
}

fn default_min_match_threshold() -> f64 {
    30.0
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_applications_per_day: default_max_applications(),
            min_match_threshold: default_min_match_threshold(),
            blocked_companies: Vec::new(),
            blocked_role_types: Vec::new(),
            require_remote: false,
            required_location: None,
        }
    }
}

impl Policy {
    /// Case-insensitive exact match against the blocked organization list.
    pub fn blocked_company(&self, organization: &str) -> Option<&str> {
        let org = organization.trim().to_lowercase();
        self.blocked_companies
            .iter()
            .find(|b| b.trim().to_lowercase() == org)
            .map(String::as_str)
    }

    /// First blocked role-type substring found in the title.
    pub fn blocked_role(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.blocked_role_types
            .iter()
            .filter(|r| !r.trim().is_empty())
            .find(|r| title.contains(&r.to_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let policy: Policy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.max_applications_per_day, 50);
        assert_eq!(policy.min_match_threshold, 30.0);
        assert!(!policy.require_remote);
    }

    #[test]
    fn blocked_company_ignores_case() {
        let policy = Policy {
            blocked_companies: vec!["Evil Corp".into()],
            ..Default::default()
        };
        assert_eq!(policy.blocked_company("evil corp"), Some("Evil Corp"));
        assert_eq!(policy.blocked_company("Evil Corporation"), None);
    }

    #[test]
    fn blocked_role_matches_substring() {
        let policy = Policy {
            blocked_role_types: vec!["sales".into(), "".into()],
            ..Default::default()
        };
        assert_eq!(policy.blocked_role("Senior Sales Engineer"), Some("sales"));
        assert_eq!(policy.blocked_role("Backend Engineer"), None);
    }
}
