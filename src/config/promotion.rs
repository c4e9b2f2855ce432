//! Promotion configuration

use serde::Deserialize;

use crate::domain::promotion::EligibilityPolicy;

/// Promotion configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromotionConfig {
    /// Who counts as an "old user" for codes restricted to new users:
    /// `ever_had` or `currently_active`
    #[serde(default)]
    pub eligibility_policy: EligibilityPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_ever_had() {
        assert_eq!(
            PromotionConfig::default().eligibility_policy,
            EligibilityPolicy::EverHad
        );
    }
}
