use serde::{Deserialize, Serialize};

/// Engine tuning supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum number of worklist dequeues per analyzed function. The
    /// exploration is explicitly unsound past this limit: the walk stops
    /// and reports what it found so far.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

/// Arbitrary limit; generous enough for real method bodies, small enough
/// to keep pathological state spaces from dominating a batch.
fn default_max_steps() -> usize {
    6200
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self { max_steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_applied_to_missing_fields() {
        let config: AnalysisConfig = serde_json::from_str("{}").expect("empty config is valid");
        assert_eq!(config.max_steps, AnalysisConfig::default().max_steps);
    }

    #[test]
    fn explicit_budget_overrides_the_default() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"max_steps": 50}"#).expect("valid config");
        assert_eq!(config.max_steps, 50);
    }
}
