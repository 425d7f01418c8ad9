//! Layer 3: path-context scoring.

use crate::types::CompiledPathRule;

/// Applies ordered path rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct ContextScorer {
    rules: Vec<CompiledPathRule>,
}

impl ContextScorer {
    pub fn new(rules: Vec<CompiledPathRule>) -> Self {
        Self { rules }
    }

    /// Multiplier for a relative path (1.0 when no rule matches).
    pub fn multiplier(&self, path: &str) -> f64 {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(path))
            .map_or(1.0, |rule| rule.multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackConfig;

    fn default_scorer() -> ContextScorer {
        ContextScorer::new(PackConfig::default().compile().unwrap().path_rules)
    }

    #[test]
    fn test_default_rules() {
        let scorer = default_scorer();
        assert_eq!(scorer.multiplier("CMakeLists.txt"), 1.5);
        assert_eq!(scorer.multiplier("docs/CMakeLists.txt"), 0.5);
        assert_eq!(scorer.multiplier("lib/tests/conanfile.txt"), 0.7);
        assert_eq!(scorer.multiplier("cmake/deps.cmake"), 1.3);
        assert_eq!(scorer.multiplier("lib/core/CMakeLists.txt"), 1.0);
    }

    #[test]
    fn test_first_match_wins() {
        let mut cfg = PackConfig::default();
        cfg.funnel.path_rules = vec![
            crate::types::PathRule::new("^examples/", 0.2),
            crate::types::PathRule::new("CMakeLists", 3.0),
        ];
        let scorer = ContextScorer::new(cfg.compile().unwrap().path_rules);
        assert_eq!(scorer.multiplier("examples/CMakeLists.txt"), 0.2);
        assert_eq!(scorer.multiplier("CMakeLists.txt"), 3.0);
    }
}
