//! Quality Report
//!
//! Output of the quality gate: a weighted AEO score with per-metric
//! breakdown, hard-invariant findings, and the pass flag the regeneration
//! controller acts on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::scoring;

/// Per-metric sub-scores on the 0..=100 scale (pre-weighting)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub direct_answer: f64,
    pub qa_format: f64,
    pub citations: f64,
    pub natural_language: f64,
    pub structure: f64,
    pub eeat: f64,
}

impl SubScores {
    /// Weighted composite on the 0..=100 scale
    pub fn composite(&self) -> f64 {
        (self.direct_answer * scoring::DIRECT_ANSWER_WEIGHT
            + self.qa_format * scoring::QA_FORMAT_WEIGHT
            + self.citations * scoring::CITATIONS_WEIGHT
            + self.natural_language * scoring::NATURAL_LANGUAGE_WEIGHT
            + self.structure * scoring::STRUCTURE_WEIGHT
            + self.eeat * scoring::EEAT_WEIGHT)
            / 100.0
    }

    /// (name, score) pairs sorted ascending by score
    pub fn weakest(&self) -> Vec<(&'static str, f64)> {
        let mut entries = vec![
            ("direct_answer", self.direct_answer),
            ("qa_format", self.qa_format),
            ("citations", self.citations),
            ("natural_language", self.natural_language),
            ("structure", self.structure),
            ("eeat", self.eeat),
        ];
        entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }

    pub fn as_map(&self) -> BTreeMap<String, f64> {
        self.weakest()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Quality gate result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    /// Weighted composite AEO score (0..=100)
    pub aeo_score: f64,
    pub sub_scores: SubScores,
    /// Hard-invariant violations; any entry forces `passed = false`
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub passed: bool,
}

impl QualityReport {
    /// Human-readable one-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "AEO {:.1}/100 ({}) | critical: {} | warnings: {}",
            self.aeo_score,
            if self.passed { "PASS" } else { "FAIL" },
            self.critical_issues.len(),
            self.warnings.len()
        )
    }

    /// Markdown rendering persisted into metadata.json exports
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Quality Report\n\n");
        md.push_str(&format!(
            "**AEO Score:** {:.1}/100 ({})\n\n",
            self.aeo_score,
            if self.passed { "PASS" } else { "FAIL" }
        ));

        md.push_str("## Sub-scores\n\n");
        md.push_str("| Metric | Score |\n|--------|-------|\n");
        for (name, score) in self.sub_scores.weakest().into_iter().rev() {
            md.push_str(&format!("| {} | {:.1} |\n", name, score));
        }

        if !self.critical_issues.is_empty() {
            md.push_str("\n## Critical Issues\n\n");
            for issue in &self.critical_issues {
                md.push_str(&format!("- {}\n", issue));
            }
        }
        if !self.warnings.is_empty() {
            md.push_str("\n## Warnings\n\n");
            for warning in &self.warnings {
                md.push_str(&format!("- {}\n", warning));
            }
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_weighting() {
        let all_hundred = SubScores {
            direct_answer: 100.0,
            qa_format: 100.0,
            citations: 100.0,
            natural_language: 100.0,
            structure: 100.0,
            eeat: 100.0,
        };
        assert!((all_hundred.composite() - 100.0).abs() < 1e-9);

        let only_direct = SubScores {
            direct_answer: 100.0,
            ..Default::default()
        };
        assert!((only_direct.composite() - scoring::DIRECT_ANSWER_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_weakest_ordering() {
        let scores = SubScores {
            direct_answer: 90.0,
            qa_format: 10.0,
            citations: 50.0,
            natural_language: 70.0,
            structure: 30.0,
            eeat: 60.0,
        };
        let weakest = scores.weakest();
        assert_eq!(weakest[0].0, "qa_format");
        assert_eq!(weakest[1].0, "structure");
    }

    #[test]
    fn test_summary_format() {
        let report = QualityReport {
            aeo_score: 81.5,
            passed: true,
            ..Default::default()
        };
        assert!(report.summary().contains("PASS"));
        assert!(report.summary().contains("81.5"));
    }
}
