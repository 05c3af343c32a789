// crates/core/src/findings.rs
//! Vulnerability findings reported during a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use ts_rs::TS;

use crate::event::VulnerabilityReport;
use crate::shared_log::SharedLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vulnerability finding. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Session-local id: `finding-1`, `finding-2`, ...
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub vulnerability_type: Option<String>,
    pub description: Option<String>,
    pub discovered_at: DateTime<Utc>,
    /// Agent that reported it, when the record named one.
    pub agent_id: Option<String>,
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub unknown: u32,
}

impl SeverityCounts {
    pub fn total(&self) -> u32 {
        [self.critical, self.high, self.medium, self.low, self.unknown]
            .into_iter()
            .fold(0u32, u32::saturating_add)
    }

    fn bump(&mut self, severity: Severity) {
        let slot = match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
            Severity::Unknown => &mut self.unknown,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Append-only list of findings, in report order.
#[derive(Debug, Clone, Default)]
pub struct FindingsCollector {
    findings: SharedLog<Finding>,
    counts: SeverityCounts,
}

impl FindingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finding and return it.
    pub fn record(
        &mut self,
        report: &VulnerabilityReport,
        discovered_at: DateTime<Utc>,
        agent_id: Option<&str>,
    ) -> Arc<Finding> {
        let finding = Arc::new(Finding {
            id: format!("finding-{}", self.findings.len() + 1),
            title: report.title.clone(),
            severity: report.severity,
            vulnerability_type: report.vulnerability_type.clone(),
            description: report.description.clone(),
            discovered_at,
            agent_id: agent_id.map(str::to_owned),
        });
        self.counts.bump(finding.severity);
        self.findings.push(Arc::clone(&finding));
        finding
    }

    pub fn all(&self) -> &SharedLog<Finding> {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(title: &str, severity: Severity) -> VulnerabilityReport {
        VulnerabilityReport {
            title: title.to_string(),
            severity,
            vulnerability_type: Some("injection".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_severity_labels_case_insensitive() {
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_label(" High "), Severity::High);
        assert_eq!(Severity::from_label("moderate"), Severity::Medium);
        assert_eq!(Severity::from_label("info"), Severity::Unknown);
    }

    #[test]
    fn test_record_assigns_sequential_ids() {
        let mut collector = FindingsCollector::new();
        let now = Utc::now();
        let first = collector.record(&report("SQLi", Severity::High), now, Some("a1"));
        let second = collector.record(&report("XSS", Severity::Medium), now, None);
        assert_eq!(first.id, "finding-1");
        assert_eq!(second.id, "finding-2");
        assert_eq!(first.agent_id.as_deref(), Some("a1"));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn test_severity_counts() {
        let mut collector = FindingsCollector::new();
        let now = Utc::now();
        for sev in [Severity::High, Severity::High, Severity::Critical, Severity::Unknown] {
            collector.record(&report("x", sev), now, None);
        }
        let counts = collector.severity_counts();
        assert_eq!(counts.high, 2);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.medium, 0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }
}
