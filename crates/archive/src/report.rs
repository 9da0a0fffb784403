//! JSON-safe wire forms of the audit/normalize results (C15), following the
//! same schema-versioned, numbers-as-strings-past-2^53 convention as
//! [`crate::error::ErrorReport`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::audit::{ArchiveAuditReport, ArchiveIssue, Severity};
use crate::error::SCHEMA_VERSION;
use crate::normalize::NormalizedArchive;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum WireSeverity {
    Info,
    Warning,
    Error,
}

impl From<Severity> for WireSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Info => WireSeverity::Info,
            Severity::Warning => WireSeverity::Warning,
            Severity::Error => WireSeverity::Error,
        }
    }
}

/// The JSON-safe wire form of one [`ArchiveIssue`].
#[derive(Debug, Clone, Serialize)]
pub struct IssueReport {
    code: &'static str,
    severity: WireSeverity,
    message: String,
    #[serde(rename = "entryName", skip_serializing_if = "Option::is_none")]
    entry_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<String, String>,
}

impl From<&ArchiveIssue> for IssueReport {
    fn from(issue: &ArchiveIssue) -> Self {
        IssueReport {
            code: issue.code,
            severity: issue.severity.into(),
            message: issue.message.clone(),
            entry_name: issue.entry_name.clone(),
            offset: issue.offset.map(|o| o.to_string()),
            details: issue.details.clone(),
        }
    }
}

/// The JSON-safe wire form of an [`ArchiveAuditReport`] (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveAuditReportWire {
    #[serde(rename = "schemaVersion")]
    schema_version: &'static str,
    ok: bool,
    #[serde(rename = "infoCount")]
    info_count: String,
    #[serde(rename = "warningCount")]
    warning_count: String,
    #[serde(rename = "errorCount")]
    error_count: String,
    issues: Vec<IssueReport>,
}

impl ArchiveAuditReport {
    /// Render this report as its JSON-safe serialized form.
    pub fn to_report(&self) -> ArchiveAuditReportWire {
        ArchiveAuditReportWire {
            schema_version: SCHEMA_VERSION,
            ok: self.ok,
            info_count: self.info_count.to_string(),
            warning_count: self.warning_count.to_string(),
            error_count: self.error_count.to_string(),
            issues: self.issues.iter().map(IssueReport::from).collect(),
        }
    }
}

/// The JSON-safe wire form of a [`NormalizedArchive`] (without the byte
/// payload itself, which callers fetch separately rather than base64
/// through a JSON report).
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveNormalizeReportWire {
    #[serde(rename = "schemaVersion")]
    schema_version: &'static str,
    format: String,
    #[serde(rename = "entryCount")]
    entry_count: String,
    #[serde(rename = "byteLength")]
    byte_length: String,
    #[serde(rename = "entryNames")]
    entry_names: Vec<String>,
}

impl NormalizedArchive {
    /// Render this result as its JSON-safe serialized form.
    pub fn to_report(&self) -> ArchiveNormalizeReportWire {
        ArchiveNormalizeReportWire {
            schema_version: SCHEMA_VERSION,
            format: format!("{:?}", self.format),
            entry_count: self.entry_names.len().to_string(),
            byte_length: self.bytes.len().to_string(),
            entry_names: self.entry_names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::audit;
    use crate::detect::ArchiveFormat;
    use crate::reader::{ArchiveEntry, ArchiveEntryKind, OpenArchive};
    use archive_format::{ArchiveProfile, ResourceLimits};

    #[test]
    fn serializes_with_counts_as_strings() {
        let open = OpenArchive {
            format: ArchiveFormat::Zip,
            comment: String::new(),
            entries: vec![
                ArchiveEntry { name: "a".into(), kind: ArchiveEntryKind::File, size: 0, mode: None },
                ArchiveEntry { name: "a".into(), kind: ArchiveEntryKind::File, size: 0, mode: None },
            ],
            contents: vec![Vec::new(), Vec::new()],
            notes: Vec::new(),
        };
        let report = audit(&open, &ResourceLimits::default(), ArchiveProfile::Agent).to_report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"schemaVersion\":\"1\""));
        assert!(json.contains("\"errorCount\":\"1\""));
        assert!(!json.contains("\"errorCount\":1"));
    }
}
