//! The audit engine (C13, spec §4.12): walks all entries and accumulates
//! issues rather than failing eagerly, so an `agent`-profile caller gets one
//! full picture of everything wrong with an archive before deciding whether
//! to trust it.
//!
//! Collision detection is grounded on `unicode-normalization` (pack-sourced:
//! no teacher repo in this corpus has an audit/normalize engine to learn
//! from) for NFC equivalence, plus a hand-rolled Unicode simple casefold
//! with the Turkic `I`/`ı`/`İ`/`i` exclusions spec §4.12 calls out by name.

use std::collections::BTreeMap;

use archive_format::fsm::archive::PreflightNote;
use archive_format::{ArchiveProfile, ResourceLimits};
use unicode_normalization::UnicodeNormalization;

use crate::error::Error;
use crate::reader::{ArchiveEntryKind, OpenArchive};

/// How serious an [`ArchiveIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth surfacing but not a safety problem (e.g. a clamped limit).
    Info,
    /// A safety-relevant condition that `agent`/`strict` profiles should
    /// treat as blocking.
    Warning,
    /// A condition that makes the archive actively unsafe to trust.
    Error,
}

/// One discrepancy found while auditing an archive.
#[derive(Debug, Clone)]
pub struct ArchiveIssue {
    /// Stable, machine-readable code (e.g. `ZIP_DUPLICATE_ENTRY`).
    pub code: &'static str,
    /// How serious this issue is.
    pub severity: Severity,
    /// Human-readable detail.
    pub message: String,
    /// The entry this issue pertains to, if any.
    pub entry_name: Option<String>,
    /// A byte offset relevant to this issue, if any.
    pub offset: Option<u64>,
    /// Additional machine-readable context.
    pub details: BTreeMap<String, String>,
}

/// The result of auditing an archive (spec §3's `ArchiveAuditReport`).
#[derive(Debug, Clone)]
pub struct ArchiveAuditReport {
    /// `true` when no `warning`/`error` severity issue is present.
    pub ok: bool,
    /// All issues found, in discovery order.
    pub issues: Vec<ArchiveIssue>,
    /// Count of issues per severity.
    pub info_count: usize,
    /// Count of warning-severity issues.
    pub warning_count: usize,
    /// Count of error-severity issues.
    pub error_count: usize,
}

impl ArchiveAuditReport {
    fn from_issues(issues: Vec<ArchiveIssue>) -> Self {
        let info_count = issues.iter().filter(|i| i.severity == Severity::Info).count();
        let warning_count = issues.iter().filter(|i| i.severity == Severity::Warning).count();
        let error_count = issues.iter().filter(|i| i.severity == Severity::Error).count();
        ArchiveAuditReport { ok: warning_count == 0 && error_count == 0, issues, info_count, warning_count, error_count }
    }

    /// Fail with `ARCHIVE_AUDIT_FAILED` if this report is not `ok`, carrying
    /// the full issue list in the error's context (spec §4.14/§7).
    pub fn assert_safe(&self) -> Result<(), Error> {
        if self.ok {
            return Ok(());
        }
        let summary = self
            .issues
            .iter()
            .filter(|i| i.severity != Severity::Info)
            .map(|i| format!("{}:{}", i.code, i.entry_name.as_deref().unwrap_or("-")))
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::new("ARCHIVE_AUDIT_FAILED", format!("audit found unresolved issues: {summary}"))
            .with_context([("issueCount", self.issues.len().to_string())]))
    }
}

/// How a collision between two entry names was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Byte-identical names.
    Exact,
    /// Equal under Unicode simple casefold (Turkic exclusions applied).
    Casefold,
    /// Equal under NFC normalization but byte-distinct.
    Normalization,
}

fn is_zip(open: &OpenArchive) -> bool {
    matches!(open.format, crate::detect::ArchiveFormat::Zip)
}

/// Unicode simple casefold with the Turkic exclusions spec §4.12 calls out
/// by name: ASCII `I`/`i` fold only among themselves, and `İ`/`ı` fold only
/// among themselves, never crossing the two pairs (unlike the default
/// Unicode casefold table, which treats all four as equivalent).
fn casefold_key(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'I' => 'i',
            // `İ` (U+0130) and `ı` (U+0131) have no *simple* casefold mapping
            // at all — only the Turkish-specific full fold maps them onto
            // `i`/`I`. Leaving them as themselves is what keeps "İ vs i" and
            // "I vs ı" from colliding, per spec §4.12/§8.7.
            'İ' => 'İ',
            'ı' => 'ı',
            other => other.to_lowercase().next().unwrap_or(other),
        })
        .collect()
}

fn nfc_key(name: &str) -> String {
    name.nfc().collect::<String>()
}

/// Audit an already-opened archive per spec §4.12.
pub fn audit(open: &OpenArchive, _limits: &ResourceLimits, profile: ArchiveProfile) -> ArchiveAuditReport {
    let zip = is_zip(open);
    let mut issues = Vec::new();

    let mut by_exact: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut by_casefold: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_nfc: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (i, entry) in open.entries.iter().enumerate() {
        by_exact.entry(entry.name.as_str()).or_default().push(i);
        by_casefold.entry(casefold_key(&entry.name)).or_default().push(i);
        by_nfc.entry(nfc_key(&entry.name)).or_default().push(i);

        match path_traversal_reason(&entry.name) {
            Some(reason) => issues.push(ArchiveIssue {
                code: if zip { "ZIP_PATH_TRAVERSAL" } else { "ARCHIVE_PATH_TRAVERSAL" },
                severity: Severity::Error,
                message: format!("entry name escapes the archive root: {reason}"),
                entry_name: Some(entry.name.clone()),
                offset: None,
                details: BTreeMap::from([("reason".to_string(), reason.to_string())]),
            }),
            None => {}
        }

        match &entry.kind {
            ArchiveEntryKind::Symlink(target) => issues.push(ArchiveIssue {
                code: if zip { "ZIP_SYMLINK_PRESENT" } else { "TAR_SYMLINK_PRESENT" },
                severity: Severity::Warning,
                message: "archive contains a symbolic link".into(),
                entry_name: Some(entry.name.clone()),
                offset: None,
                details: BTreeMap::from([("target".to_string(), target.clone())]),
            }),
            ArchiveEntryKind::HardLink(target) => issues.push(ArchiveIssue {
                code: "TAR_HARDLINK_PRESENT",
                severity: Severity::Warning,
                message: "archive contains a hard link".into(),
                entry_name: Some(entry.name.clone()),
                offset: None,
                details: BTreeMap::from([("target".to_string(), target.clone())]),
            }),
            _ => {}
        }
    }

    for idxs in by_exact.values() {
        if idxs.len() > 1 {
            for &i in &idxs[1..] {
                issues.push(ArchiveIssue {
                    code: if zip { "ZIP_DUPLICATE_ENTRY" } else { "TAR_DUPLICATE_ENTRY" },
                    severity: Severity::Error,
                    message: format!("duplicate entry name {:?}", open.entries[i].name),
                    entry_name: Some(open.entries[i].name.clone()),
                    offset: None,
                    details: BTreeMap::new(),
                });
            }
        }
    }

    for idxs in by_casefold.values() {
        if idxs.len() > 1 && !all_exact_equal(open, idxs) {
            let a = &open.entries[idxs[0]].name;
            for &i in &idxs[1..] {
                issues.push(ArchiveIssue {
                    code: if zip { "ZIP_CASE_COLLISION" } else { "TAR_CASE_COLLISION" },
                    severity: Severity::Warning,
                    message: format!("{:?} and {:?} collide under casefold", a, open.entries[i].name),
                    entry_name: Some(open.entries[i].name.clone()),
                    offset: None,
                    details: BTreeMap::from([("collidesWith".to_string(), a.clone())]),
                });
            }
        }
    }

    for idxs in by_nfc.values() {
        if idxs.len() > 1 && !all_exact_equal(open, idxs) {
            let a = &open.entries[idxs[0]].name;
            let code = if zip { "ZIP_NORMALIZATION_COLLISION" } else { "TAR_NORMALIZATION_COLLISION" };
            for &i in &idxs[1..] {
                issues.push(ArchiveIssue {
                    code,
                    severity: Severity::Warning,
                    message: format!("{:?} and {:?} are NFC-equal but byte-distinct", a, open.entries[i].name),
                    entry_name: Some(open.entries[i].name.clone()),
                    offset: None,
                    details: BTreeMap::from([("collidesWith".to_string(), a.clone())]),
                });
            }
        }
    }

    if matches!(profile, ArchiveProfile::Strict) {
        // Strict mode treats any warning as fatal (spec §4.12's severity
        // policy), so promote warnings to errors before counting.
        for issue in &mut issues {
            if issue.severity == Severity::Warning {
                issue.severity = Severity::Error;
            }
        }
    }

    ArchiveAuditReport::from_issues(issues)
}

fn all_exact_equal(open: &OpenArchive, idxs: &[usize]) -> bool {
    idxs.windows(2).all(|w| open.entries[w[0]].name == open.entries[w[1]].name)
}

/// Fold preflight notes (e.g. `ZIP_EOCD_SEARCH_CLAMPED`,
/// `COMPRESSION_RESOURCE_PREFLIGHT_INCOMPLETE`) into audit issues.
pub fn issues_from_notes(notes: &[PreflightNote]) -> Vec<ArchiveIssue> {
    notes
        .iter()
        .map(|n| ArchiveIssue {
            code: n.code,
            severity: Severity::Info,
            message: n.message.clone(),
            entry_name: None,
            offset: None,
            details: BTreeMap::new(),
        })
        .collect()
}

/// Find why `name` would escape the archive root when extracted, if it
/// would: `..` segments, an absolute root, a drive letter, or a
/// backslash-delimited component that normalizes to one of those.
fn path_traversal_reason(name: &str) -> Option<&'static str> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Some("absolute path");
    }
    if normalized.len() >= 2 && normalized.as_bytes()[1] == b':' {
        return Some("drive-letter root");
    }
    if normalized.split('/').any(|seg| seg == "..") {
        return Some("parent-directory traversal");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ArchiveFormat;
    use crate::reader::{ArchiveEntry, OpenArchive};

    fn archive(entries: Vec<(&str, ArchiveEntryKind)>) -> OpenArchive {
        let entries: Vec<ArchiveEntry> = entries
            .into_iter()
            .map(|(name, kind)| ArchiveEntry { name: name.to_string(), kind, size: 0, mode: None })
            .collect();
        let n = entries.len();
        OpenArchive {
            format: ArchiveFormat::Zip,
            comment: String::new(),
            entries,
            contents: vec![Vec::new(); n],
            notes: Vec::new(),
        }
    }

    #[test]
    fn detects_exact_duplicate() {
        let open = archive(vec![("dup.txt", ArchiveEntryKind::File), ("dup.txt", ArchiveEntryKind::File)]);
        let report = audit(&open, &ResourceLimits::default(), ArchiveProfile::Compat);
        assert!(report.issues.iter().any(|i| i.code == "ZIP_DUPLICATE_ENTRY"));
        assert!(!report.ok);
    }

    #[test]
    fn detects_case_collision() {
        let open = archive(vec![("Readme.txt", ArchiveEntryKind::File), ("README.TXT", ArchiveEntryKind::File)]);
        let report = audit(&open, &ResourceLimits::default(), ArchiveProfile::Compat);
        assert!(report.issues.iter().any(|i| i.code == "ZIP_CASE_COLLISION"));
    }

    #[test]
    fn detects_path_traversal() {
        let open = archive(vec![("../etc/passwd", ArchiveEntryKind::File)]);
        let report = audit(&open, &ResourceLimits::default(), ArchiveProfile::Agent);
        assert!(report.issues.iter().any(|i| i.code == "ZIP_PATH_TRAVERSAL"));
        assert!(report.assert_safe().is_err());
    }

    #[test]
    fn turkic_i_does_not_collide_with_ascii_i() {
        assert_ne!(casefold_key("I"), casefold_key("ı"));
        assert_ne!(casefold_key("İ"), casefold_key("i"));
    }

    #[test]
    fn clean_archive_passes_assert_safe() {
        let open = archive(vec![("a.txt", ArchiveEntryKind::File), ("b.txt", ArchiveEntryKind::File)]);
        let report = audit(&open, &ResourceLimits::default(), ArchiveProfile::Agent);
        assert!(report.assert_safe().is_ok());
    }
}
