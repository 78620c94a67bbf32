//! Conflict extraction.
//!
//! After a failed merge/rebase attempt the working tree contains standard
//! `<<<<<<<` / `=======` / `>>>>>>>` marker blocks. The extractor parses
//! each block into a structured [`ConflictRecord`] with both competing
//! segments captured verbatim, classifies it with lightweight heuristics,
//! and resolves the enclosing symbol when it can. Unmerged index entries
//! without markers (delete-vs-modify, divergent renames) become whole-file
//! records.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ConflictError;
use crate::git::{GitBackend, UnmergedEntry, UnmergedKind};

/// Start-of-block marker prefix (`<<<<<<< ours`).
const MARKER_START: &str = "<<<<<<<";
/// Diff3-style common-ancestor marker prefix.
const MARKER_ANCESTOR: &str = "|||||||";
/// Separator between the two sides.
const MARKER_SEPARATOR: &str = "=======";
/// End-of-block marker prefix (`>>>>>>> theirs`).
const MARKER_END: &str = ">>>>>>>";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a single conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// A matched function header differs in its parameter list.
    SignatureChange,
    /// Substantive code difference (safe default).
    LogicDifference,
    /// The file was renamed differently on each side.
    Rename,
    /// One side deleted the file, the other modified it.
    DeletionVsModification,
    /// Only comment/doc content differs.
    Documentation,
    /// Both sides touch import/include lines only.
    ImportChange,
    /// The sides differ only in whitespace.
    Formatting,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignatureChange => write!(f, "signature-change"),
            Self::LogicDifference => write!(f, "logic-difference"),
            Self::Rename => write!(f, "rename"),
            Self::DeletionVsModification => write!(f, "deletion-vs-modification"),
            Self::Documentation => write!(f, "documentation"),
            Self::ImportChange => write!(f, "import-change"),
            Self::Formatting => write!(f, "formatting"),
        }
    }
}

/// One parsed conflict block. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unique record id.
    pub id: String,
    /// File the conflict occurs in, relative to the repository root.
    pub file_path: String,
    /// 1-indexed line of the start marker (or 1 for whole-file records).
    pub start_line: usize,
    /// 1-indexed line of the end marker.
    pub end_line: usize,
    /// Our side of the conflict, verbatim.
    pub base_text: String,
    /// The incoming side, verbatim.
    pub incoming_text: String,
    /// Nearest enclosing function/type name, when resolvable.
    pub enclosing_symbol: Option<String>,
    pub kind: ConflictKind,
}

impl ConflictRecord {
    /// Whether our side carries TODO/FIXME markers.
    pub fn has_todo_base(&self) -> bool {
        contains_todo(&self.base_text)
    }

    /// Whether the incoming side carries TODO/FIXME markers.
    pub fn has_todo_incoming(&self) -> bool {
        contains_todo(&self.incoming_text)
    }
}

/// A file whose marker blocks could not be parsed. The workflow routes
/// these to manual resolution instead of failing the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalformedFile {
    pub path: String,
    /// Line near which parsing failed.
    pub line: usize,
}

/// Everything extracted from one conflicted working tree.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<ConflictRecord>,
    pub malformed: Vec<MalformedFile>,
}

// ---------------------------------------------------------------------------
// Helpers shared with the executor
// ---------------------------------------------------------------------------

/// Whether any conflict marker line remains in `text`.
pub fn contains_conflict_markers(text: &str) -> bool {
    text.lines().any(|line| {
        line.starts_with(MARKER_START)
            || line.starts_with(MARKER_END)
            || line.trim_end() == MARKER_SEPARATOR
    })
}

/// Whether `text` carries TODO/FIXME markers.
pub fn contains_todo(text: &str) -> bool {
    text.contains("TODO") || text.contains("FIXME")
}

/// Lines of `text` that carry TODO/FIXME markers, for annotation.
pub fn todo_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| contains_todo(l))
        .map(|l| l.trim().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Stateless conflict extractor.
pub struct ConflictExtractor;

impl ConflictExtractor {
    /// Extract all conflict records from the backend's working tree.
    ///
    /// Marker parse failures are collected per file in
    /// [`ExtractionOutcome::malformed`] rather than aborting the run.
    pub fn extract(backend: &GitBackend) -> Result<ExtractionOutcome, ConflictError> {
        let entries = backend.unmerged_entries()?;
        info!(count = entries.len(), "extracting conflicts");

        let mut outcome = ExtractionOutcome::default();
        for entry in &entries {
            match entry.kind {
                UnmergedKind::BothModified | UnmergedKind::BothAdded => {
                    let contents = std::fs::read_to_string(backend.workdir().join(&entry.path))?;
                    match Self::extract_file(&entry.path, &contents) {
                        Ok(records) => outcome.records.extend(records),
                        Err(ConflictError::MalformedConflict { path, line }) => {
                            warn!(%path, line, "malformed conflict markers, routing to manual");
                            outcome.malformed.push(MalformedFile { path, line });
                        }
                        Err(e) => return Err(e),
                    }
                }
                UnmergedKind::DeletedByUs
                | UnmergedKind::DeletedByThem
                | UnmergedKind::Renamed => {
                    outcome.records.push(Self::record_from_unmerged(backend, entry)?);
                }
            }
        }

        info!(
            records = outcome.records.len(),
            malformed = outcome.malformed.len(),
            "conflict extraction complete"
        );
        Ok(outcome)
    }

    /// Parse one file's contents into conflict records.
    ///
    /// Fails with [`ConflictError::MalformedConflict`] when a start marker
    /// has no matching end marker.
    pub fn extract_file(path: &str, contents: &str) -> Result<Vec<ConflictRecord>, ConflictError> {
        #[derive(PartialEq)]
        enum State {
            Outside,
            InBase,
            InAncestor,
            InIncoming,
        }

        let lines: Vec<&str> = contents.lines().collect();
        let mut records = Vec::new();
        let mut state = State::Outside;
        let mut block_start = 0usize;
        let mut base_lines: Vec<&str> = Vec::new();
        let mut incoming_lines: Vec<&str> = Vec::new();

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');

            if line.starts_with(MARKER_START) {
                if state != State::Outside {
                    return Err(ConflictError::MalformedConflict {
                        path: path.to_string(),
                        line: line_no,
                    });
                }
                state = State::InBase;
                block_start = line_no;
                base_lines.clear();
                incoming_lines.clear();
            } else if line.starts_with(MARKER_ANCESTOR) && state == State::InBase {
                // Diff3 style: skip the common-ancestor section entirely so
                // both captured sides stay verbatim.
                state = State::InAncestor;
            } else if line.trim_end() == MARKER_SEPARATOR
                && (state == State::InBase || state == State::InAncestor)
            {
                state = State::InIncoming;
            } else if line.starts_with(MARKER_END) {
                if state != State::InIncoming {
                    return Err(ConflictError::MalformedConflict {
                        path: path.to_string(),
                        line: line_no,
                    });
                }
                let base_text = base_lines.join("\n");
                let incoming_text = incoming_lines.join("\n");
                let kind = classify(&base_text, &incoming_text);
                records.push(ConflictRecord {
                    id: Uuid::new_v4().to_string(),
                    file_path: path.to_string(),
                    start_line: block_start,
                    end_line: line_no,
                    base_text,
                    incoming_text,
                    enclosing_symbol: enclosing_symbol(&lines, block_start - 1),
                    kind,
                });
                state = State::Outside;
            } else {
                match state {
                    State::Outside | State::InAncestor => {}
                    State::InBase => base_lines.push(line),
                    State::InIncoming => incoming_lines.push(line),
                }
            }
        }

        if state != State::Outside {
            return Err(ConflictError::MalformedConflict {
                path: path.to_string(),
                line: block_start,
            });
        }

        debug!(path, count = records.len(), "parsed conflict blocks");
        Ok(records)
    }

    /// Build a whole-file record for an unmerged entry without markers.
    fn record_from_unmerged(
        backend: &GitBackend,
        entry: &UnmergedEntry,
    ) -> Result<ConflictRecord, ConflictError> {
        let side = |id: &Option<String>| -> Result<String, ConflictError> {
            match id {
                Some(id) => Ok(backend.blob_text(id)?),
                None => Ok(String::new()),
            }
        };
        let base_text = side(&entry.our_id)?;
        let incoming_text = side(&entry.their_id)?;
        let kind = match entry.kind {
            UnmergedKind::Renamed => ConflictKind::Rename,
            _ => ConflictKind::DeletionVsModification,
        };
        let end_line = base_text
            .lines()
            .count()
            .max(incoming_text.lines().count())
            .max(1);
        Ok(ConflictRecord {
            id: Uuid::new_v4().to_string(),
            file_path: entry.path.clone(),
            start_line: 1,
            end_line,
            base_text,
            incoming_text,
            enclosing_symbol: None,
            kind,
        })
    }
}

// ---------------------------------------------------------------------------
// Classification heuristics
// ---------------------------------------------------------------------------

/// Classify a marker block from its two sides.
///
/// Unclassifiable blocks get [`ConflictKind::LogicDifference`], the safe
/// default.
fn classify(base: &str, incoming: &str) -> ConflictKind {
    if strip_whitespace(base) == strip_whitespace(incoming) {
        return ConflictKind::Formatting;
    }
    if code_lines(base) == code_lines(incoming) {
        return ConflictKind::Documentation;
    }
    if let (Some((base_name, base_arity)), Some((inc_name, inc_arity))) =
        (first_signature(base), first_signature(incoming))
    {
        if base_name == inc_name && base_arity != inc_arity {
            return ConflictKind::SignatureChange;
        }
    }
    if is_import_block(base) && is_import_block(incoming) {
        return ConflictKind::ImportChange;
    }
    ConflictKind::LogicDifference
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with('*')
        || trimmed.starts_with("/*")
        || trimmed.starts_with("*/")
        || trimmed.starts_with("--")
}

/// Non-comment, non-blank lines with whitespace stripped. Two sides with
/// identical code lines differ only in comments/docs.
fn code_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty() && !is_comment_line(l))
        .map(strip_whitespace)
        .collect()
}

/// First function-like header in the block: (name, parameter count).
fn first_signature(text: &str) -> Option<(String, usize)> {
    let re = Regex::new(r"\b(?:fn|def|func|function)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)")
        .expect("static regex");
    let caps = re.captures(text)?;
    let name = caps.get(1)?.as_str().to_string();
    let params = caps.get(2)?.as_str();
    let arity = params
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .count();
    Some((name, arity))
}

fn is_import_block(text: &str) -> bool {
    let re = Regex::new(r"^\s*(?:pub\s+)?(?:use\s|import\s|from\s+\S+\s+import\s|#include\b|require\b)")
        .expect("static regex");
    let mut saw_import = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !re.is_match(line) {
            return false;
        }
        saw_import = true;
    }
    saw_import
}

/// Nearest preceding declaration header above `before_idx` (0-indexed).
fn enclosing_symbol(lines: &[&str], before_idx: usize) -> Option<String> {
    let re = Regex::new(
        r"^\s*(?:pub(?:\([a-z:]+\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|impl|class|def|func|function|interface|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("static regex");
    lines[..before_idx]
        .iter()
        .rev()
        .find_map(|line| re.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BLOCKS: &str = "\
fn send(addr: &str) -> bool {
<<<<<<< HEAD
    connect(addr, RETRIES)
=======
    connect(addr)
>>>>>>> feature
}

<<<<<<< HEAD
// helper for logging
=======
// logging helper
>>>>>>> feature
fn log() {}
";

    #[test]
    fn test_extraction_count_matches_triple_count() {
        let records = ConflictExtractor::extract_file("src/net.rs", TWO_BLOCKS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].base_text, "    connect(addr, RETRIES)");
        assert_eq!(records[0].incoming_text, "    connect(addr)");
        assert_eq!(records[0].start_line, 2);
        assert_eq!(records[0].end_line, 6);
    }

    #[test]
    fn test_unmatched_start_marker_is_malformed() {
        let contents = "line\n<<<<<<< HEAD\nours\n=======\ntheirs\n";
        let result = ConflictExtractor::extract_file("broken.rs", contents);
        assert!(matches!(
            result,
            Err(ConflictError::MalformedConflict { line: 2, .. })
        ));
    }

    #[test]
    fn test_end_marker_without_start_is_malformed() {
        let contents = "line\n>>>>>>> feature\n";
        let result = ConflictExtractor::extract_file("broken.rs", contents);
        assert!(matches!(
            result,
            Err(ConflictError::MalformedConflict { line: 2, .. })
        ));
    }

    #[test]
    fn test_diff3_ancestor_section_is_skipped() {
        let contents = "\
<<<<<<< HEAD
ours
||||||| merged common ancestors
original
=======
theirs
>>>>>>> feature
";
        let records = ConflictExtractor::extract_file("a.rs", contents).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_text, "ours");
        assert_eq!(records[0].incoming_text, "theirs");
    }

    #[test]
    fn test_enclosing_symbol_resolution() {
        let records = ConflictExtractor::extract_file("src/net.rs", TWO_BLOCKS).unwrap();
        assert_eq!(records[0].enclosing_symbol.as_deref(), Some("send"));
    }

    #[test]
    fn test_classify_signature_change() {
        let base = "fn send(addr: &str, timeout: u32, retries: u8) -> bool {";
        let incoming = "fn send(addr: &str) -> bool {";
        assert_eq!(classify(base, incoming), ConflictKind::SignatureChange);
    }

    #[test]
    fn test_classify_documentation() {
        let base = "// helper for logging\nfn log() {}";
        let incoming = "// logging helper\nfn log() {}";
        assert_eq!(classify(base, incoming), ConflictKind::Documentation);
    }

    #[test]
    fn test_classify_import_change() {
        let base = "use std::io::Read;\nuse std::fmt;";
        let incoming = "use std::io::{Read, Write};";
        assert_eq!(classify(base, incoming), ConflictKind::ImportChange);
    }

    #[test]
    fn test_classify_formatting() {
        let base = "fn run(a: u32,b: u32) {}";
        let incoming = "fn run(a: u32, b: u32) {}";
        assert_eq!(classify(base, incoming), ConflictKind::Formatting);
    }

    #[test]
    fn test_classify_logic_fallback() {
        let base = "    total += item.price;";
        let incoming = "    total += item.price * item.quantity;";
        assert_eq!(classify(base, incoming), ConflictKind::LogicDifference);
    }

    #[test]
    fn test_todo_detection() {
        let record = ConflictRecord {
            id: "r1".into(),
            file_path: "a.rs".into(),
            start_line: 1,
            end_line: 5,
            base_text: "done".into(),
            incoming_text: "// TODO: restore timeout handling".into(),
            enclosing_symbol: None,
            kind: ConflictKind::LogicDifference,
        };
        assert!(!record.has_todo_base());
        assert!(record.has_todo_incoming());
        assert_eq!(
            todo_lines(&record.incoming_text),
            vec!["// TODO: restore timeout handling"]
        );
    }

    #[test]
    fn test_contains_conflict_markers() {
        assert!(contains_conflict_markers("a\n<<<<<<< HEAD\nb"));
        assert!(contains_conflict_markers("a\n=======\nb"));
        assert!(!contains_conflict_markers("let eq = \"=======\"; // inline"));
        assert!(!contains_conflict_markers("clean content\n"));
    }
}
