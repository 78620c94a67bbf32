//! Conflict pattern clustering.
//!
//! Clustering exists to minimize the number of decisions a human must
//! make: near-duplicate conflicts across files collapse into one pattern
//! whenever their resolution would plausibly be identical. Records are
//! grouped by conflict kind, then by a normalized shape of the two sides
//! (identifiers, numbers, and whitespace runs collapsed), so the same
//! parameter added or removed across many call sites lands in a single
//! pattern.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::extractor::{ConflictKind, ConflictRecord};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cluster of structurally similar conflicts presumed to share one
/// resolution. Rebuilt on every analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPattern {
    /// Stable within one run: `P1`, `P2`, ... in presentation order.
    pub id: String,
    pub kind: ConflictKind,
    /// Representative human-readable description.
    pub description: String,
    /// Member record ids, in extraction order. Non-owning.
    pub member_ids: Vec<String>,
    /// Distinct files the members touch, in first-seen order.
    pub files: Vec<String>,
    /// Whether any member's base side carries TODO/FIXME markers.
    pub has_todo_base: bool,
    /// Whether any member's incoming side carries TODO/FIXME markers.
    pub has_todo_incoming: bool,
    pub occurrence_count: usize,
}

// ---------------------------------------------------------------------------
// Clusterer
// ---------------------------------------------------------------------------

/// Stateless pattern clusterer.
pub struct PatternClusterer;

impl PatternClusterer {
    /// Cluster records into patterns, ordered by descending occurrence
    /// count with ties broken by first-seen file path then line. The
    /// grouping is deterministic: the same records always produce patterns
    /// with identical membership.
    pub fn cluster(records: &[ConflictRecord]) -> Vec<ConflictPattern> {
        info!(records = records.len(), "clustering conflicts");

        // Group in first-seen order so tie-breaking stays stable.
        let mut groups: Vec<(String, Vec<&ConflictRecord>)> = Vec::new();
        for record in records {
            let key = similarity_key(record);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(record),
                None => groups.push((key, vec![record])),
            }
        }

        groups.sort_by(|(_, a), (_, b)| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a[0].file_path.cmp(&b[0].file_path))
                .then_with(|| a[0].start_line.cmp(&b[0].start_line))
        });

        let patterns: Vec<ConflictPattern> = groups
            .iter()
            .enumerate()
            .map(|(idx, (_, members))| build_pattern(idx, members))
            .collect();

        debug!(patterns = patterns.len(), "clustering complete");
        patterns
    }
}

fn build_pattern(index: usize, members: &[&ConflictRecord]) -> ConflictPattern {
    let mut files: Vec<String> = Vec::new();
    for member in members {
        if !files.contains(&member.file_path) {
            files.push(member.file_path.clone());
        }
    }
    ConflictPattern {
        id: format!("P{}", index + 1),
        kind: members[0].kind,
        description: describe(members, &files),
        member_ids: members.iter().map(|m| m.id.clone()).collect(),
        files,
        has_todo_base: members.iter().any(|m| m.has_todo_base()),
        has_todo_incoming: members.iter().any(|m| m.has_todo_incoming()),
        occurrence_count: members.len(),
    }
}

fn describe(members: &[&ConflictRecord], files: &[String]) -> String {
    let kind = members[0].kind;
    let site = match &members[0].enclosing_symbol {
        Some(symbol) => format!("around '{}'", symbol),
        None => format!("in {}", members[0].file_path),
    };
    if files.len() > 1 {
        format!(
            "{} {} and {} other file{}",
            kind,
            site,
            files.len() - 1,
            if files.len() > 2 { "s" } else { "" }
        )
    } else if members.len() > 1 {
        format!("{} {} ({} occurrences)", kind, site, members.len())
    } else {
        format!("{} {}", kind, site)
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Grouping key: conflict kind plus the normalized shape of both sides.
///
/// Enclosing symbols deliberately do not participate: the same structural
/// change inside different functions still shares one resolution.
fn similarity_key(record: &ConflictRecord) -> String {
    format!(
        "{}\u{1}{}\u{1}{}",
        record.kind,
        normalize_shape(&record.base_text),
        normalize_shape(&record.incoming_text)
    )
}

/// Collapse identifiers, numbers, and whitespace so only the structural
/// shape of the text remains.
fn normalize_shape(text: &str) -> String {
    let ident = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("static regex");
    let number = Regex::new(r"\b\d+\b").expect("static regex");
    let mut out = Vec::new();
    for line in text.lines() {
        let line = ident.replace_all(line, "_");
        let line = number.replace_all(&line, "0");
        let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if !stripped.is_empty() {
            out.push(stripped);
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        id: &str,
        path: &str,
        line: usize,
        kind: ConflictKind,
        base: &str,
        incoming: &str,
    ) -> ConflictRecord {
        ConflictRecord {
            id: id.into(),
            file_path: path.into(),
            start_line: line,
            end_line: line + 4,
            base_text: base.into(),
            incoming_text: incoming.into(),
            enclosing_symbol: None,
            kind,
        }
    }

    #[test]
    fn test_same_shape_across_files_collapses() {
        // The same parameter removed at three call sites.
        let records = vec![
            record(
                "r1",
                "src/a.rs",
                10,
                ConflictKind::SignatureChange,
                "send(addr, timeout)",
                "send(addr)",
            ),
            record(
                "r2",
                "src/b.rs",
                20,
                ConflictKind::SignatureChange,
                "send(host, limit)",
                "send(host)",
            ),
            record(
                "r3",
                "src/c.rs",
                30,
                ConflictKind::SignatureChange,
                "send(target, wait)",
                "send(target)",
            ),
        ];
        let patterns = PatternClusterer::cluster(&records);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrence_count, 3);
        assert_eq!(patterns[0].member_ids, vec!["r1", "r2", "r3"]);
        assert_eq!(patterns[0].files, vec!["src/a.rs", "src/b.rs", "src/c.rs"]);
    }

    #[test]
    fn test_different_kinds_never_merge() {
        let records = vec![
            record(
                "r1",
                "src/a.rs",
                10,
                ConflictKind::Documentation,
                "// old",
                "// new",
            ),
            record(
                "r2",
                "src/a.rs",
                50,
                ConflictKind::LogicDifference,
                "x + 1",
                "x + 2",
            ),
        ];
        let patterns = PatternClusterer::cluster(&records);
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_ordering_by_count_then_path() {
        let records = vec![
            record("r1", "src/z.rs", 5, ConflictKind::Documentation, "// a", "// b"),
            record(
                "r2",
                "src/m.rs",
                1,
                ConflictKind::LogicDifference,
                "foo()",
                "bar()",
            ),
            record(
                "r3",
                "src/n.rs",
                2,
                ConflictKind::LogicDifference,
                "foo()",
                "bar()",
            ),
        ];
        let patterns = PatternClusterer::cluster(&records);
        assert_eq!(patterns.len(), 2);
        // Two occurrences first, single-occurrence pattern second.
        assert_eq!(patterns[0].occurrence_count, 2);
        assert_eq!(patterns[0].id, "P1");
        assert_eq!(patterns[1].occurrence_count, 1);
    }

    #[test]
    fn test_clustering_is_idempotent() {
        let records = vec![
            record("r1", "src/a.rs", 1, ConflictKind::Documentation, "// x", "// y"),
            record("r2", "src/b.rs", 2, ConflictKind::Documentation, "// x", "// y"),
            record(
                "r3",
                "src/c.rs",
                3,
                ConflictKind::LogicDifference,
                "a()",
                "b()",
            ),
        ];
        let first = PatternClusterer::cluster(&records);
        let second = PatternClusterer::cluster(&records);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.member_ids, b.member_ids);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn test_every_record_belongs_to_exactly_one_pattern() {
        let records = vec![
            record("r1", "src/a.rs", 1, ConflictKind::Documentation, "// x", "// y"),
            record(
                "r2",
                "src/a.rs",
                9,
                ConflictKind::LogicDifference,
                "a()",
                "b()",
            ),
            record("r3", "src/b.rs", 4, ConflictKind::Documentation, "// x", "// y"),
        ];
        let patterns = PatternClusterer::cluster(&records);
        let mut seen: Vec<&str> = patterns
            .iter()
            .flat_map(|p| p.member_ids.iter().map(String::as_str))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["r1", "r2", "r3"]);
        let total: usize = patterns.iter().map(|p| p.occurrence_count).sum();
        assert_eq!(total, records.len());
    }

    #[test]
    fn test_normalize_shape_collapses_identifiers() {
        assert_eq!(
            normalize_shape("send(addr,  timeout)"),
            normalize_shape("send(host, limit)")
        );
        assert_ne!(
            normalize_shape("send(addr, timeout)"),
            normalize_shape("send(addr)")
        );
    }
}
