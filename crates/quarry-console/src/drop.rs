//! Drop-to-query mapping.
//!
//! A dropped file becomes two candidate snippets: a complete query reading the
//! whole file, and a bare read-function call for embedding. The user picks one
//! from a transient prompt; at most one prompt is pending at a time.

use quarry_core::format_sql;
use std::path::{Path, PathBuf};

use crate::editor::EditorSurface;

// =============================================================================
// File Kinds
// =============================================================================

/// Supported file kinds, plus a plain-text fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Csv,
    Tsv,
    Json,
    NdJson,
    Parquet,
    Excel,
    Text,
}

impl FileKind {
    /// Classify a path by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => FileKind::Csv,
            Some("tsv") => FileKind::Tsv,
            Some("json") => FileKind::Json,
            Some("ndjson") | Some("jsonl") => FileKind::NdJson,
            Some("parquet") => FileKind::Parquet,
            Some("xlsx") | Some("xls") => FileKind::Excel,
            _ => FileKind::Text,
        }
    }

    /// Table function that reads this kind.
    pub fn read_function(self) -> &'static str {
        match self {
            FileKind::Csv => "read_csv",
            FileKind::Tsv => "read_tsv",
            FileKind::Json => "read_json",
            FileKind::NdJson => "read_ndjson",
            FileKind::Parquet => "read_parquet",
            FileKind::Excel => "read_excel",
            FileKind::Text => "read_text",
        }
    }
}

// =============================================================================
// Drop Candidate
// =============================================================================

/// A dropped file awaiting a choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropCandidate {
    pub file_path: String,
    pub kind: FileKind,
}

impl DropCandidate {
    pub fn new(path: &Path) -> Self {
        Self {
            file_path: path.to_string_lossy().into_owned(),
            kind: FileKind::from_path(path),
        }
    }

    /// `read_xxx('<path>')`, with single quotes doubled.
    pub fn fragment(&self) -> String {
        format!(
            "{}('{}')",
            self.kind.read_function(),
            self.file_path.replace('\'', "''")
        )
    }

    /// Formatted `SELECT * FROM read_xxx('<path>');`.
    pub fn full_query(&self) -> String {
        format_sql(&format!("SELECT * FROM {};", self.fragment()))
    }
}

/// The two options offered for a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropChoice {
    pub candidate: DropCandidate,
    pub full_query: String,
    pub fragment: String,
}

impl DropChoice {
    pub fn new(candidate: DropCandidate) -> Self {
        Self {
            full_query: candidate.full_query(),
            fragment: candidate.fragment(),
            candidate,
        }
    }

    /// Literal text of an option.
    pub fn text(&self, option: DropOption) -> &str {
        match option {
            DropOption::FullQuery => &self.full_query,
            DropOption::Fragment => &self.fragment,
        }
    }
}

/// Which snippet the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOption {
    /// Replace the buffer with the complete query.
    FullQuery,
    /// Append the read call to the buffer.
    Fragment,
}

impl DropOption {
    /// Prompt label. Names what `DropPrompt::resolve` does to the buffer.
    pub fn label(self) -> &'static str {
        match self {
            DropOption::FullQuery => "Replace query",
            DropOption::Fragment => "Append to query",
        }
    }
}

// =============================================================================
// Drop Prompt
// =============================================================================

/// Where the prompt is shown, in window coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DropAnchor {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingDrop {
    choice: DropChoice,
    anchor: DropAnchor,
}

/// The transient choice surface.
#[derive(Debug, Default)]
pub struct DropPrompt {
    pending: Option<PendingDrop>,
}

impl DropPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a drop. Only the first path is used; a pending choice is replaced.
    pub fn on_file_dropped(&mut self, paths: &[PathBuf], anchor: DropAnchor) -> Option<&DropChoice> {
        let Some(path) = paths.first() else {
            tracing::debug!("Ignoring drop without paths");
            return None;
        };
        if paths.len() > 1 {
            tracing::debug!(ignored = paths.len() - 1, "Using first dropped file only");
        }

        let choice = DropChoice::new(DropCandidate::new(path));
        tracing::debug!(kind = ?choice.candidate.kind, "File dropped");
        self.pending = Some(PendingDrop { choice, anchor });
        self.choice()
    }

    pub fn choice(&self) -> Option<&DropChoice> {
        self.pending.as_ref().map(|p| &p.choice)
    }

    pub fn anchor(&self) -> Option<DropAnchor> {
        self.pending.as_ref().map(|p| p.anchor)
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Close without choosing (outside click, Escape).
    pub fn dismiss(&mut self) {
        self.pending = None;
    }

    /// Write the chosen option into the editor and close the prompt.
    pub fn resolve(&mut self, option: DropOption, editor: &mut dyn EditorSurface) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };

        let snippet = pending.choice.text(option).to_string();
        match option {
            DropOption::FullQuery => editor.set_text(snippet),
            DropOption::Fragment => {
                let current = editor.text();
                if current.is_empty() {
                    editor.set_text(snippet);
                } else {
                    editor.set_text(format!("{}\n{}", current, snippet));
                }
            }
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{MockEditorSurface, TextBuffer};

    fn drop_one(prompt: &mut DropPrompt, path: &str) -> DropChoice {
        prompt
            .on_file_dropped(&[PathBuf::from(path)], DropAnchor { x: 10.0, y: 20.0 })
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_kind_from_extension() {
        let kind = |p: &str| FileKind::from_path(Path::new(p));
        assert_eq!(kind("a.csv"), FileKind::Csv);
        assert_eq!(kind("A.CSV"), FileKind::Csv);
        assert_eq!(kind("a.tsv"), FileKind::Tsv);
        assert_eq!(kind("a.json"), FileKind::Json);
        assert_eq!(kind("a.ndjson"), FileKind::NdJson);
        assert_eq!(kind("a.JsonL"), FileKind::NdJson);
        assert_eq!(kind("a.parquet"), FileKind::Parquet);
        assert_eq!(kind("a.xlsx"), FileKind::Excel);
        assert_eq!(kind("a.log"), FileKind::Text);
        assert_eq!(kind("Makefile"), FileKind::Text);
    }

    #[test]
    fn test_candidates_for_csv() {
        let mut prompt = DropPrompt::new();
        let choice = drop_one(&mut prompt, "data.csv");

        assert_eq!(choice.full_query, "SELECT * FROM read_csv('data.csv');");
        assert_eq!(choice.fragment, "read_csv('data.csv')");
        assert_eq!(prompt.anchor(), Some(DropAnchor { x: 10.0, y: 20.0 }));
    }

    #[test]
    fn test_unknown_extension_reads_text() {
        let candidate = DropCandidate::new(Path::new("/var/log/app.log"));
        insta::assert_snapshot!(candidate.fragment(), @"read_text('/var/log/app.log')");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let candidate = DropCandidate::new(Path::new("/tmp/bob's data.tsv"));
        assert_eq!(candidate.fragment(), "read_tsv('/tmp/bob''s data.tsv')");
    }

    #[test]
    fn test_windows_path_keeps_backslashes() {
        let candidate = DropCandidate::new(Path::new(r"C:\Users\me\data.csv"));
        assert_eq!(candidate.fragment(), r"read_csv('C:\Users\me\data.csv')");
        assert_eq!(
            candidate.full_query(),
            format!("SELECT * FROM {};", candidate.fragment())
        );
    }

    #[test]
    fn test_fragment_appends_on_new_line() {
        let mut prompt = DropPrompt::new();
        drop_one(&mut prompt, "data.csv");

        let mut buffer = TextBuffer::with_text("SELECT * FROM x");
        assert!(prompt.resolve(DropOption::Fragment, &mut buffer));

        assert_eq!(buffer.as_str(), "SELECT * FROM x\nread_csv('data.csv')");
        assert!(!prompt.is_open());
    }

    #[test]
    fn test_option_labels() {
        assert_eq!(DropOption::FullQuery.label(), "Replace query");
        assert_eq!(DropOption::Fragment.label(), "Append to query");
    }

    #[test]
    fn test_fragment_sets_empty_buffer() {
        let mut prompt = DropPrompt::new();
        drop_one(&mut prompt, "events.ndjson");

        let mut buffer = TextBuffer::new();
        prompt.resolve(DropOption::Fragment, &mut buffer);
        assert_eq!(buffer.as_str(), "read_ndjson('events.ndjson')");
    }

    #[test]
    fn test_full_query_replaces_buffer() {
        let mut prompt = DropPrompt::new();
        drop_one(&mut prompt, "data.csv");

        let mut editor = MockEditorSurface::new();
        editor.expect_text().never();
        editor
            .expect_set_text()
            .withf(|text| text == "SELECT * FROM read_csv('data.csv');")
            .times(1)
            .return_const(());

        assert!(prompt.resolve(DropOption::FullQuery, &mut editor));
    }

    #[test]
    fn test_new_drop_replaces_pending_choice() {
        let mut prompt = DropPrompt::new();
        drop_one(&mut prompt, "first.csv");
        drop_one(&mut prompt, "second.json");

        let choice = prompt.choice().unwrap();
        assert_eq!(choice.fragment, "read_json('second.json')");
    }

    #[test]
    fn test_multi_file_drop_uses_first() {
        let mut prompt = DropPrompt::new();
        let paths = [PathBuf::from("a.csv"), PathBuf::from("b.csv")];
        let choice = prompt.on_file_dropped(&paths, DropAnchor::default()).unwrap();
        assert_eq!(choice.candidate.file_path, "a.csv");
    }

    #[test]
    fn test_empty_drop_and_dismiss() {
        let mut prompt = DropPrompt::new();
        assert!(prompt.on_file_dropped(&[], DropAnchor::default()).is_none());
        assert!(!prompt.is_open());

        drop_one(&mut prompt, "data.csv");
        prompt.dismiss();
        assert!(!prompt.is_open());

        let mut buffer = TextBuffer::with_text("keep");
        assert!(!prompt.resolve(DropOption::FullQuery, &mut buffer));
        assert_eq!(buffer.as_str(), "keep");
    }
}
