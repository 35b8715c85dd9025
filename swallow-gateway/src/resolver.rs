//! File reference detection.
//!
//! Scans user text for filename-like tokens and reports the ones that are
//! already present in the [`FileReferenceTable`]. The table is read, never
//! populated: uploads go through the explicit upload endpoint.

use crate::session::FileReferenceTable;
use regex::Regex;
use std::sync::LazyLock;

/// Extensions recognised as file references.
pub const FILE_EXTENSIONS: &[&str] = &["txt", "py", "md", "json", "csv", "yaml", "yml", "sh", "ipynb"];

/// Maximal runs of filename characters. Quotes and every other character
/// (including non-ASCII text) end a run.
static NAME_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_.\-]+").unwrap());

/// The file name carried by a run, if it ends in a known extension.
///
/// Trailing dots are sentence punctuation, not part of the name.
fn file_name(run: &str) -> Option<&str> {
    let name = run.trim_end_matches('.');
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && FILE_EXTENSIONS.contains(&ext)).then_some(name)
}

/// Annotation line emitted for a mention of a known file.
pub fn annotation_for(name: &str) -> String {
    format!("File '{name}' is known. Content not directly injected for brevity.")
}

/// Detects file mentions and classifies them against the file table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileReferenceResolver;

impl FileReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// All filename-like mentions in `text`, left to right, duplicates included.
    pub fn mentions<'t>(&self, text: &'t str) -> Vec<&'t str> {
        NAME_RUN
            .find_iter(text)
            .filter_map(|run| file_name(run.as_str()))
            .collect()
    }

    /// One annotation line per mention of a known file, in detection order.
    pub fn resolve(&self, text: &str, table: &FileReferenceTable) -> Vec<String> {
        self.mentions(text)
            .into_iter()
            .filter(|name| table.contains(name))
            .map(annotation_for)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(ids: &[&str]) -> FileReferenceTable {
        let mut table = FileReferenceTable::new();
        for id in ids {
            table.insert(id.to_string(), b"placeholder".to_vec());
        }
        table
    }

    #[test]
    fn detects_every_extension() {
        let resolver = FileReferenceResolver::new();
        let text = "a.txt b.py c.md d.json e.csv f.yaml g.yml h.sh i.ipynb";
        assert_eq!(
            resolver.mentions(text),
            vec!["a.txt", "b.py", "c.md", "d.json", "e.csv", "f.yaml", "g.yml", "h.sh", "i.ipynb"]
        );
    }

    #[test]
    fn strips_quotes() {
        let resolver = FileReferenceResolver::new();
        assert_eq!(
            resolver.mentions(r#"open "train_v2.py" and 'data-01.csv'"#),
            vec!["train_v2.py", "data-01.csv"]
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let resolver = FileReferenceResolver::new();
        assert!(resolver.mentions("README.MD and main.PY").is_empty());
    }

    #[test]
    fn unknown_extension_and_partial_extension_ignored() {
        let resolver = FileReferenceResolver::new();
        assert!(resolver.mentions("lib.rs config.toml notes.pyc").is_empty());
    }

    #[test]
    fn trailing_punctuation_is_not_part_of_the_name() {
        let resolver = FileReferenceResolver::new();
        assert_eq!(resolver.mentions("see notes.md."), vec!["notes.md"]);
        assert_eq!(resolver.mentions("run build.sh, then"), vec!["build.sh"]);
    }

    #[test]
    fn names_abutting_japanese_text() {
        let resolver = FileReferenceResolver::new();
        assert_eq!(resolver.mentions("a.pyを読んで"), vec!["a.py"]);
        assert_eq!(resolver.mentions("「notes.md」とdata.csvを比較"), vec!["notes.md", "data.csv"]);
    }

    #[test]
    fn run_must_end_in_extension() {
        let resolver = FileReferenceResolver::new();
        assert!(resolver.mentions("b.py-x").is_empty());
        assert!(resolver.mentions("report.md_old v1.txt2").is_empty());
        assert_eq!(resolver.mentions("a.py-b.md"), vec!["a.py-b.md"]);
        assert!(resolver.mentions(".py").is_empty());
    }

    #[test]
    fn path_separators_split_names() {
        let resolver = FileReferenceResolver::new();
        assert_eq!(resolver.mentions("src/app/main.py"), vec!["main.py"]);
    }

    #[test]
    fn only_known_files_annotated() {
        let resolver = FileReferenceResolver::new();
        let table = table_with(&["a.py"]);
        let lines = resolver.resolve("list files a.py and b.py", &table);
        assert_eq!(
            lines,
            vec!["File 'a.py' is known. Content not directly injected for brevity.".to_string()]
        );
    }

    #[test]
    fn duplicates_annotated_per_occurrence() {
        let resolver = FileReferenceResolver::new();
        let table = table_with(&["notes.md"]);
        let lines = resolver.resolve("notes.md vs 'notes.md'", &table);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let resolver = FileReferenceResolver::new();
        let table = table_with(&["a.py"]);
        assert!(resolver.resolve("", &table).is_empty());
        assert!(resolver.resolve("no files here", &table).is_empty());
    }

    #[test]
    fn resolving_does_not_populate_table() {
        let resolver = FileReferenceResolver::new();
        let table = table_with(&[]);
        let _ = resolver.resolve("please read todo.txt", &table);
        assert!(table.is_empty());
    }
}
