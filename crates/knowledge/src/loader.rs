//! Document loading from the regulations data directory.

use crate::types::Document;
use regula_core::{AppError, AppResult};
use std::path::Path;
use walkdir::WalkDir;

/// Header repeated at the top of every exported regulation chapter.
pub const BOILERPLATE: &str = "### **INTERNAL REGULATIONS FOR COEXISTENCE AND ADMINISTRATION** **FOR THE VERTICAL CONDOMINIUM \"TRIVENTO III\"";

/// Extension of the files that make up the corpus.
pub const DOCUMENT_EXTENSION: &str = "txt";

/// Load every `.txt` file directly inside `data_dir`, stripping the default
/// boilerplate header.
pub fn load_documents(data_dir: &Path) -> AppResult<Vec<Document>> {
    load_documents_with_boilerplate(data_dir, &[BOILERPLATE.to_string()])
}

/// Load every `.txt` file directly inside `data_dir`.
///
/// Files are returned in ascending file-name order. Subdirectories are not
/// searched. Bytes that are not valid UTF-8 are replaced, never rejected.
/// Every occurrence of each `boilerplate` string is removed from the text.
pub fn load_documents_with_boilerplate(
    data_dir: &Path,
    boilerplate: &[String],
) -> AppResult<Vec<Document>> {
    if !data_dir.exists() {
        return Err(AppError::NotFound(format!(
            "Data directory does not exist: {}",
            data_dir.display()
        )));
    }

    if !data_dir.is_dir() {
        return Err(AppError::NotFound(format!(
            "Data path is not a directory: {}",
            data_dir.display()
        )));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            AppError::Io(std::io::Error::other(format!(
                "Failed to read directory {}: {}",
                data_dir.display(),
                e
            )))
        })?;

        let path = entry.path();
        if !path.is_file() || !has_document_extension(path) {
            continue;
        }

        let bytes = std::fs::read(path).map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;

        let text = strip_boilerplate(&String::from_utf8_lossy(&bytes), boilerplate);
        let source = entry.file_name().to_string_lossy().into_owned();

        tracing::debug!("Loaded '{}' ({} bytes)", source, bytes.len());
        documents.push(Document { source, text });
    }

    tracing::info!(
        "Loaded {} documents from {}",
        documents.len(),
        data_dir.display()
    );

    Ok(documents)
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == DOCUMENT_EXTENSION)
        .unwrap_or(false)
}

/// Remove every occurrence of each boilerplate string.
pub fn strip_boilerplate(text: &str, boilerplate: &[String]) -> String {
    boilerplate
        .iter()
        .filter(|b| !b.is_empty())
        .fold(text.to_string(), |acc, b| acc.replace(b.as_str(), ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_loads_txt_files_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), "Second chapter").unwrap();
        std::fs::write(temp.path().join("a.txt"), "First chapter").unwrap();
        std::fs::write(temp.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested").join("c.txt"), "ignored").unwrap();

        let docs = load_documents(temp.path()).unwrap();
        let sources: Vec<_> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
        assert_eq!(docs[0].text, "First chapter");
    }

    #[test]
    fn test_boilerplate_removed_everywhere() {
        let temp = TempDir::new().unwrap();
        let content = format!("{}\nArticle 1. Pets.\n{}\nArticle 2.", BOILERPLATE, BOILERPLATE);
        std::fs::write(temp.path().join("chapter.txt"), content).unwrap();

        let docs = load_documents(temp.path()).unwrap();
        assert_eq!(docs[0].text, "\nArticle 1. Pets.\n\nArticle 2.");
        assert!(!docs[0].text.contains("TRIVENTO"));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bad.txt"), b"caf\xff rules").unwrap();

        let docs = load_documents(temp.path()).unwrap();
        assert_eq!(docs[0].text, "caf\u{FFFD} rules");
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let result = load_documents(&temp.path().join("missing"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        assert!(load_documents(temp.path()).unwrap().is_empty());
    }
}
