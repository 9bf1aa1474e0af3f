use super::*;
use std::fs;
use tempfile::TempDir;

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dirs");
    }
    fs::write(path, content).expect("should write file");
}

#[test]
fn loads_markdown_files_sorted_by_path() {
    let temp = TempDir::new().expect("should create temp dir");
    write_file(temp.path(), "beta.md", "beta content");
    write_file(temp.path(), "alpha.md", "alpha content");

    let source = MarkdownDirSource::new(temp.path());
    let documents = source.load().expect("load should succeed");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].source_path, "alpha.md");
    assert_eq!(documents[0].raw_text, "alpha content");
    assert_eq!(documents[1].source_path, "beta.md");
    assert_eq!(documents[1].raw_text, "beta content");
}

#[test]
fn ignores_non_markdown_files() {
    let temp = TempDir::new().expect("should create temp dir");
    write_file(temp.path(), "notes.md", "markdown");
    write_file(temp.path(), "notes.txt", "plain text");
    write_file(temp.path(), "data.json", "{}");

    let source = MarkdownDirSource::new(temp.path());
    let documents = source.load().expect("load should succeed");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source_path, "notes.md");
}

#[test]
fn walks_subdirectories() {
    let temp = TempDir::new().expect("should create temp dir");
    write_file(temp.path(), "top.md", "top");
    write_file(temp.path(), "nested/inner.md", "inner");

    let source = MarkdownDirSource::new(temp.path());
    let documents = source.load().expect("load should succeed");

    assert_eq!(documents.len(), 2);
    let paths: Vec<&str> = documents.iter().map(|d| d.source_path.as_str()).collect();
    assert!(paths.contains(&"top.md"));
    assert!(paths.iter().any(|p| p.ends_with("inner.md")));
}

#[test]
fn empty_directory_yields_no_documents() {
    let temp = TempDir::new().expect("should create temp dir");

    let source = MarkdownDirSource::new(temp.path());
    let documents = source.load().expect("load should succeed");

    assert!(documents.is_empty());
}

#[test]
fn missing_root_yields_no_documents() {
    let temp = TempDir::new().expect("should create temp dir");
    let missing = temp.path().join("does-not-exist");

    let source = MarkdownDirSource::new(missing);
    let documents = source.load().expect("load should succeed");

    assert!(documents.is_empty());
}

#[test]
fn markdown_extension_is_case_insensitive() {
    let temp = TempDir::new().expect("should create temp dir");
    write_file(temp.path(), "UPPER.MD", "upper");

    let source = MarkdownDirSource::new(temp.path());
    let documents = source.load().expect("load should succeed");

    assert_eq!(documents.len(), 1);
}
