//! Tests for the TypeScript parser front-end

use cpg_core::parser::Dialect;
use cpg_core::{ParseError, SourceParser};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_parser_extensions() {
    let parser = SourceParser::new();
    let extensions = parser.file_extensions();
    assert!(extensions.contains(&".ts"));
    assert!(extensions.contains(&".tsx"));
}

#[test]
fn test_dialect_from_extension() {
    assert_eq!(Dialect::from_path(Path::new("a.ts")), Dialect::TypeScript);
    assert_eq!(Dialect::from_path(Path::new("a.mts")), Dialect::TypeScript);
    assert_eq!(Dialect::from_path(Path::new("view.tsx")), Dialect::Tsx);
    assert_eq!(Dialect::from_path(Path::new("no_extension")), Dialect::TypeScript);
}

#[test]
fn test_parse_valid_source() {
    let parser = SourceParser::new();
    let tree = parser
        .parse_source(
            "export function greet(name: string): string { return `hi ${name}`; }".to_string(),
            &PathBuf::from("greet.ts"),
        )
        .unwrap();

    assert_eq!(tree.root().kind(), "program");
    assert!(!tree.has_errors());
    assert!(tree.diagnostics().is_empty());
    assert!(tree.source().starts_with("export"));
}

#[test]
fn test_parse_reports_diagnostics() {
    let parser = SourceParser::new();
    let tree = parser
        .parse_source("function broken( {\n  return 1;\n".to_string(), &PathBuf::from("broken.ts"))
        .unwrap();

    assert!(tree.has_errors());
    let first = &tree.diagnostics()[0];
    assert!(first.line >= 1);
    assert!(first.column >= 1);
    assert!(!first.message.is_empty());
}

#[test]
fn test_tsx_requires_tsx_grammar() {
    let parser = SourceParser::new();
    let source = "const el = <div className=\"x\">hello</div>;".to_string();

    let tsx = parser.parse_source(source, &PathBuf::from("view.tsx")).unwrap();
    assert!(!tsx.has_errors());
}

#[test]
fn test_parse_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.ts");
    std::fs::write(&path, "interface Point { x: number; y: number }\n").unwrap();

    let tree = SourceParser::new().parse_file(&path).unwrap();
    assert!(!tree.has_errors());
}

#[test]
fn test_parse_missing_file() {
    let result = SourceParser::new().parse_file(Path::new("/nonexistent/mod.ts"));
    assert!(matches!(result, Err(ParseError::FileRead(_))));
}
