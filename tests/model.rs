use pretty_assertions::assert_eq;
use skillmap::classify::{unknown_extensions, Classifier, ExtensionTable};
use skillmap::error::SkillmapError;
use skillmap::model::{Commit, FileDiff, FileRef, Repository, RepositorySummary};

const SHA: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

#[test]
fn numstat_line_parses_counts_path_and_extension() {
    let table = ExtensionTable::builtin();
    let diff = FileDiff::parse("12\t49\tboard-progs/autonomous-racer/common/ir.cpp", &table).unwrap();

    assert_eq!(diff.additions, 12);
    assert_eq!(diff.deletions, 49);
    assert_eq!(diff.changes(), 61);
    assert_eq!(diff.file.path(), "board-progs/autonomous-racer/common/ir.cpp");
    assert_eq!(diff.file.name(), "ir.cpp");
    assert_eq!(diff.file.extension(), "cpp");
    assert_eq!(diff.file.classification().unwrap().language, "C++");
}

#[test]
fn numstat_columns_accept_any_whitespace_run() {
    let table = ExtensionTable::builtin();
    let diff = FileDiff::parse("  3    7   src/lib.rs", &table).unwrap();
    assert_eq!((diff.additions, diff.deletions), (3, 7));
    assert_eq!(diff.file.path(), "src/lib.rs");
}

#[test]
fn binary_numstat_reads_as_noop() {
    let table = ExtensionTable::builtin();
    let diff = FileDiff::parse("-\t-\tassets/logo.png", &table).unwrap();
    assert!(diff.is_noop());
}

#[test]
fn renamed_paths_use_destination() {
    let table = ExtensionTable::builtin();
    let diff = FileDiff::parse("1\t1\tsrc/{util.js => helpers.ts}", &table).unwrap();
    assert_eq!(diff.file.path(), "src/helpers.ts");
    assert_eq!(diff.file.classification().unwrap().language, "TypeScript");
}

#[test]
fn quoted_non_ascii_paths_are_unescaped() {
    let table = ExtensionTable::builtin();
    let diff = FileDiff::parse("4\t0\t\"src/caf\\303\\251.rs\"", &table).unwrap();

    assert_eq!(diff.file.path(), "src/café.rs");
    assert_eq!(diff.file.name(), "café.rs");
    assert_eq!(diff.file.extension(), "rs");
    assert_eq!(diff.file.classification().unwrap().language, "Rust");
}

#[test]
fn malformed_numstat_lines_are_errors() {
    let table = ExtensionTable::builtin();
    for line in ["", "12 49", "12\t49\t   ", "twelve\t49\tsrc/lib.rs", "1\t-3\tsrc/lib.rs"] {
        assert!(
            matches!(FileDiff::parse(line, &table), Err(SkillmapError::Parse(_))),
            "expected parse error for {line:?}"
        );
    }
}

#[test]
fn file_ref_name_extension_and_classification() {
    let table = ExtensionTable::builtin();

    let json = FileRef::new("/tmp/data.json", &table);
    assert_eq!(json.name(), "data.json");
    assert_eq!(json.extension(), "json");
    assert_eq!(json.classification().unwrap().category, "web");

    let makefile = FileRef::new("build/Makefile", &table);
    assert_eq!(makefile.extension(), "Makefile");
    assert_eq!(makefile.classification().unwrap().language, "Make");

    let archive = FileRef::new("dist/bundle.tar.gz", &table);
    assert_eq!(archive.extension(), "gz");
    assert!(archive.classification().is_none());
}

#[test]
fn file_refs_compare_by_path_only() {
    let table = ExtensionTable::builtin();
    assert_eq!(FileRef::new("a/b.rs", &table), FileRef::unclassified("a/b.rs"));
    assert!(FileRef::unclassified("a/a.rs") < FileRef::unclassified("a/b.rs"));
}

#[test]
fn commit_parse_reads_timestamp_and_drops_noops() {
    let table = ExtensionTable::builtin();
    let output = "2024-03-05T14:22:10+01:00\n\n4\t1\tsrc/main.rs\n0\t0\tsrc/empty.rs\n-\t-\timg.png\n2\t2\tweb/app.js\n";

    let commit = Commit::parse(SHA, output, &table).unwrap();

    assert_eq!(commit.sha, SHA);
    assert_eq!(commit.timestamp.to_rfc3339(), "2024-03-05T13:22:10+00:00");
    assert_eq!(commit.file_diffs.len(), 2);
    assert_eq!((commit.additions, commit.deletions), (6, 3));
}

#[test]
fn commit_parse_rejects_bad_input() {
    let table = ExtensionTable::builtin();
    assert!(matches!(
        Commit::parse("abc123", "2024-03-05T14:22:10+01:00\n", &table),
        Err(SkillmapError::InvalidSha(_))
    ));
    assert!(matches!(
        Commit::parse(SHA, "yesterday\n1\t1\ta.rs\n", &table),
        Err(SkillmapError::InvalidDate(_))
    ));
    assert!(matches!(Commit::parse(SHA, "\n\n", &table), Err(SkillmapError::Parse(_))));
}

#[test]
fn repository_totals_and_chronological_sort() {
    let table = ExtensionTable::builtin();
    let later = Commit::parse(&"b".repeat(40), "2024-02-01T00:00:00Z\n5\t0\ta.rs\n", &table).unwrap();
    let earlier = Commit::parse(&"a".repeat(40), "2024-01-01T00:00:00Z\n1\t2\tb.py\n", &table).unwrap();

    let mut repo = Repository::new(FileRef::unclassified("/work/robots"));
    repo.push_commit(later);
    repo.push_commit(earlier);
    repo.sort_commits();

    assert_eq!(repo.name(), "robots");
    assert_eq!((repo.additions, repo.deletions), (6, 2));
    assert_eq!(repo.commits[0].sha, "a".repeat(40));

    let summary = RepositorySummary::from(&repo);
    assert_eq!(summary.commits, 2);
    assert_eq!(summary.first_commit.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    assert_eq!(summary.last_commit.unwrap().to_rfc3339(), "2024-02-01T00:00:00+00:00");
}

#[test]
fn classifier_lookup_is_case_insensitive_and_overridable() {
    let mut table = ExtensionTable::builtin();
    assert_eq!(table.classify("RS").unwrap().language, "Rust");

    table
        .extend_from_json(r#"{ "Pde": { "category": "systems", "language": "Processing" }, "json": { "category": "data", "language": "JSON" } }"#)
        .unwrap();

    assert_eq!(table.classify("pde").unwrap().language, "Processing");
    assert_eq!(table.classify("json").unwrap().category, "data");
    assert!(table.extend_from_json("[1, 2]").is_err());
}

#[test]
fn classifier_table_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extensions.json");
    std::fs::write(&path, r#"{ "sv": { "category": "hardware", "language": "SystemVerilog" } }"#).unwrap();

    let table = ExtensionTable::load(&path).unwrap();

    assert_eq!(table.classify("rs").unwrap().language, "Rust");
    assert_eq!(table.classify("sv").unwrap().category, "hardware");
    assert!(ExtensionTable::load(dir.path().join("missing.json")).is_err());
}

#[test]
fn unknown_extensions_are_counted_most_frequent_first() {
    let table = ExtensionTable::builtin();
    let files: Vec<FileRef> = ["a.rs", "x.weird", "y.weird", "z.odd", "LICENSE"]
        .iter()
        .map(|p| FileRef::new(*p, &table))
        .collect();

    let unknown = unknown_extensions(&files);

    assert_eq!(
        unknown,
        vec![("weird".to_string(), 2), ("LICENSE".to_string(), 1), ("odd".to_string(), 1)]
    );
}
