use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::{Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use assert_cmd::Command;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const BIN_NAME: &str = "models-extract";

struct CliTest {
    _temp_dir: TempDir,
    project_dir: PathBuf,
}

impl CliTest {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let project_dir = temp_dir.path().canonicalize().unwrap();
        Self {
            _temp_dir: temp_dir,
            project_dir,
        }
    }

    fn write_file(&self, path: &str, content: &str) {
        let file_path = self.project_dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file_path, content).unwrap();
    }

    fn root(&self) -> &Path {
        &self.project_dir
    }

    fn data(&self, name: &str) -> PathBuf {
        self.project_dir.join("data").join(name)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin(BIN_NAME).unwrap();
        cmd.current_dir(&self.project_dir);
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn run_metadata(&self) -> Value {
        let content = fs::read_to_string(self.data("extraction_metadata.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn parquet_batch(&self) -> RecordBatch {
        let file = fs::File::open(self.data("community_models.parquet")).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        batches.into_iter().next().unwrap()
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> &'a StringArray {
    batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
}

#[test]
fn test_two_models_produce_all_outputs() {
    let test = CliTest::new();
    test.write_file("external-repo/models/a.json", r#"{"name":"A","size":1}"#);
    test.write_file("external-repo/models/b.json", r#"{"name":"B","size":2}"#);

    test.command()
        .args(["--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Records written: 2"));

    assert!(test.data("community_models.parquet").exists());
    assert!(test.data("community_models.csv").exists());

    let metadata = test.run_metadata();
    assert_eq!(metadata["record_count"], 2);
    assert_eq!(
        metadata["source_repository"],
        "https://github.com/drawthings/community-models"
    );
    assert!(metadata["extracted_at"].as_str().unwrap().ends_with("+00:00"));

    let batch = test.parquet_batch();
    assert_eq!(batch.num_rows(), 2);

    let schema = batch.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["name", "size", "source_file", "extracted_at"]);

    let sources = string_column(&batch, "source_file");
    assert_eq!(sources.value(0), "models/a.json");
    assert_eq!(sources.value(1), "models/b.json");

    let sizes = batch
        .column_by_name("size")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(sizes.value(0), 1);
    assert_eq!(sizes.value(1), 2);

    let stamps = string_column(&batch, "extracted_at");
    assert_eq!(stamps.value(0), metadata["extracted_at"].as_str().unwrap());
    assert_eq!(stamps.value(0), stamps.value(1));
}

#[test]
fn test_community_model_pair() {
    let test = CliTest::new();
    test.write_file(
        "external-repo/models/model1.json",
        r#"{"name":"test-model-1","version":"1.0.0","author":"Test Author","description":"A test model"}"#,
    );
    test.write_file(
        "external-repo/models/model2.json",
        r#"{"name":"test-model-2","version":"2.0.0","category":"diffusion"}"#,
    );

    test.command().assert().success();

    assert!(test.root().join("data").is_dir());
    assert!(test.data("community_models.csv").exists());

    let metadata = test.run_metadata();
    assert_eq!(metadata["record_count"], 2);
    assert_eq!(
        metadata["source_repository"],
        "https://github.com/drawthings/community-models"
    );

    let batch = test.parquet_batch();
    assert_eq!(batch.num_rows(), 2);

    let schema = batch.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "name",
            "version",
            "author",
            "description",
            "source_file",
            "category",
            "extracted_at"
        ]
    );

    assert!(string_column(&batch, "category").is_null(0));
    assert_eq!(string_column(&batch, "category").value(1), "diffusion");
    assert!(string_column(&batch, "author").is_null(1));
    assert_eq!(string_column(&batch, "version").value(1), "2.0.0");
}

#[test]
fn test_malformed_files_are_reported_and_skipped() {
    let test = CliTest::new();
    test.write_file("external-repo/good.json", r#"{"name":"good"}"#);
    test.write_file("external-repo/broken.json", r#"{"name": "#);
    test.write_file("external-repo/list.json", "[1, 2, 3]");

    let run = test
        .command()
        .args(["--output-format", "plain"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Error reading broken.json"))
        .stderr(predicate::str::contains("Error reading list.json"))
        .stderr(predicate::str::contains("good.json").not());

    let stderr = String::from_utf8_lossy(&run.get_output().stderr).into_owned();
    let diagnostics = stderr
        .lines()
        .filter(|line| line.contains("Error reading"))
        .count();
    assert_eq!(diagnostics, 2);

    assert_eq!(test.run_metadata()["record_count"], 1);
    assert_eq!(test.parquet_batch().num_rows(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinked_metadata_files_are_read() {
    use std::os::unix::fs::symlink;

    let test = CliTest::new();
    test.write_file("external-repo/models/plain.json", r#"{"name":"plain"}"#);
    test.write_file("shared/linked.json", r#"{"name":"linked"}"#);
    symlink(
        test.root().join("shared/linked.json"),
        test.root().join("external-repo/models/link.json"),
    )
    .unwrap();
    symlink(
        test.root().join("shared/missing.json"),
        test.root().join("external-repo/models/dangling.json"),
    )
    .unwrap();

    let run = test
        .command()
        .args(["--output-format", "plain"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Error reading models/dangling.json"));

    let stderr = String::from_utf8_lossy(&run.get_output().stderr).into_owned();
    assert_eq!(
        stderr
            .lines()
            .filter(|line| line.contains("Error reading"))
            .count(),
        1
    );

    assert_eq!(test.run_metadata()["record_count"], 2);

    let batch = test.parquet_batch();
    let sources = string_column(&batch, "source_file");
    assert_eq!(sources.value(0), "models/link.json");
    assert_eq!(sources.value(1), "models/plain.json");
}

#[test]
fn test_dot_json_and_git_dir_files_are_read() {
    let test = CliTest::new();
    test.write_file("external-repo/.json", r#"{"name":"bare"}"#);
    test.write_file("external-repo/.git/meta.json", r#"{"name":"in-git"}"#);

    test.command().arg("-q").assert().success();

    assert_eq!(test.run_metadata()["record_count"], 2);
}

#[test]
fn test_columns_are_the_union_of_fields() {
    let test = CliTest::new();
    test.write_file("external-repo/a.json", r#"{"name":"A","license":"MIT"}"#);
    test.write_file("external-repo/b.json", r#"{"name":"B","tags":["x","y"]}"#);

    test.command().arg("-q").assert().success();

    let csv = fs::read_to_string(test.data("community_models.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "name,license,source_file,tags,extracted_at");
    assert!(lines[1].starts_with("A,MIT,a.json,,"));
    assert!(lines[2].starts_with("B,,b.json,"));

    let batch = test.parquet_batch();
    let license = string_column(&batch, "license");
    assert!(license.is_null(1));
    let tags = string_column(&batch, "tags");
    assert!(tags.is_null(0));
    assert_eq!(tags.value(1), r#"["x","y"]"#);
}

#[test]
fn test_empty_input_writes_only_run_metadata() {
    let test = CliTest::new();
    test.write_file("external-repo/README.md", "# nothing to see");

    test.command().assert().success();

    assert!(!test.data("community_models.parquet").exists());
    assert!(!test.data("community_models.csv").exists());
    assert_eq!(test.run_metadata()["record_count"], 0);
}

#[test]
fn test_missing_root_exits_cleanly_without_outputs() {
    let test = CliTest::new();

    test.command()
        .assert()
        .success()
        .stdout(predicate::str::contains("Input root not found"));

    assert!(!test.root().join("data").exists());
}

#[test]
fn test_rerun_gives_identical_rows() {
    let test = CliTest::new();
    test.write_file("external-repo/z/last.json", r#"{"name":"Z","score":0.5}"#);
    test.write_file("external-repo/a/first.json", r#"{"name":"A","score":2}"#);

    let strip_timestamps = |csv: String| -> Vec<String> {
        csv.lines()
            .map(|line| match line.rfind(',') {
                Some(idx) => line[..idx].to_string(),
                None => line.to_string(),
            })
            .collect()
    };

    test.command().arg("-q").assert().success();
    let first = fs::read_to_string(test.data("community_models.csv")).unwrap();

    test.command().arg("-q").assert().success();
    let second = fs::read_to_string(test.data("community_models.csv")).unwrap();

    assert_eq!(strip_timestamps(first), strip_timestamps(second));
    assert_eq!(test.run_metadata()["record_count"], 2);
}

#[test]
fn test_explicit_paths() {
    let test = CliTest::new();
    test.write_file("fixtures/repo/m.json", r#"{"name":"m"}"#);

    test.command()
        .args(["--input", "fixtures/repo", "--output", "out", "-q"])
        .assert()
        .success();

    assert!(test.root().join("out/community_models.parquet").exists());
    assert!(test.root().join("out/extraction_metadata.json").exists());
    assert!(!test.root().join("data").exists());
}

#[test]
fn test_json_report() {
    let test = CliTest::new();
    test.write_file("external-repo/m.json", r#"{"name":"m"}"#);

    let output = test
        .command()
        .args(["--output-format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report_start = stdout.find("{\n").unwrap();
    let report: Value = serde_json::from_str(&stdout[report_start..]).unwrap();
    assert_eq!(report["record_count"], 1);
    assert_eq!(report["files_discovered"], 1);
}

#[test]
fn test_generate_config() {
    let test = CliTest::new();

    test.command()
        .arg("--generate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("models-extract.toml"));

    let content = fs::read_to_string(test.root().join("models-extract.toml")).unwrap();
    assert!(content.contains("[scan]"));
    assert!(content.contains("[provenance]"));
}

#[test]
fn test_config_file_overrides_provenance() {
    let test = CliTest::new();
    test.write_file("external-repo/m.json", r#"{"name":"m"}"#);
    test.write_file(
        "models-extract.toml",
        "[provenance]\nsource_repository = \"https://example.com/mirror\"\n",
    );

    test.command().arg("-q").assert().success();

    assert_eq!(
        test.run_metadata()["source_repository"],
        "https://example.com/mirror"
    );
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let test = CliTest::new();
    test.write_file(
        "models-extract.toml",
        "[provenance]\nsource_repository = \"not a url\"\n",
    );

    test.command()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source_repository"));
}

#[test]
fn test_dry_run_touches_nothing() {
    let test = CliTest::new();
    test.write_file("external-repo/m.json", r#"{"name":"m"}"#);

    test.command()
        .args(["--dry-run", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("community_models.parquet"));

    assert!(!test.root().join("data").exists());
}
