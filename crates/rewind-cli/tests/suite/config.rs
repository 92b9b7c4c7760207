use std::io::Write;

use predicates::prelude::*;

use super::rewind;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn log_requires_log_lines_to_be_kept() {
    let config = config_file("[trace]\nwrite_log = false\n");
    rewind()
        .arg("--config")
        .arg(config.path())
        .args(["demo", "--log"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--log needs trace.write_log = true"));
}

#[test]
fn invalid_config_is_reported_with_its_path() {
    let config = config_file("[vm]\nmax_call_depth = 0\n");
    rewind()
        .args(["demo", "--config"])
        .arg(config.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("vm.max_call_depth must be at least 1"))
        .stderr(predicate::str::contains(config.path().display().to_string()));
}

#[test]
fn excluded_sample_cannot_be_traced() {
    let config = config_file("[instrument]\nexclude = [\"demo/\"]\n");
    rewind()
        .arg("--config")
        .arg(config.path())
        .arg("demo")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "class demo/QuickSort is excluded from instrumentation",
        ));
}

#[test]
fn quiet_logging_keeps_stderr_empty() {
    let config = config_file("[logging]\nlevel = \"error\"\n");
    rewind()
        .arg("--config")
        .arg(config.path())
        .args(["demo", "--values", "1"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("sorted on main: [1]"));
}
