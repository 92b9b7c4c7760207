use predicates::prelude::*;

use super::{json_output, rewind};

#[test]
fn demo_reports_the_main_lane_by_default() {
    let report = json_output(rewind().args(["demo", "--json"]));

    assert_eq!(report["thread"], "main");
    assert_eq!(report["threads"], serde_json::json!(["main", "worker"]));
    assert_eq!(report["sorted"], serde_json::json!([2, 3, 3, 3, 5, 6, 7, 8, 8]));
    assert!(report.get("log").is_none());

    let root = &report["call_tree"]["calls"][0];
    assert_eq!(root["owner"], "demo/QuickSort");
    assert_eq!(root["args"], serde_json::json!(["[5, 2, 3, 8, 7, 3, 8, 6, 3]"]));
    assert_eq!(root["result"], "[2, 3, 3, 3, 5, 6, 7, 8, 8]");

    assert_eq!(report["locals"]["pivot"], "5");
    assert_eq!(report["locals"]["left"], "[2, 3, 3, 3]");
    assert_eq!(report["locals"]["right"], "[8, 7, 8, 6]");
}

#[test]
fn thread_option_selects_another_lane() {
    let report = json_output(rewind().args([
        "demo",
        "--json",
        "--thread",
        "worker",
        "--values",
        "3,1,2",
    ]));

    assert_eq!(report["thread"], "worker");
    assert_eq!(report["call_tree"]["thread"], "worker");
    assert_eq!(report["sorted"], serde_json::json!([1, 2, 3]));
    assert_eq!(report["call_tree"]["calls"][0]["args"], serde_json::json!(["[2, 1, 3]"]));
}

#[test]
fn log_lines_belong_to_the_selected_lane() {
    let report = json_output(rewind().args(["demo", "--json", "--log", "--values", "2,1"]));

    let log: Vec<&str> = report["log"]
        .as_array()
        .expect("log is included")
        .iter()
        .map(|line| line.as_str().unwrap())
        .collect();
    let entry = "ENTER METHOD: demo/QuickSort, sort, (Ljava/util/List;)Ljava/util/List;, [[2, 1]]";
    assert!(log.iter().any(|line| line.ends_with(entry)), "{log:#?}");
    assert!(!log.iter().any(|line| line.contains("[[1, 2]]")));
    assert!(log.last().unwrap().contains("EXIT VALUE: [1, 2]"));
}

#[test]
fn human_output_prints_the_instrumented_calls() {
    rewind()
        .args(["demo", "--values", "2,1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lanes: main, worker"))
        .stdout(predicate::str::contains("sorted on main: [1, 2]"))
        .stdout(predicate::str::contains(
            "  demo/QuickSort.sort([[2, 1]]) - [1, 2]\n    demo/QuickSort.sort([[1]]) - [1]\n",
        ))
        .stdout(predicate::str::contains("java/util/ArrayList.size").not())
        .stdout(predicate::str::contains("  pivot = 2"));
}

#[test]
fn all_calls_keeps_library_calls() {
    rewind()
        .args(["demo", "--values", "2,1", "--all-calls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("java/util/ArrayList.size([]) - 2"));
}

#[test]
fn unknown_lane_is_an_error() {
    rewind()
        .args(["demo", "--thread", "nobody"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "no lane named nobody; recorded lanes: main, worker",
        ));
}
