use assert_cmd::Command;

mod config;
mod demo;

pub(crate) fn rewind() -> Command {
    let mut cmd = Command::cargo_bin("rewind").expect("rewind binary is built");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub(crate) fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("rewind runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
