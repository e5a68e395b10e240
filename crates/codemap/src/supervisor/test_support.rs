//! Fake analyzer scripts for supervisor tests: a real (Python) subprocess
//! that speaks the sidecar wire protocol, rather than mocking the IPC layer
//! itself.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

fn write_script(name: &str, script: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join(name);
    fs::write(&script_path, script).expect("write script");
    let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("chmod");
    (dir, script_path)
}

/// Replies to every request with `{"result": {"files": []}}`.
pub(super) fn write_echo_analyzer() -> (tempfile::TempDir, PathBuf) {
    write_script(
        "echo-analyzer",
        r#"#!/usr/bin/env python3
import json
import sys

sys.stdout.write(json.dumps({"status": "ready"}) + "\n")
sys.stdout.flush()

for line in sys.stdin:
    if not line.strip():
        continue
    req = json.loads(line)
    resp = {"id": req["id"], "result": {"files": []}}
    sys.stdout.write(json.dumps(resp) + "\n")
    sys.stdout.flush()
"#,
    )
}

/// Crashes (closes stdout without responding) on the first request it ever
/// receives; any later spawn of the same script replies normally. State is
/// tracked via a marker file next to the script so it survives the
/// supervisor's respawn-on-crash.
pub(super) fn write_crash_once_analyzer() -> (tempfile::TempDir, PathBuf) {
    write_script(
        "crash-once-analyzer",
        r#"#!/usr/bin/env python3
import json
import os
import sys

marker = os.path.join(os.path.dirname(os.path.abspath(__file__)), ".crashed")

sys.stdout.write(json.dumps({"status": "ready"}) + "\n")
sys.stdout.flush()

if not os.path.exists(marker):
    sys.stdin.readline()
    open(marker, "w").close()
    sys.exit(1)

for line in sys.stdin:
    if not line.strip():
        continue
    req = json.loads(line)
    resp = {"id": req["id"], "result": {"files": []}}
    sys.stdout.write(json.dumps(resp) + "\n")
    sys.stdout.flush()
"#,
    )
}

/// Crashes on the first request of every single spawn, unconditionally.
pub(super) fn write_always_crash_analyzer() -> (tempfile::TempDir, PathBuf) {
    write_script(
        "always-crash-analyzer",
        r#"#!/usr/bin/env python3
import sys
import json

sys.stdout.write(json.dumps({"status": "ready"}) + "\n")
sys.stdout.flush()
sys.stdin.readline()
sys.exit(1)
"#,
    )
}

/// Sends the ready signal, then stalls forever before answering any request.
pub(super) fn write_slow_analyzer() -> (tempfile::TempDir, PathBuf) {
    write_script(
        "slow-analyzer",
        r#"#!/usr/bin/env python3
import json
import sys
import time

sys.stdout.write(json.dumps({"status": "ready"}) + "\n")
sys.stdout.flush()

for line in sys.stdin:
    if not line.strip():
        continue
    time.sleep(10)
"#,
    )
}

/// Sends a malformed (non-"ready") first line, which must fail startup
/// without being counted as a crash.
pub(super) fn write_bad_ready_signal_analyzer() -> (tempfile::TempDir, PathBuf) {
    write_script(
        "bad-ready-analyzer",
        r#"#!/usr/bin/env python3
import sys

sys.stdout.write("not json at all\n")
sys.stdout.flush()
for line in sys.stdin:
    pass
"#,
    )
}
