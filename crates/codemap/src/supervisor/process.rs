//! Spawn-with-retry helper shared by sidecar and one-shot launches.
//!
//! Retries on `ExecutableFileBusy`/`ETXTBSY` (os error 26) with a doubling
//! backoff, made async so callers never block the runtime thread while
//! backing off.

use std::path::Path;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::error::SupervisorError;

pub(super) async fn spawn_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<Child, SupervisorError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(SupervisorError::Spawn {
                    path: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}
