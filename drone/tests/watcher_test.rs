use std::sync::Arc;

use drone::{DroneClient, DroneWatcher};
use tempfile::tempdir;

#[tokio::test]
async fn initial_scan_skips_dotfiles_and_unsupported_extensions() {
    let dir = tempdir().unwrap();
    tokio::fs::write(dir.path().join("notes.txt"), "Hello there. This is a note.")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join(".hidden.txt"), "should be skipped")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("image.png"), b"not text")
        .await
        .unwrap();

    // No server is running, so `initial_scan` will hit connection errors for
    // the one qualifying file; it logs and continues rather than failing the
    // scan, which is what we're asserting here.
    let client = Arc::new(DroneClient::new("http://127.0.0.1:1", None));
    let mut watcher = DroneWatcher::new(dir.path(), "acme", "drone-test", client);
    let result = watcher.initial_scan().await;
    assert!(result.is_ok());
}
