//! `DroneWatcher` (§4.12): watches a directory tree for document files,
//! chunks qualifying files locally, and hands each document's content to
//! `DroneClient` for upload. Local chunking exists so the watcher can
//! compute the chunk-ids it's about to produce and skip files that would
//! re-derive identical ids (idempotent re-ingest of an unchanged file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use hive_core::chunk_id::chunk_id;
use hive_core::chunker::chunk_text;

use crate::client::{DroneClient, DroneClientError};

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

fn is_skippable(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('~') || name.ends_with(".tmp") || name.ends_with(".swp")
}

fn qualifies(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if is_skippable(name) {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

pub struct DroneWatcher {
    root: PathBuf,
    tenant_id: String,
    client_id: String,
    client: Arc<DroneClient>,
    /// (file_path, chunk index) already uploaded with the content hash they
    /// carried, so an unchanged file is never re-sent.
    seen: HashMap<(String, usize), u64>,
}

fn content_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

impl DroneWatcher {
    pub fn new(
        root: impl Into<PathBuf>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client: Arc<DroneClient>,
    ) -> Self {
        Self {
            root: root.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client,
            seen: HashMap::new(),
        }
    }

    /// Recursively scans `root` once, uploading every qualifying file.
    /// Called at startup before live watching begins.
    pub async fn initial_scan(&mut self) -> std::io::Result<()> {
        let mut stack = vec![self.root.clone()];
        let mut files = Vec::new();
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if qualifies(&path) {
                    files.push(path);
                }
            }
        }
        for path in files {
            if let Err(err) = self.handle_path(&path).await {
                warn!(path = %path.display(), error = %err, "initial scan ingest failed");
            }
        }
        Ok(())
    }

    /// Runs the live watch loop until the channel is closed or an
    /// unrecoverable watcher error occurs.
    pub async fn run(&mut self) -> notify::Result<()> {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(256);
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => self.handle_event(event).await,
                Err(err) => warn!(error = %err, "watch error"),
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        for path in event.paths {
            if !qualifies(&path) {
                continue;
            }
            if let Err(err) = self.handle_path(&path).await {
                warn!(path = %path.display(), error = %err, "ingest failed");
            }
        }
    }

    async fn handle_path(&mut self, path: &Path) -> Result<(), DroneClientError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping unreadable file");
                return Ok(());
            }
        };
        let file_path = path.to_string_lossy().to_string();

        let chunks = chunk_text(&content);
        let mut any_new = false;
        for chunk in &chunks {
            let id = chunk_id(&file_path, chunk.ordinal);
            let hash = content_hash(&chunk.content);
            let key = (file_path.clone(), chunk.ordinal);
            if self.seen.get(&key) != Some(&hash) {
                any_new = true;
                self.seen.insert(key, hash);
            }
            debug!(%id, ordinal = chunk.ordinal, "computed chunk id");
        }
        if !any_new {
            debug!(path = %file_path, "no changed chunks, skipping upload");
            return Ok(());
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());
        let mime_type = match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => "text/markdown",
            _ => "text/plain",
        };

        info!(path = %file_path, chunks = chunks.len(), "uploading document");
        self.client
            .ingest(
                &self.tenant_id,
                &file_path,
                &filename,
                mime_type,
                Some(&self.client_id),
                content,
            )
            .await?;
        Ok(())
    }
}
