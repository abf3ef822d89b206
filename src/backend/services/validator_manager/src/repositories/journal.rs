use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::pipeline::PipelineTransition;
use crate::repositories::traits::PipelineJournal;

/// Journal kept in process memory.
#[derive(Default, Clone)]
pub struct InMemoryJournal {
    operations: Arc<RwLock<BTreeMap<Uuid, Vec<PipelineTransition>>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineJournal for InMemoryJournal {
    async fn record(&self, transition: PipelineTransition) -> Result<()> {
        let mut operations = self.operations.write().await;
        operations
            .entry(transition.operation_id)
            .or_default()
            .push(transition);
        Ok(())
    }

    async fn history(&self, operation_id: Uuid) -> Result<Vec<PipelineTransition>> {
        let operations = self.operations.read().await;
        Ok(operations.get(&operation_id).cloned().unwrap_or_default())
    }

    async fn operations(&self) -> Result<Vec<Uuid>> {
        let operations = self.operations.read().await;
        Ok(operations.keys().cloned().collect())
    }
}

/// Append-only JSON-lines journal, one transition per line.
pub struct JsonFileJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<PipelineTransition>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading journal {}", self.path.display()))
            }
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("corrupt journal line"))
            .collect()
    }
}

#[async_trait]
impl PipelineJournal for JsonFileJournal {
    async fn record(&self, transition: PipelineTransition) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(&transition)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening journal {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn history(&self, operation_id: Uuid) -> Result<Vec<PipelineTransition>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|t| t.operation_id == operation_id)
            .collect())
    }

    async fn operations(&self) -> Result<Vec<Uuid>> {
        let mut seen = Vec::new();
        for transition in self.load().await? {
            if !seen.contains(&transition.operation_id) {
                seen.push(transition.operation_id);
            }
        }
        Ok(seen)
    }
}
