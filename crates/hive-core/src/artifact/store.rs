//! Artifact storage on the local filesystem

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{ArtifactKind, WriteMode};
use crate::error::{Error, Result};

/// Outcome of `create_work_plan`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkPlanCreation {
    /// The plan did not exist and has been written
    Created(PathBuf),
    /// A plan already exists; it was left untouched
    AlreadyExists(PathBuf),
}

/// Durable scratch files of a single agent
///
/// Files are created lazily on first write. A missing file is a valid
/// state and reads back as `None`.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    /// Serialises read-modify-write cycles of this store
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Create a store rooted at an agent's output location
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Directory holding the artifacts
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact file
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Check whether an artifact has been written
    pub async fn exists(&self, kind: ArtifactKind) -> Result<bool> {
        let path = self.path(kind);
        fs::try_exists(&path)
            .await
            .map_err(|source| Error::ArtifactIo {
                artifact: kind,
                path,
                source,
            })
    }

    /// Read an artifact, `None` if it has never been written
    pub async fn read(&self, kind: ArtifactKind) -> Result<Option<String>> {
        let path = self.path(kind);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::ArtifactIo {
                artifact: kind,
                path,
                source,
            }),
        }
    }

    /// Create the work plan unless one already exists
    pub async fn create_work_plan(&self, plan: &str) -> Result<WorkPlanCreation> {
        let _guard = self.write_lock.lock().await;
        if self.exists(ArtifactKind::WorkPlan).await? {
            return Ok(WorkPlanCreation::AlreadyExists(
                self.path(ArtifactKind::WorkPlan),
            ));
        }
        let path = self.publish(ArtifactKind::WorkPlan, plan).await?;
        Ok(WorkPlanCreation::Created(path))
    }

    /// Replace the whole work plan
    pub async fn update_work_plan(&self, plan: &str) -> Result<PathBuf> {
        self.write(ArtifactKind::WorkPlan, plan).await
    }

    pub async fn read_work_plan(&self) -> Result<Option<String>> {
        self.read(ArtifactKind::WorkPlan).await
    }

    /// Append one entry to the memory log
    pub async fn append_memory(&self, entry: &str) -> Result<PathBuf> {
        self.write(ArtifactKind::Memory, entry).await
    }

    pub async fn read_memory(&self) -> Result<Option<String>> {
        self.read(ArtifactKind::Memory).await
    }

    /// Append one entry to the reflection log
    pub async fn append_reflection(&self, reflection: &str) -> Result<PathBuf> {
        self.write(ArtifactKind::Reflection, reflection).await
    }

    /// Write (or overwrite) the final result
    pub async fn write_result(&self, result: &str) -> Result<PathBuf> {
        self.write(ArtifactKind::Result, result).await
    }

    pub async fn read_result(&self) -> Result<Option<String>> {
        self.read(ArtifactKind::Result).await
    }

    /// Write an artifact according to its write mode
    pub async fn write(&self, kind: ArtifactKind, text: &str) -> Result<PathBuf> {
        let _guard = self.write_lock.lock().await;
        match kind.write_mode() {
            WriteMode::Overwrite => self.publish(kind, text).await,
            WriteMode::Append => {
                let mut contents = self.read(kind).await?.unwrap_or_default();
                if !contents.is_empty() && !contents.ends_with('\n') {
                    contents.push('\n');
                }
                contents.push_str(text);
                contents.push('\n');
                self.publish(kind, &contents).await
            }
        }
    }

    /// Atomically replace the artifact file with `contents`.
    ///
    /// Caller must hold `write_lock`.
    async fn publish(&self, kind: ArtifactKind, contents: &str) -> Result<PathBuf> {
        let path = self.path(kind);
        let io_err = |source: std::io::Error| Error::ArtifactIo {
            artifact: kind,
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.root).await.map_err(io_err)?;

        let tmp_path = self.root.join(format!(
            ".{}.{}.tmp",
            kind.file_name(),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(source) = write_and_rename(&tmp_path, &path, contents).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_err(source));
        }

        debug!(artifact = %kind, path = %path.display(), bytes = contents.len(), "Artifact written");
        Ok(path)
    }
}

async fn write_and_rename(tmp_path: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp_path, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path().join("agent-1"))
    }

    #[tokio::test]
    async fn test_missing_artifacts_read_as_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for kind in ArtifactKind::ALL {
            assert!(store.read(kind).await.unwrap().is_none());
            assert!(!store.exists(kind).await.unwrap());
        }
        // Nothing is created by reading
        assert!(!store.root().exists());
    }

    #[tokio::test]
    async fn test_work_plan_create_then_update_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let created = store.create_work_plan("A").await.unwrap();
        assert!(matches!(created, WorkPlanCreation::Created(_)));
        assert_eq!(store.read_work_plan().await.unwrap().as_deref(), Some("A"));

        store.update_work_plan("B").await.unwrap();
        assert_eq!(store.read_work_plan().await.unwrap().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_create_work_plan_twice_keeps_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.create_work_plan("first").await.unwrap();
        let second = store.create_work_plan("second").await.unwrap();

        assert_eq!(
            second,
            WorkPlanCreation::AlreadyExists(store.path(ArtifactKind::WorkPlan))
        );
        assert_eq!(store.read_work_plan().await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_update_work_plan_without_create() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.update_work_plan("- [🟡] step 1").await.unwrap();
        assert_eq!(
            store.read_work_plan().await.unwrap().as_deref(),
            Some("- [🟡] step 1")
        );
    }

    #[tokio::test]
    async fn test_memory_appends_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append_memory("x").await.unwrap();
        store.append_memory("y").await.unwrap();

        let memory = store.read_memory().await.unwrap().unwrap();
        let x = memory.find('x').unwrap();
        let y = memory.find('y').unwrap();
        assert!(x < y);
        assert_eq!(memory, "x\ny\n");
    }

    #[tokio::test]
    async fn test_reflection_is_append_only() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append_reflection("first thought").await.unwrap();
        store.append_reflection("second thought").await.unwrap();

        let reflection = store.read(ArtifactKind::Reflection).await.unwrap().unwrap();
        assert_eq!(reflection, "first thought\nsecond thought\n");
    }

    #[tokio::test]
    async fn test_result_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.write_result("draft").await.unwrap();
        let path = store.write_result("final").await.unwrap();

        assert_eq!(path, store.root().join("result.md"));
        assert_eq!(store.read_result().await.unwrap().as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.create_work_plan("plan").await.unwrap();
        store.append_memory("m").await.unwrap();
        store.append_reflection("r").await.unwrap();
        store.write_result("done").await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["memory.md", "reflection.md", "result.md", "work_plan.md"]
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_artifact_io() {
        let dir = TempDir::new().unwrap();
        // A regular file where the output directory should be
        let blocker = dir.path().join("agent-1");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ArtifactStore::new(&blocker);

        let err = store.append_memory("entry").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ArtifactIo {
                artifact: ArtifactKind::Memory,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_entry() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_memory(&format!("entry-{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let memory = store.read_memory().await.unwrap().unwrap();
        assert_eq!(memory.lines().count(), 16);
        for i in 0..16 {
            assert!(memory.contains(&format!("entry-{i}")));
        }
    }
}
