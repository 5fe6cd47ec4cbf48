//! Directory-backed batch store
//!
//! Each batch is one pretty-printed JSON array in the ledger directory. Writes
//! go through a temporary file and an atomic rename, so readers only ever see
//! a complete batch. Appends within one process are serialized by a lock.

use crate::batch::{BatchName, BATCH_EXTENSION};
use crate::error::LedgerError;
use crate::operation::ProposedOperation;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only ledger rooted at a directory
#[derive(Debug)]
pub struct Ledger {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Open (and create if needed) a ledger directory
    ///
    /// # Errors
    /// Returns [`LedgerError::Io`] if the directory cannot be created
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| LedgerError::io_error(&root, e))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Ledger directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a batch file
    #[must_use]
    pub fn path_of(&self, batch: &BatchName) -> PathBuf {
        self.root.join(batch.file_name())
    }

    /// Create an empty batch stamped with the current time
    ///
    /// If a batch with the same label was already created this second, the
    /// timestamp is moved forward until the name is free.
    ///
    /// # Errors
    /// See [`Ledger::create_batch_named`]
    pub async fn create_batch(&self, label: &str) -> Result<BatchName, LedgerError> {
        let mut name = BatchName::now(label)?;
        loop {
            match self.create_batch_named(name).await {
                Err(LedgerError::BatchExists(taken)) => {
                    name = BatchName::new(taken.created_at() + 1, label)?;
                }
                other => return other,
            }
        }
    }

    /// Create an empty batch with an explicit name
    ///
    /// # Errors
    /// Returns [`LedgerError::BatchExists`] rather than clobbering an existing
    /// file, or [`LedgerError::Io`] on write failure
    pub async fn create_batch_named(&self, batch: BatchName) -> Result<BatchName, LedgerError> {
        let path = self.path_of(&batch);
        let _guard = self.write_lock.lock().await;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LedgerError::BatchExists(batch));
            }
            Err(e) => return Err(LedgerError::io_error(&path, e)),
        };
        file.write_all(b"[]\n")
            .await
            .map_err(|e| LedgerError::io_error(&path, e))?;
        file.sync_all()
            .await
            .map_err(|e| LedgerError::io_error(&path, e))?;

        tracing::info!(batch = %batch, path = %path.display(), "created ledger batch");
        Ok(batch)
    }

    /// Append one entry to the end of a batch
    ///
    /// Every call adds exactly one entry; nothing is deduplicated. Returns the
    /// number of entries now in the batch.
    ///
    /// # Errors
    /// Returns [`LedgerError::BatchNotFound`] if the batch was never created
    pub async fn append(
        &self,
        batch: &BatchName,
        operation: &ProposedOperation,
    ) -> Result<usize, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_batch(batch).await?;
        entries.push(operation.clone());
        self.write_entries(batch, &entries).await?;

        tracing::debug!(
            batch = %batch,
            description = operation.description(),
            entries = entries.len(),
            "appended ledger entry"
        );
        Ok(entries.len())
    }

    /// Read every entry of a batch in file order
    ///
    /// # Errors
    /// - [`LedgerError::BatchNotFound`] if the file does not exist
    /// - [`LedgerError::Serialization`] if it is not a list of valid records
    pub async fn read_batch(&self, batch: &BatchName) -> Result<Vec<ProposedOperation>, LedgerError> {
        let path = self.path_of(batch);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::BatchNotFound(batch.to_string()));
            }
            Err(e) => return Err(LedgerError::io_error(&path, e)),
        };
        serde_json::from_slice(&content).map_err(|source| LedgerError::Serialization { path, source })
    }

    /// All batches in the directory, oldest first
    ///
    /// Files that do not follow the batch naming convention are ignored.
    ///
    /// # Errors
    /// Returns [`LedgerError::Io`] if the directory cannot be listed
    pub async fn list_batches(&self) -> Result<Vec<BatchName>, LedgerError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| LedgerError::io_error(&self.root, e))?;

        let mut batches = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| LedgerError::io_error(&self.root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BATCH_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                match name.parse::<BatchName>() {
                    Ok(batch) => batches.push(batch),
                    Err(_) => tracing::debug!(file = name, "skipping non-batch file"),
                }
            }
        }
        batches.sort();
        Ok(batches)
    }

    /// Most recent batch carrying `label`
    ///
    /// # Errors
    /// See [`Ledger::list_batches`]
    pub async fn latest_batch(&self, label: &str) -> Result<Option<BatchName>, LedgerError> {
        Ok(self
            .list_batches()
            .await?
            .into_iter()
            .filter(|b| b.label() == label)
            .max())
    }

    /// Resolve a full batch name (`{ts}_{label}[.json]`) or a bare label
    ///
    /// A bare label resolves to the most recent batch with that label.
    ///
    /// # Errors
    /// - [`LedgerError::BatchNotFound`] if nothing matches
    /// - [`LedgerError::Io`] if the batch file cannot be checked
    pub async fn resolve(&self, name_or_label: &str) -> Result<BatchName, LedgerError> {
        if let Ok(batch) = name_or_label.parse::<BatchName>() {
            let path = self.path_of(&batch);
            if fs::try_exists(&path)
                .await
                .map_err(|e| LedgerError::io_error(&path, e))?
            {
                return Ok(batch);
            }
        }
        self.latest_batch(name_or_label)
            .await?
            .ok_or_else(|| LedgerError::BatchNotFound(name_or_label.to_string()))
    }

    async fn write_entries(
        &self,
        batch: &BatchName,
        entries: &[ProposedOperation],
    ) -> Result<(), LedgerError> {
        let path = self.path_of(batch);
        let tmp = path.with_extension(format!("{BATCH_EXTENSION}.tmp"));

        let mut body = serde_json::to_vec_pretty(entries)
            .map_err(|source| LedgerError::Serialization { path: path.clone(), source })?;
        body.push(b'\n');

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| LedgerError::io_error(&tmp, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| LedgerError::io_error(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| LedgerError::io_error(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| LedgerError::io_error(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationDraft, QueueEvidence};
    use timelock_abi::{AbiValue, Address, Call, U256};

    fn op(n: u64) -> ProposedOperation {
        let call = Call::new("setFee(uint256)", &["uint256"], vec![AbiValue::uint(n)]).unwrap();
        let data = call.encode().unwrap();
        OperationDraft {
            description: format!("set fee to {n}"),
            target: Address::repeat_byte(0x11),
            value: U256::ZERO,
            call,
            maturity_time: 1_000 + n,
        }
        .record(QueueEvidence {
            data,
            sequence_number: Some(n),
            queue_receipt: format!("0xq{n}"),
            replay_command: String::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn create_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let name = BatchName::new(100, "fees").unwrap();

        ledger.create_batch_named(name.clone()).await.unwrap();
        let err = ledger.create_batch_named(name).await.unwrap_err();
        assert!(matches!(err, LedgerError::BatchExists(_)));
    }

    #[tokio::test]
    async fn same_second_labels_get_distinct_batches() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();

        let first = ledger.create_batch("fees").await.unwrap();
        let second = ledger.create_batch("fees").await.unwrap();
        assert!(second > first);
        assert_eq!(ledger.latest_batch("fees").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn append_to_missing_batch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let name = BatchName::new(100, "ghost").unwrap();

        let err = ledger.append(&name, &op(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::BatchNotFound(_)));
    }

    #[tokio::test]
    async fn append_does_not_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let name = ledger.create_batch("dupes").await.unwrap();

        ledger.append(&name, &op(1)).await.unwrap();
        let count = ledger.append(&name, &op(1)).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn list_and_resolve_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let old = ledger.create_batch_named(BatchName::new(100, "fees").unwrap()).await.unwrap();
        let new = ledger.create_batch_named(BatchName::new(200, "fees").unwrap()).await.unwrap();
        let other = ledger.create_batch_named(BatchName::new(150, "roles").unwrap()).await.unwrap();
        tokio::fs::write(dir.path().join("notes.json"), b"{}").await.unwrap();

        assert_eq!(ledger.list_batches().await.unwrap(), vec![old.clone(), other, new.clone()]);
        assert_eq!(ledger.resolve("fees").await.unwrap(), new);
        assert_eq!(ledger.resolve("100_fees.json").await.unwrap(), old);
        assert!(matches!(ledger.resolve("missing").await, Err(LedgerError::BatchNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_batch_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let name = BatchName::new(100, "fees").unwrap();
        // Self-referencing link: stat fails with ELOOP rather than NotFound
        std::os::unix::fs::symlink(ledger.path_of(&name), ledger.path_of(&name)).unwrap();

        let err = ledger.resolve("100_fees.json").await.unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        let name = BatchName::new(1, "broken").unwrap();
        tokio::fs::write(ledger.path_of(&name), b"[{\"description\": 1}]").await.unwrap();

        let err = ledger.read_batch(&name).await.unwrap_err();
        assert!(matches!(err, LedgerError::Serialization { .. }));
    }
}
