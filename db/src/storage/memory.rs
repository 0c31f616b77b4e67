use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use tracing::trace;

use crate::{
    models::{CertificateRow, CrlRow},
    storage::{CertificateStore, CrlStore, ReplicationTarget, StoreError, WriteOutcome},
};

/// A stored row together with its row version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub row: T,
    pub row_version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    InsertCertificate,
    UpdateCertificate,
    InsertCrl,
    UpdateCrl,
    Ping,
}

/// One call made against the store, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub fingerprint: Option<String>,
}

/// Failure modes a [`MemoryStorage`] can be switched into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every call fails as if the database could not be reached.
    Unreachable,

    /// Every write fails with a query error; pings still succeed.
    RejectWrites,
}

#[derive(Debug, Default)]
struct State {
    certificates: HashMap<String, Versioned<CertificateRow>>,
    crls: HashMap<String, Versioned<CrlRow>>,
    operations: Vec<Operation>,
    fault: Option<Fault>,
}

/// An in-process target with the same keying rules as the responder tables:
/// one row per fingerprint, inserts of an existing fingerprint conflict.
///
/// Intended for tests and dry runs, not as a long-lived store. Every call is
/// appended to an operation log that is only released by
/// [`MemoryStorage::take_operations`].
#[derive(Debug)]
pub struct MemoryStorage {
    name: String,
    state: Mutex<State>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStorage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_fault(self, fault: Fault) -> Self {
        self.set_fault(Some(fault));
        self
    }

    pub fn set_fault(&self, fault: Option<Fault>) {
        self.lock().fault = fault;
    }

    pub fn certificate(&self, fingerprint: &str) -> Option<Versioned<CertificateRow>> {
        self.lock().certificates.get(fingerprint).cloned()
    }

    pub fn certificate_count(&self) -> usize {
        self.lock().certificates.len()
    }

    pub fn crl(&self, fingerprint: &str) -> Option<Versioned<CrlRow>> {
        self.lock().crls.get(fingerprint).cloned()
    }

    pub fn crl_count(&self) -> usize {
        self.lock().crls.len()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Drain the operation log.
    pub fn take_operations(&self) -> Vec<Operation> {
        std::mem::take(&mut self.lock().operations)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a row half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<F>(&self, kind: OperationKind, fingerprint: &str, apply: F) -> WriteOutcome
    where
        F: FnOnce(&mut State) -> WriteOutcome,
    {
        let mut state = self.lock();
        state.operations.push(Operation {
            kind,
            fingerprint: Some(fingerprint.to_string()),
        });

        let fault = state.fault;
        let outcome = match fault {
            Some(Fault::Unreachable) => WriteOutcome::Failed(self.unreachable()),
            Some(Fault::RejectWrites) => WriteOutcome::Failed(StoreError::Internal(
                format!("write rejected by {}", self.name).into(),
            )),
            None => apply(&mut *state),
        };

        trace!(?kind, fingerprint, ?outcome, "Memory store write");
        outcome
    }

    fn unreachable(&self) -> StoreError {
        StoreError::Connection(format!("data source {} is unreachable", self.name))
    }
}

fn insert_row<T: Clone>(rows: &mut HashMap<String, Versioned<T>>, key: &str, row: &T) -> WriteOutcome {
    if rows.contains_key(key) {
        return WriteOutcome::Conflict;
    }
    rows.insert(
        key.to_string(),
        Versioned {
            row: row.clone(),
            row_version: 0,
        },
    );
    WriteOutcome::Inserted
}

fn update_row<T: Clone>(rows: &mut HashMap<String, Versioned<T>>, key: &str, row: &T) -> WriteOutcome {
    match rows.get_mut(key) {
        Some(stored) => {
            stored.row = row.clone();
            stored.row_version += 1;
            WriteOutcome::Updated(1)
        }
        None => WriteOutcome::Updated(0),
    }
}

#[async_trait]
impl CertificateStore for MemoryStorage {
    async fn insert(&self, row: &CertificateRow) -> WriteOutcome {
        self.write(OperationKind::InsertCertificate, &row.fingerprint, |state| {
            insert_row(&mut state.certificates, &row.fingerprint, row)
        })
    }

    async fn update(&self, row: &CertificateRow) -> WriteOutcome {
        self.write(OperationKind::UpdateCertificate, &row.fingerprint, |state| {
            update_row(&mut state.certificates, &row.fingerprint, row)
        })
    }
}

#[async_trait]
impl CrlStore for MemoryStorage {
    async fn insert(&self, row: &CrlRow) -> WriteOutcome {
        self.write(OperationKind::InsertCrl, &row.fingerprint, |state| {
            insert_row(&mut state.crls, &row.fingerprint, row)
        })
    }

    async fn update(&self, row: &CrlRow) -> WriteOutcome {
        self.write(OperationKind::UpdateCrl, &row.fingerprint, |state| {
            update_row(&mut state.crls, &row.fingerprint, row)
        })
    }
}

#[async_trait]
impl ReplicationTarget for MemoryStorage {
    fn data_source(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.operations.push(Operation {
            kind: OperationKind::Ping,
            fingerprint: None,
        });

        match state.fault {
            Some(Fault::Unreachable) => Err(self.unreachable()),
            _ => Ok(()),
        }
    }
}
