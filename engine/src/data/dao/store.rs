//! Model stores
//!
//! A store behaves like a session: writes are staged until `commit`, and
//! `rollback` discards whatever is staged.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::StoreError;
use super::model::Model;

#[async_trait]
pub trait ModelStore<M: Model>: Send + Sync {
    /// Look a model up, staged writes included
    async fn find(&self, id: i64) -> Result<Option<M>, StoreError>;

    /// Stage a new model, assigning its id
    async fn add(&self, model: M) -> Result<M, StoreError>;

    /// Stage an update of an existing model
    async fn merge(&self, model: M) -> Result<M, StoreError>;

    /// Stage removal of an existing model
    async fn delete(&self, model: &M) -> Result<(), StoreError>;

    async fn commit(&self) -> Result<(), StoreError>;

    async fn rollback(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
enum StagedWrite<M> {
    Upsert(M),
    Delete(i64),
}

#[derive(Debug)]
struct StoreState<M> {
    committed: BTreeMap<i64, M>,
    staged: Vec<StagedWrite<M>>,
    next_id: i64,
    fail_next_commit: Option<StoreError>,
}

impl<M: Model> StoreState<M> {
    /// Committed rows with staged writes applied
    fn view(&self) -> BTreeMap<i64, M> {
        let mut rows = self.committed.clone();
        for write in &self.staged {
            match write {
                StagedWrite::Upsert(model) => {
                    if let Some(id) = model.id() {
                        rows.insert(id, model.clone());
                    }
                }
                StagedWrite::Delete(id) => {
                    rows.remove(id);
                }
            }
        }
        rows
    }
}

/// Mutex-guarded in-memory store with unique-key enforcement at commit
#[derive(Debug)]
pub struct InMemoryStore<M> {
    state: Mutex<StoreState<M>>,
}

impl<M: Model> Default for InMemoryStore<M> {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState {
                committed: BTreeMap::new(),
                staged: Vec::new(),
                next_id: 1,
                fail_next_commit: None,
            }),
        }
    }
}

impl<M: Model> InMemoryStore<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with `error`, simulating a backend fault
    pub fn fail_next_commit(&self, error: StoreError) {
        self.state.lock().fail_next_commit = Some(error);
    }

    /// Committed models, ignoring staged writes
    pub fn committed(&self) -> Vec<M> {
        self.state.lock().committed.values().cloned().collect()
    }

    pub fn staged_len(&self) -> usize {
        self.state.lock().staged.len()
    }

    fn require_existing(state: &StoreState<M>, model: &M) -> Result<i64, StoreError> {
        let not_found = |id| StoreError::NotFound { model: M::KIND, id };
        let id = model.id().ok_or(not_found(0))?;
        if state.view().contains_key(&id) {
            Ok(id)
        } else {
            Err(not_found(id))
        }
    }
}

fn check_unique<M: Model>(rows: &BTreeMap<i64, M>) -> Result<(), StoreError> {
    let mut seen: HashSet<(&'static str, String)> = HashSet::new();
    for model in rows.values() {
        for (field, value) in model.unique_keys() {
            if !seen.insert((field, value.clone())) {
                return Err(StoreError::Constraint {
                    model: M::KIND,
                    field,
                    value,
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl<M: Model> ModelStore<M> for InMemoryStore<M> {
    async fn find(&self, id: i64) -> Result<Option<M>, StoreError> {
        Ok(self.state.lock().view().get(&id).cloned())
    }

    async fn add(&self, mut model: M) -> Result<M, StoreError> {
        let mut state = self.state.lock();
        if model.id().is_none() {
            model.set_id(state.next_id);
            state.next_id += 1;
        }
        state.staged.push(StagedWrite::Upsert(model.clone()));
        Ok(model)
    }

    async fn merge(&self, model: M) -> Result<M, StoreError> {
        let mut state = self.state.lock();
        Self::require_existing(&state, &model)?;
        state.staged.push(StagedWrite::Upsert(model.clone()));
        Ok(model)
    }

    async fn delete(&self, model: &M) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let id = Self::require_existing(&state, model)?;
        state.staged.push(StagedWrite::Delete(id));
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_commit.take() {
            return Err(error);
        }
        let rows = state.view();
        check_unique(&rows)?;
        tracing::trace!(model = M::KIND, writes = state.staged.len(), "Committing staged writes");
        state.committed = rows;
        state.staged.clear();
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        tracing::trace!(model = M::KIND, writes = state.staged.len(), "Discarding staged writes");
        state.staged.clear();
        Ok(())
    }
}
