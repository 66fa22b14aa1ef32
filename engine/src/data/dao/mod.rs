//! Generic data-access helper
//!
//! `BaseDao` wraps a `ModelStore` with create/update/delete operations that
//! roll the store back before reporting a failure. Each mutation takes a
//! `commit` flag; with `commit = false` the write stays staged and the
//! caller owns the eventual `commit` or `rollback`.

mod error;
mod model;
mod models;
mod store;

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

pub use error::{DaoError, StoreError};
pub use model::{FieldSetter, Model, expect_bool, expect_optional_string, expect_string};
pub use models::DatabaseModel;
pub use store::{InMemoryStore, ModelStore};

/// Row-level visibility predicate applied by `find_by_id`
pub type BaseFilter<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

pub struct BaseDao<M: Model> {
    store: Arc<dyn ModelStore<M>>,
    factory: Option<fn() -> M>,
    base_filter: Option<BaseFilter<M>>,
}

impl<M: Model> BaseDao<M> {
    pub fn new(store: Arc<dyn ModelStore<M>>) -> Self {
        Self {
            store,
            factory: Some(M::default),
            base_filter: None,
        }
    }

    /// A DAO with no model constructor; `create` fails with `DaoError::Config`
    pub fn unbound(store: Arc<dyn ModelStore<M>>) -> Self {
        Self {
            store,
            factory: None,
            base_filter: None,
        }
    }

    pub fn with_base_filter(mut self, filter: impl Fn(&M) -> bool + Send + Sync + 'static) -> Self {
        self.base_filter = Some(Arc::new(filter));
        self
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<M>, StoreError> {
        let found = self.store.find(id).await?;
        Ok(match &self.base_filter {
            Some(filter) => found.filter(|m| filter(m)),
            None => found,
        })
    }

    pub async fn create(
        &self,
        properties: &Map<String, JsonValue>,
        commit: bool,
    ) -> Result<M, DaoError> {
        let factory = self.factory.ok_or(DaoError::Config)?;
        let mut model = factory();
        let result = async {
            model.apply(properties)?;
            let model = self.store.add(model).await?;
            if commit {
                self.store.commit().await?;
            }
            Ok::<M, StoreError>(model)
        }
        .await;
        match result {
            Ok(model) => {
                tracing::debug!(model = M::KIND, id = ?model.id(), commit, "Created model");
                Ok(model)
            }
            Err(e) => Err(DaoError::CreateFailed(self.rollback_after(e).await)),
        }
    }

    pub async fn update(
        &self,
        model: M,
        properties: &Map<String, JsonValue>,
        commit: bool,
    ) -> Result<M, DaoError> {
        let mut model = model;
        let result = async {
            model.apply(properties)?;
            let model = self.store.merge(model).await?;
            if commit {
                self.store.commit().await?;
            }
            Ok::<M, StoreError>(model)
        }
        .await;
        match result {
            Ok(model) => {
                tracing::debug!(model = M::KIND, id = ?model.id(), commit, "Updated model");
                Ok(model)
            }
            Err(e) => Err(DaoError::UpdateFailed(self.rollback_after(e).await)),
        }
    }

    pub async fn delete(&self, model: M, commit: bool) -> Result<M, DaoError> {
        let result = async {
            self.store.delete(&model).await?;
            if commit {
                self.store.commit().await?;
            }
            Ok::<(), StoreError>(())
        }
        .await;
        match result {
            Ok(()) => {
                tracing::debug!(model = M::KIND, id = ?model.id(), commit, "Deleted model");
                Ok(model)
            }
            Err(e) => Err(DaoError::DeleteFailed(self.rollback_after(e).await)),
        }
    }

    pub async fn commit(&self) -> Result<(), StoreError> {
        self.store.commit().await
    }

    pub async fn rollback(&self) -> Result<(), StoreError> {
        self.store.rollback().await
    }

    /// Roll back, then hand back the error that caused it
    async fn rollback_after(&self, error: StoreError) -> StoreError {
        tracing::warn!(model = M::KIND, error = %error, "Rolling back failed write");
        if let Err(e) = self.store.rollback().await {
            tracing::warn!(model = M::KIND, error = %e, "Rollback failed");
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (Arc<InMemoryStore<DatabaseModel>>, BaseDao<DatabaseModel>) {
        let store = Arc::new(InMemoryStore::new());
        let dao = BaseDao::new(store.clone() as Arc<dyn ModelStore<DatabaseModel>>);
        (store, dao)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (store, dao) = setup();
        let db = dao
            .create(&props(json!({"database_name": "examples", "allow_dml": true})), true)
            .await
            .unwrap();
        assert_eq!(db.id, Some(1));
        assert_eq!(store.committed().len(), 1);
        let found = dao.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.database_name, "examples");
        assert!(found.allow_dml);
        assert!(dao.find_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unbound_dao_is_config_error() {
        let store: Arc<dyn ModelStore<DatabaseModel>> = Arc::new(InMemoryStore::new());
        let dao = BaseDao::unbound(store);
        let err = dao.create(&props(json!({})), true).await.unwrap_err();
        assert_eq!(err, DaoError::Config);
    }

    #[tokio::test]
    async fn test_create_failure_rolls_back() {
        let (store, dao) = setup();
        let cause = StoreError::Backend("disk full".into());
        store.fail_next_commit(cause.clone());

        let err = dao
            .create(&props(json!({"database_name": "examples"})), true)
            .await
            .unwrap_err();
        assert_eq!(err, DaoError::CreateFailed(cause));
        assert!(store.committed().is_empty());
        assert_eq!(store.staged_len(), 0);
        assert!(dao.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_violation_is_create_failure() {
        let (store, dao) = setup();
        dao.create(&props(json!({"database_name": "examples"})), true)
            .await
            .unwrap();
        let err = dao
            .create(&props(json!({"database_name": "examples"})), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DaoError::CreateFailed(StoreError::Constraint { field: "database_name", .. })
        ));
        assert_eq!(store.committed().len(), 1);
        assert_eq!(store.staged_len(), 0);
    }

    #[tokio::test]
    async fn test_bad_property_is_create_failure() {
        let (store, dao) = setup();
        let err = dao
            .create(&props(json!({"database_name": 5})), true)
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::CreateFailed(StoreError::InvalidField { .. })));
        assert!(store.committed().is_empty());
    }

    #[tokio::test]
    async fn test_deferred_commit() {
        let (store, dao) = setup();
        dao.create(&props(json!({"database_name": "a"})), false)
            .await
            .unwrap();
        assert!(store.committed().is_empty());
        assert!(dao.find_by_id(1).await.unwrap().is_some());

        dao.commit().await.unwrap();
        assert_eq!(store.committed().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_rollback() {
        let (store, dao) = setup();
        dao.create(&props(json!({"database_name": "a"})), false)
            .await
            .unwrap();
        dao.rollback().await.unwrap();
        assert!(store.committed().is_empty());
        assert!(dao.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update() {
        let (_, dao) = setup();
        let db = dao
            .create(&props(json!({"database_name": "a"})), true)
            .await
            .unwrap();
        let updated = dao
            .update(db, &props(json!({"allow_ctas": true, "force_ctas_schema": "tmp"})), true)
            .await
            .unwrap();
        assert!(updated.allow_ctas);
        let found = dao.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.force_ctas_schema.as_deref(), Some("tmp"));
    }

    #[tokio::test]
    async fn test_update_failure_keeps_committed_state() {
        let (store, dao) = setup();
        let db = dao
            .create(&props(json!({"database_name": "a"})), true)
            .await
            .unwrap();
        store.fail_next_commit(StoreError::Backend("lost connection".into()));
        let err = dao
            .update(db, &props(json!({"database_name": "b"})), true)
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::UpdateFailed(StoreError::Backend(_))));
        assert_eq!(store.committed()[0].database_name, "a");
        assert_eq!(store.staged_len(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_model() {
        let (_, dao) = setup();
        let ghost = DatabaseModel {
            id: Some(42),
            ..DatabaseModel::default()
        };
        let err = dao.update(ghost, &Map::new(), true).await.unwrap_err();
        assert_eq!(
            err,
            DaoError::UpdateFailed(StoreError::NotFound {
                model: "database",
                id: 42
            })
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, dao) = setup();
        let db = dao
            .create(&props(json!({"database_name": "a"})), true)
            .await
            .unwrap();
        let deleted = dao.delete(db, true).await.unwrap();
        assert_eq!(deleted.database_name, "a");
        assert!(store.committed().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_rolls_back() {
        let (store, dao) = setup();
        let db = dao
            .create(&props(json!({"database_name": "a"})), true)
            .await
            .unwrap();
        store.fail_next_commit(StoreError::Backend("locked".into()));
        let err = dao.delete(db, true).await.unwrap_err();
        assert!(matches!(err, DaoError::DeleteFailed(_)));
        assert_eq!(store.committed().len(), 1);
        assert!(dao.find_by_id(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_base_filter_hides_rows() {
        let store: Arc<dyn ModelStore<DatabaseModel>> = Arc::new(InMemoryStore::new());
        let dao = BaseDao::new(store).with_base_filter(|db: &DatabaseModel| db.expose_in_sqllab);
        dao.create(&props(json!({"database_name": "hidden"})), true)
            .await
            .unwrap();
        dao.create(
            &props(json!({"database_name": "shown", "expose_in_sqllab": true})),
            true,
        )
        .await
        .unwrap();
        assert!(dao.find_by_id(1).await.unwrap().is_none());
        assert!(dao.find_by_id(2).await.unwrap().is_some());
    }
}
