//! Data layer: caching, persistence helpers and query execution sources

pub mod cache;
pub mod dao;
pub mod source;

pub use cache::{CacheError, CacheKey, CacheService, CachedValue};
pub use dao::{BaseDao, DaoError, InMemoryStore, Model, ModelStore, StoreError};
pub use source::{
    DataSource, Datasource, DatasourceResolver, InMemorySource, JsonFileSource,
    QueryExecutionError, StaticResolver,
};
