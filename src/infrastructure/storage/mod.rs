mod in_memory_store;
mod local_store;
mod store_factory;

pub use in_memory_store::InMemoryStagingStore;
pub use local_store::LocalStagingStore;
pub use store_factory::StagingStoreFactory;
