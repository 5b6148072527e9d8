// Persistent key-value stores keyed by URL: the durable tier behind the cache store.

pub mod disk;
pub mod memory;
pub mod traits;

pub use disk::{DiskStore, DiskStoreHost};
pub use memory::{MemoryStore, MemoryStoreHost};
pub use traits::{PersistentStore, StoreHost, StoredResponse, UnavailableStoreHost};
