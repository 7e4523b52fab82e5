//! Infrastructure Layer - Counter Store Implementations

pub mod backend;
pub mod memory;
pub mod redis;

pub use self::backend::CounterBackend;
pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;
