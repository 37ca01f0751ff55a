//! Jobsync document store
//!
//! The realtime document store is an external collaborator. This crate defines the
//! capability the engine relies on ([`DocumentStore`]: create, partial update,
//! live query subscription), the query shapes used against the `job_logs`
//! collection, additive patch operations, and [`MemoryDocumentStore`], an
//! in-process implementation with fault injection used by the CLI and the tests.

pub mod error;
pub mod memory;
pub mod patch;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use jobsync_core::models::Document;
pub use memory::MemoryDocumentStore;
pub use patch::{DocumentPatch, FieldOp};
pub use query::{Direction, JobQuery, OrderBy, OrderField};
pub use traits::{DocumentStore, Subscription};
