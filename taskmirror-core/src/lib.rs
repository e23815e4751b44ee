//! Core reconciliation logic for taskmirror.
//!
//! This crate contains everything that is independent of the concrete
//! services being bridged:
//! - `workpackage` and `event` normalize the two raw record shapes into a
//!   shared comparable schema and build calendar payloads from tasks
//! - `codec` owns the title/body/dueHour wire grammar (an exact
//!   encode/decode inverse pair)
//! - `reconcile` partitions the two keyed collections into create/delete/
//!   update sets and drives the actions through the `EventSink` trait
//!
//! The HTTP clients live in the taskmirror binary and only hand raw records
//! in and sink calls out.

pub mod codec;
pub mod constants;
pub mod error;
pub mod event;
pub mod options;
pub mod reconcile;
pub mod workpackage;

pub use error::{MirrorError, MirrorResult};
pub use event::{EventPayload, NormalizedEvent, RawEvent};
pub use options::SyncOptions;
pub use reconcile::{EventSink, Partition, SyncReport};
pub use workpackage::{NormalizedTask, ParentRef, WorkPackage};
