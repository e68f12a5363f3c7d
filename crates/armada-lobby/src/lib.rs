//! # armada-lobby
//!
//! The in-memory coordination core of the armada lobby server:
//!
//! - [`names`] — unique human-readable session name allocation
//! - [`registry`] — session lifecycle, membership, authority election
//! - [`objects`] — per-session synchronized object store with optimistic
//!   concurrency and scope-based departure handling
//!
//! These services are transport-agnostic. All state is process-local and
//! lost on restart.

#![deny(unsafe_code)]

pub mod names;
pub mod object;
pub mod objects;
pub mod registry;
pub mod session;

pub use names::NamePool;
pub use object::{ObjectScope, SyncObject};
pub use objects::{DepartureEffects, Migration, ObjectPatch, ObjectRegistry};
pub use registry::{Departure, PromotedMember, RegistryError, SessionRegistry};
pub use session::{ActiveSessionList, ActiveSessionSummary, Member, MemberRole, Session};
