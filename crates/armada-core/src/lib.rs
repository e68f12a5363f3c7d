//! # armada-core
//!
//! Foundation types shared by every armada crate:
//!
//! - Branded ID newtypes (`SessionId`, `MemberId`, `ObjectId`, `ConnectionId`)
//! - The [`LobbyOptions`] struct consumed by the registries

#![deny(unsafe_code)]

pub mod ids;
pub mod options;

pub use ids::{ConnectionId, MemberId, ObjectId, SessionId};
pub use options::{clamp_aspect_ratio, LobbyOptions};
