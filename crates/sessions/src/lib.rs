//! SchoolBridge remote session manager
//!
//! Owns one authenticated portal session per signed-in device:
//! - Portal adapters, one per portal dialect
//! - `RemoteSession`: an adapter behind a per-session guard
//! - `SessionRegistry`: local session id to remote session
//! - `Orchestrator`: relogin and retry once when the portal drops a session

pub mod error;
pub mod model;
pub mod ops;
pub mod orchestrator;
pub mod portal;
pub mod registry;
pub mod remote;

#[cfg(test)]
mod testing;

pub use error::{CreationFailure, PortalError, SessionError};
pub use ops::PortalOperation;
pub use orchestrator::Orchestrator;
pub use portal::{HttpPortalFactory, Portal, PortalFactory};
pub use registry::SessionRegistry;
pub use remote::RemoteSession;
