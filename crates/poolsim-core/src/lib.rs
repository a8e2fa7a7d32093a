//! Core types and traits for the poolsim request-processing simulator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: strongly-typed
//! ids, timestamps, requests, error types, and the injectable
//! [`Clock`] and [`DurationSource`] seams.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod request;
pub mod time;
pub mod traits;

pub use error::{AllocatorError, PoolError};
pub use id::{PoolId, RequestId, TickId, TokenIndex, WorkerId};
pub use request::{CoreTask, Payload, Request};
pub use time::{Clock, ManualClock, Timestamp, WallClock};
pub use traits::DurationSource;
