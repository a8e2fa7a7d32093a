//! Requests and the tasks that occupy core tokens.

use std::fmt;
use std::sync::Arc;

use crate::id::{RequestId, WorkerId};

/// Opaque request body.
///
/// The engine never inspects payload bytes. Cloning is cheap (shared
/// buffer), so snapshots and observers can hold on to requests freely.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    /// A zero-length payload.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Self(v.into())
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Self(v.into())
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Self(v.as_bytes().into())
    }
}

/// An immutable unit of work.
///
/// Created by an external generator, buffered in the request queue,
/// and consumed by the worker that finishes processing it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Request {
    id: RequestId,
    payload: Payload,
}

impl Request {
    /// A request with an empty payload.
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            payload: Payload::empty(),
        }
    }

    /// A request carrying `payload`.
    pub fn with_payload(id: RequestId, payload: impl Into<Payload>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// The request's identifier.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The request body.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// A task holding (or waiting for) a core token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreTask {
    /// A worker processing a request.
    Request {
        /// The busy worker.
        worker: WorkerId,
        /// The request being processed.
        request: RequestId,
    },
    /// Work submitted directly to the allocator by some other service
    /// sharing the same cores (cache, database, ...).
    External {
        /// Caller-chosen task identifier.
        id: u64,
    },
}

impl fmt::Display for CoreTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { worker, request } => write!(f, "request {request} on {worker}"),
            Self::External { id } => write!(f, "external task {id}"),
        }
    }
}
