// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::{CategoryId, ConsolidatedStock, Cylinder, RecordDetail, RecordId, Sphere, SphereSign};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("cannot reach {url}: {message}")]
    Transport { url: String, message: String },
    #[error("server error ({code}): {message}")]
    Status { code: u16, message: String },
    #[error("decode {what}: {message}")]
    Decode { what: String, message: String },
    #[error("no data found for {what}")]
    Empty { what: String },
}

impl FetchError {
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Empty { .. } => "empty",
        }
    }
}

/// A zero-length sphere list is an application error, separate from a
/// transport failure.
pub fn require_non_empty(
    sign: SphereSign,
    spheres: Vec<Sphere>,
) -> Result<Vec<Sphere>, FetchError> {
    if spheres.is_empty() {
        return Err(FetchError::Empty {
            what: format!("sphere type {}", sign.as_str()),
        });
    }
    Ok(spheres)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchLane {
    Cylinders,
    Spheres,
    Stock,
    Record,
}

impl FetchLane {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cylinders => "cylinders",
            Self::Spheres => "spheres",
            Self::Stock => "stock",
            Self::Record => "record",
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Cylinders => 0,
            Self::Spheres => 1,
            Self::Stock => 2,
            Self::Record => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    Cylinders,
    Spheres(SphereSign),
    Stock(CategoryId),
    Record(RecordId),
}

impl FetchRequest {
    pub const fn lane(self) -> FetchLane {
        match self {
            Self::Cylinders => FetchLane::Cylinders,
            Self::Spheres(_) => FetchLane::Spheres,
            Self::Stock(_) => FetchLane::Stock,
            Self::Record(_) => FetchLane::Record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub generation: u64,
    pub request: FetchRequest,
}

impl FetchTicket {
    pub const fn lane(self) -> FetchLane {
        self.request.lane()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReply {
    Cylinders(Vec<Cylinder>),
    Spheres(Vec<Sphere>),
    Stock(ConsolidatedStock),
    Record(RecordDetail),
}

impl FetchReply {
    pub const fn lane(&self) -> FetchLane {
        match self {
            Self::Cylinders(_) => FetchLane::Cylinders,
            Self::Spheres(_) => FetchLane::Spheres,
            Self::Stock(_) => FetchLane::Stock,
            Self::Record(_) => FetchLane::Record,
        }
    }
}

/// Per-lane request counters. Only the newest ticket of a lane may commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generations {
    current: [u64; 4],
}

impl Generations {
    pub fn issue(&mut self, request: FetchRequest) -> FetchTicket {
        let slot = &mut self.current[request.lane().slot()];
        *slot = slot.saturating_add(1);
        FetchTicket {
            generation: *slot,
            request,
        }
    }

    pub fn current(&self, lane: FetchLane) -> u64 {
        self.current[lane.slot()]
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.current(ticket.lane())
    }
}
