//! Ping-pong buffer pair.
//!
//! Two equally sized device buffers carry the `current` and `next` roles of
//! an iterated stencil. A single selector bit maps roles to the physical
//! buffers, so a swap is an index flip with no data movement and no
//! reallocation.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::device::ComputeDevice;
use crate::error::Result;
use crate::session::DeviceSession;

/// Logical role of a buffer within a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Holds the latest completed state; read by the stencil.
    Current,
    /// Written by the stencil.
    Next,
}

/// Physical identity of a buffer within a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// First allocated buffer.
    A,
    /// Second allocated buffer.
    B,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::A => write!(f, "A"),
            Slot::B => write!(f, "B"),
        }
    }
}

/// Two device buffers of `len` elements of `T` with swappable roles.
pub struct BufferPair<D: ComputeDevice, T: Pod = f32> {
    buffers: [D::Buffer; 2],
    /// Index of the buffer holding [`Role::Current`].
    current: usize,
    len: usize,
    swaps: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<D: ComputeDevice, T: Pod> BufferPair<D, T> {
    /// Allocate both buffers.
    ///
    /// When `initial` is given it seeds both buffers, so boundary cells that
    /// the stencil never writes are valid in either role. `A` starts as
    /// [`Role::Current`].
    pub fn create(session: &DeviceSession<D>, len: usize, initial: Option<&[T]>) -> Result<Self> {
        let a = session.create_buffer("pingpong_a", len, initial)?;
        let b = session.create_buffer("pingpong_b", len, initial)?;

        Ok(Self {
            buffers: [a, b],
            current: 0,
            len,
            swaps: 0,
            _marker: PhantomData,
        })
    }

    /// Exchange the roles. O(1), no device interaction.
    pub fn swap(&mut self) {
        self.current ^= 1;
        self.swaps += 1;
    }

    fn index(&self, role: Role) -> usize {
        match role {
            Role::Current => self.current,
            Role::Next => self.current ^ 1,
        }
    }

    /// Which physical buffer currently holds `role`.
    pub fn slot(&self, role: Role) -> Slot {
        match self.index(role) {
            0 => Slot::A,
            _ => Slot::B,
        }
    }

    /// The buffer currently holding `role`.
    pub fn buffer(&self, role: Role) -> &D::Buffer {
        &self.buffers[self.index(role)]
    }

    /// Blocking copy of the buffer holding `role` into a new host vector.
    pub fn readback(&self, session: &DeviceSession<D>, role: Role) -> Result<Vec<T>> {
        tracing::trace!("Reading back {:?} ({})", role, self.slot(role));
        session.read_buffer(self.buffer(role), self.len)
    }

    /// Elements per buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; empty pairs cannot be created.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of swaps performed.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }
}
