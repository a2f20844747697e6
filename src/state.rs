// src/state.rs

//! Owned memory backing a native codec state.
//!
//! libopus can initialise its encoder/decoder structs in caller-provided memory
//! (`opus_*_get_size` + `opus_*_init`). We allocate that memory here so the state is released by
//! ordinary ownership instead of a `create`/`destroy` pair.

use std::marker::PhantomData;

/// One 16-byte aligned block. The native structs need no stricter alignment than this.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Block([u8; 16]);

/// A zeroed, aligned allocation large enough for one `T`-typed native state.
pub(crate) struct NativeState<T> {
    mem: Box<[Block]>,
    _state: PhantomData<*mut T>,
}

impl<T> NativeState<T> {
    /// Allocate `size` bytes (rounded up to whole blocks).
    pub(crate) fn zeroed(size: usize) -> Self {
        let blocks = size.div_ceil(size_of::<Block>()).max(1);
        Self {
            mem: vec![Block([0; 16]); blocks].into_boxed_slice(),
            _state: PhantomData,
        }
    }

    /// The native handle. Valid for as long as `self` is alive and not moved out of its box.
    pub(crate) fn as_ptr(&mut self) -> *mut T {
        self.mem.as_mut_ptr().cast()
    }

    pub(crate) fn size(&self) -> usize {
        self.mem.len() * size_of::<Block>()
    }
}

// Safety: the state is only ever reached through `&mut` borrows of its owner, and libopus keeps
// no thread-local references into it.
unsafe impl<T> Send for NativeState<T> {}

/// Lifecycle of a codec session.
pub(crate) enum Slot<T> {
    /// Zero value: never initialised.
    Empty,
    Live(NativeState<T>),
    Released,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Empty
    }
}
