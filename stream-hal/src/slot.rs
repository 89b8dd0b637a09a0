use core::marker::PhantomData;
use core::ptr::NonNull;
use core::task::Waker;

use crate::buffer::BufferState;

/// Registry entry for one application-supplied buffer.
///
/// The memory is kept as a raw region rather than a `&'a mut [u8]` so that
/// the application may hold a slice into a `Ready` buffer while interrupt
/// context holds `&mut` access to the registry.
pub(crate) struct Slot<'a> {
    data: NonNull<u8>,
    capacity: usize,
    /// Bytes valid for the current transfer.
    pub(crate) len: usize,
    pub(crate) state: BufferState,
    /// Stream position of the buffer's last frame (estimated completion).
    pub(crate) end_position: u64,
    /// A completion notification for this slot sits in the channel.
    pub(crate) notify_pending: bool,
    /// Task awaiting this buffer.
    pub(crate) waker: Option<Waker>,
    /// The application holds a slice of the memory (`fill` or `read` is
    /// running), so it can be neither submitted nor lent again.
    pub(crate) lent: bool,
    _memory: PhantomData<&'a mut [u8]>,
}

impl<'a> Slot<'a> {
    pub(crate) fn new(memory: &'a mut [u8], state: BufferState) -> Self {
        let capacity = memory.len();
        Slot {
            data: NonNull::from(memory).cast::<u8>(),
            capacity,
            len: 0,
            state,
            end_position: 0,
            notify_pending: false,
            waker: None,
            lent: false,
            _memory: PhantomData,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Valid bytes of the buffer.
    ///
    /// # Safety
    /// Nobody may be writing the memory for the lifetime of the returned
    /// slice: the slot is `Busy` (only the pipeline touches it), or the
    /// caller is the application owning a non-`Busy` slot.
    pub(crate) unsafe fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Location of the memory, for lending it out past the exclusive
    /// region.
    pub(crate) fn raw(&self) -> RawMemory {
        RawMemory {
            ptr: self.data,
            capacity: self.capacity,
            len: self.len,
        }
    }
}

/// Snapshot of a slot's memory region and valid length.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawMemory {
    pub(crate) ptr: NonNull<u8>,
    pub(crate) capacity: usize,
    pub(crate) len: usize,
}
