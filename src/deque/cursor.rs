use core::mem;
use core::ptr;

/// Number of element slots per chunk for an element of `elem_size` bytes.
///
/// The smallest power of two that is at least 16 and fills at least 512
/// bytes, so a chunk spans a handful of cache lines for small elements
/// without degenerating into a linked list of singletons for large ones.
/// Zero-sized types are rejected before this is ever used for real; the
/// fallback keeps the constant total for `const` evaluation.
pub(crate) const fn chunk_capacity(elem_size: usize) -> usize {
    if elem_size == 0 {
        return 512;
    }
    let mut cap = 16;
    while cap * elem_size < 512 {
        cap *= 2;
    }
    cap
}

/// Minimum number of map slots kept on each side of the active chunks, so
/// a freshly built deque can grow one chunk at either end without touching
/// the map.
pub(crate) const MAP_PADDING: usize = 4;

/// A position inside the two-level chunk layout.
///
/// `outer` points into the map (the array of chunk pointers), `inner` into
/// the chunk `*outer`, and `chunk_begin`/`chunk_end` cache that chunk's
/// bounds so stepping within a chunk is a single pointer bump.
///
/// A normalized cursor never sits at `chunk_end`; crossing a chunk
/// boundary immediately hops `outer`. Hopping onto a null map slot (a
/// sentinel or a not-yet-allocated slot) parks the cursor with null chunk
/// bounds instead of doing arithmetic on the null chunk pointer.
pub(crate) struct Cursor<T> {
    pub outer: *mut *mut T,
    pub inner: *mut T,
    pub chunk_begin: *mut T,
    pub chunk_end: *mut T,
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<T> {}

impl<T> Cursor<T> {
    /// Element slots per chunk for this element type.
    pub const CAP: usize = chunk_capacity(mem::size_of::<T>());

    /// Cursor at the first slot of the chunk held in `slot`.
    ///
    /// # Safety
    /// `slot` must be a readable map slot holding a non-null chunk pointer.
    pub unsafe fn at_chunk_start(slot: *mut *mut T) -> Self {
        let chunk = *slot;
        debug_assert!(!chunk.is_null());
        Cursor {
            outer: slot,
            inner: chunk,
            chunk_begin: chunk,
            chunk_end: chunk.add(Self::CAP),
        }
    }

    /// Slots between the chunk start and the cursor.
    pub fn offset_in_chunk(&self) -> usize {
        // Both pointers sit in the same chunk allocation.
        unsafe { self.inner.offset_from(self.chunk_begin) as usize }
    }

    /// Re-reads the chunk bounds from `*outer`; parks on a null slot.
    ///
    /// # Safety
    /// `outer` must be a readable map slot.
    unsafe fn reload_chunk(&mut self) {
        let chunk = *self.outer;
        if chunk.is_null() {
            self.chunk_begin = ptr::null_mut();
            self.chunk_end = ptr::null_mut();
            self.inner = ptr::null_mut();
        } else {
            self.chunk_begin = chunk;
            self.chunk_end = chunk.add(Self::CAP);
            self.inner = chunk;
        }
    }

    /// Moves to the first slot of the next chunk (or parks on a null slot).
    ///
    /// # Safety
    /// `outer + 1` must be a readable map slot.
    pub unsafe fn to_next_chunk(&mut self) {
        self.outer = self.outer.add(1);
        self.reload_chunk();
    }

    /// Moves to the first slot of the previous chunk (or parks).
    ///
    /// # Safety
    /// `outer - 1` must be a readable map slot.
    pub unsafe fn to_prev_chunk(&mut self) {
        self.outer = self.outer.sub(1);
        self.reload_chunk();
    }

    /// Steps one slot forward.
    ///
    /// # Safety
    /// The cursor must point at an allocated slot, and if this step crosses
    /// a chunk boundary, `outer + 1` must be a readable map slot.
    pub unsafe fn inc(&mut self) {
        self.inner = self.inner.add(1);
        if self.inner == self.chunk_end {
            self.to_next_chunk();
        }
    }

    /// Steps one slot backward.
    ///
    /// # Safety
    /// The slot before the cursor must exist in an allocated chunk.
    pub unsafe fn dec(&mut self) {
        if self.inner == self.chunk_begin {
            self.to_prev_chunk();
            self.inner = self.chunk_end;
        }
        self.inner = self.inner.sub(1);
    }

    /// Jumps `n` slots (signed), landing on an allocated chunk.
    ///
    /// The offset is split with flooring division so negative jumps resolve
    /// to the correct earlier chunk rather than truncating toward zero.
    ///
    /// # Safety
    /// The destination slot must lie in an allocated chunk of the same map
    /// (the end-landing chunk counts).
    pub unsafe fn add(mut self, n: isize) -> Self {
        let cap = Self::CAP as isize;
        let offset = self.inner.offset_from(self.chunk_begin) + n;
        self.outer = self.outer.offset(offset.div_euclid(cap));
        let chunk = *self.outer;
        debug_assert!(!chunk.is_null());
        self.chunk_begin = chunk;
        self.chunk_end = chunk.add(Self::CAP);
        self.inner = chunk.add(offset.rem_euclid(cap) as usize);
        self
    }

    /// Signed slot distance `self - other`.
    ///
    /// # Safety
    /// Both cursors must point into the same map, each on an allocated
    /// chunk.
    pub unsafe fn distance_from(&self, other: &Self) -> isize {
        self.outer.offset_from(other.outer) * Self::CAP as isize
            + self.inner.offset_from(self.chunk_begin)
            - other.inner.offset_from(other.chunk_begin)
    }

    /// Pointer to the slot `i` positions ahead, without touching `self`.
    ///
    /// # Safety
    /// Slot `i` ahead must lie in an allocated chunk of the same map.
    pub unsafe fn slot(&self, i: usize) -> *mut T {
        let offset = self.offset_in_chunk() + i;
        if offset < Self::CAP {
            self.inner.add(i)
        } else {
            let chunk = *self.outer.add(offset / Self::CAP);
            chunk.add(offset % Self::CAP)
        }
    }

    /// Two cursors into the same container address the same slot exactly
    /// when their `inner` pointers match (normalized cursors never sit at
    /// `chunk_end`, so chunk-boundary aliases cannot occur).
    pub fn same_slot(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}
