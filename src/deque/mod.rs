//! A double-ended sequence stored as fixed-size chunks behind a pointer map.
//!
//! Unlike the ring buffer backing `std::collections::VecDeque`, growth at
//! an end never moves elements: the map of chunk pointers is rebalanced or
//! reallocated instead, and spent chunks are retained as ghost capacity so
//! oscillating push/pop traffic at one end settles into zero allocations.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::{Bound, Index, IndexMut, RangeBounds};
use core::ptr;

use allocator_api2::alloc::{Allocator, Global};

mod cursor;
mod iter;
mod raw;

pub use iter::{IntoIter, Iter, IterMut};

use cursor::{Cursor, MAP_PADDING};
use raw::{drop_range, move_range, move_range_backward};

/// A double-ended queue with chunked storage and ghost capacity.
///
/// # Overview
/// Storage is split across chunks of [`CHUNK_CAPACITY`] elements, indexed
/// by a central map of chunk pointers with a null sentinel at each end.
/// Pushes at either end are amortized O(1), indexing is O(1), and
/// insertion or removal in the middle shifts whichever side is shorter.
/// Chunks freed by pops are kept allocated ("ghost capacity") and reused,
/// so element addresses are stable across every operation that does not
/// insert or erase on their side.
///
/// # Invariants
/// * The allocated chunks form one contiguous map range containing every
///   live element plus the ghost chunks on both sides.
/// * The end cursor always rests on an allocated chunk, so advancing one
///   past the last element never reads a null chunk pointer.
/// * Element slots outside the live range are plain uninitialized memory.
///
/// Zero-sized element types are rejected at compile time; the chunk
/// layout is pointer arithmetic per element and cannot express them.
///
/// [`CHUNK_CAPACITY`]: ChunkedDeque::CHUNK_CAPACITY
///
/// # Examples
/// ```rust
/// use chunked_deque::ChunkedDeque;
///
/// let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
/// d.push_back(2);
/// d.push_front(1);
/// d.push_back(3);
/// assert_eq!(d.len(), 3);
/// assert_eq!(d[1], 2);
/// assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
/// ```
pub struct ChunkedDeque<T, A: Allocator = Global> {
    /// First non-sentinel map slot; the allocation starts one slot before.
    map: *mut *mut T,
    /// Non-sentinel map slots.
    map_len: usize,
    /// First allocated chunk slot.
    begin_chunk: *mut *mut T,
    /// One past the last allocated chunk slot.
    end_chunk: *mut *mut T,
    /// First element.
    head: Cursor<T>,
    /// One past the last element; always on an allocated chunk.
    tail: Cursor<T>,
    alloc: A,
    marker: PhantomData<T>,
}

unsafe impl<T: Send, A: Allocator + Send> Send for ChunkedDeque<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for ChunkedDeque<T, A> {}

impl<T> ChunkedDeque<T> {
    /// Creates an empty deque with one chunk ready.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates an empty deque with chunk capacity for at least `capacity`
    /// elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }

    /// Creates a deque holding `n` clones of `value`.
    pub fn from_elem(value: T, n: usize) -> Self
    where
        T: Clone,
    {
        Self::from_elem_in(value, n, Global)
    }
}

impl<T, A: Allocator> ChunkedDeque<T, A> {
    /// Element slots per chunk: the smallest power of two of at least 16
    /// slots spanning at least 512 bytes.
    pub const CHUNK_CAPACITY: usize = Cursor::<T>::CAP;

    /// Creates an empty deque using the given allocator.
    pub fn new_in(alloc: A) -> Self {
        Self::with_slots_in(0, alloc)
    }

    /// Creates an empty deque with chunk capacity for at least `capacity`
    /// elements, using the given allocator.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self::with_slots_in(capacity, alloc)
    }

    /// Creates a deque holding `n` clones of `value`, using the given
    /// allocator.
    ///
    /// If a clone panics midway, everything constructed so far is dropped
    /// and all memory is released before the panic continues.
    pub fn from_elem_in(value: T, n: usize, alloc: A) -> Self
    where
        T: Clone,
    {
        let mut deque = Self::with_slots_in(n, alloc);
        unsafe {
            for _ in 0..n {
                deque.push_back_unchecked(value.clone());
            }
        }
        deque
    }

    // --- Inspection ---

    /// Number of elements.
    pub fn len(&self) -> usize {
        unsafe { self.tail.distance_from(&self.head) as usize }
    }

    /// Returns `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.head.same_slot(&self.tail)
    }

    /// Total element slots across allocated chunks, including ghost
    /// capacity. One slot past the back is always reserved for the end
    /// cursor's landing.
    pub fn capacity(&self) -> usize {
        unsafe { self.end_chunk.offset_from(self.begin_chunk) as usize * Self::CHUNK_CAPACITY }
    }

    /// A reference to the allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    // --- Access ---

    /// Returns a reference to the element at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len() {
            unsafe { Some(&*self.head.slot(index)) }
        } else {
            None
        }
    }

    /// Returns a mutable reference to the element at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len() {
            unsafe { Some(&mut *self.head.slot(index)) }
        } else {
            None
        }
    }

    /// Returns a reference to the first element.
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            unsafe { Some(&*self.head.inner) }
        }
    }

    /// Returns a mutable reference to the first element.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            None
        } else {
            unsafe { Some(&mut *self.head.inner) }
        }
    }

    /// Returns a reference to the last element.
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            unsafe {
                let mut cur = self.tail;
                cur.dec();
                Some(&*cur.inner)
            }
        }
    }

    /// Returns a mutable reference to the last element.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            None
        } else {
            unsafe {
                let mut cur = self.tail;
                cur.dec();
                Some(&mut *cur.inner)
            }
        }
    }

    // --- Iteration ---

    /// A front-to-back iterator over references.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.head, self.tail)
    }

    /// A front-to-back iterator over mutable references.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut::new(self.head, self.tail)
    }

    // --- End operations ---

    /// Appends an element to the back.
    ///
    /// Any growth happens before the element is written, so a failed
    /// growth leaves the deque exactly as it was.
    pub fn push_back(&mut self, value: T) {
        unsafe {
            if self.tail.inner.add(1) == self.tail.chunk_end {
                self.ensure_back_landing();
            }
            self.tail.inner.write(value);
            self.tail.inner = self.tail.inner.add(1);
            if self.tail.inner == self.tail.chunk_end {
                self.tail.to_next_chunk();
            }
        }
    }

    /// Prepends an element to the front.
    pub fn push_front(&mut self, value: T) {
        unsafe {
            if self.head.inner == self.head.chunk_begin {
                self.ensure_front_room();
            }
            self.head.dec();
            self.head.inner.write(value);
        }
    }

    /// Removes and returns the last element. Never releases chunks; the
    /// freed space stays as ghost capacity.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        unsafe {
            self.tail.dec();
            Some(self.tail.inner.read())
        }
    }

    /// Removes and returns the first element. Never releases chunks.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        unsafe {
            let value = self.head.inner.read();
            self.head.inc();
            Some(value)
        }
    }

    /// Appends assuming slots are already reserved.
    ///
    /// # Safety
    /// A free slot at the end cursor plus an allocated landing chunk for
    /// the advanced cursor must already exist (see [`Self::reserve_back`]).
    unsafe fn push_back_unchecked(&mut self, value: T) {
        self.tail.inner.write(value);
        self.tail.inner = self.tail.inner.add(1);
        if self.tail.inner == self.tail.chunk_end {
            self.tail.to_next_chunk();
        }
    }

    /// Makes the chunk after the end cursor's chunk available.
    unsafe fn ensure_back_landing(&mut self) {
        let next = self.tail.outer.add(1);
        if next == self.map_end() {
            self.make_room(false, 1);
        } else if (*next).is_null() {
            debug_assert!(next == self.end_chunk);
            *next = Self::allocate_chunk_in(&self.alloc);
            self.end_chunk = next.add(1);
        }
    }

    /// Makes the chunk before the head's chunk available.
    unsafe fn ensure_front_room(&mut self) {
        if self.head.outer == self.map {
            self.make_room(true, 1);
        } else {
            let prev = self.head.outer.sub(1);
            if (*prev).is_null() {
                debug_assert!(self.head.outer == self.begin_chunk);
                *prev = Self::allocate_chunk_in(&self.alloc);
                self.begin_chunk = prev;
            }
        }
    }

    // --- Capacity ---

    /// Reserves room for at least `additional` more `push_back` calls
    /// without touching the map again.
    pub fn reserve_back(&mut self, additional: usize) {
        unsafe { self.ensure_back_slots(additional) }
    }

    /// Reserves room for at least `additional` more `push_front` calls
    /// without touching the map again.
    pub fn reserve_front(&mut self, additional: usize) {
        unsafe { self.ensure_front_slots(additional) }
    }

    /// Releases ghost chunks and shrinks the map to the minimum that still
    /// holds every element plus the end cursor's landing slot. May slide
    /// the elements to the start of their first chunk to free one more
    /// chunk of slack. Calling it twice in a row makes the second call a
    /// no-op.
    pub fn shrink_to_fit(&mut self) {
        unsafe {
            let cap = Self::CHUNK_CAPACITY;
            let len = self.len();
            let needed = len + 1;
            let occupied =
                (self.tail.outer.offset_from(self.head.outer) as usize + 1) * cap;
            let total = self.map_len * cap;
            let minimum = MAP_PADDING * cap;
            if needed + cap > occupied && (occupied == total || occupied <= minimum) {
                return;
            }
            if needed + cap <= occupied && self.head.offset_in_chunk() != 0 {
                // Slide to the start of the first used chunk; that frees at
                // least one trailing chunk's worth of slots.
                let new_head = Cursor::at_chunk_start(self.head.outer);
                move_range(self.head, self.tail, new_head);
                self.head = new_head;
                self.tail = new_head.add(len as isize);
            }
            let bic = self.head.outer;
            let eic = self.tail.outer.add(1);
            while self.begin_chunk != bic {
                let chunk = *self.begin_chunk;
                *self.begin_chunk = ptr::null_mut();
                self.begin_chunk = self.begin_chunk.add(1);
                Self::deallocate_chunk_in(&self.alloc, chunk);
            }
            while self.end_chunk != eic {
                self.end_chunk = self.end_chunk.sub(1);
                let chunk = *self.end_chunk;
                *self.end_chunk = ptr::null_mut();
                Self::deallocate_chunk_in(&self.alloc, chunk);
            }
            let used = eic.offset_from(bic) as usize;
            debug_assert_eq!(used, needed.div_ceil(cap));
            let new_map = Self::allocate_map_in(&self.alloc, used);
            ptr::copy_nonoverlapping(bic, new_map, used);
            let tail_delta = self.tail.outer.offset_from(bic);
            Self::deallocate_map_in(&self.alloc, self.map, self.map_len);
            self.map = new_map;
            self.map_len = used;
            self.begin_chunk = new_map;
            self.end_chunk = new_map.add(used);
            self.head.outer = new_map;
            self.tail.outer = new_map.offset(tail_delta);
        }
    }

    // --- Middle insertion ---

    /// Inserts `value` before `index`, shifting the shorter side.
    ///
    /// Insertion at either end degrades to the corresponding push and
    /// keeps its all-or-nothing behavior.
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(
            index <= len,
            "insertion index (is {index}) should be <= len (is {len})"
        );
        if index == 0 {
            self.push_front(value);
        } else if index == len {
            self.push_back(value);
        } else {
            unsafe {
                let (gap, _) = self.open_gap(index, 1);
                gap.inner.write(value);
            }
        }
    }

    /// Inserts `n` clones of `value` before `index`.
    ///
    /// If a clone panics midway, the clones already written stay in place
    /// and the unfilled hole is closed again, leaving a valid deque.
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert_n(&mut self, index: usize, value: T, n: usize)
    where
        T: Clone,
    {
        let len = self.len();
        assert!(
            index <= len,
            "insertion index (is {index}) should be <= len (is {len})"
        );
        match n {
            0 => return,
            1 => return self.insert(index, value),
            _ => {}
        }
        unsafe {
            let (gap, from_front) = self.open_gap(index, n);
            let mut guard = GapFillGuard {
                deque: self,
                gap,
                total: n,
                filled: 0,
                from_front,
            };
            let mut cur = gap;
            let mut value = Some(value);
            for i in 0..n {
                let item = if i + 1 == n {
                    value.take().unwrap()
                } else {
                    value.as_ref().unwrap().clone()
                };
                cur.inner.write(item);
                guard.filled += 1;
                if i + 1 != n {
                    cur.inc();
                }
            }
        }
    }

    /// Inserts every element of `iterable` before `index`, in order.
    ///
    /// The input is buffered first, so single-pass iterators are fine and
    /// the deque is touched only once the whole input has been read.
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert_many<I>(&mut self, index: usize, iterable: I)
    where
        I: IntoIterator<Item = T>,
    {
        let len = self.len();
        assert!(
            index <= len,
            "insertion index (is {index}) should be <= len (is {len})"
        );
        let mut buffer: Vec<T> = iterable.into_iter().collect();
        match buffer.len() {
            0 => return,
            1 => return self.insert(index, buffer.pop().unwrap()),
            _ => {}
        }
        unsafe {
            let (gap, _) = self.open_gap(index, buffer.len());
            let mut cur = gap;
            for item in buffer {
                cur.inner.write(item);
                cur.inc();
            }
        }
    }

    /// Opens a gap of `n` raw slots before `index` by shifting whichever
    /// side is shorter. Returns the gap start and whether the prefix was
    /// the side that moved. The caller must fill all `n` slots (or close
    /// the hole) before the deque is observable again.
    unsafe fn open_gap(&mut self, index: usize, n: usize) -> (Cursor<T>, bool) {
        let len = self.len();
        debug_assert!(n > 0 && index <= len);
        if 2 * index <= len {
            self.ensure_front_slots(n);
            let pos = self.head.add(index as isize);
            let new_head = self.head.add(-(n as isize));
            if index > 0 {
                move_range(self.head, pos, new_head);
            }
            self.head = new_head;
            (new_head.add(index as isize), true)
        } else {
            self.ensure_back_slots(n);
            let suffix = (len - index) as isize;
            let pos = self.tail.add(-suffix);
            let new_tail = self.tail.add(n as isize);
            if suffix > 0 {
                move_range_backward(pos, self.tail, new_tail);
            }
            self.tail = new_tail;
            (pos, false)
        }
    }

    // --- Erasure ---

    /// Removes and returns the element at `index`, shifting the shorter
    /// side over the vacated slot. The endpoints degrade to pops.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let len = self.len();
        if index >= len {
            return None;
        }
        if index == 0 {
            return self.pop_front();
        }
        if index + 1 == len {
            return self.pop_back();
        }
        unsafe {
            let value = self.head.slot(index).read();
            self.close_gap(index, 1);
            Some(value)
        }
    }

    /// Removes every element in `range`, shifting the shorter side.
    ///
    /// # Panics
    /// Panics if the range is out of bounds or inverted.
    pub fn remove_range<R: RangeBounds<usize>>(&mut self, range: R) {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        assert!(
            start <= end && end <= len,
            "range {start}..{end} out of bounds for length {len}"
        );
        if start == end {
            return;
        }
        unsafe {
            let first = self.head.add(start as isize);
            let last = self.head.add(end as isize);
            // The guard closes the gap even if an element drop unwinds, so
            // the deque is valid either way.
            let _guard = CloseGapGuard {
                deque: self,
                start,
                count: end - start,
            };
            drop_range(first, last);
        }
    }

    /// Shortens the deque to at most `len` elements, dropping the rest
    /// from the back.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.remove_range(len..);
        }
    }

    /// Drops every element. Keeps all chunks and recenters the cursors in
    /// the allocated range so subsequent pushes at either end start from
    /// the best position.
    pub fn clear(&mut self) {
        unsafe {
            let head = self.head;
            let tail = self.tail;
            let total = self.capacity();
            self.head = Cursor::at_chunk_start(self.begin_chunk).add((total / 2) as isize);
            self.tail = self.head;
            drop_range(head, tail);
        }
    }

    /// Shifts the shorter side over the raw slots `[start, start + count)`.
    ///
    /// # Safety
    /// Those slots must be logically uninitialized while everything else
    /// in the live range is initialized.
    unsafe fn close_gap(&mut self, start: usize, count: usize) {
        let len = self.len();
        let before = start;
        let after = len - start - count;
        if before <= after {
            if before > 0 {
                let first = self.head.add(before as isize);
                move_range_backward(self.head, first, first.add(count as isize));
            }
            self.head = self.head.add(count as isize);
        } else {
            if after > 0 {
                let last = self.head.add((start + count) as isize);
                move_range(last, self.tail, last.add(-(count as isize)));
            }
            self.tail = self.tail.add(-(count as isize));
        }
    }

    // --- Resizing ---

    /// Resizes to `new_len` elements, cloning `value` to fill new slots.
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        let len = self.len();
        if new_len <= len {
            self.truncate(new_len);
        } else {
            self.reserve_back(new_len - len);
            for _ in len..new_len {
                self.push_back(value.clone());
            }
        }
    }

    /// Resizes to `new_len` elements, filling new slots from `f`.
    pub fn resize_with<F: FnMut() -> T>(&mut self, new_len: usize, mut f: F) {
        let len = self.len();
        if new_len <= len {
            self.truncate(new_len);
        } else {
            self.reserve_back(new_len - len);
            for _ in len..new_len {
                self.push_back(f());
            }
        }
    }

    // --- Copying ---

    /// Clones the contents into a new deque using `alloc`, preserving the
    /// head's offset within its chunk so the layout stays stable under
    /// repeated copies.
    pub fn clone_in<B: Allocator>(&self, alloc: B) -> ChunkedDeque<T, B>
    where
        T: Clone,
    {
        let head_off = self.head.offset_in_chunk();
        let mut out = ChunkedDeque::with_slots_in(head_off + self.len(), alloc);
        unsafe {
            out.head = out.head.add(head_off as isize);
            out.tail = out.head;
            for item in self.iter() {
                out.push_back_unchecked(item.clone());
            }
        }
        out
    }
}

/// Closes the unfilled part of an insertion gap if filling it unwinds.
/// Clones already written stay; the hole between them and the far side is
/// shifted shut, so the deque stays valid and leak-free.
struct GapFillGuard<'a, T, A: Allocator> {
    deque: &'a mut ChunkedDeque<T, A>,
    gap: Cursor<T>,
    total: usize,
    filled: usize,
    from_front: bool,
}

impl<T, A: Allocator> Drop for GapFillGuard<'_, T, A> {
    fn drop(&mut self) {
        if self.filled == self.total {
            return;
        }
        unsafe {
            let hole = (self.total - self.filled) as isize;
            let filled_end = self.gap.add(self.filled as isize);
            if self.from_front {
                move_range_backward(self.deque.head, filled_end, filled_end.add(hole));
                self.deque.head = self.deque.head.add(hole);
            } else {
                let gap_end = self.gap.add(self.total as isize);
                move_range(gap_end, self.deque.tail, filled_end);
                self.deque.tail = self.deque.tail.add(-hole);
            }
        }
    }
}

/// Runs `close_gap` on both the ordinary and the unwinding path of a range
/// removal.
struct CloseGapGuard<'a, T, A: Allocator> {
    deque: &'a mut ChunkedDeque<T, A>,
    start: usize,
    count: usize,
}

impl<T, A: Allocator> Drop for CloseGapGuard<'_, T, A> {
    fn drop(&mut self) {
        unsafe { self.deque.close_gap(self.start, self.count) }
    }
}

// --- Traits ---

impl<T, A: Allocator> Drop for ChunkedDeque<T, A> {
    fn drop(&mut self) {
        unsafe {
            drop_range(self.head, self.tail);
            let mut p = self.begin_chunk;
            while p != self.end_chunk {
                Self::deallocate_chunk_in(&self.alloc, *p);
                p = p.add(1);
            }
            Self::deallocate_map_in(&self.alloc, self.map, self.map_len);
        }
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for ChunkedDeque<T, A> {
    fn clone(&self) -> Self {
        self.clone_in(self.alloc.clone())
    }

    /// Reuses the existing chunks when they can hold the source's
    /// contents, rebuilding from scratch otherwise.
    fn clone_from(&mut self, source: &Self) {
        let n = source.len();
        if self.capacity() > n {
            self.clear();
            unsafe {
                let total = self.capacity();
                self.head =
                    Cursor::at_chunk_start(self.begin_chunk).add(((total - n) / 2) as isize);
                self.tail = self.head;
                for item in source.iter() {
                    self.push_back_unchecked(item.clone());
                }
            }
        } else {
            *self = source.clone();
        }
    }
}

impl<T> Default for ChunkedDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for ChunkedDeque<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, A: Allocator> Index<usize> for ChunkedDeque<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        self.get(index).expect("index out of bounds")
    }
}

impl<T, A: Allocator> IndexMut<usize> for ChunkedDeque<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.get_mut(index).expect("index out of bounds")
    }
}

impl<T: PartialEq, A1: Allocator, A2: Allocator> PartialEq<ChunkedDeque<T, A2>>
    for ChunkedDeque<T, A1>
{
    fn eq(&self, other: &ChunkedDeque<T, A2>) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq, A: Allocator> Eq for ChunkedDeque<T, A> {}

impl<T: PartialOrd, A: Allocator> PartialOrd for ChunkedDeque<T, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, A: Allocator> Ord for ChunkedDeque<T, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, A: Allocator> Hash for ChunkedDeque<T, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for item in self.iter() {
            item.hash(state);
        }
    }
}

impl<T, A: Allocator> Extend<T> for ChunkedDeque<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve_back(lower);
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T> FromIterator<T> for ChunkedDeque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = Self::new();
        deque.extend(iter);
        deque
    }
}

impl<T, const N: usize> From<[T; N]> for ChunkedDeque<T> {
    fn from(array: [T; N]) -> Self {
        array.into_iter().collect()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a ChunkedDeque<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut ChunkedDeque<T, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A: Allocator> IntoIterator for ChunkedDeque<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}

// --- Internal validation ---

#[cfg(test)]
impl<T, A: Allocator> ChunkedDeque<T, A> {
    /// Number of allocated chunks, ghosts included.
    pub(crate) fn chunk_count(&self) -> usize {
        unsafe { self.end_chunk.offset_from(self.begin_chunk) as usize }
    }

    /// Asserts the structural invariants. Test-only; walks the whole map
    /// and the whole element range.
    pub(crate) fn check_invariants(&self) {
        unsafe {
            let cap = Self::CHUNK_CAPACITY;
            let map_end = self.map.add(self.map_len);
            assert!(self.map <= self.begin_chunk);
            assert!(self.begin_chunk <= self.end_chunk);
            assert!(self.end_chunk <= map_end);

            // Sentinels and slots outside the active range are null; the
            // active range is fully allocated.
            let mut p = self.map.sub(1);
            while p != self.begin_chunk {
                assert!((*p).is_null());
                p = p.add(1);
            }
            let mut p = self.end_chunk;
            while p != map_end.add(1) {
                assert!((*p).is_null());
                p = p.add(1);
            }
            let mut p = self.begin_chunk;
            while p != self.end_chunk {
                assert!(!(*p).is_null());
                p = p.add(1);
            }

            // Cursors sit on allocated chunks with coherent cached bounds;
            // the end cursor's chunk is the always-allocated landing.
            for cur in [&self.head, &self.tail] {
                assert!(self.begin_chunk <= cur.outer && cur.outer < self.end_chunk);
                assert_eq!(cur.chunk_begin, *cur.outer);
                assert_eq!(cur.chunk_end, cur.chunk_begin.add(cap));
                assert!(cur.chunk_begin <= cur.inner && cur.inner < cur.chunk_end);
            }

            let distance = self.tail.distance_from(&self.head);
            assert!(distance >= 0);
            let mut walked = 0usize;
            let mut cur = self.head;
            while !cur.same_slot(&self.tail) {
                cur.inc();
                walked += 1;
            }
            assert_eq!(walked, distance as usize);
        }
    }
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    const CAP: usize = ChunkedDeque::<i32>::CHUNK_CAPACITY;

    /// Counts live instances and can be set to panic after a number of
    /// clones (a negative fuse never burns out).
    #[derive(Debug)]
    struct Tracked {
        value: i32,
        live: Rc<Cell<isize>>,
        fuse: Rc<Cell<isize>>,
    }

    impl Tracked {
        fn new(value: i32, live: &Rc<Cell<isize>>, fuse: &Rc<Cell<isize>>) -> Self {
            live.set(live.get() + 1);
            Tracked {
                value,
                live: Rc::clone(live),
                fuse: Rc::clone(fuse),
            }
        }
    }

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            let left = self.fuse.get();
            if left == 0 {
                panic!("clone fuse burned out");
            }
            self.fuse.set(left - 1);
            Tracked::new(self.value, &self.live, &self.fuse)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl PartialEq for Tracked {
        fn eq(&self, other: &Self) -> bool {
            self.value == other.value
        }
    }

    fn counters() -> (Rc<Cell<isize>>, Rc<Cell<isize>>) {
        (Rc::new(Cell::new(0)), Rc::new(Cell::new(-1)))
    }

    #[test]
    fn test_deque_push_back_basic() {
        let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
        assert!(d.is_empty());
        for i in 1..=10 {
            d.push_back(i);
        }
        assert_eq!(d.len(), 10);
        assert_eq!(d.front(), Some(&1));
        assert_eq!(d.back(), Some(&10));
        assert_eq!(d[5], 6);
        d.check_invariants();
    }

    #[test]
    fn test_deque_empty_edge_cases() {
        let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
        assert_eq!(d.pop_front(), None);
        assert_eq!(d.pop_back(), None);
        assert_eq!(d.front(), None);
        assert_eq!(d.back(), None);
        assert_eq!(d.get(0), None);
        d.check_invariants();

        d.push_back(42);
        assert_eq!(d.len(), 1);
        assert_eq!(d.front(), d.back());
        assert_eq!(d.front(), Some(&42));
        assert_eq!(d.iter().next(), d.front());
        d.check_invariants();
    }

    #[test]
    fn test_deque_push_pop_round_trip() {
        let mut d: ChunkedDeque<i32> = (0..100).collect();
        let before: Vec<i32> = d.iter().copied().collect();
        d.push_back(1000);
        assert_eq!(d.pop_back(), Some(1000));
        d.push_front(-1);
        assert_eq!(d.pop_front(), Some(-1));
        let after: Vec<i32> = d.iter().copied().collect();
        assert_eq!(before, after);
        d.check_invariants();
    }

    #[test]
    fn test_deque_growth_across_many_chunks() {
        let n = 5 * CAP + 17;
        let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
        for i in 0..n as i32 {
            d.push_back(i);
        }
        d.check_invariants();
        assert_eq!(d.len(), n);
        for i in 0..n {
            assert_eq!(d[i], i as i32);
        }

        let mut f: ChunkedDeque<i32> = ChunkedDeque::new();
        for i in 0..n as i32 {
            f.push_front(i);
        }
        f.check_invariants();
        for i in 0..n {
            assert_eq!(f[i], (n - 1 - i) as i32);
        }
    }

    #[test]
    fn test_deque_alternating_ends_matches_model() {
        // Deterministic mixed traffic compared against the std ring buffer.
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut d: ChunkedDeque<u32> = ChunkedDeque::new();
        let mut state = 0x2545_f491u32;
        for i in 0..10_000u32 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            match state % 5 {
                0 => {
                    model.push_front(i);
                    d.push_front(i);
                }
                1 | 2 => {
                    model.push_back(i);
                    d.push_back(i);
                }
                3 => assert_eq!(model.pop_front(), d.pop_front()),
                _ => assert_eq!(model.pop_back(), d.pop_back()),
            }
        }
        d.check_invariants();
        assert_eq!(model.len(), d.len());
        assert!(model.iter().eq(d.iter()));
    }

    #[test]
    fn test_deque_oscillation_reuses_ghost_chunks() {
        let mut d: ChunkedDeque<i32> = ChunkedDeque::from_elem(7, 128);
        for _ in 0..256 {
            d.pop_front();
            d.push_back(99);
        }
        assert_eq!(d.len(), 128);
        assert!(d.iter().all(|&v| v == 99));
        // Bounded ghost growth: a handful of chunks for 128 elements, not
        // one per cycle.
        assert!(d.chunk_count() <= 9, "chunk count {}", d.chunk_count());
        d.check_invariants();
    }

    #[test]
    fn test_deque_element_addresses_stable_across_end_growth() {
        let mut d: ChunkedDeque<i32> = (0..10).collect();
        let first = &d[0] as *const i32;
        let mid = &d[5] as *const i32;
        for i in 0..(4 * CAP as i32) {
            d.push_back(i);
            d.push_front(-i);
        }
        // Growth only touches the chunk pointer map, never the chunks.
        assert_eq!(d[4 * CAP], 0);
        assert!(core::ptr::eq(&d[4 * CAP] as *const i32, first));
        assert!(core::ptr::eq(&d[4 * CAP + 5] as *const i32, mid));
        d.check_invariants();
    }

    #[test]
    fn test_deque_index_matches_iteration_order() {
        let d: ChunkedDeque<i32> = (0..(3 * CAP as i32 + 11)).collect();
        let by_index: Vec<*const i32> = (0..d.len()).map(|i| &d[i] as *const i32).collect();
        let by_iter: Vec<*const i32> = d.iter().map(|r| r as *const i32).collect();
        assert_eq!(by_index, by_iter);
    }

    #[test]
    fn test_deque_insert_middle_block() {
        let mut d: ChunkedDeque<i32> = (0..1000).collect();
        d.insert_n(500, -1, 1000);
        assert_eq!(d.len(), 2000);
        for i in 0..500 {
            assert_eq!(d[i], i as i32);
        }
        for i in 500..1500 {
            assert_eq!(d[i], -1);
        }
        for i in 1500..2000 {
            assert_eq!(d[i], i as i32 - 1000);
        }
        d.check_invariants();
    }

    #[test]
    fn test_deque_insert_many_both_shift_directions() {
        // Near the front: the prefix is the shorter side.
        let mut d: ChunkedDeque<i32> = (0..1000).collect();
        d.insert_many(10, [-1, -2, -3]);
        assert_eq!(d.len(), 1003);
        assert_eq!(d[9], 9);
        assert_eq!(d[10], -1);
        assert_eq!(d[12], -3);
        assert_eq!(d[13], 10);
        assert_eq!(d[1002], 999);
        d.check_invariants();

        // Near the back: the suffix is the shorter side.
        let mut d: ChunkedDeque<i32> = (0..1000).collect();
        d.insert_many(990, vec![-1, -2, -3]);
        assert_eq!(d.len(), 1003);
        assert_eq!(d[989], 989);
        assert_eq!(d[990], -1);
        assert_eq!(d[992], -3);
        assert_eq!(d[993], 990);
        assert_eq!(d[1002], 999);
        d.check_invariants();

        // Single-pass source.
        let mut d: ChunkedDeque<i32> = (0..100).collect();
        d.insert_many(50, (0..5).map(|v| v * 100).filter(|&v| v != 300));
        assert_eq!(d.len(), 104);
        assert_eq!(d[50], 0);
        assert_eq!(d[53], 400);
        assert_eq!(d[54], 50);
        d.check_invariants();
    }

    #[test]
    fn test_deque_insert_at_ends_equals_push() {
        let mut a: ChunkedDeque<i32> = (0..10).collect();
        let mut b = a.clone();
        a.insert(0, -1);
        b.push_front(-1);
        assert_eq!(a, b);
        a.insert(a.len(), 99);
        b.push_back(99);
        assert_eq!(a, b);
        a.check_invariants();
    }

    #[test]
    fn test_deque_insert_erase_round_trip() {
        let mut d: ChunkedDeque<i32> = (0..500).collect();
        let snapshot: Vec<i32> = d.iter().copied().collect();
        d.insert_n(123, 0, 77);
        d.remove_range(123..200);
        assert!(d.iter().copied().eq(snapshot.iter().copied()));
        d.check_invariants();
    }

    #[test]
    fn test_deque_erase_range_middle() {
        let mut d: ChunkedDeque<i32> = (0..1000).collect();
        d.remove_range(100..900);
        assert_eq!(d.len(), 200);
        for i in 0..100 {
            assert_eq!(d[i], i as i32);
        }
        for i in 100..200 {
            assert_eq!(d[i], i as i32 + 800);
        }
        d.check_invariants();
    }

    #[test]
    fn test_deque_remove_single() {
        let mut d: ChunkedDeque<i32> = (0..10).collect();
        assert_eq!(d.remove(0), Some(0));
        assert_eq!(d.remove(d.len() - 1), Some(9));
        assert_eq!(d.remove(3), Some(4));
        assert_eq!(d.remove(100), None);
        assert_eq!(
            d.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 6, 7, 8]
        );
        d.check_invariants();
    }

    #[test]
    fn test_deque_remove_range_bounds_forms() {
        let mut d: ChunkedDeque<i32> = (0..10).collect();
        d.remove_range(..2);
        d.remove_range(6..);
        d.remove_range(1..=2);
        assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![2, 5, 6, 7]);
        d.remove_range(..);
        assert!(d.is_empty());
        d.check_invariants();
    }

    #[test]
    fn test_deque_clear_and_reuse() {
        let mut d: ChunkedDeque<i32> = (0..(2 * CAP as i32)).collect();
        let chunks = d.chunk_count();
        d.clear();
        assert!(d.is_empty());
        assert_eq!(d.chunk_count(), chunks);
        d.check_invariants();
        // Cursors are recentered, so both ends have room again.
        d.push_front(1);
        d.push_back(2);
        assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        d.check_invariants();
    }

    #[test]
    fn test_deque_truncate_resize() {
        let mut d: ChunkedDeque<i32> = (0..100).collect();
        d.truncate(150);
        assert_eq!(d.len(), 100);
        d.truncate(40);
        assert_eq!(d.len(), 40);
        assert_eq!(d[39], 39);

        d.resize(45, -1);
        assert_eq!(d.len(), 45);
        assert_eq!(d[39], 39);
        assert_eq!(d[44], -1);
        d.resize(20, 0);
        assert_eq!(d.len(), 20);

        let mut next = 100;
        d.resize_with(23, || {
            next += 1;
            next
        });
        assert_eq!(d.iter().copied().collect::<Vec<_>>()[20..], [101, 102, 103]);
        d.check_invariants();
    }

    #[test]
    fn test_deque_shrink_to_fit_after_growth() {
        let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
        for i in 0..10_000 {
            d.push_back(i);
        }
        d.shrink_to_fit();
        assert_eq!(d.len(), 10_000);
        assert_eq!(d.chunk_count(), (10_000usize + 1).div_ceil(CAP));
        for i in 0..10_000 {
            assert_eq!(d[i], i as i32);
        }
        d.check_invariants();

        // Idempotent: a second call changes nothing.
        let capacity = d.capacity();
        let first = &d[0] as *const i32;
        d.shrink_to_fit();
        assert_eq!(d.capacity(), capacity);
        assert!(core::ptr::eq(&d[0] as *const i32, first));
        d.check_invariants();
    }

    #[test]
    fn test_deque_shrink_to_fit_releases_ghosts() {
        let mut d: ChunkedDeque<i32> = (0..(10 * CAP as i32)).collect();
        for _ in 0..(5 * CAP) {
            d.pop_front();
        }
        let before = d.chunk_count();
        d.shrink_to_fit();
        assert!(d.chunk_count() < before);
        assert_eq!(d.chunk_count(), (5 * CAP + 1).div_ceil(CAP));
        assert_eq!(d.len(), 5 * CAP);
        assert!(d.iter().copied().eq((5 * CAP as i32)..(10 * CAP as i32)));
        d.check_invariants();

        // Deques whose used window is at or below the padding floor are
        // left alone.
        let mut small: ChunkedDeque<i32> = (0..3).collect();
        small.shrink_to_fit();
        assert_eq!(small.len(), 3);
        small.check_invariants();
    }

    #[test]
    fn test_deque_reserve_front_and_back() {
        let mut d: ChunkedDeque<i32> = (0..10).collect();
        d.reserve_back(3 * CAP);
        let first = &d[0] as *const i32;
        let capacity = d.capacity();
        for i in 0..(3 * CAP as i32) {
            d.push_back(i);
        }
        assert_eq!(d.capacity(), capacity);
        assert!(core::ptr::eq(&d[0] as *const i32, first));

        d.reserve_front(2 * CAP);
        let capacity = d.capacity();
        for i in 0..(2 * CAP as i32) {
            d.push_front(i);
        }
        assert_eq!(d.capacity(), capacity);
        d.check_invariants();
    }

    #[test]
    fn test_deque_clone_is_independent() {
        let original: ChunkedDeque<i32> = (0..10).collect();
        let mut copy = original.clone();
        copy.push_back(11);
        copy[0] = -5;
        assert_eq!(original.len(), 10);
        assert!(original.iter().copied().eq(0..10));
        assert_eq!(copy.len(), 11);
        assert_eq!(copy[0], -5);
        original.check_invariants();
        copy.check_invariants();
    }

    #[test]
    fn test_deque_clone_preserves_head_offset() {
        let mut d: ChunkedDeque<i32> = (0..(2 * CAP as i32)).collect();
        for _ in 0..7 {
            d.pop_front();
        }
        let copy = d.clone();
        assert_eq!(d, copy);
        let copy2 = copy.clone();
        assert_eq!(copy, copy2);
        copy2.check_invariants();
    }

    #[test]
    fn test_deque_clone_from_reuses_chunks() {
        let source: ChunkedDeque<i32> = (0..50).collect();
        let mut target: ChunkedDeque<i32> = (0..(3 * CAP as i32)).collect();
        let capacity = target.capacity();
        target.clone_from(&source);
        assert_eq!(target, source);
        assert_eq!(target.capacity(), capacity);
        target.check_invariants();

        // Too small to reuse: rebuilt instead.
        let mut tiny: ChunkedDeque<i32> = ChunkedDeque::new();
        let big: ChunkedDeque<i32> = (0..(4 * CAP as i32)).collect();
        tiny.clone_from(&big);
        assert_eq!(tiny, big);
        tiny.check_invariants();
    }

    #[test]
    fn test_deque_assign_semantics() {
        let mut d: ChunkedDeque<i32> = (0..100).collect();
        d.clear();
        d.extend(5..15);
        assert!(d.iter().copied().eq(5..15));
        d.check_invariants();
    }

    #[test]
    fn test_deque_from_elem_and_array() {
        let d = ChunkedDeque::from_elem(9u8, 3000);
        assert_eq!(d.len(), 3000);
        assert!(d.iter().all(|&v| v == 9));
        d.check_invariants();

        let d: ChunkedDeque<i32> = ChunkedDeque::from([1, 2, 3]);
        assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let empty = ChunkedDeque::from_elem(0u64, 0);
        assert!(empty.is_empty());
        empty.check_invariants();
    }

    #[test]
    fn test_deque_comparisons_and_hash() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a: ChunkedDeque<i32> = (0..10).collect();
        let b: ChunkedDeque<i32> = (0..10).collect();
        let c: ChunkedDeque<i32> = (0..11).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
        assert!(c > b);
        assert_eq!(a.cmp(&b), core::cmp::Ordering::Equal);

        let hash = |d: &ChunkedDeque<i32>| {
            let mut h = DefaultHasher::new();
            d.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));

        assert_eq!(format!("{a:?}"), format!("{:?}", (0..10).collect::<Vec<_>>()));
    }

    #[test]
    fn test_deque_custom_allocator_plumbing() {
        // Counts allocations and frees through the allocator seam.
        use allocator_api2::alloc::{AllocError, Layout};
        use core::ptr::NonNull;

        #[derive(Clone)]
        struct Counting {
            count: Rc<Cell<isize>>,
        }

        unsafe impl Allocator for Counting {
            fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
                self.count.set(self.count.get() + 1);
                Global.allocate(layout)
            }

            unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
                self.count.set(self.count.get() - 1);
                Global.deallocate(ptr, layout)
            }
        }

        let count = Rc::new(Cell::new(0));
        {
            let mut d: ChunkedDeque<u64, Counting> =
                ChunkedDeque::new_in(Counting { count: Rc::clone(&count) });
            for i in 0..5000 {
                d.push_back(i);
            }
            assert_eq!(d.allocator().count.get(), count.get());
            assert!(count.get() > 0);
            d.shrink_to_fit();
            d.check_invariants();
            assert_eq!(d.len(), 5000);
        }
        // Every allocation came back through deallocate.
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_deque_drop_accounting() {
        let (live, fuse) = counters();
        {
            let mut d: ChunkedDeque<Tracked> = ChunkedDeque::new();
            for i in 0..50 {
                d.push_back(Tracked::new(i, &live, &fuse));
            }
            assert_eq!(live.get(), 50);
            d.pop_front();
            d.pop_back();
            assert_eq!(live.get(), 48);
            d.remove_range(10..20);
            assert_eq!(live.get(), 38);
            d.truncate(30);
            assert_eq!(live.get(), 30);
            d.remove(5);
            assert_eq!(live.get(), 29);
            let mut iter = d.into_iter();
            iter.next();
            iter.next_back();
            assert_eq!(live.get(), 27);
        }
        assert_eq!(live.get(), 0);

        {
            let mut d: ChunkedDeque<Tracked> = ChunkedDeque::new();
            for i in 0..10 {
                d.push_back(Tracked::new(i, &live, &fuse));
            }
            d.clear();
            assert_eq!(live.get(), 0);
        }
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_deque_from_elem_clone_panic_leaks_nothing() {
        let (live, fuse) = counters();
        fuse.set(10);
        let seed = Tracked::new(7, &live, &fuse);
        let result = catch_unwind(AssertUnwindSafe(|| ChunkedDeque::from_elem(seed, 100)));
        assert!(result.is_err());
        // The ten successful clones and the seed were all dropped during
        // unwinding; nothing observable was constructed.
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_deque_insert_n_clone_panic_leaves_valid_deque() {
        let (live, fuse) = counters();
        let mut d: ChunkedDeque<Tracked> = ChunkedDeque::new();
        for i in 0..20 {
            d.push_back(Tracked::new(i, &live, &fuse));
        }
        let value = Tracked::new(-1, &live, &fuse);
        fuse.set(4);
        let result = catch_unwind(AssertUnwindSafe(|| d.insert_n(10, value, 10)));
        assert!(result.is_err());
        // The four clones that were written stay; the hole was closed.
        d.check_invariants();
        assert_eq!(d.len(), 24);
        let values: Vec<i32> = d.iter().map(|t| t.value).collect();
        let expected: Vec<i32> = (0..10).chain([-1; 4]).chain(10..20).collect();
        assert_eq!(values, expected);
        drop(d);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_deque_clone_panic_leaves_source_intact() {
        let (live, fuse) = counters();
        let mut d: ChunkedDeque<Tracked> = ChunkedDeque::new();
        for i in 0..20 {
            d.push_back(Tracked::new(i, &live, &fuse));
        }
        fuse.set(5);
        let result = catch_unwind(AssertUnwindSafe(|| d.clone()));
        assert!(result.is_err());
        d.check_invariants();
        assert_eq!(d.len(), 20);
        assert_eq!(live.get(), 20);
        assert!(d.iter().map(|t| t.value).eq(0..20));
        drop(d);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_deque_resize_clone_panic_keeps_prefix_valid() {
        let (live, fuse) = counters();
        let mut d: ChunkedDeque<Tracked> = ChunkedDeque::new();
        for i in 0..5 {
            d.push_back(Tracked::new(i, &live, &fuse));
        }
        let value = Tracked::new(-1, &live, &fuse);
        fuse.set(3);
        let result = catch_unwind(AssertUnwindSafe(|| d.resize(50, value)));
        assert!(result.is_err());
        d.check_invariants();
        assert_eq!(d.len(), 8);
        drop(d);
        assert_eq!(live.get(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    enum Op {
        PushBack(i32),
        PushFront(i32),
        PopBack,
        PopFront,
        Insert(usize, i32),
        InsertN(usize, i32, usize),
        Remove(usize),
        RemoveRange(usize, usize),
        Clear,
        ShrinkToFit,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => any::<i32>().prop_map(Op::PushBack),
            8 => any::<i32>().prop_map(Op::PushFront),
            4 => Just(Op::PopBack),
            4 => Just(Op::PopFront),
            3 => (any::<usize>(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (any::<usize>(), any::<i32>(), 0..40usize)
                .prop_map(|(i, v, n)| Op::InsertN(i, v, n)),
            3 => any::<usize>().prop_map(Op::Remove),
            2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::RemoveRange(a, b)),
            1 => Just(Op::Clear),
            1 => Just(Op::ShrinkToFit),
        ]
    }

    proptest! {
        #[test]
        fn test_deque_matches_vecdeque_model(
            ops in proptest::collection::vec(op_strategy(), 1..300)
        ) {
            let mut model: VecDeque<i32> = VecDeque::new();
            let mut deque: ChunkedDeque<i32> = ChunkedDeque::new();
            for op in ops {
                match op {
                    Op::PushBack(v) => {
                        model.push_back(v);
                        deque.push_back(v);
                    }
                    Op::PushFront(v) => {
                        model.push_front(v);
                        deque.push_front(v);
                    }
                    Op::PopBack => prop_assert_eq!(model.pop_back(), deque.pop_back()),
                    Op::PopFront => prop_assert_eq!(model.pop_front(), deque.pop_front()),
                    Op::Insert(i, v) => {
                        let i = i % (model.len() + 1);
                        model.insert(i, v);
                        deque.insert(i, v);
                    }
                    Op::InsertN(i, v, n) => {
                        let i = i % (model.len() + 1);
                        for k in 0..n {
                            model.insert(i + k, v);
                        }
                        deque.insert_n(i, v, n);
                    }
                    Op::Remove(i) => {
                        if model.is_empty() {
                            prop_assert_eq!(deque.remove(i), None);
                        } else {
                            let i = i % model.len();
                            prop_assert_eq!(model.remove(i), deque.remove(i));
                        }
                    }
                    Op::RemoveRange(a, b) => {
                        let len = model.len();
                        let (a, b) = (a % (len + 1), b % (len + 1));
                        let (a, b) = if a <= b { (a, b) } else { (b, a) };
                        model.drain(a..b);
                        deque.remove_range(a..b);
                    }
                    Op::Clear => {
                        model.clear();
                        deque.clear();
                    }
                    Op::ShrinkToFit => deque.shrink_to_fit(),
                }
                prop_assert_eq!(model.len(), deque.len());
            }
            deque.check_invariants();
            prop_assert!(model.iter().eq(deque.iter()));
        }
    }
}
