//! Map and chunk memory management for [`ChunkedDeque`].
//!
//! The map is a single allocation of `map_len + 2` pointer slots with a
//! null sentinel at each end, so cursor hops can always read the
//! neighboring slot. Chunks are independent fixed-size allocations indexed
//! by the map; ghost chunks (allocated but element-free) are kept on both
//! sides of the used window to absorb oscillating end operations.

use core::alloc::Layout;
use core::cmp;
use core::mem;
use core::ptr;
use std::alloc::handle_alloc_error;

use allocator_api2::alloc::Allocator;

use super::cursor::{Cursor, MAP_PADDING};
use super::ChunkedDeque;

pub(crate) fn capacity_overflow() -> ! {
    panic!("capacity overflow in ChunkedDeque");
}

// --- Bulk slot primitives ---

/// Bitwise-moves `[first, last)` to the region beginning at `dest`, one
/// chunk segment at a time. The destination region must already be backed
/// by allocated chunks. Safe for overlapping regions as long as `dest`
/// does not start after `first` (a move to the left).
///
/// # Safety
/// Both ranges must lie within allocated chunks of the same map, and the
/// source slots must hold valid values. Source slots become logically
/// uninitialized.
pub(crate) unsafe fn move_range<T>(mut first: Cursor<T>, last: Cursor<T>, mut dest: Cursor<T>) {
    let mut remaining = last.distance_from(&first) as usize;
    while remaining > 0 {
        if first.inner == first.chunk_end {
            first.to_next_chunk();
        }
        if dest.inner == dest.chunk_end {
            dest.to_next_chunk();
        }
        let src_room = first.chunk_end.offset_from(first.inner) as usize;
        let dst_room = dest.chunk_end.offset_from(dest.inner) as usize;
        let n = cmp::min(remaining, cmp::min(src_room, dst_room));
        ptr::copy(first.inner, dest.inner, n);
        first.inner = first.inner.add(n);
        dest.inner = dest.inner.add(n);
        remaining -= n;
    }
}

/// Bitwise-moves `[first, last)` so it ends at `dest_last`, walking
/// backward. Safe for overlapping regions as long as the destination does
/// not end before the source (a move to the right).
///
/// # Safety
/// Same contract as [`move_range`].
pub(crate) unsafe fn move_range_backward<T>(
    first: Cursor<T>,
    mut last: Cursor<T>,
    mut dest_last: Cursor<T>,
) {
    let mut remaining = last.distance_from(&first) as usize;
    while remaining > 0 {
        if last.inner == last.chunk_begin {
            last.to_prev_chunk();
            last.inner = last.chunk_end;
        }
        if dest_last.inner == dest_last.chunk_begin {
            dest_last.to_prev_chunk();
            dest_last.inner = dest_last.chunk_end;
        }
        let src_room = last.inner.offset_from(last.chunk_begin) as usize;
        let dst_room = dest_last.inner.offset_from(dest_last.chunk_begin) as usize;
        let n = cmp::min(remaining, cmp::min(src_room, dst_room));
        ptr::copy(last.inner.sub(n), dest_last.inner.sub(n), n);
        last.inner = last.inner.sub(n);
        dest_last.inner = dest_last.inner.sub(n);
        remaining -= n;
    }
}

/// Drops every element in `[first, last)` chunk slice by chunk slice.
///
/// If an element drop unwinds, the remaining chunks are still dropped
/// before the panic continues, so the caller can treat the whole range as
/// logically uninitialized afterwards either way.
///
/// # Safety
/// The range must consist of initialized slots in allocated chunks.
pub(crate) unsafe fn drop_range<T>(first: Cursor<T>, last: Cursor<T>) {
    struct RangeDropper<T> {
        cur: Cursor<T>,
        remaining: usize,
    }

    impl<T> RangeDropper<T> {
        unsafe fn run(&mut self) {
            while self.remaining > 0 {
                if self.cur.inner == self.cur.chunk_end {
                    self.cur.to_next_chunk();
                }
                let room = self.cur.chunk_end.offset_from(self.cur.inner) as usize;
                let n = cmp::min(room, self.remaining);
                let slice = ptr::slice_from_raw_parts_mut(self.cur.inner, n);
                // State first, so an unwinding drop skips the slice the
                // slice glue already handled.
                self.cur.inner = self.cur.inner.add(n);
                self.remaining -= n;
                ptr::drop_in_place(slice);
            }
        }
    }

    impl<T> Drop for RangeDropper<T> {
        fn drop(&mut self) {
            unsafe { self.run() };
        }
    }

    let mut dropper = RangeDropper {
        remaining: last.distance_from(&first) as usize,
        cur: first,
    };
    dropper.run();
    mem::forget(dropper);
}

// --- Allocation plumbing ---

impl<T, A: Allocator> ChunkedDeque<T, A> {
    fn chunk_layout() -> Layout {
        match Layout::array::<T>(Cursor::<T>::CAP) {
            Ok(layout) => layout,
            Err(_) => capacity_overflow(),
        }
    }

    fn map_layout(slots: usize) -> Layout {
        let with_sentinels = match slots.checked_add(2) {
            Some(n) => n,
            None => capacity_overflow(),
        };
        match Layout::array::<*mut T>(with_sentinels) {
            Ok(layout) => layout,
            Err(_) => capacity_overflow(),
        }
    }

    pub(crate) fn allocate_chunk_in(alloc: &A) -> *mut T {
        let layout = Self::chunk_layout();
        match alloc.allocate(layout) {
            Ok(block) => block.cast::<T>().as_ptr(),
            Err(_) => handle_alloc_error(layout),
        }
    }

    /// # Safety
    /// `chunk` must have been returned by [`Self::allocate_chunk_in`] with
    /// the same allocator.
    pub(crate) unsafe fn deallocate_chunk_in(alloc: &A, chunk: *mut T) {
        alloc.deallocate(
            ptr::NonNull::new_unchecked(chunk).cast(),
            Self::chunk_layout(),
        );
    }

    /// Allocates a zeroed map of `slots + 2` pointer slots and returns the
    /// first non-sentinel slot. Null chunk pointers are the all-zero bit
    /// pattern, so the fresh map is entirely sentinels.
    pub(crate) fn allocate_map_in(alloc: &A, slots: usize) -> *mut *mut T {
        let layout = Self::map_layout(slots);
        match alloc.allocate_zeroed(layout) {
            Ok(block) => unsafe { block.cast::<*mut T>().as_ptr().add(1) },
            Err(_) => handle_alloc_error(layout),
        }
    }

    /// # Safety
    /// `map` must have come from [`Self::allocate_map_in`] with the same
    /// allocator and `slots`.
    pub(crate) unsafe fn deallocate_map_in(alloc: &A, map: *mut *mut T, slots: usize) {
        alloc.deallocate(
            ptr::NonNull::new_unchecked(map.sub(1)).cast(),
            Self::map_layout(slots),
        );
    }

    /// Builds a deque skeleton with chunk capacity for `slots + 1` element
    /// slots (the extra slot keeps the end cursor on an allocated chunk),
    /// the active chunks at the map center, and no elements.
    pub(crate) fn with_slots_in(slots: usize, alloc: A) -> Self {
        const {
            assert!(
                mem::size_of::<T>() != 0,
                "ChunkedDeque does not support zero-sized element types"
            );
        }

        struct Skeleton<'a, T, A: Allocator> {
            alloc: &'a A,
            map: *mut *mut T,
            map_len: usize,
            begin_chunk: *mut *mut T,
            end_chunk: *mut *mut T,
        }

        impl<T, A: Allocator> Drop for Skeleton<'_, T, A> {
            fn drop(&mut self) {
                unsafe {
                    let mut p = self.begin_chunk;
                    while p != self.end_chunk {
                        ChunkedDeque::<T, A>::deallocate_chunk_in(self.alloc, *p);
                        p = p.add(1);
                    }
                    ChunkedDeque::<T, A>::deallocate_map_in(self.alloc, self.map, self.map_len);
                }
            }
        }

        let cap = Cursor::<T>::CAP;
        let body = match slots.checked_add(cap) {
            Some(n) => n / cap,
            None => capacity_overflow(),
        };
        let map_len = MAP_PADDING + body;
        let map = Self::allocate_map_in(&alloc, map_len);
        unsafe {
            let begin = map.add(MAP_PADDING / 2);
            let mut sk = Skeleton {
                alloc: &alloc,
                map,
                map_len,
                begin_chunk: begin,
                end_chunk: begin,
            };
            let mut remain = slots + 1;
            while remain > 0 {
                let chunk = Self::allocate_chunk_in(sk.alloc);
                *sk.end_chunk = chunk;
                sk.end_chunk = sk.end_chunk.add(1);
                remain -= cmp::min(cap, remain);
            }
            let head = Cursor::at_chunk_start(begin);
            let (map, map_len, begin_chunk, end_chunk) =
                (sk.map, sk.map_len, sk.begin_chunk, sk.end_chunk);
            mem::forget(sk);
            ChunkedDeque {
                map,
                map_len,
                begin_chunk,
                end_chunk,
                head,
                tail: head,
                alloc,
                marker: core::marker::PhantomData,
            }
        }
    }
}

// --- Growth: make room at an end ---

impl<T, A: Allocator> ChunkedDeque<T, A> {
    pub(crate) fn map_end(&self) -> *mut *mut T {
        unsafe { self.map.add(self.map_len) }
    }

    /// Guarantees at least `n` free element slots before the first
    /// element, allocating front chunks or making map room. No element is
    /// moved; only chunk pointers may shuffle.
    pub(crate) unsafe fn ensure_front_slots(&mut self, n: usize) {
        let cap = Cursor::<T>::CAP;
        let head_off = self.head.offset_in_chunk();
        let free_front = self.head.outer.offset_from(self.map) as usize * cap + head_off;
        if free_front < n {
            self.make_room(true, (n - head_off).div_ceil(cap));
        } else {
            let delta = (head_off as isize - n as isize).div_euclid(cap as isize);
            let fill_start = self.head.outer.offset(delta);
            while self.begin_chunk > fill_start {
                let chunk = Self::allocate_chunk_in(&self.alloc);
                self.begin_chunk = self.begin_chunk.sub(1);
                *self.begin_chunk = chunk;
            }
        }
    }

    /// Guarantees `n` free element slots after the last element, plus an
    /// allocated landing chunk for the end cursor once it has advanced by
    /// `n`. No element is moved.
    pub(crate) unsafe fn ensure_back_slots(&mut self, n: usize) {
        let cap = Cursor::<T>::CAP;
        let tail_slot = self.tail.outer.offset_from(self.map) as usize * cap
            + self.tail.offset_in_chunk();
        let free_back = self.map_len * cap - tail_slot;
        let landing_idx = match tail_slot.checked_add(n) {
            Some(s) => s / cap + 1,
            None => capacity_overflow(),
        };
        if free_back <= n {
            let eic_idx = self.tail.outer.offset_from(self.map) as usize + 1;
            self.make_room(false, landing_idx - eic_idx);
        } else {
            let fill_end = self.map.add(landing_idx);
            while self.end_chunk < fill_end {
                let chunk = Self::allocate_chunk_in(&self.alloc);
                *self.end_chunk = chunk;
                self.end_chunk = self.end_chunk.add(1);
            }
        }
    }

    /// Makes `new_chunks` allocated chunks available on one side of the
    /// used window, rearranging within the current map when the active set
    /// would still fit in a third of it, reallocating the map otherwise.
    pub(crate) unsafe fn make_room(&mut self, front: bool, new_chunks: usize) {
        let used = self.tail.outer.offset_from(self.head.outer) as usize + 1;
        let active = used + new_chunks;
        if active <= self.map_len / 3 {
            self.rearrange(front, new_chunks);
        } else {
            self.reallocate(front, new_chunks);
        }
    }

    /// Pointer-shuffle growth: translates the used window toward the map
    /// center, compacts the ghost chunk pointers against it, satisfies the
    /// demand side, and leaves the surplus ghosts balanced within one.
    /// Element addresses never change; cursors only change their `outer`
    /// slot.
    unsafe fn rearrange(&mut self, front: bool, new_chunks: usize) {
        let bic = self.head.outer;
        let used = self.tail.outer.offset_from(bic) as usize + 1;
        let (front_demand, back_demand) = if front { (new_chunks, 0) } else { (0, new_chunks) };
        let active = used + new_chunks;
        let new_bic = self.map.add((self.map_len - active) / 2 + front_demand);
        let tail_delta = self.tail.outer.offset_from(bic);

        // Translate the window with direction-aware swaps so overlapping
        // source and target keep every displaced ghost pointer intact.
        if new_bic < bic {
            for i in 0..used {
                ptr::swap(new_bic.add(i), bic.add(i));
            }
        } else if new_bic > bic {
            for i in (0..used).rev() {
                ptr::swap(new_bic.add(i), bic.add(i));
            }
        }
        self.head.outer = new_bic;
        self.tail.outer = new_bic.offset(tail_delta);
        let new_eic = new_bic.add(used);

        // Compact scattered ghost pointers into two runs flush against the
        // window.
        let mut ghosts_front = 0usize;
        let mut dst = new_bic;
        let mut p = new_bic;
        while p != self.map {
            p = p.sub(1);
            let chunk = *p;
            if !chunk.is_null() {
                dst = dst.sub(1);
                if dst != p {
                    *dst = chunk;
                    *p = ptr::null_mut();
                }
                ghosts_front += 1;
            }
        }
        let mut ghosts_back = 0usize;
        let map_end = self.map_end();
        let mut dst = new_eic;
        let mut p = new_eic;
        while p != map_end {
            let chunk = *p;
            if !chunk.is_null() {
                if dst != p {
                    *dst = chunk;
                    *p = ptr::null_mut();
                }
                dst = dst.add(1);
                ghosts_back += 1;
            }
            p = p.add(1);
        }
        self.begin_chunk = new_bic.sub(ghosts_front);
        self.end_chunk = new_eic.add(ghosts_back);

        // Satisfy the demand side, stealing the other side's surplus
        // before allocating fresh chunks. begin/end_chunk track every step
        // so the structure stays coherent if an allocation unwinds.
        while ghosts_front < front_demand {
            let chunk = if ghosts_back > back_demand {
                self.end_chunk = self.end_chunk.sub(1);
                let chunk = *self.end_chunk;
                *self.end_chunk = ptr::null_mut();
                ghosts_back -= 1;
                chunk
            } else {
                Self::allocate_chunk_in(&self.alloc)
            };
            self.begin_chunk = self.begin_chunk.sub(1);
            *self.begin_chunk = chunk;
            ghosts_front += 1;
        }
        while ghosts_back < back_demand {
            let chunk = if ghosts_front > front_demand {
                let chunk = *self.begin_chunk;
                *self.begin_chunk = ptr::null_mut();
                self.begin_chunk = self.begin_chunk.add(1);
                ghosts_front -= 1;
                chunk
            } else {
                Self::allocate_chunk_in(&self.alloc)
            };
            *self.end_chunk = chunk;
            self.end_chunk = self.end_chunk.add(1);
            ghosts_back += 1;
        }

        // Center the surplus. Flooring the front target keeps both runs in
        // bounds when the leftover map space is odd.
        let surplus = ghosts_front + ghosts_back - front_demand - back_demand;
        let target_front = front_demand + surplus / 2;
        while ghosts_front > target_front {
            let chunk = *self.begin_chunk;
            *self.begin_chunk = ptr::null_mut();
            self.begin_chunk = self.begin_chunk.add(1);
            ghosts_front -= 1;
            *self.end_chunk = chunk;
            self.end_chunk = self.end_chunk.add(1);
            ghosts_back += 1;
        }
        while ghosts_front < target_front {
            self.end_chunk = self.end_chunk.sub(1);
            let chunk = *self.end_chunk;
            *self.end_chunk = ptr::null_mut();
            ghosts_back -= 1;
            self.begin_chunk = self.begin_chunk.sub(1);
            *self.begin_chunk = chunk;
            ghosts_front += 1;
        }
    }

    /// Map-reallocation growth: a fresh map of three times the active
    /// size, the window copied beside the demand region, old ghost chunks
    /// reused before anything new is allocated, surplus centered. Until
    /// the final commit the old map and chunks are untouched, so an
    /// unwinding allocation leaves the deque exactly as it was.
    unsafe fn reallocate(&mut self, front: bool, new_chunks: usize) {
        struct Fresh<'a, T, A: Allocator> {
            alloc: &'a A,
            map: *mut *mut T,
            map_len: usize,
            chunks: *mut *mut T,
            chunks_end: *mut *mut T,
        }

        impl<T, A: Allocator> Drop for Fresh<'_, T, A> {
            fn drop(&mut self) {
                unsafe {
                    let mut p = self.chunks;
                    while p != self.chunks_end {
                        ChunkedDeque::<T, A>::deallocate_chunk_in(self.alloc, *p);
                        p = p.add(1);
                    }
                    ChunkedDeque::<T, A>::deallocate_map_in(self.alloc, self.map, self.map_len);
                }
            }
        }

        let bic = self.head.outer;
        let eic = self.tail.outer.add(1);
        let used = eic.offset_from(bic) as usize;
        let (front_demand, back_demand) = if front { (new_chunks, 0) } else { (0, new_chunks) };
        let active = used + new_chunks;
        let new_map_len = match active.checked_mul(3) {
            Some(n) => n,
            None => capacity_overflow(),
        };
        let new_map = Self::allocate_map_in(&self.alloc, new_map_len);
        let new_bic = new_map.add(active + front_demand);
        let new_eic = new_bic.add(used);
        let mut fresh = Fresh {
            alloc: &self.alloc,
            map: new_map,
            map_len: new_map_len,
            chunks: new_map,
            chunks_end: new_map,
        };
        ptr::copy_nonoverlapping(bic, new_bic, used);

        // Final ghost distribution: the demand comes first, the surplus is
        // split evenly. Old ghosts cover as much of it as they can.
        let old_gf = bic.offset_from(self.begin_chunk) as usize;
        let old_gb = self.end_chunk.offset_from(eic) as usize;
        let surplus = (old_gf + old_gb).saturating_sub(new_chunks);
        let ghosts_front = front_demand + surplus / 2;
        let ghosts_back = back_demand + (surplus - surplus / 2);
        let new_begin_chunk = new_bic.sub(ghosts_front);
        let new_end_chunk = new_eic.add(ghosts_back);

        let mut src_front = self.begin_chunk;
        let mut src_back = eic;
        let mut refill = |fresh: &mut Fresh<'_, T, A>, slot: *mut *mut T| {
            let chunk = if src_front != bic {
                let chunk = *src_front;
                src_front = src_front.add(1);
                chunk
            } else if src_back != self.end_chunk {
                let chunk = *src_back;
                src_back = src_back.add(1);
                chunk
            } else {
                // Fresh chunks form one contiguous run: they are only
                // needed once both old ghost runs are dry, and the guard
                // must free exactly them (reused chunks still belong to
                // the intact old map).
                let chunk = Self::allocate_chunk_in(fresh.alloc);
                if fresh.chunks == fresh.chunks_end {
                    fresh.chunks = slot;
                }
                fresh.chunks_end = slot.add(1);
                chunk
            };
            *slot = chunk;
        };
        let mut slot = new_begin_chunk;
        while slot != new_bic {
            refill(&mut fresh, slot);
            slot = slot.add(1);
        }
        let mut slot = new_eic;
        while slot != new_end_chunk {
            refill(&mut fresh, slot);
            slot = slot.add(1);
        }

        // Every allocation succeeded; commit and retire the old map.
        mem::forget(fresh);
        let tail_delta = self.tail.outer.offset_from(bic);
        Self::deallocate_map_in(&self.alloc, self.map, self.map_len);
        self.map = new_map;
        self.map_len = new_map_len;
        self.begin_chunk = new_begin_chunk;
        self.end_chunk = new_end_chunk;
        self.head.outer = new_bic;
        self.tail.outer = new_bic.offset(tail_delta);
    }
}
