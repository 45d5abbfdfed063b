//! Ascending list of expiration records for idle-connection timeouts.
//!
//! Records live in an arena and are linked by index in both directions, so
//! unlinking is O(1) and a handle to a record that already fired or was
//! deleted is detected instead of dereferenced.
//!
//! The list does no locking of its own. Every mutating call takes
//! `&mut self`, so it can only be driven by whoever owns it, normally the
//! reactor thread.

use std::fmt;
use std::time::Instant;

use crate::error::TimerError;
use crate::slab::Slab;

/// Names one record in a [`TimerList`]. Becomes stale once the record fires
/// or is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    index: usize,
    generation: u32,
}

struct Record<U, D> {
    expire: D,
    payload: U,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Timers sorted by absolute deadline `D`, each carrying a caller payload `U`
/// (typically the id of the connection to close).
///
/// Records with equal deadlines keep their insertion order.
///
/// ```
/// use server_core::TimerList;
///
/// let mut timers: TimerList<&str, u64> = TimerList::new();
/// timers.add_timer(300, "c");
/// timers.add_timer(100, "a");
/// timers.add_timer(200, "b");
///
/// let mut closed = Vec::new();
/// timers.tick(250, |_, conn| closed.push(conn));
///
/// assert_eq!(closed, ["a", "b"]);
/// assert_eq!(timers.next_expiry(), Some(300));
/// ```
pub struct TimerList<U, D = Instant> {
    records: Slab<Record<U, D>>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<U, D: Ord + Copy> TimerList<U, D> {
    pub fn new() -> Self {
        TimerList {
            records: Slab::new(),
            head: None,
            tail: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TimerList {
            records: Slab::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Links a new record in deadline order. O(1) when it becomes the new
    /// head, otherwise a forward scan from the head.
    pub fn add_timer(&mut self, expire: D, payload: U) -> TimerHandle {
        let (index, generation) = self.records.insert(Record {
            expire,
            payload,
            prev: None,
            next: None,
        });

        match self.head {
            None => {
                self.head = Some(index);
                self.tail = Some(index);
            }
            Some(head) if expire < self.records[head].expire => {
                self.records[index].next = Some(head);
                self.records[head].prev = Some(index);
                self.head = Some(index);
            }
            Some(head) => self.link_after(index, head),
        }

        TimerHandle { index, generation }
    }

    /// Pushes a record's deadline later and moves it toward the tail, behind
    /// any record that already expires at the new deadline. Re-arming with an
    /// unchanged deadline leaves the record where it is.
    ///
    /// The new position is searched from the record's old successor, never
    /// from the head, which is only valid because the deadline can not move
    /// earlier.
    ///
    /// # Errors
    ///
    /// [`TimerError::StaleHandle`] if the record is gone,
    /// [`TimerError::DeadlineMovedBack`] if `expire` is earlier than the
    /// current deadline. The list is unchanged on error.
    pub fn adjust_timer(&mut self, handle: TimerHandle, expire: D) -> Result<(), TimerError> {
        let index = self.resolve(handle)?;

        let record = &mut self.records[index];
        if expire < record.expire {
            return Err(TimerError::DeadlineMovedBack);
        }
        if expire == record.expire {
            return Ok(());
        }
        record.expire = expire;

        // already last, or still ahead of its successor
        let Some(next) = record.next else {
            return Ok(());
        };
        if expire < self.records[next].expire {
            return Ok(());
        }

        self.unlink(index);
        self.link_after(index, next);
        tracing::debug!(timer = index, "timer moved toward the tail");
        Ok(())
    }

    /// Unlinks and destroys a record, handing back its payload.
    ///
    /// # Errors
    ///
    /// [`TimerError::StaleHandle`] if the record already fired or was deleted.
    pub fn del_timer(&mut self, handle: TimerHandle) -> Result<U, TimerError> {
        let index = self.resolve(handle)?;
        self.unlink(index);
        self.records
            .remove(handle.index, handle.generation)
            .map(|record| record.payload)
            .ok_or(TimerError::StaleHandle(handle))
    }

    /// Expires every record whose deadline is `<= now`, earliest first.
    ///
    /// Each record is unlinked and destroyed before `on_expire` receives its
    /// payload, so the callback may freely add, adjust or delete other records
    /// (its own handle is already stale). The sweep covers only the records
    /// that were due when it started: one the callback deletes or pushes past
    /// `now` is not fired, and one the callback adds waits for the next tick
    /// even if its deadline has already passed. Returns how many records fired.
    pub fn tick<F>(&mut self, now: D, mut on_expire: F) -> usize
    where
        F: FnMut(&mut Self, U),
    {
        let mut due = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let record = &self.records[index];
            if now < record.expire {
                break;
            }
            due.push(TimerHandle {
                index,
                generation: self.records.generation(index),
            });
            cursor = record.next;
        }

        let mut expired = 0;
        for handle in due {
            match self.expire_of(handle) {
                Some(expire) if expire <= now => {}
                _ => continue,
            }
            let Ok(payload) = self.del_timer(handle) else {
                continue;
            };

            expired += 1;
            on_expire(self, payload);
        }

        if expired > 0 {
            tracing::trace!(expired, remaining = self.len(), "timer sweep");
        }
        expired
    }

    /// Deadline of the earliest record, useful as the reactor's poll timeout.
    pub fn next_expiry(&self) -> Option<D> {
        self.head.map(|head| self.records[head].expire)
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    pub fn expire_of(&self, handle: TimerHandle) -> Option<D> {
        self.records
            .get(handle.index, handle.generation)
            .map(|record| record.expire)
    }

    pub fn payload(&self, handle: TimerHandle) -> Option<&U> {
        self.records
            .get(handle.index, handle.generation)
            .map(|record| &record.payload)
    }

    pub fn payload_mut(&mut self, handle: TimerHandle) -> Option<&mut U> {
        self.records
            .get_mut(handle.index, handle.generation)
            .map(|record| &mut record.payload)
    }

    /// Walks the records from earliest to latest deadline.
    pub fn iter(&self) -> Iter<'_, U, D> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn resolve(&self, handle: TimerHandle) -> Result<usize, TimerError> {
        self.records
            .get(handle.index, handle.generation)
            .map(|_| handle.index)
            .ok_or(TimerError::StaleHandle(handle))
    }

    // splice `index` in after `anchor`, before the first later record that expires strictly after it
    fn link_after(&mut self, index: usize, anchor: usize) {
        let expire = self.records[index].expire;

        let mut prev = anchor;
        let mut cursor = self.records[anchor].next;
        while let Some(current) = cursor {
            if expire < self.records[current].expire {
                break;
            }
            prev = current;
            cursor = self.records[current].next;
        }

        self.records[index].prev = Some(prev);
        self.records[index].next = cursor;
        self.records[prev].next = Some(index);
        match cursor {
            Some(next) => self.records[next].prev = Some(index),
            None => self.tail = Some(index),
        }
    }

    fn unlink(&mut self, index: usize) {
        let record = &mut self.records[index];
        let (prev, next) = (record.prev.take(), record.next.take());

        match prev {
            Some(prev) => self.records[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.records[next].prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<U> TimerList<U, Instant> {
    /// [`TimerList::tick`] against the current wall clock.
    pub fn tick_now<F>(&mut self, on_expire: F) -> usize
    where
        F: FnMut(&mut Self, U),
    {
        self.tick(Instant::now(), on_expire)
    }
}

impl<U, D: Ord + Copy> Default for TimerList<U, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, D: Ord + Copy + fmt::Debug> fmt::Debug for TimerList<U, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerList")
            .field("len", &self.len())
            .field("next_expiry", &self.next_expiry())
            .finish()
    }
}

pub struct Iter<'a, U, D> {
    list: &'a TimerList<U, D>,
    cursor: Option<usize>,
}

impl<'a, U, D: Ord + Copy> Iterator for Iter<'a, U, D> {
    type Item = (TimerHandle, D, &'a U);

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let index = self.cursor?;
        let record = &list.records[index];
        self.cursor = record.next;

        let handle = TimerHandle {
            index,
            generation: list.records.generation(index),
        };
        Some((handle, record.expire, &record.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // forward and backward walks agree, deadlines never decrease
    fn assert_well_formed<U, D: Ord + Copy + fmt::Debug>(list: &TimerList<U, D>) {
        let mut forward = Vec::new();
        let mut cursor = list.head;
        let mut prev = None;
        while let Some(index) = cursor {
            assert_eq!(list.records[index].prev, prev);
            forward.push(index);
            prev = cursor;
            cursor = list.records[index].next;
        }
        assert_eq!(list.tail, prev);

        let mut backward = Vec::new();
        let mut cursor = list.tail;
        while let Some(index) = cursor {
            backward.push(index);
            cursor = list.records[index].prev;
        }
        backward.reverse();

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), list.len());
        assert!(
            forward
                .windows(2)
                .all(|w| list.records[w[0]].expire <= list.records[w[1]].expire)
        );
    }

    fn deadlines<U>(list: &TimerList<U, u64>) -> Vec<u64> {
        list.iter().map(|(_, expire, _)| expire).collect()
    }

    #[test]
    fn insert_at_head_middle_and_tail() {
        let mut list = TimerList::new();
        list.add_timer(200, 'b');
        list.add_timer(100, 'a');
        list.add_timer(400, 'd');
        list.add_timer(300, 'c');

        assert_eq!(deadlines(&list), [100, 200, 300, 400]);
        assert_well_formed(&list);
    }

    #[test]
    fn equal_deadlines_keep_insertion_order() {
        let mut list = TimerList::new();
        list.add_timer(100, 1);
        list.add_timer(100, 2);
        list.add_timer(100, 3);

        let payloads: Vec<_> = list.iter().map(|(_, _, p)| *p).collect();
        assert_eq!(payloads, [1, 2, 3]);
    }

    #[test]
    fn adjust_head_and_tail() {
        let mut list = TimerList::new();
        let a = list.add_timer(100, 'a');
        list.add_timer(200, 'b');
        let c = list.add_timer(300, 'c');

        list.adjust_timer(a, 250).unwrap();
        assert_eq!(deadlines(&list), [200, 250, 300]);
        assert_well_formed(&list);

        list.adjust_timer(c, 900).unwrap();
        assert_eq!(deadlines(&list), [200, 250, 900]);
        assert_well_formed(&list);
    }

    #[test]
    fn adjust_that_stays_put() {
        let mut list = TimerList::new();
        let a = list.add_timer(100, 'a');
        list.add_timer(300, 'b');

        list.adjust_timer(a, 150).unwrap();
        assert_eq!(deadlines(&list), [150, 300]);
        assert_eq!(list.expire_of(a), Some(150));
        assert_well_formed(&list);
    }

    #[test]
    fn adjust_earlier_is_rejected() {
        let mut list = TimerList::new();
        let a = list.add_timer(100, 'a');
        list.add_timer(200, 'b');

        assert_eq!(list.adjust_timer(a, 50), Err(TimerError::DeadlineMovedBack));
        assert_eq!(deadlines(&list), [100, 200]);
    }

    #[test]
    fn delete_from_every_position() {
        let mut list = TimerList::new();
        let a = list.add_timer(1, 'a');
        let b = list.add_timer(2, 'b');
        let c = list.add_timer(3, 'c');
        let d = list.add_timer(4, 'd');

        assert_eq!(list.del_timer(b), Ok('b'));
        assert_well_formed(&list);
        assert_eq!(list.del_timer(a), Ok('a'));
        assert_well_formed(&list);
        assert_eq!(list.del_timer(d), Ok('d'));
        assert_well_formed(&list);
        assert_eq!(list.del_timer(c), Ok('c'));
        assert_well_formed(&list);

        assert!(list.is_empty());
        assert_eq!(list.next_expiry(), None);
    }

    #[test]
    fn stale_handles_are_reported() {
        let mut list = TimerList::new();
        let a = list.add_timer(10, 'a');
        list.del_timer(a).unwrap();

        // slot gets reused by the next insert
        let b = list.add_timer(20, 'b');
        assert!(!list.contains(a));
        assert!(list.contains(b));
        assert_eq!(list.del_timer(a), Err(TimerError::StaleHandle(a)));
        assert_eq!(list.adjust_timer(a, 30), Err(TimerError::StaleHandle(a)));
        assert_eq!(list.payload(a), None);
        assert_eq!(list.payload(b), Some(&'b'));
    }

    #[test]
    fn callback_may_delete_other_records() {
        let mut list = TimerList::new();
        list.add_timer(10, None);
        let victim = list.add_timer(500, None);
        list.add_timer(20, Some(victim));

        let mut fired = 0;
        list.tick(100, |list, victim| {
            fired += 1;
            if let Some(victim) = victim {
                list.del_timer(victim).unwrap();
            }
        });

        assert_eq!(fired, 2);
        assert!(list.is_empty());
    }

    #[test]
    fn rearming_at_or_before_now_waits_for_next_tick() {
        let mut list = TimerList::new();
        list.add_timer(10, 'a');
        list.add_timer(20, 'b');

        let mut fired = Vec::new();
        let count = list.tick(50, |list, conn| {
            fired.push(conn);
            list.add_timer(5, conn);
        });

        assert_eq!(count, 2);
        assert_eq!(fired, ['a', 'b']);
        assert_eq!(list.len(), 2);
        assert_well_formed(&list);
        assert_eq!(list.tick(50, |_, _| {}), 2);
    }

    #[test]
    fn callback_pushing_a_due_record_past_now_spares_it() {
        let mut list = TimerList::new();
        let spared = list.add_timer(20, None);
        list.add_timer(10, Some(spared));

        let mut fired = 0;
        list.tick(30, |list, other| {
            fired += 1;
            if let Some(other) = other {
                list.adjust_timer(other, 100).unwrap();
            }
        });

        assert_eq!(fired, 1);
        assert_eq!(list.expire_of(spared), Some(100));
    }

    #[test]
    fn tick_with_nothing_due() {
        let mut list = TimerList::new();
        list.add_timer(100, ());
        assert_eq!(list.tick(99, |_, _| panic!("nothing is due")), 0);
        assert_eq!(list.len(), 1);
    }
}
