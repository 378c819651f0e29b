//! Capacity-bounded storage ordered by 16-bit id
//!
//! Every entity of the data model (objects, object instances, resources,
//! resource instances) and the per-server registration handlers live in an
//! [`OrderedStorage`]. Items are kept in strictly ascending id order so
//! iteration, serialization and discovery output are deterministic.
//!
//! Iteration does not use a cursor stored inside the storage. [`OrderedStorage::first`]
//! and [`OrderedStorage::next`] take the last visited id from the caller, and
//! [`OrderedStorage::iter`] borrows, so nested iteration over the same storage is safe.

use crate::error::{Error, Result};

/// Reserved id meaning "unassigned / any / all"
pub const ID_ANY: u16 = u16::MAX;

/// An item addressable by a 16-bit id unique among its siblings
pub trait Identified {
    fn id(&self) -> u16;
}

/// Ordered, optionally capacity-bounded collection keyed by id
///
/// A capacity of 0 means unbounded. A non-zero capacity is a hard cap and the
/// backing memory is reserved up front.
#[derive(Debug, Clone)]
pub struct OrderedStorage<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Default for OrderedStorage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
        }
    }
}

impl<T: Identified> OrderedStorage<T> {
    /// Creates a storage; `capacity > 0` reserves memory for that many items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// The hard cap, 0 when unbounded
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.items.len() >= self.capacity
    }

    fn position(&self, id: u16) -> std::result::Result<usize, usize> {
        self.items.binary_search_by_key(&id, |item| item.id())
    }

    /// Smallest id not currently in use, starting at 0
    pub fn next_free_id(&self) -> Option<u16> {
        let mut candidate: u16 = 0;
        for item in &self.items {
            if item.id() != candidate {
                break;
            }
            candidate = candidate.checked_add(1)?;
        }
        (candidate != ID_ANY).then_some(candidate)
    }

    /// Constructs an item with `build` and inserts it at its sorted position
    ///
    /// `None` assigns the smallest unused id. Fails with `AlreadyExists` when
    /// the id is taken, `OutOfCapacity` at the capacity bound and
    /// `InvalidValue` for the reserved id.
    pub fn create_with<F>(&mut self, id: Option<u16>, build: F) -> Result<&mut T>
    where
        F: FnOnce(u16) -> T,
    {
        let id = match id {
            Some(ID_ANY) => return Err(Error::InvalidValue),
            Some(id) => id,
            None => self.next_free_id().ok_or(Error::OutOfCapacity)?,
        };

        let index = match self.position(id) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(index) => index,
        };

        if self.is_full() {
            return Err(Error::OutOfCapacity);
        }

        let item = build(id);
        debug_assert_eq!(item.id(), id);
        self.items.insert(index, item);
        Ok(&mut self.items[index])
    }

    /// Removes and returns the item with `id`
    pub fn delete(&mut self, id: u16) -> Result<T> {
        match self.position(id) {
            Ok(index) => Ok(self.items.remove(index)),
            Err(_) => Err(Error::NotFound),
        }
    }

    /// Removes every item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keeps only the items matching `keep`
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    pub fn contains(&self, id: u16) -> bool {
        self.position(id).is_ok()
    }

    pub fn get(&self, id: u16) -> Option<&T> {
        self.position(id).ok().map(|index| &self.items[index])
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        match self.position(id) {
            Ok(index) => Some(&mut self.items[index]),
            Err(_) => None,
        }
    }

    /// Item with the lowest id
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Item with the lowest id strictly greater than `after`
    pub fn next(&self, after: u16) -> Option<&T> {
        let index = match self.position(after) {
            Ok(index) => index + 1,
            Err(index) => index,
        };
        self.items.get(index)
    }

    /// Ascending-id iterator
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Ascending-id mutable iterator
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.items.iter().map(|item| item.id())
    }
}

impl<'a, T> IntoIterator for &'a OrderedStorage<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u16,
        tag: &'static str,
    }

    impl Identified for Item {
        fn id(&self) -> u16 {
            self.id
        }
    }

    fn item(tag: &'static str) -> impl FnOnce(u16) -> Item {
        move |id| Item { id, tag }
    }

    fn collect_with_cursor(storage: &OrderedStorage<Item>) -> Vec<u16> {
        let mut ids = Vec::new();
        let mut cursor = storage.first();
        while let Some(current) = cursor {
            ids.push(current.id);
            cursor = storage.next(current.id);
        }
        ids
    }

    #[test]
    fn test_ascending_order_regardless_of_insertion_order() {
        let mut storage = OrderedStorage::new(0);
        for id in [7u16, 2, 9, 0, 5] {
            storage.create_with(Some(id), item("x")).unwrap();
        }

        assert_eq!(collect_with_cursor(&storage), vec![0, 2, 5, 7, 9]);
        assert_eq!(storage.ids().collect::<Vec<_>>(), vec![0, 2, 5, 7, 9]);
    }

    #[test]
    fn test_auto_id_fills_gaps_first() {
        let mut storage = OrderedStorage::new(0);
        for _ in 0..4 {
            storage.create_with(None, item("auto")).unwrap();
        }
        assert_eq!(storage.ids().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        storage.delete(1).unwrap();
        storage.delete(2).unwrap();

        assert_eq!(storage.create_with(None, item("a")).unwrap().id, 1);
        assert_eq!(storage.create_with(None, item("b")).unwrap().id, 2);
        assert_eq!(storage.create_with(None, item("c")).unwrap().id, 4);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut storage = OrderedStorage::new(0);
        storage.create_with(Some(3), item("first")).unwrap();

        let err = storage.create_with(Some(3), item("second")).unwrap_err();
        assert_eq!(err, Error::AlreadyExists);
        assert_eq!(storage.get(3).unwrap().tag, "first");
    }

    #[test]
    fn test_capacity_is_a_hard_cap() {
        let mut storage = OrderedStorage::new(2);
        storage.create_with(None, item("a")).unwrap();
        storage.create_with(None, item("b")).unwrap();

        assert!(storage.is_full());
        assert_eq!(
            storage.create_with(Some(10), item("c")).unwrap_err(),
            Error::OutOfCapacity
        );
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_reserved_id_rejected() {
        let mut storage = OrderedStorage::new(0);
        assert_eq!(
            storage.create_with(Some(ID_ANY), item("x")).unwrap_err(),
            Error::InvalidValue
        );
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut storage: OrderedStorage<Item> = OrderedStorage::new(0);
        assert_eq!(storage.delete(4).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn test_next_after_missing_id() {
        let mut storage = OrderedStorage::new(0);
        storage.create_with(Some(2), item("a")).unwrap();
        storage.create_with(Some(6), item("b")).unwrap();

        assert_eq!(storage.next(3).map(|i| i.id), Some(6));
        assert_eq!(storage.next(6), None);
    }

    #[test]
    fn test_nested_iteration() {
        let mut storage = OrderedStorage::new(0);
        for id in 0..3 {
            storage.create_with(Some(id), item("x")).unwrap();
        }

        let mut pairs = 0;
        for outer in &storage {
            for inner in &storage {
                if outer.id < inner.id {
                    pairs += 1;
                }
            }
        }
        assert_eq!(pairs, 3);
    }
}
