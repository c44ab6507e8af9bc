//! The finished array object and the allocation seam above it.
//!
//! The engine itself never creates user-visible arrays: finalisation
//! hands a store plus a logical length to an [`ArrayFactory`], the host
//! runtime's object allocator. [`VArray`] is the minimal wrapper this
//! crate ships so construction is testable end to end.

use crate::store::{ArrayStore, StoreIter};
use crate::value::Value;

/// A finished, user-visible array: a store and its logical length.
///
/// The store shape is fixed for the array's lifetime; the builder hands
/// off ownership at finalisation and never touches it again.
#[derive(Clone, Debug, PartialEq)]
pub struct VArray {
    store: ArrayStore,
    len: usize,
}

impl VArray {
    /// Wraps a store and length into a finished array.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the store's capacity.
    pub fn new(store: ArrayStore, len: usize) -> Self {
        assert!(
            len <= store.capacity(),
            "array length {} exceeds {} store capacity {}",
            len,
            store.tag(),
            store.capacity()
        );
        VArray { store, len }
    }

    /// The logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing store.
    pub fn store(&self) -> &ArrayStore {
        &self.store
    }

    /// Reads one element, boxing primitive slots.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range.
    pub fn read(&self, index: usize) -> Value {
        assert!(index < self.len, "index {} out of range for array of length {}", index, self.len);
        self.store.read(index)
    }

    /// Iterates the elements as boxed values.
    pub fn iter(&self) -> StoreIter<'_> {
        self.store.iterate(0, self.len)
    }

    /// Flat boxed copy of the elements, for host interop.
    pub fn to_vec(&self) -> Vec<Value> {
        self.store.to_vec(self.len)
    }

    /// Releases the store and length back to the caller.
    pub fn into_parts(self) -> (ArrayStore, usize) {
        (self.store, self.len)
    }
}

impl<'a> IntoIterator for &'a VArray {
    type Item = Value;
    type IntoIter = StoreIter<'a>;

    fn into_iter(self) -> StoreIter<'a> {
        self.iter()
    }
}

/// The host runtime's array allocator, as consumed by literal sites.
///
/// Given a finished store and its length, produces whatever the host
/// considers an array object.
pub trait ArrayFactory {
    /// The host's array object.
    type Output;

    /// Wraps a finished store and logical length into an array object.
    fn allocate(&mut self, store: ArrayStore, len: usize) -> Self::Output;
}

/// The in-crate factory producing [`VArray`] values.
#[derive(Copy, Clone, Debug, Default)]
pub struct VArrayFactory;

impl ArrayFactory for VArrayFactory {
    type Output = VArray;

    fn allocate(&mut self, store: ArrayStore, len: usize) -> VArray {
        VArray::new(store, len)
    }
}
