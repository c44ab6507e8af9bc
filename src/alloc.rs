//! Per-shape store factories.
//!
//! An allocator is bound to one store shape and also carries the shape's
//! acceptance predicate and default value. Generalisation queries on
//! stores answer with an allocator, so callers can produce a widened
//! buffer without ever matching on shapes themselves.

use crate::store::{ArrayStore, StoreTag};
use crate::value::Value;

/// A factory bound to one store shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreAllocator(StoreTag);

impl StoreAllocator {
    /// The allocator of the empty sentinel.
    pub const EMPTY: StoreAllocator = StoreAllocator(StoreTag::Empty);
    /// The allocator of int stores.
    pub const INT: StoreAllocator = StoreAllocator(StoreTag::Int);
    /// The allocator of long stores.
    pub const LONG: StoreAllocator = StoreAllocator(StoreTag::Long);
    /// The allocator of double stores.
    pub const DOUBLE: StoreAllocator = StoreAllocator(StoreTag::Double);
    /// The allocator of boxed stores.
    pub const OBJECT: StoreAllocator = StoreAllocator(StoreTag::Object);

    /// The allocator producing stores of `tag`'s shape.
    pub fn for_tag(tag: StoreTag) -> StoreAllocator {
        StoreAllocator(tag)
    }

    /// The shape this allocator produces.
    pub fn tag(self) -> StoreTag {
        self.0
    }

    /// Returns a fresh store of this shape with `capacity` default-valued
    /// slots and logical length 0.
    ///
    /// # Panics
    ///
    /// The empty allocator only produces the sentinel; asking it for a
    /// non-zero capacity is a caller bug.
    pub fn allocate(self, capacity: usize) -> ArrayStore {
        match self.0 {
            StoreTag::Empty => {
                assert!(capacity == 0, "the empty allocator cannot allocate {capacity} slots");
                ArrayStore::Empty
            }
            StoreTag::Int => ArrayStore::from(vec![0i32; capacity]),
            StoreTag::Long => ArrayStore::from(vec![0i64; capacity]),
            StoreTag::Double => ArrayStore::from(vec![0.0f64; capacity]),
            StoreTag::Object => ArrayStore::from(vec![Value::Nil; capacity]),
        }
    }

    /// Returns whether `value` can be inserted into this shape without
    /// widening. The empty sentinel accepts nothing.
    pub fn accepts(self, value: &Value) -> bool {
        match (self.0, value) {
            (StoreTag::Int, Value::Int(_)) => true,
            (StoreTag::Long, Value::Int(_) | Value::Long(_)) => true,
            (StoreTag::Double, Value::Double(_)) => true,
            (StoreTag::Object, _) => true,
            _ => false,
        }
    }

    /// Returns whether a fresh site observing only `value` would commit
    /// to exactly this shape.
    pub fn specializes_for(self, value: &Value) -> bool {
        match (self.0, value) {
            (StoreTag::Int, Value::Int(_)) => true,
            (StoreTag::Long, Value::Long(_)) => true,
            (StoreTag::Double, Value::Double(_)) => true,
            (StoreTag::Object, value) => StoreTag::for_value(value) == StoreTag::Object,
            _ => false,
        }
    }

    /// Returns whether `value` equals the shape's zero, the content of
    /// freshly allocated slots.
    pub fn is_default_value(self, value: &Value) -> bool {
        match (self.0, value) {
            (StoreTag::Int, Value::Int(0)) => true,
            (StoreTag::Long, Value::Long(0)) => true,
            (StoreTag::Double, Value::Double(value)) => *value == 0.0,
            (StoreTag::Object | StoreTag::Empty, Value::Nil) => true,
            _ => false,
        }
    }
}
