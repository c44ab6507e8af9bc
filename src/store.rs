//! The concrete array-store representations.
//!
//! A store is the backing buffer of an array under construction (and of
//! the finished array): a tagged variant over four contiguous buffers plus
//! the shared empty sentinel. Primitive shapes hold their elements
//! unboxed; the `Object` shape boxes every slot. The logical length of an
//! array lives outside the store — a buffer is all capacity, and the
//! owning site decides how much of it is meaningful.
//!
//! Shapes form a generality lattice: `Empty` below everything, `Object`
//! above everything, `Int` below `Long`, and `Double` incomparable with
//! both integer shapes. All specialisation decisions in this crate reduce
//! to least-upper-bound queries on this lattice.

use std::fmt::{self, Debug, Formatter};

use strum::Display;

use crate::alloc::StoreAllocator;
use crate::value::Value;

/// Tag identifying the concrete backing representation of a store.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreTag {
    /// The shared zero-length sentinel.
    Empty = 0,
    /// Contiguous 32-bit signed integers.
    Int = 1,
    /// Contiguous 64-bit signed integers.
    Long = 2,
    /// Contiguous 64-bit floats.
    Double = 3,
    /// Contiguous boxed values.
    Object = 4,
}

impl StoreTag {
    /// Returns whether stores of this shape hold their elements unboxed.
    ///
    /// The empty sentinel counts as primitive.
    pub fn is_primitive(self) -> bool {
        !matches!(self, StoreTag::Object)
    }

    /// The shape a fresh site would pick for a single value of this kind.
    pub fn for_value(value: &Value) -> StoreTag {
        match value {
            Value::Int(_) => StoreTag::Int,
            Value::Long(_) => StoreTag::Long,
            Value::Double(_) => StoreTag::Double,
            _ => StoreTag::Object,
        }
    }

    /// Least shape at or above both operands in the generality lattice.
    pub fn union(self, other: StoreTag) -> StoreTag {
        use StoreTag::*;
        match (self, other) {
            (Empty, tag) | (tag, Empty) => tag,
            (Int, Int) => Int,
            (Int | Long, Int | Long) => Long,
            (Double, Double) => Double,
            _ => Object,
        }
    }

    /// Returns whether this shape accepts everything `other` accepts.
    pub fn generalizes(self, other: StoreTag) -> bool {
        self.union(other) == self
    }
}

/// An array backing buffer in one of the five shapes.
///
/// Stores are write-once within a build: the site that owns one mutates
/// it until finalisation hands it to the finished array, after which it
/// is never written again. Nothing here enforces that discipline; the
/// construction sites do.
#[derive(Clone, PartialEq)]
pub enum ArrayStore {
    /// The shared zero-length sentinel. Reading from it is a caller bug.
    Empty,
    /// Unboxed 32-bit integers.
    Int(Box<[i32]>),
    /// Unboxed 64-bit integers.
    Long(Box<[i64]>),
    /// Unboxed 64-bit floats.
    Double(Box<[f64]>),
    /// Boxed values; unwritten slots hold `Value::Nil`.
    Object(Box<[Value]>),
}

/// Borrowed view of a store's buffer, dispatched by shape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StoreSlice<'a> {
    /// View of the empty sentinel.
    Empty,
    /// View of an int store.
    Int(&'a [i32]),
    /// View of a long store.
    Long(&'a [i64]),
    /// View of a double store.
    Double(&'a [f64]),
    /// View of a boxed store.
    Object(&'a [Value]),
}

impl StoreSlice<'_> {
    /// The shape of the viewed store.
    pub fn tag(&self) -> StoreTag {
        match self {
            StoreSlice::Empty => StoreTag::Empty,
            StoreSlice::Int(_) => StoreTag::Int,
            StoreSlice::Long(_) => StoreTag::Long,
            StoreSlice::Double(_) => StoreTag::Double,
            StoreSlice::Object(_) => StoreTag::Object,
        }
    }

    /// The number of slots in the viewed buffer.
    pub fn len(&self) -> usize {
        match self {
            StoreSlice::Empty => 0,
            StoreSlice::Int(slice) => slice.len(),
            StoreSlice::Long(slice) => slice.len(),
            StoreSlice::Double(slice) => slice.len(),
            StoreSlice::Object(slice) => slice.len(),
        }
    }

    /// Returns `true` if the viewed buffer has no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArrayStore {
    /// The shape of this store.
    pub fn tag(&self) -> StoreTag {
        match self {
            ArrayStore::Empty => StoreTag::Empty,
            ArrayStore::Int(_) => StoreTag::Int,
            ArrayStore::Long(_) => StoreTag::Long,
            ArrayStore::Double(_) => StoreTag::Double,
            ArrayStore::Object(_) => StoreTag::Object,
        }
    }

    /// The buffer size. Zero for the empty sentinel.
    pub fn capacity(&self) -> usize {
        match self {
            ArrayStore::Empty => 0,
            ArrayStore::Int(buffer) => buffer.len(),
            ArrayStore::Long(buffer) => buffer.len(),
            ArrayStore::Double(buffer) => buffer.len(),
            ArrayStore::Object(buffer) => buffer.len(),
        }
    }

    /// Borrows the buffer as a shape-dispatched slice.
    pub fn as_slice(&self) -> StoreSlice<'_> {
        match self {
            ArrayStore::Empty => StoreSlice::Empty,
            ArrayStore::Int(buffer) => StoreSlice::Int(buffer),
            ArrayStore::Long(buffer) => StoreSlice::Long(buffer),
            ArrayStore::Double(buffer) => StoreSlice::Double(buffer),
            ArrayStore::Object(buffer) => StoreSlice::Object(buffer),
        }
    }

    /// Reads one slot, boxing primitive elements.
    ///
    /// # Panics
    ///
    /// Panics on the empty sentinel and on out-of-range indices; both are
    /// caller bugs, not runtime conditions.
    pub fn read(&self, index: usize) -> Value {
        match self {
            ArrayStore::Empty => panic!("read from the empty array store"),
            ArrayStore::Int(buffer) => Value::Int(buffer[index]),
            ArrayStore::Long(buffer) => Value::Long(buffer[index]),
            ArrayStore::Double(buffer) => Value::Double(buffer[index]),
            ArrayStore::Object(buffer) => buffer[index].clone(),
        }
    }

    /// Writes one slot unboxed.
    ///
    /// Precondition: the store's allocator accepts `value`. A `Long`
    /// store takes 32-bit integers with a widening write.
    ///
    /// # Panics
    ///
    /// Panics if the value is incompatible with the shape.
    pub fn write(&mut self, index: usize, value: Value) {
        match (self, value) {
            (ArrayStore::Int(buffer), Value::Int(value)) => buffer[index] = value,
            (ArrayStore::Long(buffer), Value::Long(value)) => buffer[index] = value,
            (ArrayStore::Long(buffer), Value::Int(value)) => buffer[index] = i64::from(value),
            (ArrayStore::Double(buffer), Value::Double(value)) => buffer[index] = value,
            (ArrayStore::Object(buffer), value) => buffer[index] = value,
            (store, value) => {
                panic!("{} store cannot hold a {} value", store.tag(), value.kind())
            }
        }
    }

    /// Returns a boxed buffer of `new_capacity` slots with this store's
    /// contents boxed into the leading slots and `Nil` in the rest.
    pub fn expand(&self, new_capacity: usize) -> Box<[Value]> {
        assert!(
            new_capacity >= self.capacity(),
            "expand to {} slots would drop contents of a {}-slot store",
            new_capacity,
            self.capacity()
        );
        let mut boxed = vec![Value::Nil; new_capacity].into_boxed_slice();
        match self {
            ArrayStore::Empty => {}
            ArrayStore::Int(buffer) => {
                for (slot, value) in boxed.iter_mut().zip(buffer.iter()) {
                    *slot = Value::Int(*value);
                }
            }
            ArrayStore::Long(buffer) => {
                for (slot, value) in boxed.iter_mut().zip(buffer.iter()) {
                    *slot = Value::Long(*value);
                }
            }
            ArrayStore::Double(buffer) => {
                for (slot, value) in boxed.iter_mut().zip(buffer.iter()) {
                    *slot = Value::Double(*value);
                }
            }
            ArrayStore::Object(buffer) => {
                for (slot, value) in boxed.iter_mut().zip(buffer.iter()) {
                    *slot = value.clone();
                }
            }
        }
        boxed
    }

    /// Copies `start..end` out into a fresh store of the same shape.
    ///
    /// On the empty sentinel the only valid range is `0..0`, which
    /// returns the sentinel itself.
    pub fn extract_range(&self, start: usize, end: usize) -> ArrayStore {
        match self {
            ArrayStore::Empty => {
                assert!(start == 0 && end == 0, "range {start}..{end} on the empty array store");
                ArrayStore::Empty
            }
            ArrayStore::Int(buffer) => ArrayStore::from(buffer[start..end].to_vec()),
            ArrayStore::Long(buffer) => ArrayStore::from(buffer[start..end].to_vec()),
            ArrayStore::Double(buffer) => ArrayStore::from(buffer[start..end].to_vec()),
            ArrayStore::Object(buffer) => ArrayStore::from(buffer[start..end].to_vec()),
        }
    }

    /// Boxes `length` slots starting at `start` into a fresh buffer.
    pub fn boxed_copy_of_range(&self, start: usize, length: usize) -> Box<[Value]> {
        if let ArrayStore::Empty = self {
            assert!(start == 0 && length == 0, "range on the empty array store");
            return Vec::new().into_boxed_slice();
        }
        (start..start + length).map(|index| self.read(index)).collect()
    }

    /// Flat boxed copy of the first `length` slots, for host interop.
    pub fn to_vec(&self, length: usize) -> Vec<Value> {
        if let ArrayStore::Empty = self {
            assert!(length == 0, "non-zero copy of the empty array store");
            return Vec::new();
        }
        (0..length).map(|index| self.read(index)).collect()
    }

    /// Bulk-copies `length` slots into `dest`.
    ///
    /// Same-shape copies are contiguous; copies into a wider shape widen
    /// per element (unboxed into `Long`, boxed into `Object`).
    ///
    /// # Panics
    ///
    /// Panics, naming both shapes, when the destination cannot represent
    /// the source elements without narrowing.
    pub fn copy_contents(
        &self,
        src_start: usize,
        dest: &mut ArrayStore,
        dest_start: usize,
        length: usize,
    ) {
        match (self, dest) {
            (ArrayStore::Empty, _) => {
                assert!(src_start == 0 && length == 0, "non-zero copy from the empty array store");
            }
            (ArrayStore::Int(src), ArrayStore::Int(dst)) => {
                dst[dest_start..dest_start + length]
                    .copy_from_slice(&src[src_start..src_start + length]);
            }
            (ArrayStore::Long(src), ArrayStore::Long(dst)) => {
                dst[dest_start..dest_start + length]
                    .copy_from_slice(&src[src_start..src_start + length]);
            }
            (ArrayStore::Double(src), ArrayStore::Double(dst)) => {
                dst[dest_start..dest_start + length]
                    .copy_from_slice(&src[src_start..src_start + length]);
            }
            (ArrayStore::Int(src), ArrayStore::Long(dst)) => {
                for offset in 0..length {
                    dst[dest_start + offset] = i64::from(src[src_start + offset]);
                }
            }
            (src, ArrayStore::Object(dst)) => {
                for offset in 0..length {
                    dst[dest_start + offset] = src.read(src_start + offset);
                }
            }
            (src, dest) => panic!(
                "cannot copy {} store contents into a {} store",
                src.tag(),
                dest.tag()
            ),
        }
    }

    /// Sorts the first `size` slots in place under the shape's natural
    /// comparator. Trivial for the empty sentinel with `size == 0`.
    pub fn sort(&mut self, size: usize) {
        match self {
            ArrayStore::Empty => assert!(size == 0, "non-zero sort of the empty array store"),
            ArrayStore::Int(buffer) => buffer[..size].sort_unstable(),
            ArrayStore::Long(buffer) => buffer[..size].sort_unstable(),
            ArrayStore::Double(buffer) => buffer[..size].sort_unstable_by(f64::total_cmp),
            ArrayStore::Object(buffer) => buffer[..size].sort_by(Value::total_cmp),
        }
    }

    /// Lazily yields `length` boxed values starting at `from`.
    ///
    /// The sequence is finite, single-pass and not restartable.
    pub fn iterate(&self, from: usize, length: usize) -> StoreIter<'_> {
        assert!(
            from + length <= self.capacity(),
            "iterate range {}..{} exceeds {} store capacity {}",
            from,
            from + length,
            self.tag(),
            self.capacity()
        );
        StoreIter { store: self, index: from, end: from + length }
    }

    /// The allocator for the tightest shape accepting both this store's
    /// elements and `value`.
    pub fn generalize_for_value(&self, value: &Value) -> StoreAllocator {
        StoreAllocator::for_tag(self.tag().union(StoreTag::for_value(value)))
    }

    /// The allocator for the tightest shape accepting both this store's
    /// elements and every element of `other`.
    pub fn generalize_for_store(&self, other: &ArrayStore) -> StoreAllocator {
        StoreAllocator::for_tag(self.tag().union(other.tag()))
    }

    /// The allocator producing stores of this shape.
    pub fn allocator(&self) -> StoreAllocator {
        StoreAllocator::for_tag(self.tag())
    }

    /// Reallocates to `new_capacity` slots of the same shape, default
    /// values in the tail. Not meaningful for the empty sentinel, which
    /// has no element type to grow into.
    pub(crate) fn grown(self, new_capacity: usize) -> ArrayStore {
        fn regrow<T: Clone + Default>(buffer: Box<[T]>, new_capacity: usize) -> Box<[T]> {
            let mut buffer = buffer.into_vec();
            buffer.resize(new_capacity, T::default());
            buffer.into_boxed_slice()
        }
        match self {
            ArrayStore::Empty => panic!("the empty array store cannot grow"),
            ArrayStore::Int(buffer) => ArrayStore::Int(regrow(buffer, new_capacity)),
            ArrayStore::Long(buffer) => ArrayStore::Long(regrow(buffer, new_capacity)),
            ArrayStore::Double(buffer) => ArrayStore::Double(regrow(buffer, new_capacity)),
            ArrayStore::Object(buffer) => ArrayStore::Object(regrow(buffer, new_capacity)),
        }
    }
}

impl Debug for ArrayStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ArrayStore::Empty => f.write_str("empty"),
            ArrayStore::Int(buffer) => f.debug_tuple("int").field(buffer).finish(),
            ArrayStore::Long(buffer) => f.debug_tuple("long").field(buffer).finish(),
            ArrayStore::Double(buffer) => f.debug_tuple("double").field(buffer).finish(),
            ArrayStore::Object(buffer) => f.debug_tuple("object").field(buffer).finish(),
        }
    }
}

macro_rules! store_from_impls {
    ($(($ty:ty, $variant:ident)),* $(,)?) => {
        $(impl From<Vec<$ty>> for ArrayStore {
            fn from(buffer: Vec<$ty>) -> Self {
                ArrayStore::$variant(buffer.into_boxed_slice())
            }
        })*
    };
}

store_from_impls!((i32, Int), (i64, Long), (f64, Double), (Value, Object));

/// Iterator over boxed values of a store range.
#[derive(Clone, Debug)]
pub struct StoreIter<'a> {
    store: &'a ArrayStore,
    index: usize,
    end: usize,
}

impl Iterator for StoreIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.index == self.end {
            return None;
        }
        let value = self.store.read(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StoreIter<'_> {}
