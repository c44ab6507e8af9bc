//! The dynamic-arity array builder.
//!
//! A builder is per-call-site state for incremental construction: it
//! begins every first build in a boxed scratch buffer, learns the element
//! type and expected length from what the build pushed, and serves later
//! builds with a pre-sized primitive buffer. The builder never owns the
//! store between calls — every operation takes the current store and
//! logical length from the caller and hands a (possibly different) store
//! back.
//!
//! Each specialised operation re-checks the shape of the store argument
//! before touching it, and boxes locally when the shape is not the one
//! the variant expects. The store is caller-owned and opaque, so the
//! variant's own state is never proof of what it is about to be handed.

use crate::alloc::StoreAllocator;
use crate::array::VArray;
use crate::config::EngineConfig;
use crate::site::Slot;
use crate::store::{ArrayStore, StoreTag};
use crate::value::Value;

/// Sticky screening flags of an uninitialised build. Each starts true
/// and is only ever cleared.
#[derive(Copy, Clone, Debug)]
struct ScreenFlags {
    int: bool,
    long: bool,
    double: bool,
}

impl ScreenFlags {
    fn new() -> Self {
        ScreenFlags { int: true, long: true, double: true }
    }

    /// The builder's screening is strict: no integer-to-float promotion,
    /// unlike literal classification.
    fn screen(&mut self, value: &Value) {
        match value {
            Value::Int(_) => self.double = false,
            Value::Long(_) => {
                self.int = false;
                self.double = false;
            }
            Value::Double(_) => {
                self.int = false;
                self.long = false;
            }
            _ => {
                self.int = false;
                self.long = false;
                self.double = false;
            }
        }
    }
}

/// Which source-store shapes an object-variant builder has appended.
/// Profile state recorded on first encounter of each shape.
#[derive(Copy, Clone, Debug, Default)]
struct SeenStores {
    int: bool,
    long: bool,
    double: bool,
    object: bool,
}

#[derive(Copy, Clone, Debug)]
enum BuilderState {
    Uninitialized { flags: ScreenFlags },
    Int { expected: usize },
    Long { expected: usize },
    Double { expected: usize },
    Object { expected: usize, seen: SeenStores },
}

/// A dynamic-arity construction site.
pub struct ArrayBuilder {
    config: EngineConfig,
    slot: Slot<BuilderState>,
}

impl Default for ArrayBuilder {
    fn default() -> Self {
        ArrayBuilder::new(EngineConfig::default())
    }
}

impl ArrayBuilder {
    /// Creates an uninitialised builder using `config` for buffer sizing.
    pub fn new(config: EngineConfig) -> Self {
        ArrayBuilder {
            config,
            slot: Slot::new(BuilderState::Uninitialized { flags: ScreenFlags::new() }),
        }
    }

    /// How many times this site has replaced its variant.
    pub fn transition_count(&self) -> u32 {
        self.slot.transitions()
    }

    /// Begins a build with no length hint.
    pub fn start(&mut self) -> ArrayStore {
        match *self.slot.get() {
            BuilderState::Uninitialized { .. } => {
                StoreAllocator::OBJECT.allocate(self.config.uninitialized_size)
            }
            BuilderState::Int { expected } => StoreAllocator::INT.allocate(expected),
            BuilderState::Long { expected } => StoreAllocator::LONG.allocate(expected),
            BuilderState::Double { expected } => StoreAllocator::DOUBLE.allocate(expected),
            BuilderState::Object { expected, .. } => StoreAllocator::OBJECT.allocate(expected),
        }
    }

    /// Begins a build that expects `length` elements.
    ///
    /// A specialised site asked for more than its learned expected length
    /// de-specialises rather than failing.
    pub fn start_with(&mut self, length: usize) -> ArrayStore {
        match *self.slot.get() {
            BuilderState::Uninitialized { .. } => StoreAllocator::OBJECT.allocate(length),
            BuilderState::Int { expected } => {
                if length > expected {
                    return self.restart(length);
                }
                StoreAllocator::INT.allocate(expected)
            }
            BuilderState::Long { expected } => {
                if length > expected {
                    return self.restart(length);
                }
                StoreAllocator::LONG.allocate(expected)
            }
            BuilderState::Double { expected } => {
                if length > expected {
                    return self.restart(length);
                }
                StoreAllocator::DOUBLE.allocate(expected)
            }
            BuilderState::Object { expected, .. } => {
                if length > expected {
                    self.slot.replace(BuilderState::Object {
                        expected: length,
                        seen: SeenStores::default(),
                    });
                    return StoreAllocator::OBJECT.allocate(length);
                }
                StoreAllocator::OBJECT.allocate(expected)
            }
        }
    }

    /// Makes room for `length` elements; identity when the store already
    /// has the capacity.
    pub fn ensure(&mut self, store: ArrayStore, length: usize) -> ArrayStore {
        match *self.slot.get() {
            // Appends through the scratch buffer always make space.
            BuilderState::Uninitialized { .. } => store,
            _ if length <= store.capacity() => store,
            BuilderState::Object { .. } => {
                let boxed = store.expand(length);
                self.slot.replace(BuilderState::Object {
                    expected: length,
                    seen: SeenStores::default(),
                });
                ArrayStore::Object(boxed)
            }
            _ => self.ensure_fallback(store, length),
        }
    }

    /// Appends one value at `index`, which the caller has made room for.
    pub fn append_value(&mut self, store: ArrayStore, index: usize, value: Value) -> ArrayStore {
        match *self.slot.get() {
            BuilderState::Uninitialized { .. } => {
                self.append_value_uninitialized(store, index, value)
            }
            BuilderState::Int { expected } => match (store, value) {
                (ArrayStore::Int(mut buffer), Value::Int(value)) => {
                    buffer[index] = value;
                    ArrayStore::Int(buffer)
                }
                (ArrayStore::Int(buffer), Value::Long(value)) => {
                    // An int site meeting a 64-bit integer widens in
                    // place and stays primitive.
                    let mut widened: Box<[i64]> =
                        buffer.iter().map(|&v| i64::from(v)).collect();
                    widened[index] = value;
                    self.slot.replace(BuilderState::Long { expected });
                    ArrayStore::Long(widened)
                }
                (store, value) => self.append_value_fallback(store, index, value, expected),
            },
            BuilderState::Long { expected } => match (store, value) {
                (ArrayStore::Long(mut buffer), Value::Long(value)) => {
                    buffer[index] = value;
                    ArrayStore::Long(buffer)
                }
                (ArrayStore::Long(mut buffer), Value::Int(value)) => {
                    buffer[index] = i64::from(value);
                    ArrayStore::Long(buffer)
                }
                (store, value) => self.append_value_fallback(store, index, value, expected),
            },
            BuilderState::Double { expected } => match (store, value) {
                (ArrayStore::Double(mut buffer), Value::Double(value)) => {
                    buffer[index] = value;
                    ArrayStore::Double(buffer)
                }
                // Strict: integers are not promoted here.
                (store, value) => self.append_value_fallback(store, index, value, expected),
            },
            BuilderState::Object { .. } => {
                let mut boxed = into_boxed(store);
                boxed[index] = value;
                ArrayStore::Object(boxed)
            }
        }
    }

    /// Appends a whole source array starting at `index`, which the caller
    /// has made room for.
    pub fn append_array(&mut self, store: ArrayStore, index: usize, other: &VArray) -> ArrayStore {
        if other.is_empty() {
            return store;
        }
        match *self.slot.get() {
            BuilderState::Uninitialized { .. } => {
                let mut store = store;
                for (offset, value) in other.iter().enumerate() {
                    store = self.append_value(store, index + offset, value);
                }
                store
            }
            BuilderState::Int { expected } => {
                self.append_array_primitive(store, index, other, expected, StoreTag::Int)
            }
            BuilderState::Long { expected } => {
                self.append_array_primitive(store, index, other, expected, StoreTag::Long)
            }
            BuilderState::Double { expected } => {
                self.append_array_primitive(store, index, other, expected, StoreTag::Double)
            }
            BuilderState::Object { .. } => self.append_array_object(store, index, other),
        }
    }

    /// Finishes the build. The store passes through unchanged, except
    /// that an uninitialised build re-packs its scratch into the tightest
    /// shape, and every zero-length build yields the shared sentinel.
    pub fn finish(&mut self, store: ArrayStore, length: usize) -> ArrayStore {
        let store = match *self.slot.get() {
            BuilderState::Uninitialized { flags } => {
                self.finish_uninitialized(store, length, flags)
            }
            _ => store,
        };
        if length == 0 {
            ArrayStore::Empty
        } else {
            store
        }
    }

    fn restart(&mut self, length: usize) -> ArrayStore {
        self.slot.replace(BuilderState::Uninitialized { flags: ScreenFlags::new() });
        self.start_with(length)
    }

    fn append_value_uninitialized(
        &mut self,
        store: ArrayStore,
        index: usize,
        value: Value,
    ) -> ArrayStore {
        if let BuilderState::Uninitialized { flags } = self.slot.get_mut() {
            flags.screen(&value);
        }
        let mut store = ArrayStore::Object(into_boxed(store));
        if index >= store.capacity() {
            let next = self.config.capacity(store.capacity(), index + 1);
            store = store.grown(next);
        }
        store.write(index, value);
        store
    }

    /// The store type cannot be assumed on this slow path, so the whole
    /// store is boxed before the write.
    fn append_value_fallback(
        &mut self,
        store: ArrayStore,
        index: usize,
        value: Value,
        expected: usize,
    ) -> ArrayStore {
        self.slot.replace(BuilderState::Object { expected, seen: SeenStores::default() });
        let mut boxed = into_boxed(store);
        boxed[index] = value;
        ArrayStore::Object(boxed)
    }

    fn ensure_fallback(&mut self, store: ArrayStore, length: usize) -> ArrayStore {
        let boxed = store.expand(length);
        // Resume as an uninitialised build over the boxed contents.
        let mut flags = ScreenFlags::new();
        for value in boxed.iter() {
            flags.screen(value);
        }
        self.slot.replace(BuilderState::Uninitialized { flags });
        ArrayStore::Object(boxed)
    }

    fn append_array_primitive(
        &mut self,
        store: ArrayStore,
        index: usize,
        other: &VArray,
        expected: usize,
        kind: StoreTag,
    ) -> ArrayStore {
        if store.tag() != kind {
            // Handed a store this variant did not produce; box locally.
            return self.append_array_fallback(store, index, other, expected);
        }
        match store.generalize_for_store(other.store()).tag() {
            target if target == kind => {
                let mut store = store;
                other.store().copy_contents(0, &mut store, index, other.len());
                store
            }
            StoreTag::Long => {
                // An int site meeting a long source widens and stays
                // primitive.
                let widened = match store {
                    ArrayStore::Int(buffer) => {
                        buffer.iter().map(|&v| i64::from(v)).collect::<Box<[i64]>>()
                    }
                    _ => unreachable!("only an int store generalizes into long"),
                };
                let mut widened = ArrayStore::Long(widened);
                other.store().copy_contents(0, &mut widened, index, other.len());
                self.slot.replace(BuilderState::Long { expected });
                widened
            }
            _ => self.append_array_fallback(store, index, other, expected),
        }
    }

    fn append_array_fallback(
        &mut self,
        store: ArrayStore,
        index: usize,
        other: &VArray,
        expected: usize,
    ) -> ArrayStore {
        self.slot.replace(BuilderState::Object { expected, seen: SeenStores::default() });
        let boxed = ArrayStore::Object(into_boxed(store));
        self.append_array_object(boxed, index, other)
    }

    fn append_array_object(
        &mut self,
        store: ArrayStore,
        index: usize,
        other: &VArray,
    ) -> ArrayStore {
        if let BuilderState::Object { seen, .. } = self.slot.get_mut() {
            match other.store().tag() {
                StoreTag::Int => seen.int = true,
                StoreTag::Long => seen.long = true,
                StoreTag::Double => seen.double = true,
                StoreTag::Object => seen.object = true,
                StoreTag::Empty => {}
            }
        }
        let mut dest = ArrayStore::Object(into_boxed(store));
        other.store().copy_contents(0, &mut dest, index, other.len());
        dest
    }

    fn finish_uninitialized(
        &mut self,
        store: ArrayStore,
        length: usize,
        flags: ScreenFlags,
    ) -> ArrayStore {
        let boxed = into_boxed(store);
        let expected = boxed.len();
        if flags.int {
            self.slot.replace(BuilderState::Int { expected });
            let buffer: Vec<i32> = boxed[..length]
                .iter()
                .map(|value| match value {
                    Value::Int(value) => *value,
                    _ => unreachable!("screened build holds a non-int value"),
                })
                .collect();
            ArrayStore::from(buffer)
        } else if flags.long {
            self.slot.replace(BuilderState::Long { expected });
            let buffer: Vec<i64> = boxed[..length]
                .iter()
                .map(|value| match value {
                    Value::Int(value) => i64::from(*value),
                    Value::Long(value) => *value,
                    _ => unreachable!("screened build holds a non-integer value"),
                })
                .collect();
            ArrayStore::from(buffer)
        } else if flags.double {
            self.slot.replace(BuilderState::Double { expected });
            let buffer: Vec<f64> = boxed[..length]
                .iter()
                .map(|value| match value {
                    Value::Double(value) => *value,
                    _ => unreachable!("screened build holds a non-double value"),
                })
                .collect();
            ArrayStore::from(buffer)
        } else {
            self.slot.replace(BuilderState::Object { expected, seen: SeenStores::default() });
            ArrayStore::Object(boxed)
        }
    }

    #[cfg(test)]
    fn seen_shapes(&self) -> Option<(bool, bool, bool, bool)> {
        match *self.slot.get() {
            BuilderState::Object { seen, .. } => {
                Some((seen.int, seen.long, seen.double, seen.object))
            }
            _ => None,
        }
    }
}

/// Boxes a store unless it is already boxed.
fn into_boxed(store: ArrayStore) -> Box<[Value]> {
    match store {
        ArrayStore::Object(values) => values,
        store => {
            let capacity = store.capacity();
            store.expand(capacity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::VArray;

    fn build(builder: &mut ArrayBuilder, values: &[Value]) -> VArray {
        let mut store = builder.start();
        for (index, value) in values.iter().enumerate() {
            store = builder.ensure(store, index + 1);
            store = builder.append_value(store, index, value.clone());
        }
        let store = builder.finish(store, values.len());
        VArray::new(store, values.len())
    }

    #[test]
    fn first_build_learns_shape_and_expected_length() {
        let mut builder = ArrayBuilder::default();
        let array = build(&mut builder, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(array.store().tag(), StoreTag::Int);
        assert_eq!(array.to_vec(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(builder.transition_count(), 1);

        // The next build starts straight in a pre-sized int buffer.
        let store = builder.start();
        assert_eq!(store.tag(), StoreTag::Int);
        assert_eq!(store.capacity(), EngineConfig::default().uninitialized_size);
    }

    #[test]
    fn mixed_build_goes_generic() {
        let mut builder = ArrayBuilder::default();
        let array = build(&mut builder, &[Value::Int(1), Value::Double(1.5)]);
        assert_eq!(array.store().tag(), StoreTag::Object);
        assert_eq!(array.to_vec(), vec![Value::Int(1), Value::Double(1.5)]);
    }

    #[test]
    fn specialised_mismatch_boxes_and_absorbs() {
        let mut builder = ArrayBuilder::default();
        build(&mut builder, &[Value::Double(1.0)]);
        assert_eq!(builder.transition_count(), 1);

        let array = build(&mut builder, &[Value::Double(2.0), Value::from("x")]);
        assert_eq!(array.store().tag(), StoreTag::Object);
        assert_eq!(array.to_vec(), vec![Value::Double(2.0), Value::from("x")]);
        // Double -> Object, and no further movement.
        assert_eq!(builder.transition_count(), 2);
        build(&mut builder, &[Value::Nil]);
        assert_eq!(builder.transition_count(), 2);
    }

    #[test]
    fn int_builder_widens_to_long_in_place() {
        let mut builder = ArrayBuilder::default();
        build(&mut builder, &[Value::Int(1)]);

        let array = build(&mut builder, &[Value::Int(1), Value::Long(1 << 40)]);
        assert_eq!(array.store().tag(), StoreTag::Long);
        assert_eq!(array.to_vec(), vec![Value::Long(1), Value::Long(1 << 40)]);

        // Long is sticky for later int-only builds of this site.
        let array = build(&mut builder, &[Value::Int(7)]);
        assert_eq!(array.store().tag(), StoreTag::Long);
    }

    #[test]
    fn ensure_is_identity_within_capacity() {
        let mut builder = ArrayBuilder::default();
        build(&mut builder, &[Value::Int(1)]);
        let store = builder.start();
        let capacity = store.capacity();
        let store = builder.ensure(store, capacity);
        assert_eq!(store.capacity(), capacity);
        assert_eq!(store.tag(), StoreTag::Int);
        assert_eq!(builder.transition_count(), 1);
    }

    #[test]
    fn ensure_overflow_despecialises() {
        let mut builder = ArrayBuilder::new(EngineConfig::new(2));
        build(&mut builder, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(builder.transition_count(), 1);

        let store = builder.start();
        let store = builder.ensure(store, 5);
        // Boxed back into an uninitialised build.
        assert_eq!(store.tag(), StoreTag::Object);
        assert_eq!(store.capacity(), 5);
        assert_eq!(builder.transition_count(), 2);
    }

    #[test]
    fn object_variant_tolerates_primitive_stores() {
        let mut builder = ArrayBuilder::default();
        build(&mut builder, &[Value::Nil]);
        assert!(builder.seen_shapes().is_some());

        // Hand the object variant an int store; it must box locally
        // rather than corrupt anything.
        let store = StoreAllocator::INT.allocate(4);
        let store = builder.append_value(store, 2, Value::from("z"));
        assert_eq!(store.tag(), StoreTag::Object);
        assert_eq!(store.read(2), Value::from("z"));
        assert_eq!(store.read(0), Value::Int(0));
    }

    #[test]
    fn object_append_array_records_seen_shapes() {
        let mut builder = ArrayBuilder::default();
        build(&mut builder, &[Value::Nil]);
        assert_eq!(builder.seen_shapes(), Some((false, false, false, false)));

        let ints = VArray::new(StoreAllocator::INT.allocate(2), 2);
        let store = builder.start_with(4);
        let store = builder.append_array(store, 0, &ints);
        assert_eq!(builder.seen_shapes(), Some((true, false, false, false)));

        let doubles = VArray::new(StoreAllocator::DOUBLE.allocate(2), 2);
        let store = builder.append_array(store, 2, &doubles);
        assert_eq!(builder.seen_shapes(), Some((true, false, true, false)));
        assert_eq!(store.read(0), Value::Int(0));
        assert_eq!(store.read(2), Value::Double(0.0));
    }

    #[test]
    fn zero_length_builds_share_the_sentinel() {
        let mut builder = ArrayBuilder::default();
        let store = builder.start();
        let store = builder.finish(store, 0);
        assert_eq!(store, ArrayStore::Empty);

        // Still true once the site is specialised.
        build(&mut builder, &[Value::Int(1)]);
        let store = builder.start();
        assert_eq!(builder.finish(store, 0), ArrayStore::Empty);
    }
}
