//! Fixed-arity literal construction sites.
//!
//! A literal site owns one producer per subexpression and speculates on a
//! single uniform element type across all of them. The first execution
//! runs fully boxed, classifies what it saw, and installs a specialised
//! variant; later executions write straight into a primitive buffer and
//! fall back to boxed completion on the first value that breaks the
//! speculation. Producers always run left to right, exactly once each,
//! whatever the specialisation does around them.

use smallvec::SmallVec;

use crate::array::ArrayFactory;
use crate::error::EvalError;
use crate::site::Slot;
use crate::store::{ArrayStore, StoreTag};
use crate::value::{fits_into_double, fits_into_int, Value};

/// Producer of one subexpression value.
///
/// This is the seam to the host runtime's expression evaluator. Producers
/// may fail; the failure propagates through the site unchanged.
pub trait ValueProducer {
    /// Evaluates the subexpression once.
    fn produce(&mut self) -> Result<Value, EvalError>;
}

/// A constant producer: every execution yields the same value.
impl ValueProducer for Value {
    fn produce(&mut self) -> Result<Value, EvalError> {
        Ok(self.clone())
    }
}

impl<'a> ValueProducer for Box<dyn ValueProducer + 'a> {
    fn produce(&mut self) -> Result<Value, EvalError> {
        (**self).produce()
    }
}

// Scratch for the arities a first execution typically sees; larger
// literals spill to the heap.
type Scratch = SmallVec<[Value; 8]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LiteralKind {
    Uninitialized,
    Empty,
    Int,
    Long,
    Double,
    Object,
}

/// A fixed-arity array-literal call site.
pub struct LiteralSite<P> {
    producers: Box<[P]>,
    slot: Slot<LiteralKind>,
}

impl<P: ValueProducer> LiteralSite<P> {
    /// Creates an uninitialised site over the given subexpression
    /// producers. The arity is fixed for the site's lifetime.
    pub fn new(producers: Vec<P>) -> Self {
        LiteralSite {
            producers: producers.into_boxed_slice(),
            slot: Slot::new(LiteralKind::Uninitialized),
        }
    }

    /// The number of subexpressions.
    pub fn arity(&self) -> usize {
        self.producers.len()
    }

    /// How many times this site has replaced its variant.
    pub fn transition_count(&self) -> u32 {
        self.slot.transitions()
    }

    /// Executes the literal once, producing a finished array through
    /// `factory`.
    pub fn execute<F: ArrayFactory>(&mut self, factory: &mut F) -> Result<F::Output, EvalError> {
        match *self.slot.get() {
            LiteralKind::Uninitialized => self.execute_uninitialized(factory),
            LiteralKind::Empty => Ok(factory.allocate(ArrayStore::Empty, 0)),
            LiteralKind::Int => self.execute_int(factory),
            LiteralKind::Long => self.execute_long(factory),
            LiteralKind::Double => self.execute_double(factory),
            LiteralKind::Object => self.execute_object(factory),
        }
    }

    fn execute_uninitialized<F: ArrayFactory>(
        &mut self,
        factory: &mut F,
    ) -> Result<F::Output, EvalError> {
        let mut values = Scratch::with_capacity(self.producers.len());
        for producer in self.producers.iter_mut() {
            values.push(producer.produce()?);
        }

        let store = store_specialized_from_values(&values);
        let kind = match store.tag() {
            StoreTag::Empty => LiteralKind::Empty,
            StoreTag::Int => LiteralKind::Int,
            StoreTag::Long => LiteralKind::Long,
            StoreTag::Double => LiteralKind::Double,
            StoreTag::Object => LiteralKind::Object,
        };
        self.slot.replace(kind);

        let len = values.len();
        Ok(factory.allocate(store, len))
    }

    fn execute_int<F: ArrayFactory>(&mut self, factory: &mut F) -> Result<F::Output, EvalError> {
        let arity = self.producers.len();
        let mut buffer = vec![0i32; arity];
        for index in 0..arity {
            match self.producers[index].produce()? {
                Value::Int(value) => buffer[index] = value,
                other => {
                    let mut executed: Scratch =
                        buffer[..index].iter().map(|&v| Value::Int(v)).collect();
                    executed.push(other);
                    return self.finish_generic(executed, factory);
                }
            }
        }
        Ok(factory.allocate(ArrayStore::from(buffer), arity))
    }

    fn execute_long<F: ArrayFactory>(&mut self, factory: &mut F) -> Result<F::Output, EvalError> {
        let arity = self.producers.len();
        let mut buffer = vec![0i64; arity];
        for index in 0..arity {
            match self.producers[index].produce()? {
                Value::Long(value) => buffer[index] = value,
                Value::Int(value) => buffer[index] = i64::from(value),
                other => {
                    let mut executed: Scratch =
                        buffer[..index].iter().map(|&v| Value::Long(v)).collect();
                    executed.push(other);
                    return self.finish_generic(executed, factory);
                }
            }
        }
        Ok(factory.allocate(ArrayStore::from(buffer), arity))
    }

    fn execute_double<F: ArrayFactory>(&mut self, factory: &mut F) -> Result<F::Output, EvalError> {
        let arity = self.producers.len();
        let mut buffer = vec![0.0f64; arity];
        for index in 0..arity {
            // The same promotion rule that chose this shape keeps it
            // stable on re-execution.
            match self.producers[index].produce()? {
                Value::Double(value) => buffer[index] = value,
                Value::Int(value) => buffer[index] = f64::from(value),
                Value::Long(value) if fits_into_double(value) => buffer[index] = value as f64,
                other => {
                    let mut executed: Scratch =
                        buffer[..index].iter().map(|&v| Value::Double(v)).collect();
                    executed.push(other);
                    return self.finish_generic(executed, factory);
                }
            }
        }
        Ok(factory.allocate(ArrayStore::from(buffer), arity))
    }

    fn execute_object<F: ArrayFactory>(&mut self, factory: &mut F) -> Result<F::Output, EvalError> {
        let arity = self.producers.len();
        let mut values = Vec::with_capacity(arity);
        for producer in self.producers.iter_mut() {
            values.push(producer.produce()?);
        }
        Ok(factory.allocate(ArrayStore::from(values), arity))
    }

    /// Boxed completion after a failed speculation: `executed` holds the
    /// already-evaluated prefix including the mismatching value. The
    /// object variant is installed before the remaining producers run, so
    /// a failure among them leaves the site generalised, never skips or
    /// re-runs a producer, and the caller still sees every value in
    /// evaluation order.
    fn finish_generic<F: ArrayFactory>(
        &mut self,
        executed: Scratch,
        factory: &mut F,
    ) -> Result<F::Output, EvalError> {
        self.slot.replace(LiteralKind::Object);

        let arity = self.producers.len();
        let mut values = executed;
        for index in values.len()..arity {
            values.push(self.producers[index].produce()?);
        }
        let values: Vec<Value> = values.into_vec();
        Ok(factory.allocate(ArrayStore::from(values), arity))
    }
}

/// Joint classification of a first execution's values into the tightest
/// store, with integer-to-float promotion permitted.
fn store_specialized_from_values(values: &[Value]) -> ArrayStore {
    if values.is_empty() {
        return ArrayStore::Empty;
    }

    let mut could_use_int = true;
    let mut could_use_long = true;
    let mut could_use_double = true;

    for value in values {
        match value {
            Value::Int(_) => {}
            Value::Long(value) => {
                could_use_int = could_use_int && fits_into_int(*value);
                could_use_double = could_use_double && fits_into_double(*value);
            }
            Value::Double(_) => {
                could_use_int = false;
                could_use_long = false;
            }
            _ => {
                could_use_int = false;
                could_use_long = false;
                could_use_double = false;
            }
        }
    }

    if could_use_int {
        let buffer: Vec<i32> = values
            .iter()
            .map(|value| match value {
                Value::Int(value) => *value,
                // Classification proved the narrowing exact.
                Value::Long(value) => *value as i32,
                _ => unreachable!("non-integer value classified as int"),
            })
            .collect();
        ArrayStore::from(buffer)
    } else if could_use_long {
        let buffer: Vec<i64> = values
            .iter()
            .map(|value| match value {
                Value::Int(value) => i64::from(*value),
                Value::Long(value) => *value,
                _ => unreachable!("non-integer value classified as long"),
            })
            .collect();
        ArrayStore::from(buffer)
    } else if could_use_double {
        let buffer: Vec<f64> = values
            .iter()
            .map(|value| match value.as_promoted_double() {
                Some(value) => value,
                None => unreachable!("non-numeric value classified as double"),
            })
            .collect();
        ArrayStore::from(buffer)
    } else {
        ArrayStore::from(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::VArrayFactory;

    // Yields a fixed sequence across executions, then sticks on the last
    // value. Lets a test change what a site observes between executions.
    struct Replay {
        values: Vec<Value>,
        next: usize,
    }

    impl Replay {
        fn new(values: Vec<Value>) -> Self {
            Replay { values, next: 0 }
        }
    }

    impl ValueProducer for Replay {
        fn produce(&mut self) -> Result<Value, EvalError> {
            let index = self.next.min(self.values.len() - 1);
            self.next += 1;
            Ok(self.values[index].clone())
        }
    }

    fn ints(site_values: &[i32]) -> LiteralSite<Value> {
        LiteralSite::new(site_values.iter().map(|&v| Value::Int(v)).collect())
    }

    #[test]
    fn first_execution_classifies_and_specializes() {
        let mut factory = VArrayFactory;
        let mut site = ints(&[1, 2, 3]);
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(array.store().tag(), StoreTag::Int);
        assert_eq!(site.transition_count(), 1);

        let again = site.execute(&mut factory).unwrap();
        assert_eq!(again.to_vec(), array.to_vec());
        assert_eq!(site.transition_count(), 1);
    }

    #[test]
    fn fitting_longs_narrow_at_classification_only() {
        let mut factory = VArrayFactory;
        let mut site = LiteralSite::new(vec![Value::Int(1), Value::Long(2)]);
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(array.store().tag(), StoreTag::Int);
        assert_eq!(array.to_vec(), vec![Value::Int(1), Value::Int(2)]);

        // A long reaching the specialised int variant is a mismatch, not
        // a narrowing opportunity.
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(array.store().tag(), StoreTag::Object);
    }

    #[test]
    fn double_variant_keeps_promoting_integers() {
        let mut factory = VArrayFactory;
        let mut site = LiteralSite::new(vec![Value::Double(1.5), Value::Int(2)]);
        for _ in 0..3 {
            let array = site.execute(&mut factory).unwrap();
            assert_eq!(array.store().tag(), StoreTag::Double);
            assert_eq!(array.to_vec(), vec![Value::Double(1.5), Value::Double(2.0)]);
        }
        assert_eq!(site.transition_count(), 1);
    }

    #[test]
    fn mismatch_mid_execution_generalizes_without_reordering() {
        let mut factory = VArrayFactory;
        let mut site = LiteralSite::new(vec![
            Replay::new(vec![Value::Int(1)]),
            Replay::new(vec![Value::Int(2), Value::from("x")]),
            Replay::new(vec![Value::Int(3)]),
        ]);

        let first = site.execute(&mut factory).unwrap();
        assert_eq!(first.store().tag(), StoreTag::Int);

        let second = site.execute(&mut factory).unwrap();
        assert_eq!(second.store().tag(), StoreTag::Object);
        assert_eq!(
            second.to_vec(),
            vec![Value::Int(1), Value::from("x"), Value::Int(3)]
        );
        assert_eq!(site.transition_count(), 2);

        // Absorbed: later executions stay generic.
        let third = site.execute(&mut factory).unwrap();
        assert_eq!(third.store().tag(), StoreTag::Object);
        assert_eq!(site.transition_count(), 2);
    }

    #[test]
    fn empty_literal_uses_the_sentinel() {
        let mut factory = VArrayFactory;
        let mut site: LiteralSite<Value> = LiteralSite::new(Vec::new());
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(*array.store(), ArrayStore::Empty);
        assert_eq!(site.transition_count(), 1);
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(*array.store(), ArrayStore::Empty);
        assert_eq!(site.transition_count(), 1);
    }
}
