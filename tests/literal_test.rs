//! End-to-end behaviour of fixed-arity literal sites.

use varray::{
    ArrayStore, EvalError, LiteralSite, StoreTag, VArray, VArrayFactory, Value, ValueProducer,
};

/// Scripted producer: yields each step once, sticks on the last.
enum Step {
    Give(Value),
    Fail(&'static str),
}

struct Script {
    steps: Vec<Step>,
    next: usize,
}

impl Script {
    fn new(steps: Vec<Step>) -> Self {
        Script { steps, next: 0 }
    }

    fn constant(value: Value) -> Self {
        Script::new(vec![Step::Give(value)])
    }
}

impl ValueProducer for Script {
    fn produce(&mut self) -> Result<Value, EvalError> {
        let index = self.next.min(self.steps.len() - 1);
        self.next += 1;
        match &self.steps[index] {
            Step::Give(value) => Ok(value.clone()),
            Step::Fail(reason) => Err(EvalError::new(*reason)),
        }
    }
}

fn literal_of(values: Vec<Value>) -> LiteralSite<Value> {
    LiteralSite::new(values)
}

fn execute(site: &mut LiteralSite<impl ValueProducer>) -> VArray {
    site.execute(&mut VArrayFactory).unwrap()
}

#[test]
fn uniform_ints_choose_the_int_shape() {
    let mut site = literal_of(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let array = execute(&mut site);
    assert_eq!(array.store().tag(), StoreTag::Int);
    assert_eq!(array.to_vec(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn one_wide_integer_chooses_the_long_shape() {
    let mut site = literal_of(vec![Value::Int(1), Value::Int(2), Value::Long(3_000_000_000)]);
    let array = execute(&mut site);
    assert_eq!(array.store().tag(), StoreTag::Long);
    assert_eq!(
        array.to_vec(),
        vec![Value::Long(1), Value::Long(2), Value::Long(3_000_000_000)]
    );
}

#[test]
fn promotable_integers_keep_the_double_shape() {
    let mut site = literal_of(vec![Value::Double(1.0), Value::Double(2.0), Value::Int(3)]);
    let array = execute(&mut site);
    assert_eq!(array.store().tag(), StoreTag::Double);
    assert_eq!(
        array.to_vec(),
        vec![Value::Double(1.0), Value::Double(2.0), Value::Double(3.0)]
    );
}

#[test]
fn mixed_kinds_choose_the_object_shape() {
    let mut site = literal_of(vec![Value::Int(1), Value::from("a"), Value::Int(3)]);
    let array = execute(&mut site);
    assert_eq!(array.store().tag(), StoreTag::Object);
    assert_eq!(
        array.to_vec(),
        vec![Value::Int(1), Value::from("a"), Value::Int(3)]
    );
}

#[test]
fn unpromotable_long_does_not_reach_the_double_shape() {
    let wide = (1 << 53) + 1;
    let mut site = literal_of(vec![Value::Double(1.0), Value::Long(wide)]);
    let array = execute(&mut site);
    assert_eq!(array.store().tag(), StoreTag::Object);
    assert_eq!(array.to_vec(), vec![Value::Double(1.0), Value::Long(wide)]);
}

#[test]
fn a_hundred_executions_transition_exactly_once() {
    let mut site = literal_of(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    for _ in 0..100 {
        let array = execute(&mut site);
        assert_eq!(array.store().tag(), StoreTag::Int);
        assert_eq!(array.to_vec(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
    assert_eq!(site.transition_count(), 1);
}

#[test]
fn specialisation_is_monotonic_across_executions() {
    // Int on the first execution, a string on the third, ints after.
    let mut site = LiteralSite::new(vec![
        Script::constant(Value::Int(1)),
        Script::new(vec![
            Step::Give(Value::Int(2)),
            Step::Give(Value::Int(2)),
            Step::Give(Value::from("s")),
            Step::Give(Value::Int(2)),
        ]),
    ]);

    let tags: Vec<StoreTag> = (0..5)
        .map(|_| execute(&mut site).store().tag())
        .collect();
    assert_eq!(
        tags,
        vec![
            StoreTag::Int,
            StoreTag::Int,
            StoreTag::Object,
            StoreTag::Object,
            StoreTag::Object
        ]
    );
    for pair in tags.windows(2) {
        assert!(pair[1].generalizes(pair[0]));
    }
    assert_eq!(site.transition_count(), 2);
}

#[test]
fn empty_literals_share_the_sentinel() {
    let mut first: LiteralSite<Value> = LiteralSite::new(Vec::new());
    let mut second: LiteralSite<Value> = LiteralSite::new(Vec::new());
    let a = execute(&mut first);
    let b = execute(&mut second);
    assert_eq!(*a.store(), ArrayStore::Empty);
    assert_eq!(*b.store(), ArrayStore::Empty);
    assert_eq!(a.len(), 0);
}

#[test]
fn producer_failure_propagates_and_preserves_specialisation() {
    let mut site = LiteralSite::new(vec![
        Script::constant(Value::Int(1)),
        Script::new(vec![
            Step::Give(Value::Int(2)),
            Step::Fail("host raised"),
            Step::Give(Value::Int(2)),
        ]),
    ]);

    assert_eq!(execute(&mut site).store().tag(), StoreTag::Int);
    assert_eq!(site.transition_count(), 1);

    let error = site.execute(&mut VArrayFactory).unwrap_err();
    assert_eq!(error, EvalError::new("host raised"));
    assert_eq!(site.transition_count(), 1);

    // The site is still the int variant and keeps working.
    assert_eq!(execute(&mut site).store().tag(), StoreTag::Int);
    assert_eq!(site.transition_count(), 1);
}

#[test]
fn failure_during_boxed_completion_leaves_the_site_generalised() {
    let mut site = LiteralSite::new(vec![
        Script::new(vec![
            Step::Give(Value::Int(1)),
            Step::Give(Value::from("x")),
            Step::Give(Value::Int(1)),
        ]),
        Script::new(vec![
            Step::Give(Value::Int(2)),
            Step::Fail("second producer"),
            Step::Give(Value::Int(2)),
        ]),
    ]);

    assert_eq!(execute(&mut site).store().tag(), StoreTag::Int);

    // The mismatch at position 0 commits the object variant before the
    // failing producer runs.
    let error = site.execute(&mut VArrayFactory).unwrap_err();
    assert_eq!(error, EvalError::new("second producer"));
    assert_eq!(site.transition_count(), 2);
    assert_eq!(execute(&mut site).store().tag(), StoreTag::Object);
    assert_eq!(site.transition_count(), 2);
}

#[test]
fn evaluation_order_is_left_to_right_with_single_evaluation() {
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Logging {
        id: u32,
        value: Value,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl ValueProducer for Logging {
        fn produce(&mut self) -> Result<Value, EvalError> {
            self.log.borrow_mut().push(self.id);
            Ok(self.value.clone())
        }
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    let producer = |id, value: Value| Logging { id, value, log: Rc::clone(&log) };

    let mut site = LiteralSite::new(vec![
        producer(0, Value::Int(1)),
        producer(1, Value::from("mid")),
        producer(2, Value::Int(3)),
    ]);

    execute(&mut site);
    execute(&mut site);
    // Two executions, each running every producer exactly once in order,
    // mismatch or not.
    assert_eq!(*log.borrow(), vec![0, 1, 2, 0, 1, 2]);
}
