#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use varray::{ArrayBuilder, EngineConfig, StoreTag, VArray, Value};

#[derive(Arbitrary, Debug)]
enum RawValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Nil,
}

impl RawValue {
    fn to_value(&self) -> Value {
        match self {
            RawValue::Int(v) => Value::Int(*v),
            RawValue::Long(v) => Value::Long(*v),
            RawValue::Double(v) => Value::Double(*v),
            RawValue::Bool(v) => Value::Bool(*v),
            RawValue::Str(v) => Value::from(v.as_str()),
            RawValue::Nil => Value::Nil,
        }
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    Push(RawValue),
    PushArray(Vec<RawValue>),
}

/// The shape a fresh builder must finish with, per its strict screening.
fn least_shape(values: &[Value]) -> StoreTag {
    if values.is_empty() {
        return StoreTag::Empty;
    }
    let mut int = true;
    let mut long = true;
    let mut double = true;
    for value in values {
        match value {
            Value::Int(_) => double = false,
            Value::Long(_) => {
                int = false;
                double = false;
            }
            Value::Double(_) => {
                int = false;
                long = false;
            }
            _ => {
                int = false;
                long = false;
                double = false;
            }
        }
    }
    if int {
        StoreTag::Int
    } else if long {
        StoreTag::Long
    } else if double {
        StoreTag::Double
    } else {
        StoreTag::Object
    }
}

fn build_fresh(values: &[Value]) -> VArray {
    let mut builder = ArrayBuilder::new(EngineConfig::new(4));
    let mut store = builder.start();
    for (index, value) in values.iter().enumerate() {
        store = builder.ensure(store, index + 1);
        store = builder.append_value(store, index, value.clone());
    }
    let store = builder.finish(store, values.len());
    VArray::new(store, values.len())
}

fuzz_target!(|ops: Vec<Op>| {
    let mut builder = ArrayBuilder::new(EngineConfig::new(4));
    let mut store = builder.start();
    let mut inserted: Vec<Value> = Vec::new();

    for op in &ops {
        match op {
            Op::Push(raw) => {
                let value = raw.to_value();
                store = builder.ensure(store, inserted.len() + 1);
                store = builder.append_value(store, inserted.len(), value.clone());
                inserted.push(value);
            }
            Op::PushArray(raws) => {
                let values: Vec<Value> = raws.iter().map(RawValue::to_value).collect();
                let source = build_fresh(&values);
                store = builder.ensure(store, inserted.len() + source.len());
                store = builder.append_array(store, inserted.len(), &source);
                inserted.extend(source.iter());
            }
        }
    }

    let store = builder.finish(store, inserted.len());
    let array = VArray::new(store, inserted.len());

    // The finished shape accepts everything that was inserted, and a
    // reused site is never tighter than the least shape.
    assert!(array.store().tag().generalizes(least_shape(&inserted)));

    // Contents survive up to the widening a primitive store applies.
    for (read, expected) in array.iter().zip(inserted.iter()) {
        assert!(
            read == *expected || read.total_cmp(expected).is_eq(),
            "read {read:?}, expected {expected:?}"
        );
    }
});
