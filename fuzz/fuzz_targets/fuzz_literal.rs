#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use varray::{LiteralSite, StoreTag, VArrayFactory, Value};

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

fuzz_target!(|raws: Vec<RawValue>| {
    let values: Vec<Value> = raws.iter().map(RawValue::to_value).collect();
    let mut site = LiteralSite::new(values.clone());
    let mut factory = VArrayFactory;

    let mut tags: Vec<StoreTag> = Vec::new();
    for _ in 0..3 {
        let array = site.execute(&mut factory).unwrap();
        assert_eq!(array.len(), values.len());
        // Contents survive up to exact numeric conversion.
        for (read, expected) in array.iter().zip(values.iter()) {
            assert!(
                read == *expected || read.total_cmp(expected).is_eq(),
                "read {read:?}, expected {expected:?}"
            );
        }
        tags.push(array.store().tag());
    }

    // Monotonic specialisation, settling after at most one fallback.
    for pair in tags.windows(2) {
        assert!(pair[1].generalizes(pair[0]));
    }
    assert!(site.transition_count() <= 2);
});
