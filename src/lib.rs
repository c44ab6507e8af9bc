//! Self-specialising array storage for dynamic-language runtimes.
//!
//! Dynamically typed programs build arrays whose elements are, in
//! practice, usually uniform: all small integers, all floats. This crate
//! is the storage engine that exploits that. Each array-construction
//! call site owns a small state machine that observes the values flowing
//! through it, commits to the tightest unboxed backing buffer that has
//! worked so far, and widens smoothly — never failing — when a new value
//! breaks the assumption.
//!
//! Two construction paths share the machinery:
//!
//! - [`LiteralSite`] — fixed-arity literal expressions, speculating on
//!   one uniform element type across all subexpressions.
//! - [`ArrayBuilder`] — dynamic-arity incremental building, learning the
//!   element type and expected length of the builds it serves.
//!
//! Both hand finished buffers to the host runtime through
//! [`ArrayFactory`]. Stores come in five shapes ([`StoreTag`]): the
//! shared empty sentinel, unboxed int/long/double buffers, and a boxed
//! object buffer, ordered by generality with `Object` absorbing
//! everything. Specialisation only ever moves up that lattice.
//!
//! ```
//! use varray::{ArrayBuilder, Value, StoreTag, VArray};
//!
//! let mut builder = ArrayBuilder::default();
//! let mut store = builder.start();
//! store = builder.append_value(store, 0, Value::Int(1));
//! store = builder.append_value(store, 1, Value::Int(2));
//! let store = builder.finish(store, 2);
//!
//! // The build was uniformly int, so the store is unboxed.
//! assert_eq!(store.tag(), StoreTag::Int);
//! let array = VArray::new(store, 2);
//! assert_eq!(array.read(1), Value::Int(2));
//! ```

#![warn(missing_docs)]

mod alloc;
mod array;
mod builder;
mod config;
mod error;
mod literal;
mod site;
mod store;
mod value;

pub use alloc::StoreAllocator;
pub use array::{ArrayFactory, VArray, VArrayFactory};
pub use builder::ArrayBuilder;
pub use config::EngineConfig;
pub use error::EvalError;
pub use literal::{LiteralSite, ValueProducer};
pub use store::{ArrayStore, StoreIter, StoreSlice, StoreTag};
pub use value::{fits_into_double, fits_into_int, Value, ValueKind};
