//! Fixed-id message classes used by the test suites of both crates.
//!
//! `TestEvent` and `TestMetaData` mirror the classic content/metadata pair
//! used to exercise the format; `PlainSample` has no fixed id and therefore
//! always travels with an in-stream descriptor.

use crate::message::FixedClass;
use crate::registry::register_class;
use crate::schema::{ClassSchema, FieldKind};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestEvent {
    #[prost(uint32, tag = "1")]
    pub event_number: u32,
}

impl FixedClass for TestEvent {
    const CLASS_ID: u32 = 150;
    const FULL_NAME: &'static str = "a4stream.TestEvent";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME).with_field(1, "event_number", FieldKind::Uint32, false)
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestMetaData {
    #[prost(uint32, tag = "1")]
    pub meta_data: u32,
}

impl FixedClass for TestMetaData {
    const CLASS_ID: u32 = 151;
    const FULL_NAME: &'static str = "a4stream.TestMetaData";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME).with_field(1, "meta_data", FieldKind::Uint32, false)
    }
}

/// A class without a fixed id: writers assign a per-stream id and emit a
/// `ProtoClass` record; readers without this type decode it dynamically.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlainSample {
    #[prost(string, tag = "1")]
    pub label: String,
    #[prost(uint64, tag = "2")]
    pub value: u64,
}

impl FixedClass for PlainSample {
    const CLASS_ID: u32 = 0;
    const FULL_NAME: &'static str = "a4stream.PlainSample";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME)
            .with_field(1, "label", FieldKind::String, false)
            .with_field(2, "value", FieldKind::Uint64, false)
    }
}

crate::stream_class!(TestEvent);
crate::stream_class!(TestMetaData);
crate::stream_class!(PlainSample);

/// Register the test classes in the process-wide table. `PlainSample`
/// registers by name only; readers resolve its in-stream descriptor back
/// to the compiled type.
pub fn register() {
    register_class::<TestEvent>();
    register_class::<TestMetaData>();
    register_class::<PlainSample>();
}
