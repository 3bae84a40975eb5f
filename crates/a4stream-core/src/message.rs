//! Message traits and the read-side envelope.
//!
//! The stream codec is polymorphic over message types through a narrow
//! capability set: serialize, describe yourself, name yourself. Compiled-in
//! classes implement [`FixedClass`] and invoke [`stream_class!`](crate::stream_class)
//! once; [`DynamicMessage`] implements the capability set directly.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::registry::ClassPool;
use crate::schema::{ClassSchema, DynamicMessage};

/// A message class known at compile time.
///
/// `CLASS_ID` is the globally stable wire id; `0` means the class has no
/// fixed id and writers assign one per stream (emitting a `ProtoClass`
/// record so readers can decode it dynamically).
pub trait FixedClass: Default + Clone + Send + Sync + 'static {
    const CLASS_ID: u32;
    const FULL_NAME: &'static str;

    fn class_schema() -> ClassSchema;
}

/// Object-safe capability set the codec needs from any message.
pub trait AnyMessage: Any + fmt::Debug + Send + Sync {
    /// Stable textual identity of the message's class.
    fn full_name(&self) -> &str;

    /// Self-description, used for `ProtoClass` emission and field
    /// enumeration.
    fn class_schema(&self) -> ClassSchema;

    /// Compile-time class id, if the class has one.
    fn fixed_class_id(&self) -> Option<u32>;

    /// Canonical payload encoding.
    fn encode_payload(&self) -> Vec<u8>;

    fn as_any(&self) -> &dyn Any;
}

/// Derive [`AnyMessage`] for a [`FixedClass`] + `prost::Message` type.
///
/// Every class meant to travel in a stream names itself once:
///
/// ```ignore
/// a4stream_core::stream_class!(MyEvent);
/// ```
#[macro_export]
macro_rules! stream_class {
    ($ty:ty) => {
        impl $crate::AnyMessage for $ty {
            fn full_name(&self) -> &str {
                <$ty as $crate::FixedClass>::FULL_NAME
            }

            fn class_schema(&self) -> $crate::ClassSchema {
                <$ty as $crate::FixedClass>::class_schema()
            }

            fn fixed_class_id(&self) -> Option<u32> {
                let id = <$ty as $crate::FixedClass>::CLASS_ID;
                (id != 0).then_some(id)
            }

            fn encode_payload(&self) -> Vec<u8> {
                ::prost::Message::encode_to_vec(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}

impl AnyMessage for DynamicMessage {
    fn full_name(&self) -> &str {
        DynamicMessage::full_name(self)
    }

    fn class_schema(&self) -> ClassSchema {
        self.schema().as_ref().clone()
    }

    fn fixed_class_id(&self) -> Option<u32> {
        None
    }

    fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A message read from a stream: its wire class id, the decoded body, and
/// a handle to the class pool that parsed it. The pool handle keeps
/// in-stream descriptors alive as long as any message decoded from them.
#[derive(Clone)]
pub struct A4Message {
    class_id: u32,
    body: Arc<dyn AnyMessage>,
    pool: Arc<ClassPool>,
}

impl A4Message {
    pub fn new(class_id: u32, body: Arc<dyn AnyMessage>, pool: Arc<ClassPool>) -> Self {
        A4Message {
            class_id,
            body,
            pool,
        }
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn full_name(&self) -> &str {
        self.body.full_name()
    }

    pub fn body(&self) -> &dyn AnyMessage {
        self.body.as_ref()
    }

    pub fn pool(&self) -> &Arc<ClassPool> {
        &self.pool
    }

    /// True if this message's wire id matches `T`'s fixed class id.
    pub fn is<T: FixedClass>(&self) -> bool {
        T::CLASS_ID != 0 && self.class_id == T::CLASS_ID
    }

    /// Downcast to a compiled-in class. Returns `None` for id mismatches
    /// and for messages that were decoded dynamically.
    pub fn get<T: FixedClass>(&self) -> Option<&T> {
        if !self.is::<T>() {
            return None;
        }
        self.body.as_any().downcast_ref::<T>()
    }

    /// The dynamically decoded body, if this message came from an
    /// in-stream descriptor.
    pub fn dynamic(&self) -> Option<&DynamicMessage> {
        self.body.as_any().downcast_ref::<DynamicMessage>()
    }
}

impl fmt::Debug for A4Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("A4Message")
            .field("class_id", &self.class_id)
            .field("body", &self.body)
            .finish()
    }
}

/// Result of a single `next()` call on a reader.
///
/// `End` and `Error` report class ids 0 and 1 for parity with the historic
/// API; on the wire class ids are always non-zero.
#[derive(Debug, Clone)]
pub enum Envelope {
    Message(A4Message),
    End,
    Error(ErrorKind),
}

impl Envelope {
    pub fn message(&self) -> Option<&A4Message> {
        match self {
            Envelope::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<A4Message> {
        match self {
            Envelope::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn class_id(&self) -> u32 {
        match self {
            Envelope::Message(m) => m.class_id(),
            Envelope::End => 0,
            Envelope::Error(_) => 1,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Envelope::End)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error(_))
    }

    pub fn is<T: FixedClass>(&self) -> bool {
        self.message().map(A4Message::is::<T>).unwrap_or(false)
    }

    pub fn get<T: FixedClass>(&self) -> Option<&T> {
        self.message().and_then(A4Message::get::<T>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EndCompressedSection, StreamHeader};
    use crate::schema::{FieldKind, FieldValue};

    fn header_message() -> A4Message {
        let header = StreamHeader {
            a4_version: 2,
            ..Default::default()
        };
        A4Message::new(StreamHeader::CLASS_ID, Arc::new(header), ClassPool::new())
    }

    // ---------------------------------------------------------------
    // A4Message downcasts
    // ---------------------------------------------------------------

    #[test]
    fn is_and_get_match_on_fixed_class_id() {
        let msg = header_message();
        assert!(msg.is::<StreamHeader>());
        assert!(!msg.is::<EndCompressedSection>());
        assert_eq!(msg.get::<StreamHeader>().unwrap().a4_version, 2);
        assert!(msg.get::<EndCompressedSection>().is_none());
    }

    #[test]
    fn dynamic_accessor_only_for_dynamic_bodies() {
        let msg = header_message();
        assert!(msg.dynamic().is_none());

        let schema = Arc::new(
            ClassSchema::new("test.Dyn").with_field(1, "v", FieldKind::Uint32, false),
        );
        let mut dynamic = DynamicMessage::new(schema);
        dynamic.set("v", FieldValue::Uint32(3)).unwrap();
        let msg = A4Message::new(201, Arc::new(dynamic), ClassPool::new());
        assert_eq!(
            msg.dynamic().unwrap().get("v"),
            Some(&FieldValue::Uint32(3))
        );
        // id 201 is not a fixed class, so typed downcasts fail
        assert!(msg.get::<StreamHeader>().is_none());
    }

    // ---------------------------------------------------------------
    // Envelope sentinels
    // ---------------------------------------------------------------

    #[test]
    fn envelope_sentinel_class_ids() {
        assert_eq!(Envelope::End.class_id(), 0);
        assert_eq!(Envelope::Error(ErrorKind::Truncation).class_id(), 1);
        assert_eq!(
            Envelope::Message(header_message()).class_id(),
            StreamHeader::CLASS_ID
        );
    }

    #[test]
    fn envelope_message_accessors() {
        let env = Envelope::Message(header_message());
        assert!(env.message().is_some());
        assert!(env.is::<StreamHeader>());
        assert!(!env.is_end());
        assert!(!env.is_error());
        assert!(env.into_message().is_some());

        assert!(Envelope::End.message().is_none());
        assert!(Envelope::End.is_end());
        assert!(Envelope::Error(ErrorKind::Io).is_error());
    }
}
