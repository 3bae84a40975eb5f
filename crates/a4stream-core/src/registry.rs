//! Class id registries.
//!
//! Two levels, mirroring the two ways a reader can know a class:
//!
//! - The **compile-time table** is process-wide and effectively immutable:
//!   built-in record types are registered when the table is first touched,
//!   user classes via [`register_class`] at startup. It maps both fixed
//!   class ids and full names to parse entries.
//! - A [`ClassPool`] is per segment and collects the dynamic descriptors
//!   announced by `ProtoClass` records. Lookups fall back to the
//!   compile-time table, and a dynamic descriptor whose full name matches
//!   a compiled-in class resolves to the compiled parser (the descriptors
//!   are equivalent; the typed message is more useful to callers).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use prost::Message;

use crate::error::{Error, Result};
use crate::message::{AnyMessage, FixedClass};
use crate::records::{
    EndCompressedSection, ProtoClass, StartCompressedSection, StreamFooter, StreamHeader,
};
use crate::schema::{ClassSchema, DynamicMessage};

type ParseFn = fn(&[u8]) -> Result<Arc<dyn AnyMessage>>;

#[derive(Debug)]
enum Parser {
    Compiled(ParseFn),
    Dynamic(Arc<ClassSchema>),
}

/// A resolvable class: its identity plus a way to parse payloads.
#[derive(Debug)]
pub struct ClassEntry {
    class_id: u32,
    full_name: String,
    schema: Arc<ClassSchema>,
    parser: Parser,
}

impl ClassEntry {
    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn schema(&self) -> &Arc<ClassSchema> {
        &self.schema
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.parser, Parser::Dynamic(_))
    }

    pub fn parse(&self, payload: &[u8]) -> Result<Arc<dyn AnyMessage>> {
        match &self.parser {
            Parser::Compiled(parse) => parse(payload),
            Parser::Dynamic(schema) => {
                Ok(Arc::new(DynamicMessage::decode(schema.clone(), payload)?))
            }
        }
    }
}

fn parse_compiled<T: FixedClass + Message + AnyMessage>(payload: &[u8]) -> Result<Arc<dyn AnyMessage>> {
    Ok(Arc::new(T::decode(payload)?))
}

fn compiled_entry<T: FixedClass + Message + AnyMessage>() -> Arc<ClassEntry> {
    Arc::new(ClassEntry {
        class_id: T::CLASS_ID,
        full_name: T::FULL_NAME.to_string(),
        schema: Arc::new(<T as FixedClass>::class_schema()),
        parser: Parser::Compiled(parse_compiled::<T>),
    })
}

#[derive(Default)]
struct CompileTimeTable {
    by_id: HashMap<u32, Arc<ClassEntry>>,
    by_name: HashMap<String, Arc<ClassEntry>>,
}

impl CompileTimeTable {
    fn insert<T: FixedClass + Message + AnyMessage>(&mut self) {
        let entry = compiled_entry::<T>();
        if T::CLASS_ID != 0 {
            self.by_id.insert(T::CLASS_ID, entry.clone());
        }
        self.by_name.insert(T::FULL_NAME.to_string(), entry);
    }
}

static COMPILED_CLASSES: Lazy<RwLock<CompileTimeTable>> = Lazy::new(|| {
    let mut table = CompileTimeTable::default();
    table.insert::<StreamHeader>();
    table.insert::<StreamFooter>();
    table.insert::<ProtoClass>();
    table.insert::<StartCompressedSection>();
    table.insert::<EndCompressedSection>();
    RwLock::new(table)
});

/// Register a compiled-in class in the process-wide table. Intended to be
/// called during startup, before any streams are opened. Classes without a
/// fixed id are registered by name only (writers will assign them per-stream
/// ids and describe them in-stream).
pub fn register_class<T: FixedClass + Message + AnyMessage>() {
    COMPILED_CLASSES.write().unwrap().insert::<T>();
}

/// Look up a compiled-in class by its fixed id.
pub fn compiled_class_by_id(class_id: u32) -> Option<Arc<ClassEntry>> {
    COMPILED_CLASSES.read().unwrap().by_id.get(&class_id).cloned()
}

/// Look up a compiled-in class by full name.
pub fn compiled_class_by_name(full_name: &str) -> Option<Arc<ClassEntry>> {
    COMPILED_CLASSES.read().unwrap().by_name.get(full_name).cloned()
}

/// Per-segment class pool: wire class id to entry, populated from
/// `ProtoClass` records, falling back to the compile-time table.
///
/// Readers hand an `Arc<ClassPool>` to every message they parse, so the
/// pool (and the descriptors it owns) outlives the stream if messages do.
#[derive(Debug, Default)]
pub struct ClassPool {
    dynamic: RwLock<HashMap<u32, Arc<ClassEntry>>>,
}

impl ClassPool {
    pub fn new() -> Arc<Self> {
        Arc::new(ClassPool::default())
    }

    /// Register the class described by a `ProtoClass` record under its
    /// per-stream wire id.
    pub fn add_protoclass(&self, proto: &ProtoClass) -> Result<()> {
        let schema = proto
            .schema
            .as_ref()
            .ok_or_else(|| Error::InvalidStream("ProtoClass record without schema".into()))?;
        let entry = match compiled_class_by_name(&schema.full_name) {
            Some(compiled) => compiled,
            None => {
                let schema = Arc::new(schema.clone());
                Arc::new(ClassEntry {
                    class_id: proto.class_id,
                    full_name: schema.full_name.clone(),
                    schema: schema.clone(),
                    parser: Parser::Dynamic(schema),
                })
            }
        };
        self.dynamic.write().unwrap().insert(proto.class_id, entry);
        Ok(())
    }

    /// Resolve a wire class id: in-stream descriptors first, then the
    /// compile-time table.
    pub fn entry(&self, class_id: u32) -> Option<Arc<ClassEntry>> {
        if let Some(entry) = self.dynamic.read().unwrap().get(&class_id) {
            return Some(entry.clone());
        }
        compiled_class_by_id(class_id)
    }

    pub fn full_name(&self, class_id: u32) -> Option<String> {
        self.entry(class_id).map(|e| e.full_name().to_string())
    }
}
