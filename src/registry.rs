//! Type registry
//!
//! Maps object types to the stable names written into payload headers and
//! back. Rust has no runtime reflection, so every type that is cached as an
//! object must be registered up front; the registry is then frozen behind an
//! `Arc` inside the coordinator.
//!
//! Default names come from [`std::any::type_name`], i.e. module path plus
//! type name. Crate versions never appear in them, but the exact output is
//! not guaranteed by the compiler and may differ between Rust releases.
//! Use [`TypeRegistry::register_as`] for any type whose cached entries must
//! outlive a toolchain upgrade or a move between modules.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};
use crate::value::{CacheObject, CacheValue};

type DecodeFn = fn(&str) -> Result<Box<dyn CacheObject>>;

/// What a stored type name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
    /// The body is UTF-8 text
    Text,
    /// The body is structured text for a registered object type
    Object,
}

/// Compile-time registered map between object types and their names
pub struct TypeRegistry {
    names: HashMap<TypeId, String>,
    decoders: HashMap<String, DecodeFn>,
}

impl TypeRegistry {
    /// Create a registry that only knows the built-in text type
    pub fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(TypeId::of::<String>(), Self::text_type_name().to_string());
        Self {
            names,
            decoders: HashMap::new(),
        }
    }

    /// Name written for long strings
    pub fn text_type_name() -> &'static str {
        type_name::<String>()
    }

    /// Register `T` under its default qualified name.
    ///
    /// The name is whatever [`std::any::type_name`] returns, which may change
    /// between compiler releases; entries written before such a change then
    /// fail to resolve. Prefer [`register_as`](Self::register_as) with a
    /// fixed name for long-lived entries.
    pub fn register<T>(&mut self) -> Result<&mut Self>
    where
        T: CacheObject + DeserializeOwned,
    {
        self.register_as::<T>(type_name::<T>())
    }

    /// Register `T` under an explicit, stable name
    pub fn register_as<T>(&mut self, name: impl Into<String>) -> Result<&mut Self>
    where
        T: CacheObject + DeserializeOwned,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(CacheError::Config("type name must not be empty".to_string()));
        }
        if name == Self::text_type_name() {
            return Err(CacheError::Config(format!(
                "type name '{}' is reserved for text",
                name
            )));
        }

        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.names.get(&type_id) {
            if *existing != name {
                return Err(CacheError::Config(format!(
                    "{} is already registered as '{}'",
                    type_name::<T>(),
                    existing
                )));
            }
        }
        if self.decoders.contains_key(&name) && self.names.get(&type_id) != Some(&name) {
            return Err(CacheError::Config(format!(
                "type name '{}' is already taken",
                name
            )));
        }

        tracing::trace!("Registered cache type {} as '{}'", type_name::<T>(), name);
        self.names.insert(type_id, name.clone());
        self.decoders.insert(name, decode_json::<T>);
        Ok(self)
    }

    /// Qualified name for an object's concrete type
    pub fn qualified_name(&self, object: &dyn CacheObject) -> Result<&str> {
        self.names
            .get(&object.as_any().type_id())
            .map(String::as_str)
            .ok_or_else(|| {
                CacheError::Encoding(format!(
                    "object type is not registered: {:?}",
                    object
                ))
            })
    }

    /// Resolve a stored type name
    pub fn resolve(&self, name: &str) -> Result<ResolvedType> {
        if name == Self::text_type_name() {
            Ok(ResolvedType::Text)
        } else if self.decoders.contains_key(name) {
            Ok(ResolvedType::Object)
        } else {
            Err(CacheError::TypeResolution(name.to_string()))
        }
    }

    /// Rebuild a value from its stored type name and body text
    pub fn decode(&self, name: &str, body: &str) -> Result<CacheValue> {
        match self.resolve(name)? {
            ResolvedType::Text => Ok(CacheValue::Text(body.to_string())),
            ResolvedType::Object => {
                let decode = self
                    .decoders
                    .get(name)
                    .ok_or_else(|| CacheError::TypeResolution(name.to_string()))?;
                Ok(CacheValue::Object(decode(body)?))
            }
        }
    }

    /// Number of registered object types
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_json<T>(body: &str) -> Result<Box<dyn CacheObject>>
where
    T: CacheObject + DeserializeOwned,
{
    let value: T = serde_json::from_str(body)?;
    Ok(Box::new(value))
}
