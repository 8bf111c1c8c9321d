//! Cache values
//!
//! [`CacheValue`] is what callers hand to and get back from the cache.
//! Scalars and short strings travel to the transport untouched as a
//! [`Scalar`]; everything else goes through the payload encoder.

use std::any::Any;
use std::fmt::Debug;
use std::time::SystemTime;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An arbitrary typed object that can be cached
///
/// Implemented for every `serde` type that is also `Clone + PartialEq + Debug`,
/// so user types only need the usual derives plus a registry entry.
pub trait CacheObject: Any + Debug + Send + Sync {
    /// Serialize to structured text
    fn to_json(&self) -> serde_json::Result<String>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Structural equality against another (possibly differently typed) object
    fn eq_object(&self, other: &dyn CacheObject) -> bool;

    fn clone_object(&self) -> Box<dyn CacheObject>;
}

impl<T> CacheObject for T
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn eq_object(&self, other: &dyn CacheObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }

    fn clone_object(&self) -> Box<dyn CacheObject> {
        Box::new(self.clone())
    }
}

/// A value the transport stores natively, without a payload header
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Timestamp(SystemTime),
    Text(String),
}

/// A logical cache value
#[derive(Debug)]
pub enum CacheValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Timestamp(SystemTime),
    Text(String),
    /// Raw bytes, stored without type information
    Bytes(Bytes),
    /// Any registered serde type
    Object(Box<dyn CacheObject>),
}

impl CacheValue {
    /// Wrap a serde type as an object value
    pub fn object<T: CacheObject>(value: T) -> Self {
        CacheValue::Object(Box::new(value))
    }

    /// Borrow the text of a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CacheValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow the bytes of a `Bytes` value
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            CacheValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Borrow an object value as its concrete type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            CacheValue::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Convert into a concrete Rust type.
    ///
    /// Integers come back as `i64`/`u64`, floats as `f64`, text as `String`
    /// and raw buffers as `Bytes`; asking for any other type yields `None`.
    pub fn into_typed<T: 'static>(self) -> Option<T> {
        let any: Box<dyn Any + Send + Sync> = match self {
            CacheValue::Bool(v) => Box::new(v),
            CacheValue::Int(v) => Box::new(v),
            CacheValue::UInt(v) => Box::new(v),
            CacheValue::Float(v) => Box::new(v),
            CacheValue::Timestamp(v) => Box::new(v),
            CacheValue::Text(v) => Box::new(v),
            CacheValue::Bytes(v) => Box::new(v),
            CacheValue::Object(object) => object.into_any(),
        };
        any.downcast::<T>().ok().map(|boxed| *boxed)
    }
}

impl Clone for CacheValue {
    fn clone(&self) -> Self {
        match self {
            CacheValue::Bool(v) => CacheValue::Bool(*v),
            CacheValue::Int(v) => CacheValue::Int(*v),
            CacheValue::UInt(v) => CacheValue::UInt(*v),
            CacheValue::Float(v) => CacheValue::Float(*v),
            CacheValue::Timestamp(v) => CacheValue::Timestamp(*v),
            CacheValue::Text(v) => CacheValue::Text(v.clone()),
            CacheValue::Bytes(v) => CacheValue::Bytes(v.clone()),
            CacheValue::Object(object) => CacheValue::Object(object.clone_object()),
        }
    }
}

impl PartialEq for CacheValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CacheValue::Bool(a), CacheValue::Bool(b)) => a == b,
            (CacheValue::Int(a), CacheValue::Int(b)) => a == b,
            (CacheValue::UInt(a), CacheValue::UInt(b)) => a == b,
            (CacheValue::Float(a), CacheValue::Float(b)) => a == b,
            (CacheValue::Timestamp(a), CacheValue::Timestamp(b)) => a == b,
            (CacheValue::Text(a), CacheValue::Text(b)) => a == b,
            (CacheValue::Bytes(a), CacheValue::Bytes(b)) => a == b,
            (CacheValue::Object(a), CacheValue::Object(b)) => a.eq_object(&**b),
            _ => false,
        }
    }
}

impl From<Scalar> for CacheValue {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(v) => CacheValue::Bool(v),
            Scalar::Int(v) => CacheValue::Int(v),
            Scalar::UInt(v) => CacheValue::UInt(v),
            Scalar::Float(v) => CacheValue::Float(v),
            Scalar::Timestamp(v) => CacheValue::Timestamp(v),
            Scalar::Text(v) => CacheValue::Text(v),
        }
    }
}

macro_rules! impl_from_primitive {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for CacheValue {
                fn from(value: $source) -> Self {
                    CacheValue::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from_primitive!(Int, i64, i8, i16, i32, i64);
impl_from_primitive!(UInt, u64, u8, u16, u32, u64);
impl_from_primitive!(Float, f64, f32, f64);

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Bool(value)
    }
}

impl From<SystemTime> for CacheValue {
    fn from(value: SystemTime) -> Self {
        CacheValue::Timestamp(value)
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<Bytes> for CacheValue {
    fn from(value: Bytes) -> Self {
        CacheValue::Bytes(value)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(Bytes::from(value))
    }
}
