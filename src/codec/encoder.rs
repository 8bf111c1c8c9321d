//! Payload encoder
//!
//! Decides between native storage and a header-framed payload, and builds
//! the payload when one is needed.

use bytes::{BufMut, BytesMut};

use crate::config::Config;
use crate::error::Result;
use crate::registry::TypeRegistry;
use crate::value::{CacheValue, Scalar};

use super::header::{PayloadHeader, HEADER_SIZE};

/// Output of the encoder
#[derive(Debug)]
pub enum Encoded {
    /// Stored by the transport as-is, no header
    Native(Scalar),

    /// Header-framed payload, not yet compressed or chunked
    Payload(BytesMut),
}

/// Incremental payload buffer.
///
/// The header space is reserved up front and patched by [`finish`] once the
/// body is complete, so the buffer never has to be rewound.
///
/// [`finish`]: PayloadBuilder::finish
pub struct PayloadBuilder {
    buf: BytesMut,
    header: PayloadHeader,
}

impl PayloadBuilder {
    /// Start a payload with an optional type name section
    pub fn new(type_name: Option<&str>, body_hint: usize) -> Result<Self> {
        let name = type_name.unwrap_or("").as_bytes();
        let header = PayloadHeader::new(name.len())?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + name.len() + body_hint);
        buf.put_bytes(0, HEADER_SIZE);
        buf.put_slice(name);

        Ok(Self { buf, header })
    }

    /// Append body bytes
    pub fn append(&mut self, body: &[u8]) {
        self.buf.put_slice(body);
    }

    /// Current payload length including the header
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Patch the header and hand back the payload
    pub fn finish(mut self) -> BytesMut {
        self.header.write_to(&mut self.buf);
        self.buf
    }
}

/// Encode a value for the transport
pub fn encode_value(value: CacheValue, registry: &TypeRegistry, config: &Config) -> Result<Encoded> {
    let encoded = match value {
        CacheValue::Bool(v) => Encoded::Native(Scalar::Bool(v)),
        CacheValue::Int(v) => Encoded::Native(Scalar::Int(v)),
        CacheValue::UInt(v) => Encoded::Native(Scalar::UInt(v)),
        CacheValue::Float(v) => Encoded::Native(Scalar::Float(v)),
        CacheValue::Timestamp(v) => Encoded::Native(Scalar::Timestamp(v)),
        CacheValue::Text(text) => {
            if is_native_text(&text, config.native_text_limit) {
                Encoded::Native(Scalar::Text(text))
            } else {
                Encoded::Payload(text_payload(&text)?)
            }
        }
        CacheValue::Bytes(bytes) => {
            let mut builder = PayloadBuilder::new(None, bytes.len())?;
            builder.append(&bytes);
            Encoded::Payload(builder.finish())
        }
        CacheValue::Object(object) => {
            if let Some(text) = object.as_any().downcast_ref::<String>() {
                Encoded::Payload(text_payload(text)?)
            } else {
                let name = registry.qualified_name(&*object)?;
                let body = object.to_json()?;
                let mut builder = PayloadBuilder::new(Some(name), body.len())?;
                builder.append(body.as_bytes());
                Encoded::Payload(builder.finish())
            }
        }
    };
    Ok(encoded)
}

fn text_payload(text: &str) -> Result<BytesMut> {
    let mut builder = PayloadBuilder::new(Some(TypeRegistry::text_type_name()), text.len())?;
    builder.append(text.as_bytes());
    Ok(builder.finish())
}

fn is_native_text(text: &str, limit: usize) -> bool {
    // Byte length bounds the character count from above
    text.len() < limit || text.chars().count() < limit
}
