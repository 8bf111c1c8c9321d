//! Payload Codec
//!
//! Turns cache values into self-describing byte payloads and back.
//!
//! ## Payload Format
//! ```text
//! ┌──────────────────────────┬──────────────┬─────────────────┬──────────────┐
//! │ C(1 bit) + NameLen(15)   │ Chunks (16)  │   Type name     │     Body     │
//! └──────────────────────────┴──────────────┴─────────────────┴──────────────┘
//!   byte 0 bit 7 = compressed   bytes 2-3 BE   NameLen bytes     rest
//! ```
//!
//! - NameLen 0: body is a raw byte buffer
//! - Compressed: everything after the 4 header bytes is compressed output
//! - Chunks: number of transport entries holding this payload, stamped by
//!   the chunker just before the payload is split

mod header;
mod encoder;
mod decoder;

pub use header::{PayloadHeader, HEADER_SIZE, MAX_CHUNK_COUNT, MAX_TYPE_NAME_LEN};
pub use encoder::{encode_value, Encoded, PayloadBuilder};
pub use decoder::decode_payload;
