//! # cborstream
//!
//! A streaming CBOR (RFC 8949) codec built around three layers:
//!
//! - **Items.** [`Item`] is the faithful wire-level model: integers, strings
//!   (definite or chunked), arrays and maps (definite or indefinite), tags,
//!   simple values and floats. Equality is structural, so a chunked string
//!   equals its joined form and indefinite containers equal their definite
//!   counterparts.
//! - **Streams.** [`Encoder`] writes through any [`Sink`]; [`Decoder`] and
//!   the incremental [`EventDecoder`] read through any [`Source`]. Sources
//!   can be fed gradually: a `Truncated` failure is retryable once more
//!   bytes arrive.
//! - **Native values.** A [`Registry`] maps Rust types to items and tags to
//!   [`Value`]s, with builtin support for primitives, tag 0/1 date/times and
//!   tag 2/3 bignums. Applications extend it with their own encoders,
//!   fallback predicates and tag decoders.
//!
//! ## Canonical form
//!
//! [`CanonicalCbor`] produces and validates deterministic encodings:
//! shortest-form operands, narrowest exact float width, no indefinite
//! lengths, and map keys sorted by their encoded bytes. Canonical bytes are
//! byte-comparable and hashable as values.
//!
//! ## Untrusted input
//!
//! Decoding is bounded by [`DecodeOptions`]: nesting depth, total items,
//! container lengths and string sizes, all enforced before allocation grows
//! past the configured limits.
//!
//! ## Quick start
//!
//! ```
//! use cborstream::{from_slice, to_vec, Item};
//!
//! let item = Item::Map(vec![
//!     (Item::from("temp"), Item::from(21.5)),
//! ]);
//! let bytes = to_vec(&item)?;
//! assert_eq!(from_slice(&bytes)?, item);
//! # Ok::<(), cborstream::CborError>(())
//! ```
//!
//! ## Feature flags
//!
//! - `sha2` *(default)*: SHA-256 hashing of canonical bytes.
//! - `simdutf8`: SIMD-accelerated UTF-8 validation where supported.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

mod alloc_util;
mod canonical;
mod codec;
mod decode;
mod encode;
mod error;
mod events;
mod io;
mod item;
mod limits;
mod registry;
mod utf8;
mod value;
mod wire;

pub use canonical::{is_canonical, CanonicalCbor};
pub use codec::{
    from_slice, from_slice_native, from_slice_with, iter_slice, to_canonical_vec, to_vec,
    to_vec_native, to_vec_with, ItemIter,
};
pub use decode::Decoder;
pub use encode::{ChunkWriter, Encoder};
pub use error::{CborError, ErrorCode, ErrorKind};
pub use events::{Event, EventDecoder, StringKind};
pub use io::{ReaderSource, SliceSource, Sink, Source, VecSink, WriterSink};
pub use item::{Item, ItemKind};
pub use limits::{
    DecodeLimits, DecodeOptions, EncodeOptions, DEFAULT_CHUNK_THRESHOLD,
    DEFAULT_MAX_CONTAINER_LEN, DEFAULT_MAX_DEPTH,
};
pub use registry::{DecodeFn, DecodeKey, EncodeFn, EncodePredicate, Registry};
pub use value::{
    timestamp_from_epoch_float, timestamp_from_epoch_secs, timestamp_from_rfc3339,
    timestamp_to_rfc3339, BigInt, Value,
};
