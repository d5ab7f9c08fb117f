//! Type registry: the bridge between native Rust values and CBOR items.
//!
//! A [`Registry`] maps native types to item-producing encoders and maps tags
//! (or untagged item kinds) to value-producing decoders. The builtin registry
//! covers the primitive types and the well-known tags (0/1 date/time, 2/3
//! bignum); applications clone it and register their own entries on top, or
//! start from [`Registry::empty`] for full control.
//!
//! Registration is explicit about conflicts: binding an occupied slot fails
//! with `RegistryConflict` unless the caller passes `overwrite`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use time::OffsetDateTime;

use crate::item::{Item, ItemKind};
use crate::value::{
    self, magnitude_from_u128, timestamp_from_epoch_float, timestamp_from_epoch_secs,
    timestamp_from_rfc3339, BigInt, Value,
};
use crate::{CborError, ErrorCode};

/// An encoder entry: turns a type-erased native value into an item.
pub type EncodeFn = Arc<dyn Fn(&dyn Any, &Registry) -> Result<Item, CborError> + Send + Sync>;

/// A predicate selecting values for a fallback encoder.
pub type EncodePredicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// A decoder entry: turns an item (the tag's inner item, for tag entries)
/// into a native value.
pub type DecodeFn = Arc<dyn Fn(&Item, &Registry) -> Result<Value, CborError> + Send + Sync>;

/// What a decoder entry is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeKey {
    /// Items under this tag.
    Tag(u64),
    /// Untagged items of this kind, overriding the default mapping.
    Kind(ItemKind),
}

/// A registry of encoders and decoders.
#[derive(Clone, Default)]
pub struct Registry {
    by_type: HashMap<TypeId, EncodeFn>,
    fallbacks: Vec<(EncodePredicate, EncodeFn)>,
    by_tag: HashMap<u64, DecodeFn>,
    by_kind: HashMap<ItemKind, DecodeFn>,
    deny_unknown_tags: bool,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("encoders", &self.by_type.len())
            .field("fallbacks", &self.fallbacks.len())
            .field("tag_decoders", &self.by_tag.len())
            .field("kind_overrides", &self.by_kind.len())
            .field("deny_unknown_tags", &self.deny_unknown_tags)
            .finish()
    }
}

impl Registry {
    /// A registry with no entries at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh copy of the builtin registry: primitive encoders plus tag 0/1
    /// date/time and tag 2/3 bignum decoders.
    ///
    /// The builtin set is constructed once and cloned per call, so obtaining
    /// it is cheap and mutations never leak between copies.
    #[must_use]
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(Self::build_builtin).clone()
    }

    /// Reject tags without a registered decoder instead of wrapping them in
    /// [`Value::Tagged`].
    pub fn set_deny_unknown_tags(&mut self, deny: bool) {
        self.deny_unknown_tags = deny;
    }

    /// Register an encoder for the exact type `T`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryConflict` if `T` is already bound and `overwrite` is
    /// `false`.
    pub fn register_encoder<T, F>(&mut self, f: F, overwrite: bool) -> Result<(), CborError>
    where
        T: Any,
        F: Fn(&T, &Registry) -> Result<Item, CborError> + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        if !overwrite && self.by_type.contains_key(&id) {
            return Err(CborError::new(ErrorCode::RegistryConflict, 0));
        }
        self.add_encoder::<T, F>(f);
        Ok(())
    }

    fn add_encoder<T, F>(&mut self, f: F)
    where
        T: Any,
        F: Fn(&T, &Registry) -> Result<Item, CborError> + Send + Sync + 'static,
    {
        let erased: EncodeFn = Arc::new(move |v, reg| {
            let v = v
                .downcast_ref::<T>()
                .ok_or_else(|| CborError::new(ErrorCode::UnencodableType, 0))?;
            f(v, reg)
        });
        self.by_type.insert(TypeId::of::<T>(), erased);
    }

    /// Register a fallback encoder consulted, in registration order, for
    /// values whose exact type has no entry. The predicate decides whether
    /// this fallback applies.
    pub fn register_fallback_encoder<P, F>(&mut self, predicate: P, f: F)
    where
        P: Fn(&dyn Any) -> bool + Send + Sync + 'static,
        F: Fn(&dyn Any, &Registry) -> Result<Item, CborError> + Send + Sync + 'static,
    {
        self.fallbacks.push((Arc::new(predicate), Arc::new(f)));
    }

    /// Register a decoder for a tag or an untagged item kind.
    ///
    /// # Errors
    ///
    /// Returns `RegistryConflict` if the slot is already bound and
    /// `overwrite` is `false`.
    pub fn register_decoder<F>(
        &mut self,
        key: DecodeKey,
        f: F,
        overwrite: bool,
    ) -> Result<(), CborError>
    where
        F: Fn(&Item, &Registry) -> Result<Value, CborError> + Send + Sync + 'static,
    {
        match key {
            DecodeKey::Tag(tag) => {
                if !overwrite && self.by_tag.contains_key(&tag) {
                    return Err(CborError::new(ErrorCode::RegistryConflict, 0));
                }
                self.by_tag.insert(tag, Arc::new(f));
            }
            DecodeKey::Kind(kind) => {
                if !overwrite && self.by_kind.contains_key(&kind) {
                    return Err(CborError::new(ErrorCode::RegistryConflict, 0));
                }
                self.by_kind.insert(kind, Arc::new(f));
            }
        }
        Ok(())
    }

    /// Encode a native value to an item through the registered encoders:
    /// exact type first, then fallbacks in registration order.
    ///
    /// # Errors
    ///
    /// Returns `UnencodableType` if no encoder claims the value.
    pub fn encode_value(&self, v: &dyn Any) -> Result<Item, CborError> {
        if let Some(f) = self.by_type.get(&v.type_id()) {
            return f(v, self);
        }
        for (predicate, f) in &self.fallbacks {
            if predicate(v) {
                return f(v, self);
            }
        }
        Err(CborError::new(ErrorCode::UnencodableType, 0))
    }

    /// Decode an item to a native value.
    ///
    /// Tagged items dispatch on the tag; an unknown tag becomes
    /// [`Value::Tagged`] unless unknown tags are denied. Untagged items use
    /// the kind override if one is registered, otherwise the default mapping.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTag` under the deny policy, or whatever the dispatched
    /// decoder returns.
    pub fn to_value(&self, item: &Item) -> Result<Value, CborError> {
        if let Item::Tag(tag, inner) = item {
            if let Some(f) = self.by_tag.get(tag) {
                return f(inner, self);
            }
            if self.deny_unknown_tags {
                return Err(CborError::new(ErrorCode::UnknownTag, 0));
            }
            return Ok(Value::Tagged(*tag, Box::new(self.to_value(inner)?)));
        }
        if let Some(f) = self.by_kind.get(&item.kind()) {
            return f(item, self);
        }
        self.default_value(item)
    }

    fn default_value(&self, item: &Item) -> Result<Value, CborError> {
        Ok(match item {
            Item::Unsigned(v) => Value::Int(i128::from(*v)),
            Item::Negative(n) => Value::Int(-1 - i128::from(*n)),
            Item::Bytes(_) | Item::BytesChunks(_) => {
                Value::Bytes(joined_bytes(item).unwrap_or_default())
            }
            Item::Text(_) | Item::TextChunks(_) => {
                Value::Text(joined_text(item).unwrap_or_default())
            }
            Item::Array(items) | Item::IndefiniteArray(items) => {
                let mut out = Vec::with_capacity(items.len());
                for it in items {
                    out.push(self.to_value(it)?);
                }
                Value::Array(out)
            }
            Item::Map(entries) | Item::IndefiniteMap(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((self.to_value(k)?, self.to_value(v)?));
                }
                Value::Map(out)
            }
            Item::Simple(20) => Value::Bool(false),
            Item::Simple(21) => Value::Bool(true),
            Item::Simple(22) => Value::Null,
            Item::Simple(23) => Value::Undefined,
            Item::Simple(v) => Value::Simple(*v),
            Item::Float(v) => Value::Float(*v),
            Item::Tag(..) => unreachable!("tags dispatch in to_value"),
        })
    }

    fn build_builtin() -> Self {
        let mut reg = Self::default();

        reg.add_encoder::<bool, _>(|v, _| Ok(Item::bool(*v)));
        reg.add_encoder::<u8, _>(|v, _| Ok(Item::Unsigned(u64::from(*v))));
        reg.add_encoder::<u16, _>(|v, _| Ok(Item::Unsigned(u64::from(*v))));
        reg.add_encoder::<u32, _>(|v, _| Ok(Item::Unsigned(u64::from(*v))));
        reg.add_encoder::<u64, _>(|v, _| Ok(Item::Unsigned(*v)));
        reg.add_encoder::<usize, _>(|v, _| Ok(Item::Unsigned(*v as u64)));
        reg.add_encoder::<i8, _>(|v, _| Ok(Item::from(i64::from(*v))));
        reg.add_encoder::<i16, _>(|v, _| Ok(Item::from(i64::from(*v))));
        reg.add_encoder::<i32, _>(|v, _| Ok(Item::from(i64::from(*v))));
        reg.add_encoder::<i64, _>(|v, _| Ok(Item::from(*v)));
        reg.add_encoder::<i128, _>(|v, _| Ok(int_item(*v)));
        reg.add_encoder::<u128, _>(|v, _| Ok(uint_item(*v)));
        reg.add_encoder::<f32, _>(|v, _| Ok(Item::Float(f64::from(*v))));
        reg.add_encoder::<f64, _>(|v, _| Ok(Item::Float(*v)));
        reg.add_encoder::<String, _>(|v, _| Ok(Item::Text(v.clone())));
        reg.add_encoder::<Vec<u8>, _>(|v, _| Ok(Item::Bytes(v.clone())));
        reg.add_encoder::<BigInt, _>(|v, _| Ok(bignum_item(v)));
        reg.add_encoder::<OffsetDateTime, _>(|v, _| timestamp_item(*v));
        reg.add_encoder::<Item, _>(|v, _| Ok(v.clone()));
        reg.add_encoder::<Value, _>(value_to_item);

        // Tag 0: RFC 3339 date/time text.
        reg.by_tag.insert(
            0,
            Arc::new(|inner, _| {
                let text = joined_text(inner)
                    .ok_or_else(|| CborError::new(ErrorCode::InvalidTagPayload, 0))?;
                timestamp_from_rfc3339(&text, 0).map(Value::Timestamp)
            }),
        );
        // Tag 1: epoch seconds as integer or float.
        reg.by_tag.insert(
            1,
            Arc::new(|inner, _| {
                let ts = match inner {
                    Item::Float(secs) => timestamp_from_epoch_float(*secs, 0)?,
                    _ => {
                        let secs = inner
                            .as_int()
                            .ok_or_else(|| CborError::new(ErrorCode::InvalidTagPayload, 0))?;
                        timestamp_from_epoch_secs(secs, 0)?
                    }
                };
                Ok(Value::Timestamp(ts))
            }),
        );
        // Tags 2/3: bignums, narrowed to Int when they fit.
        reg.by_tag
            .insert(2, Arc::new(|inner, _| bignum_value(inner, false)));
        reg.by_tag
            .insert(3, Arc::new(|inner, _| bignum_value(inner, true)));

        reg
    }
}

fn int_item(v: i128) -> Item {
    Item::int(v).unwrap_or_else(|| bignum_item(&BigInt::from(v)))
}

fn uint_item(v: u128) -> Item {
    u64::try_from(v).map_or_else(
        |_| Item::Tag(2, Box::new(Item::Bytes(magnitude_from_u128(v)))),
        Item::Unsigned,
    )
}

fn bignum_item(b: &BigInt) -> Item {
    // Narrow to major 0/1 when the value fits; tags 2/3 are the overflow
    // representation, not a distinct number space.
    if let Some(v) = b.to_i128() {
        if let Some(item) = Item::int(v) {
            return item;
        }
    }
    let tag = if b.is_negative() { 3 } else { 2 };
    Item::Tag(tag, Box::new(Item::Bytes(b.magnitude().to_vec())))
}

fn bignum_value(inner: &Item, negative: bool) -> Result<Value, CborError> {
    let bytes =
        joined_bytes(inner).ok_or_else(|| CborError::new(ErrorCode::InvalidTagPayload, 0))?;
    let big = BigInt::from_tag_bytes(negative, &bytes);
    Ok(big.to_i128().map_or(Value::Bignum(big), Value::Int))
}

fn timestamp_item(ts: OffsetDateTime) -> Result<Item, CborError> {
    Ok(Item::Tag(
        0,
        Box::new(Item::Text(value::timestamp_to_rfc3339(ts)?)),
    ))
}

fn value_to_item(v: &Value, reg: &Registry) -> Result<Item, CborError> {
    Ok(match v {
        Value::Null => Item::NULL,
        Value::Undefined => Item::UNDEFINED,
        Value::Bool(b) => Item::bool(*b),
        Value::Int(i) => int_item(*i),
        Value::Bignum(b) => bignum_item(b),
        Value::Float(f) => Item::Float(*f),
        Value::Bytes(b) => Item::Bytes(b.clone()),
        Value::Text(s) => Item::Text(s.clone()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for it in items {
                out.push(value_to_item(it, reg)?);
            }
            Item::Array(out)
        }
        Value::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, val) in entries {
                out.push((value_to_item(k, reg)?, value_to_item(val, reg)?));
            }
            Item::Map(out)
        }
        Value::Timestamp(ts) => timestamp_item(*ts)?,
        Value::Simple(s) => Item::Simple(*s),
        Value::Tagged(tag, inner) => Item::Tag(*tag, Box::new(value_to_item(inner, reg)?)),
    })
}

fn joined_bytes(item: &Item) -> Option<Vec<u8>> {
    match item {
        Item::Bytes(b) => Some(b.clone()),
        Item::BytesChunks(chunks) => Some(chunks.concat()),
        _ => None,
    }
}

fn joined_text(item: &Item) -> Option<String> {
    match item {
        Item::Text(s) => Some(s.clone()),
        Item::TextChunks(chunks) => Some(chunks.concat()),
        _ => None,
    }
}
