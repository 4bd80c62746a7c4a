//! Lists, maps and structs.
//!
//! A container holds raw host data together with the adapter that knows how
//! to read it. Elements are converted to `CelVal` only when accessed.

use std::any::Any as StdAny;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use cel_eval_common::CelType;

use super::{coerce_to_values, CelError, CelResult, CelVal};
use crate::adapter::{CelAdapter, ValueAdapter};

// ==================== Map Keys ====================

/// The canonical form of a map key.
///
/// Integers of either signedness and integral doubles share the numeric
/// space, so `m[1]`, `m[1u]` and `m[1.0]` find the same entry. Booleans are
/// their own keys: `true` and `1` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Num(i128),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl MapKey {
    /// Canonicalize a key; `None` when the value cannot be a map key.
    pub fn from_val(val: &CelVal) -> Option<MapKey> {
        match val {
            CelVal::Int(i) => Some(MapKey::Num(i128::from(*i))),
            CelVal::UInt(u) => Some(MapKey::Num(i128::from(u.0))),
            CelVal::Double(d) => {
                // Beyond 2^64 the cast saturates; those doubles are never equal to an int key.
                if d.is_finite() && d.fract() == 0.0 && d.abs() < super::coerce::U64_BOUND {
                    Some(MapKey::Num(*d as i128))
                } else {
                    None
                }
            }
            CelVal::Bool(b) => Some(MapKey::Bool(*b)),
            CelVal::String(s) => Some(MapKey::String(s.clone())),
            CelVal::Bytes(b) => Some(MapKey::Bytes(b.clone())),
            CelVal::Wrapped(w) => MapKey::from_val(&w.clone().into_inner()),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Num(n) => write!(f, "{}", n),
            MapKey::String(s) => write!(f, "{:?}", s),
            MapKey::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
        }
    }
}

// ==================== Backing Traits ====================

/// Indexed storage behind a [`CelList`].
pub trait ListItems: Debug + Send + Sync {
    fn len(&self) -> usize;

    /// Element `index` as a CEL value, `None` when out of bounds.
    fn get(&self, id: i64, index: usize) -> Option<CelResult>;

    /// Compare against another backing of the same concrete type without
    /// converting elements. `None` means the backings are not comparable
    /// this way and the caller should fall back to element-wise equality.
    fn equals_same(&self, _other: &dyn ListItems) -> Option<bool> {
        None
    }

    fn as_any(&self) -> &dyn StdAny;
}

/// Keyed storage behind a [`CelMap`].
pub trait MapEntries: Debug + Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, id: i64, key: &MapKey) -> Option<CelResult>;

    /// All entries in insertion order.
    fn entries(&self, id: i64) -> Vec<(CelResult, CelResult)>;

    fn equals_same(&self, _other: &dyn MapEntries) -> Option<bool> {
        None
    }

    fn as_any(&self) -> &dyn StdAny;
}

/// Named-field storage behind a [`CelObject`].
pub trait StructFields: Debug + Send + Sync {
    /// Field `name`, `None` when the type has no such field.
    fn get(&self, id: i64, name: &str) -> Option<CelResult>;

    /// Presence test used by `has()`.
    fn is_set(&self, id: i64, name: &str) -> CelResult<bool>;

    /// Every field name of the type, set or not.
    fn field_names(&self) -> Vec<String>;

    fn as_any(&self) -> &dyn StdAny;
}

// ==================== CelList ====================

#[derive(Debug, Clone)]
pub struct CelList {
    items: Arc<dyn ListItems>,
    ty: CelType,
}

impl CelList {
    pub fn new(items: Arc<dyn ListItems>, ty: CelType) -> Self {
        Self { items, ty }
    }

    /// A `list(dyn)` of already converted values.
    pub fn from_vals(values: Vec<CelVal>) -> Self {
        AdaptedList::new(CelAdapter, values).into_list(CelType::dyn_list())
    }

    pub fn cel_type(&self) -> &CelType {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.len() == 0
    }

    pub fn items(&self) -> &dyn ListItems {
        self.items.as_ref()
    }

    pub fn get(&self, id: i64, index: usize) -> Option<CelResult> {
        self.items.get(id, index)
    }

    /// Element at a CEL index value; negative or out-of-range indices error.
    pub fn get_checked(&self, id: i64, index: i128) -> CelResult {
        let len = self.len();
        if index < 0 || index >= len as i128 {
            return Err(CelError::index_out_of_bounds(id, index, len).into());
        }
        self.items
            .get(id, index as usize)
            .unwrap_or_else(|| Err(CelError::index_out_of_bounds(id, index, len).into()))
    }

    pub fn iter(&self, id: i64) -> impl Iterator<Item = CelResult> + '_ {
        (0..self.len()).filter_map(move |i| self.items.get(id, i))
    }

    /// Convert every element, merging faults.
    pub fn values(&self, id: i64) -> CelResult<Vec<CelVal>> {
        coerce_to_values(self.iter(id))
    }

    /// `self + other` as a fresh `list(dyn)`.
    pub fn concat(&self, id: i64, other: &CelList) -> CelResult<CelList> {
        let mut values = self.values(id)?;
        values.extend(other.values(id)?);
        let ty = if self.ty.identical(&other.ty) {
            self.ty.clone()
        } else {
            CelType::dyn_list()
        };
        Ok(AdaptedList::new(CelAdapter, values).into_list(ty))
    }
}

/// A list of host values read through adapter `A`.
#[derive(Debug, Clone)]
pub struct AdaptedList<A: ValueAdapter> {
    adapter: A,
    values: Vec<A::Native>,
}

impl<A: ValueAdapter> AdaptedList<A> {
    pub fn new(adapter: A, values: Vec<A::Native>) -> Self {
        Self { adapter, values }
    }

    pub fn values(&self) -> &[A::Native] {
        &self.values
    }

    pub fn into_list(self, ty: CelType) -> CelList {
        CelList::new(Arc::new(self), ty)
    }
}

impl<A: ValueAdapter> ListItems for AdaptedList<A> {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn get(&self, id: i64, index: usize) -> Option<CelResult> {
        self.values.get(index).map(|v| self.adapter.to_cel(id, v))
    }

    fn equals_same(&self, other: &dyn ListItems) -> Option<bool> {
        let other = other.as_any().downcast_ref::<Self>()?;
        Some(
            self.values.len() == other.values.len()
                && self
                    .values
                    .iter()
                    .zip(&other.values)
                    .all(|(a, b)| self.adapter.equals(a, b)),
        )
    }

    fn as_any(&self) -> &dyn StdAny {
        self
    }
}

// ==================== CelMap ====================

#[derive(Debug, Clone)]
pub struct CelMap {
    entries: Arc<dyn MapEntries>,
    ty: CelType,
}

impl CelMap {
    pub fn new(entries: Arc<dyn MapEntries>, ty: CelType) -> Self {
        Self { entries, ty }
    }

    /// A `map(dyn, dyn)` of already converted values.
    pub fn from_vals(id: i64, entries: Vec<(CelVal, CelVal)>) -> CelResult<Self> {
        Ok(AdaptedMap::try_new(id, CelAdapter, entries)?.into_map(CelType::dyn_map()))
    }

    pub fn cel_type(&self) -> &CelType {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    pub fn backing(&self) -> &dyn MapEntries {
        self.entries.as_ref()
    }

    /// Look up `key`; `Ok(None)` when absent, an error when `key` is not a
    /// valid key type.
    pub fn get(&self, id: i64, key: &CelVal) -> CelResult<Option<CelVal>> {
        let key = MapKey::from_val(key).ok_or_else(|| CelError::unsupported_key_type(id))?;
        self.entries.get(id, &key).transpose()
    }

    pub fn contains_key(&self, id: i64, key: &CelVal) -> bool {
        MapKey::from_val(key).is_some_and(|k| self.entries.get(id, &k).is_some())
    }

    pub fn keys(&self, id: i64) -> CelResult<Vec<CelVal>> {
        coerce_to_values(self.entries.entries(id).into_iter().map(|(k, _)| k))
    }

    pub fn entries(&self, id: i64) -> CelResult<Vec<(CelVal, CelVal)>> {
        coerce_to_values(
            self.entries
                .entries(id)
                .into_iter()
                .map(|(k, v)| Ok((k?, v?))),
        )
    }
}

/// A map of host values read through adapter `A`, indexed by canonical key.
#[derive(Debug, Clone)]
pub struct AdaptedMap<A: ValueAdapter> {
    adapter: A,
    entries: Vec<(A::Native, A::Native)>,
    index: HashMap<MapKey, usize>,
}

impl<A: ValueAdapter> AdaptedMap<A> {
    /// Index `entries`, rejecting keys that are not valid CEL map keys and
    /// distinct keys that canonicalize to the same bucket.
    pub fn try_new(id: i64, adapter: A, entries: Vec<(A::Native, A::Native)>) -> CelResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, (k, _)) in entries.iter().enumerate() {
            let key = adapter.to_cel(id, k)?;
            let canonical =
                MapKey::from_val(&key).ok_or_else(|| CelError::unsupported_key_type(id))?;
            if index.insert(canonical, i).is_some() {
                return Err(CelError::map_key_conflict(id, key).into());
            }
        }
        Ok(Self {
            adapter,
            entries,
            index,
        })
    }

    pub fn entries(&self) -> &[(A::Native, A::Native)] {
        &self.entries
    }

    pub fn into_map(self, ty: CelType) -> CelMap {
        CelMap::new(Arc::new(self), ty)
    }
}

impl<A: ValueAdapter> MapEntries for AdaptedMap<A> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, id: i64, key: &MapKey) -> Option<CelResult> {
        let &i = self.index.get(key)?;
        Some(self.adapter.to_cel(id, &self.entries[i].1))
    }

    fn entries(&self, id: i64) -> Vec<(CelResult, CelResult)> {
        self.entries
            .iter()
            .map(|(k, v)| (self.adapter.to_cel(id, k), self.adapter.to_cel(id, v)))
            .collect()
    }

    fn equals_same(&self, other: &dyn MapEntries) -> Option<bool> {
        let other = other.as_any().downcast_ref::<Self>()?;
        if self.entries.len() != other.entries.len() {
            return Some(false);
        }
        Some(self.index.iter().all(|(key, &i)| {
            other
                .index
                .get(key)
                .is_some_and(|&j| self.adapter.equals(&self.entries[i].1, &other.entries[j].1))
        }))
    }

    fn as_any(&self) -> &dyn StdAny {
        self
    }
}

// ==================== CelObject ====================

#[derive(Debug, Clone)]
pub struct CelObject {
    fields: Arc<dyn StructFields>,
    ty: CelType,
}

impl CelObject {
    pub fn new(fields: Arc<dyn StructFields>, ty: CelType) -> Self {
        Self { fields, ty }
    }

    pub fn cel_type(&self) -> &CelType {
        &self.ty
    }

    pub fn backing(&self) -> &dyn StructFields {
        self.fields.as_ref()
    }

    /// Field `name`, or a "field not found" error naming this type.
    pub fn get(&self, id: i64, name: &str) -> CelResult {
        self.fields
            .get(id, name)
            .unwrap_or_else(|| Err(CelError::field_not_found(id, name, Some(&self.ty.name())).into()))
    }

    pub fn is_set(&self, id: i64, name: &str) -> CelResult<bool> {
        self.fields.is_set(id, name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.field_names()
    }
}

/// A struct-like host value read through adapter `A`.
#[derive(Debug, Clone)]
pub struct AdaptedObject<A: ValueAdapter> {
    adapter: A,
    value: A::Native,
}

impl<A: ValueAdapter> AdaptedObject<A> {
    pub fn new(adapter: A, value: A::Native) -> Self {
        Self { adapter, value }
    }

    pub fn value(&self) -> &A::Native {
        &self.value
    }

    pub fn into_object(self, ty: CelType) -> CelObject {
        CelObject::new(Arc::new(self), ty)
    }
}

impl<A: ValueAdapter> StructFields for AdaptedObject<A> {
    fn get(&self, id: i64, name: &str) -> Option<CelResult> {
        self.adapter.access_by_name(id, &self.value, name)
    }

    fn is_set(&self, id: i64, name: &str) -> CelResult<bool> {
        self.adapter.is_set_by_name(id, &self.value, name)
    }

    fn field_names(&self) -> Vec<String> {
        self.adapter.get_fields(&self.value)
    }

    fn as_any(&self) -> &dyn StdAny {
        self
    }
}
