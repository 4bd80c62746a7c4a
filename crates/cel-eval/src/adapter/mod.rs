//! Value adapters: one per host value representation.
//!
//! An adapter converts between its representation and [`CelVal`], and knows
//! how to compare and access values of that representation. Containers keep a
//! handle to the adapter that produced them, so a JSON list holding proto
//! messages still reads each element through the right adapter.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::value::{CelResult, CelVal};

mod cel;
mod native;
mod proto;
mod wire;

pub use cel::CelAdapter;
pub use native::NativeAdapter;
pub use proto::{ProtoAdapter, ProtoProvider};
pub use wire::WireAdapter;

/// Conversion and access for one host representation.
pub trait ValueAdapter: Clone + Debug + Send + Sync + 'static {
    /// The host representation.
    type Native: Clone + Debug + Send + Sync + 'static;

    fn to_cel(&self, id: i64, native: &Self::Native) -> CelResult;

    fn from_cel(&self, id: i64, val: &CelVal) -> CelResult<Self::Native>;

    /// CEL equality over two host values.
    fn equals(&self, lhs: &Self::Native, rhs: &Self::Native) -> bool {
        match (self.to_cel(0, lhs), self.to_cel(0, rhs)) {
            (Ok(l), Ok(r)) => CelAdapter.equals(&l, &r),
            _ => false,
        }
    }

    /// CEL ordering; `None` when the values are incomparable.
    fn compare(&self, lhs: &Self::Native, rhs: &Self::Native) -> Option<Ordering> {
        match (self.to_cel(0, lhs), self.to_cel(0, rhs)) {
            (Ok(l), Ok(r)) => CelAdapter.compare(&l, &r),
            _ => None,
        }
    }

    /// Field access; `None` when `obj` has no field `name`.
    fn access_by_name(&self, _id: i64, _obj: &Self::Native, _name: &str) -> Option<CelResult> {
        None
    }

    fn is_set_by_name(&self, _id: i64, _obj: &Self::Native, _name: &str) -> CelResult<bool> {
        Ok(false)
    }

    /// Element access; `None` when `obj` cannot be indexed.
    fn access_by_index(&self, _id: i64, _obj: &Self::Native, _index: &CelVal) -> Option<CelResult> {
        None
    }

    fn get_fields(&self, _obj: &Self::Native) -> Vec<String> {
        Vec::new()
    }

    /// Strip wrapper boxes down to the bare scalar. Every adapter shares this.
    fn unwrap(&self, val: CelVal) -> CelVal {
        match val {
            CelVal::Wrapped(w) => w.into_inner(),
            other => other,
        }
    }
}
