use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::ValueAdapter;
use crate::value::{CelError, CelList, CelMap, CelObject, CelResult, CelVal, MapKey};

/// The identity adapter over [`CelVal`] itself, and the home of CEL's
/// equality and ordering rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CelAdapter;

/// A number lifted out of its CEL type for cross-type comparison.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Double(f64),
}

fn as_num(val: &CelVal) -> Option<Num> {
    match val {
        CelVal::Int(i) => Some(Num::Int(i128::from(*i))),
        CelVal::UInt(u) => Some(Num::Int(i128::from(u.0))),
        CelVal::Double(d) => Some(Num::Double(*d)),
        _ => None,
    }
}

/// Exact ordering of an integer against a double, without rounding the integer.
fn cmp_int_double(i: i128, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    // Every CEL integer fits in (-2^64, 2^64).
    if d >= 18_446_744_073_709_551_616.0 {
        return Some(Ordering::Less);
    }
    if d <= -18_446_744_073_709_551_616.0 {
        return Some(Ordering::Greater);
    }
    let whole = d.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => (0.0).partial_cmp(&(d - whole)),
        other => Some(other),
    }
}

fn compare_num(lhs: Num, rhs: Num) -> Option<Ordering> {
    match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (Num::Double(a), Num::Double(b)) => a.partial_cmp(&b),
        (Num::Int(a), Num::Double(b)) => cmp_int_double(a, b),
        (Num::Double(a), Num::Int(b)) => cmp_int_double(b, a).map(Ordering::reverse),
    }
}

impl CelAdapter {
    fn equals_list(&self, lhs: &CelList, rhs: &CelList) -> bool {
        if lhs.len() != rhs.len() {
            return false;
        }
        if let Some(same) = lhs.items().equals_same(rhs.items()) {
            return same;
        }
        lhs.iter(0).zip(rhs.iter(0)).all(|pair| match pair {
            (Ok(a), Ok(b)) => self.equals(&a, &b),
            _ => false,
        })
    }

    fn equals_map(&self, lhs: &CelMap, rhs: &CelMap) -> bool {
        if lhs.len() != rhs.len() {
            return false;
        }
        if let Some(same) = lhs.backing().equals_same(rhs.backing()) {
            return same;
        }
        lhs.backing().entries(0).into_iter().all(|(k, v)| {
            let (Ok(k), Ok(v)) = (k, v) else {
                return false;
            };
            let Some(key) = MapKey::from_val(&k) else {
                return false;
            };
            match rhs.backing().get(0, &key) {
                Some(Ok(other)) => self.equals(&v, &other),
                _ => false,
            }
        })
    }

    fn equals_object(&self, lhs: &CelObject, rhs: &CelObject) -> bool {
        if !lhs.cel_type().equals(rhs.cel_type()) {
            return false;
        }
        let names: BTreeSet<String> = lhs
            .field_names()
            .into_iter()
            .chain(rhs.field_names())
            .collect();
        names.iter().all(|name| {
            match (lhs.backing().get(0, name), rhs.backing().get(0, name)) {
                (Some(Ok(a)), Some(Ok(b))) => self.equals(&a, &b),
                _ => false,
            }
        })
    }
}

impl ValueAdapter for CelAdapter {
    type Native = CelVal;

    fn to_cel(&self, _id: i64, native: &CelVal) -> CelResult {
        Ok(native.clone())
    }

    fn from_cel(&self, _id: i64, val: &CelVal) -> CelResult<CelVal> {
        Ok(val.clone())
    }

    fn equals(&self, lhs: &CelVal, rhs: &CelVal) -> bool {
        match (lhs, rhs) {
            (CelVal::Null, other) | (other, CelVal::Null) => other.is_null(),
            (CelVal::TypedNull(a), CelVal::TypedNull(b)) => a.type_name == b.type_name,
            (CelVal::TypedNull(_), _) | (_, CelVal::TypedNull(_)) => false,
            (CelVal::Wrapped(w), other) => self.equals(&w.clone().into_inner(), other),
            (other, CelVal::Wrapped(w)) => self.equals(other, &w.clone().into_inner()),
            (CelVal::Bool(a), CelVal::Bool(b)) => a == b,
            (CelVal::String(a), CelVal::String(b)) => a == b,
            (CelVal::Bytes(a), CelVal::Bytes(b)) => a == b,
            (CelVal::Timestamp(a), CelVal::Timestamp(b)) => a == b,
            (CelVal::Duration(a), CelVal::Duration(b)) => a == b,
            (CelVal::List(a), CelVal::List(b)) => self.equals_list(a, b),
            (CelVal::Map(a), CelVal::Map(b)) => self.equals_map(a, b),
            (CelVal::Object(a), CelVal::Object(b)) => self.equals_object(a, b),
            (CelVal::Type(a), CelVal::Type(b)) => a.equals(b),
            (a, b) => match (as_num(a), as_num(b)) {
                (Some(x), Some(y)) => compare_num(x, y) == Some(Ordering::Equal),
                _ => false,
            },
        }
    }

    fn compare(&self, lhs: &CelVal, rhs: &CelVal) -> Option<Ordering> {
        let lhs = self.unwrap(lhs.clone());
        let rhs = self.unwrap(rhs.clone());
        if let (Some(a), Some(b)) = (as_num(&lhs), as_num(&rhs)) {
            return compare_num(a, b);
        }
        match (&lhs, &rhs) {
            (CelVal::Bool(a), CelVal::Bool(b)) => Some(a.cmp(b)),
            (CelVal::String(a), CelVal::String(b)) => Some(a.cmp(b)),
            (CelVal::Bytes(a), CelVal::Bytes(b)) => Some(a.cmp(b)),
            (CelVal::Timestamp(a), CelVal::Timestamp(b)) => {
                Some((a.seconds, a.nanos).cmp(&(b.seconds, b.nanos)))
            }
            (CelVal::Duration(a), CelVal::Duration(b)) => {
                Some((a.seconds, a.nanos).cmp(&(b.seconds, b.nanos)))
            }
            _ => None,
        }
    }

    fn access_by_name(&self, id: i64, obj: &CelVal, name: &str) -> Option<CelResult> {
        match obj {
            CelVal::Map(m) => m.get(id, &CelVal::string(name)).transpose(),
            CelVal::Object(o) => o.backing().get(id, name),
            CelVal::TypedNull(n) => self.access_by_name(id, &n.zero, name),
            _ => None,
        }
    }

    fn is_set_by_name(&self, id: i64, obj: &CelVal, name: &str) -> CelResult<bool> {
        match obj {
            CelVal::Map(m) => Ok(m.contains_key(id, &CelVal::string(name))),
            CelVal::Object(o) => o.is_set(id, name),
            CelVal::Null | CelVal::TypedNull(_) => Ok(false),
            other => Err(CelError::bad_string_access(id, &other.cel_type()).into()),
        }
    }

    fn access_by_index(&self, id: i64, obj: &CelVal, index: &CelVal) -> Option<CelResult> {
        match obj {
            CelVal::List(l) => Some(list_index(id, l, index)),
            CelVal::Map(m) => Some(match m.get(id, index) {
                Ok(Some(v)) => Ok(v),
                Ok(None) => Err(CelError::key_not_found(id).into()),
                Err(f) => Err(f),
            }),
            CelVal::TypedNull(n) => self.access_by_index(id, &n.zero, index),
            _ => None,
        }
    }

    fn get_fields(&self, obj: &CelVal) -> Vec<String> {
        match obj {
            CelVal::Map(m) => m
                .keys(0)
                .map(|keys| {
                    keys.iter()
                        .filter_map(|k| k.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            CelVal::Object(o) => o.field_names(),
            _ => Vec::new(),
        }
    }
}

/// Index a list with an int, uint or integral double.
fn list_index(id: i64, list: &CelList, index: &CelVal) -> CelResult {
    let i = match CelAdapter.unwrap(index.clone()) {
        CelVal::Int(i) => i128::from(i),
        CelVal::UInt(u) => i128::from(u.0),
        CelVal::Double(d) if d.fract() == 0.0 && d.is_finite() => d as i128,
        CelVal::Double(d) => {
            return Err(CelError::invalid_argument(id, "_[_]", format!("non-integral index {}", d)).into())
        }
        other => return Err(CelError::bad_index_access(id, &other.cel_type()).into()),
    };
    list.get_checked(id, i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Duration, Timestamp, Wrapper};
    use cel_eval_common::CelType;

    fn eq(a: CelVal, b: CelVal) -> bool {
        CelAdapter.equals(&a, &b)
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert!(eq(CelVal::Int(1), CelVal::uint(1)));
        assert!(eq(CelVal::uint(1), CelVal::Double(1.0)));
        assert!(eq(CelVal::Int(-0), CelVal::Double(-0.0)));
        assert!(eq(CelVal::Double(-0.0), CelVal::Double(0.0)));
        assert!(!eq(CelVal::Double(f64::NAN), CelVal::Double(f64::NAN)));
        assert!(!eq(CelVal::Int(-1), CelVal::uint(u64::MAX)));
        assert!(!eq(CelVal::Int(i64::MAX), CelVal::Double(9_223_372_036_854_775_807.0)));
    }

    #[test]
    fn test_null_and_typed_null() {
        let tn = CelVal::typed_null("a.B", CelVal::Null);
        assert!(eq(CelVal::Null, tn.clone()));
        assert!(eq(tn.clone(), CelVal::typed_null("a.B", CelVal::Null)));
        assert!(!eq(tn, CelVal::typed_null("a.C", CelVal::Null)));
        assert!(!eq(CelVal::Null, CelVal::Int(0)));
    }

    #[test]
    fn test_wrappers_compare_as_scalars() {
        assert!(eq(CelVal::Wrapped(Wrapper::Int(2)), CelVal::Double(2.0)));
        assert_eq!(
            CelAdapter.compare(&CelVal::Wrapped(Wrapper::UInt(3)), &CelVal::Int(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_containers() {
        let a = CelVal::list(vec![CelVal::Int(1), CelVal::from("x")]);
        let b = CelVal::list(vec![CelVal::Double(1.0), CelVal::from("x")]);
        assert!(eq(a.clone(), b));
        assert!(!eq(a, CelVal::list(vec![CelVal::Int(1)])));

        let m1 = CelVal::map(1, vec![(CelVal::Int(1), CelVal::Bool(true))]).unwrap();
        let m2 = CelVal::map(1, vec![(CelVal::uint(1), CelVal::Bool(true))]).unwrap();
        assert!(eq(m1.clone(), m2));
        assert_eq!(CelAdapter.compare(&m1, &m1), None);
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            CelAdapter.compare(&CelVal::Int(2), &CelVal::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            CelAdapter.compare(&CelVal::Int(-2), &CelVal::Double(-2.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            CelAdapter.compare(&CelVal::Bool(false), &CelVal::Bool(true)),
            Some(Ordering::Less)
        );
        assert_eq!(
            CelAdapter.compare(&CelVal::bytes(&b"ab"[..]), &CelVal::bytes(&b"b"[..])),
            Some(Ordering::Less)
        );
        let t1 = CelVal::Timestamp(Timestamp { seconds: 1, nanos: 5 });
        let t2 = CelVal::Timestamp(Timestamp { seconds: 1, nanos: 7 });
        assert_eq!(CelAdapter.compare(&t1, &t2), Some(Ordering::Less));
        let d = CelVal::Duration(Duration { seconds: 3, nanos: 0 });
        assert_eq!(CelAdapter.compare(&t1, &d), None);
    }

    #[test]
    fn test_types_compare_loosely() {
        assert!(eq(
            CelVal::Type(CelType::list(CelType::Int)),
            CelVal::Type(CelType::dyn_list())
        ));
    }

    #[test]
    fn test_index_access() {
        let l = CelVal::list(vec![CelVal::from("a")]);
        assert_eq!(
            CelAdapter.access_by_index(1, &l, &CelVal::uint(0)).unwrap().unwrap(),
            CelVal::from("a")
        );
        let m = CelVal::map(1, vec![(CelVal::from("k"), CelVal::Int(1))]).unwrap();
        let missing = CelAdapter.access_by_index(1, &m, &CelVal::from("x")).unwrap();
        assert_eq!(missing.unwrap_err().as_error().unwrap().message, "key not found");
        assert!(CelAdapter.access_by_index(1, &CelVal::Int(1), &CelVal::Int(0)).is_none());
    }
}
