use std::collections::BTreeMap;

use crate::object::{Name, Object};
use crate::reference::ObjectId;

/// A PDF dictionary: Name → Object.
///
/// Backed by a `BTreeMap` ordered by the name's byte value. Spec §3.1 says
/// insertion order is not part of a dict's identity, and §4.1 requires
/// `PDFString` to serialize keys alphabetically — a `BTreeMap<Name, _>`
/// gives us both for free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict(BTreeMap<Name, Object>);

impl Dict {
    pub fn new() -> Self {
        Dict(BTreeMap::new())
    }

    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<Name>, value: Object) -> Option<Object> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Object)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The dict's `/Type` name, without the leading slash, if present.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.name_entry(b"Type")
    }

    /// The dict's `/Subtype` name, without the leading slash, if present.
    pub fn subtype_name(&self) -> Option<&[u8]> {
        self.name_entry(b"Subtype")
    }

    pub fn is_objstm(&self) -> bool {
        self.type_name() == Some(b"ObjStm")
    }

    pub fn is_xref_stream(&self) -> bool {
        self.type_name() == Some(b"XRef")
    }

    /// True for the linearization parameter dictionary: a dict whose sole
    /// identifying trait is a `/Linearized` numeric entry (it carries no
    /// `/Type`). We don't implement linearized writing (out of scope, spec
    /// §1/§6.1), but the reader must still recognize and skip one.
    pub fn is_linearization_param_dict(&self) -> bool {
        self.contains_key(b"Linearized") && self.contains_key(b"N") && self.contains_key(b"H")
    }

    pub fn boolean_entry(&self, key: &[u8]) -> Option<bool> {
        match self.get(key) {
            Some(Object::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn int_entry(&self, key: &[u8]) -> Option<i64> {
        match self.get(key) {
            Some(Object::Integer(n)) => Some(*n),
            Some(Object::Real(f)) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn number_entry(&self, key: &[u8]) -> Option<f64> {
        match self.get(key) {
            Some(Object::Integer(n)) => Some(*n as f64),
            Some(Object::Real(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn name_entry(&self, key: &[u8]) -> Option<&[u8]> {
        match self.get(key) {
            Some(Object::Name(n)) => Some(n.as_slice()),
            _ => None,
        }
    }

    pub fn indirect_ref_entry(&self, key: &[u8]) -> Option<ObjectId> {
        match self.get(key) {
            Some(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn dict_entry(&self, key: &[u8]) -> Option<&Dict> {
        match self.get(key) {
            Some(Object::Dict(d)) => Some(d),
            _ => None,
        }
    }

    pub fn array_entry(&self, key: &[u8]) -> Option<&[Object]> {
        match self.get(key) {
            Some(Object::Array(a)) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// Raw bytes of a `StringLiteral`/`HexLiteral` entry, whichever form it
    /// was stored in (spec §4.1: both decode to bytes identically).
    pub fn string_entry_bytes(&self, key: &[u8]) -> Option<&[u8]> {
        match self.get(key) {
            Some(Object::StringLiteral(s)) | Some(Object::HexLiteral(s)) => Some(s.as_slice()),
            _ => None,
        }
    }
}

impl FromIterator<(Name, Object)> for Dict {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        Dict(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut d = Dict::new();
        d.set(b"Type".to_vec(), Object::Name(b"Page".to_vec()));
        d.set(b"Count".to_vec(), Object::Integer(3));
        d.set(b"Root".to_vec(), Object::Reference(ObjectId::new(1, 0)));

        assert_eq!(d.type_name(), Some(b"Page".as_slice()));
        assert_eq!(d.int_entry(b"Count"), Some(3));
        assert_eq!(d.indirect_ref_entry(b"Root"), Some(ObjectId::new(1, 0)));
        assert_eq!(d.int_entry(b"Missing"), None);
    }

    #[test]
    fn serializes_keys_alphabetically_via_btreemap_order() {
        let mut d = Dict::new();
        d.set(b"Zeta".to_vec(), Object::Null);
        d.set(b"Alpha".to_vec(), Object::Null);
        d.set(b"Mid".to_vec(), Object::Null);
        let keys: Vec<&[u8]> = d.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"Alpha".as_slice(), b"Mid", b"Zeta"]);
    }
}
