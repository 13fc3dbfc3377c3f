//! Name trees and number trees (spec §3.3): balanced B-tree-like
//! structures whose leaves hold sorted `(key, value)` pairs. Edits happen
//! on an in-memory `Node` tree; `bind_name_trees` reconciles that back to
//! the on-disk dict shape (spec §9 "Deferred bind of name trees").

use pdf_object::{Dict, Object, ObjectId};

use crate::xref::XRefTable;

/// A tree key: PDF string for name trees, integer for number trees (spec
/// §3.3).
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum TreeKey {
    Name(Vec<u8>),
    Number(i64),
}

/// The in-memory form of one name/number tree, cached by name (`Dests`,
/// `EmbeddedFiles`, ...) so repeated lookups and edits don't re-walk the
/// on-disk dict chain every time.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub entries: Vec<(TreeKey, Object)>,
    pub kids: Vec<Node>,
}

impl Node {
    /// This node's key range, recomputed bottom-up (spec §8 invariant 6,
    /// §9 "the bound form's Limits arrays must be recomputed bottom-up").
    pub fn limits(&self) -> Option<(TreeKey, TreeKey)> {
        let mut min: Option<TreeKey> = None;
        let mut max: Option<TreeKey> = None;

        let mut consider = |k: &TreeKey| {
            if min.as_ref().map(|m| key_lt(k, m)).unwrap_or(true) {
                min = Some(k.clone());
            }
            if max.as_ref().map(|m| key_lt(m, k)).unwrap_or(true) {
                max = Some(k.clone());
            }
        };

        for (k, _) in &self.entries {
            consider(k);
        }
        for kid in &self.kids {
            if let Some((kmin, kmax)) = kid.limits() {
                consider(&kmin);
                consider(&kmax);
            }
        }
        min.zip(max)
    }

    pub fn flatten(&self) -> Vec<(TreeKey, Object)> {
        let mut out = self.entries.clone();
        for kid in &self.kids {
            out.extend(kid.flatten());
        }
        out
    }

    pub fn get(&self, key: &TreeKey) -> Option<&Object> {
        if let Some((_, v)) = self.entries.iter().find(|(k, _)| k == key) {
            return Some(v);
        }
        self.kids.iter().find_map(|kid| kid.get(key))
    }

    pub fn insert(&mut self, key: TreeKey, value: Object) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }
        if self.kids.is_empty() {
            self.entries.push((key, value));
            self.entries
                .sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            // Insert into whichever kid's range best fits; falls back to
            // the last kid for keys past every existing range.
            let idx = self
                .kids
                .iter()
                .position(|kid| kid.limits().map(|(_, max)| !key_lt(&max, &key)).unwrap_or(true))
                .unwrap_or(self.kids.len() - 1);
            self.kids[idx].insert(key, value);
        }
    }
}

fn key_lt(a: &TreeKey, b: &TreeKey) -> bool {
    a.partial_cmp(b) == Some(std::cmp::Ordering::Less)
}

/// Parse an on-disk name/number tree dict into its in-memory `Node` form
/// (spec §3.3). `number` selects the `/Nums` key instead of `/Names`.
pub fn parse_tree(xref: &XRefTable, dict: &Dict, number: bool) -> Node {
    let entries_key: &[u8] = if number { b"Nums" } else { b"Names" };

    if let Some(flat) = xref.dereference_array(dict.get(entries_key).unwrap_or(&Object::Null)) {
        let mut entries = Vec::new();
        let mut iter = flat.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            let key = if number {
                xref.dereference_integer(&k).map(TreeKey::Number)
            } else {
                xref.dereference_string(&k).map(TreeKey::Name)
            };
            if let Some(key) = key {
                entries.push((key, v));
            }
        }
        return Node {
            entries,
            kids: Vec::new(),
        };
    }

    if let Some(kids) = xref.dereference_array(dict.get(b"Kids").unwrap_or(&Object::Null)) {
        let kids = kids
            .iter()
            .filter_map(|k| xref.dereference_dict(k))
            .map(|kid_dict| parse_tree(xref, &kid_dict, number))
            .collect();
        return Node {
            entries: Vec::new(),
            kids,
        };
    }

    Node::default()
}

/// Reconcile an edited `Node` tree back into on-disk dicts, recomputing
/// `Limits` bottom-up and writing each non-root node's limits array (spec
/// §4.4 `bind_name_trees`, §9 "Deferred bind of name trees"). Returns the
/// `ObjectId` of the (possibly newly-inserted) root dict.
pub fn bind_name_trees(xref: &mut XRefTable, node: &Node, number: bool, is_root: bool) -> ObjectId {
    let mut dict = Dict::new();
    let entries_key: Vec<u8> = if number { b"Nums".to_vec() } else { b"Names".to_vec() };

    if node.kids.is_empty() {
        let mut flat = Vec::with_capacity(node.entries.len() * 2);
        for (k, v) in &node.entries {
            flat.push(key_to_object(k));
            flat.push(v.clone());
        }
        dict.set(entries_key, Object::Array(flat));
    } else {
        let mut kid_refs = Vec::new();
        for kid in &node.kids {
            let kid_id = bind_name_trees(xref, kid, number, false);
            if !is_root {
                if let Some((min, max)) = kid.limits() {
                    if let Some(Object::Dict(kid_dict)) = xref.find_mut(kid_id.number).and_then(|e| e.object.as_mut()) {
                        kid_dict.set(b"Limits".to_vec(), Object::Array(vec![key_to_object(&min), key_to_object(&max)]));
                    }
                }
            }
            kid_refs.push(Object::Reference(kid_id));
        }
        dict.set(b"Kids".to_vec(), Object::Array(kid_refs));
    }

    if !is_root {
        if let Some((min, max)) = node.limits() {
            dict.set(b"Limits".to_vec(), Object::Array(vec![key_to_object(&min), key_to_object(&max)]));
        }
    }

    xref.insert_and_use_recycled(Object::Dict(dict))
}

fn key_to_object(key: &TreeKey) -> Object {
    match key {
        TreeKey::Name(n) => Object::StringLiteral(n.clone()),
        TreeKey::Number(n) => Object::Integer(*n),
    }
}

/// Find a named tree under `/Root/Names/<name>` (spec §4.4
/// `locate_name_tree`), e.g. `locate_name_tree(xref, catalog, b"Dests")`.
pub fn locate_name_tree(xref: &XRefTable, catalog: &Dict, name: &[u8]) -> Option<Node> {
    let names = xref.dereference_dict(catalog.get(b"Names")?)?;
    let tree_dict = xref.dereference_dict(names.get(name)?)?;
    Some(parse_tree(xref, &tree_dict, false))
}

/// Remove a named tree from `/Root/Names` entirely (spec §4.4
/// `remove_name_tree`), e.g. when the last embedded file is deleted.
pub fn remove_name_tree(xref: &mut XRefTable, catalog_id: ObjectId, name: &[u8]) {
    let Some(Object::Dict(catalog)) = xref.find(catalog_id.number).and_then(|e| e.object.clone()) else {
        return;
    };
    let Some(names_ref) = catalog.get(b"Names").cloned() else {
        return;
    };
    let Object::Reference(names_id) = names_ref else {
        return;
    };
    if let Some(Object::Dict(names_dict)) = xref.find_mut(names_id.number).and_then(|e| e.object.as_mut()) {
        names_dict.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_tree_reads_flat_leaf() {
        let xref = XRefTable::new();
        let mut dict = Dict::new();
        dict.set(
            b"Names".to_vec(),
            Object::Array(vec![
                Object::StringLiteral(b"a".to_vec()),
                Object::Integer(1),
                Object::StringLiteral(b"b".to_vec()),
                Object::Integer(2),
            ]),
        );
        let node = parse_tree(&xref, &dict, false);
        assert_eq!(node.entries.len(), 2);
        assert_eq!(node.get(&TreeKey::Name(b"a".to_vec())), Some(&Object::Integer(1)));
    }

    #[test]
    fn leaf_limits_span_its_sorted_entries() {
        let node = Node {
            entries: vec![
                (TreeKey::Name(b"alpha".to_vec()), Object::Null),
                (TreeKey::Name(b"zeta".to_vec()), Object::Null),
            ],
            kids: Vec::new(),
        };
        let (min, max) = node.limits().unwrap();
        assert_eq!(min, TreeKey::Name(b"alpha".to_vec()));
        assert_eq!(max, TreeKey::Name(b"zeta".to_vec()));
    }

    #[test]
    fn insert_keeps_flat_leaf_sorted() {
        let mut node = Node::default();
        node.insert(TreeKey::Number(3), Object::Null);
        node.insert(TreeKey::Number(1), Object::Null);
        node.insert(TreeKey::Number(2), Object::Null);
        let keys: Vec<_> = node.entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![TreeKey::Number(1), TreeKey::Number(2), TreeKey::Number(3)]
        );
    }

    #[test]
    fn bind_name_trees_writes_limits_on_non_root_kids() {
        let mut xref = XRefTable::new();
        let root = Node {
            entries: Vec::new(),
            kids: vec![
                Node {
                    entries: vec![(TreeKey::Name(b"a".to_vec()), Object::Integer(1))],
                    kids: Vec::new(),
                },
                Node {
                    entries: vec![(TreeKey::Name(b"z".to_vec()), Object::Integer(2))],
                    kids: Vec::new(),
                },
            ],
        };
        let root_id = bind_name_trees(&mut xref, &root, false, true);
        let Object::Dict(root_dict) = xref.dereference(root_id) else {
            panic!("expected dict");
        };
        let kids = root_dict.array_entry(b"Kids").unwrap();
        for kid in kids {
            let Object::Reference(kid_id) = kid else {
                panic!("expected reference");
            };
            let Object::Dict(kid_dict) = xref.dereference(*kid_id) else {
                panic!("expected dict");
            };
            assert!(kid_dict.contains_key(b"Limits"));
        }
    }
}
