// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Symbols and record types.
//!
//! Field names are interned into symbols, and a record type is the ordered
//! list of its field symbols. Records built from the same field list share a
//! type id, and their values are stored in that order.

use rustc_hash::FxHashMap;

/// Interned field names.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: FxHashMap<String, usize>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, adding it if needed.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Looks up the name of symbol `id`.
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The shape of a record: its field symbols in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    /// Field symbols, in storage order
    pub fields: Vec<usize>,
}

impl RecordType {
    /// Position of `symbol` in the record's values.
    pub fn field_index(&self, symbol: usize) -> Option<usize> {
        self.fields.iter().position(|field| *field == symbol)
    }
}

/// All record types, deduplicated by field list.
#[derive(Debug, Default)]
pub struct RecordTypes {
    types: Vec<RecordType>,
    ids: FxHashMap<Vec<usize>, usize>,
}

impl RecordTypes {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the type id for `fields`, adding it if needed.
    pub fn intern(&mut self, fields: Vec<usize>) -> usize {
        if let Some(id) = self.ids.get(&fields) {
            return *id;
        }
        let id = self.types.len();
        self.ids.insert(fields.clone(), id);
        self.types.push(RecordType { fields });
        id
    }

    /// Looks up a record type.
    pub fn get(&self, id: usize) -> Option<&RecordType> {
        self.types.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_symbols() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        let y = symbols.intern("y");
        assert_ne!(x, y);
        assert_eq!(symbols.intern("x"), x);
        assert_eq!(symbols.name(y), Some("y"));
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn test_record_types_are_shared() {
        let mut types = RecordTypes::new();
        let a = types.intern(vec![0, 1]);
        let b = types.intern(vec![0, 1]);
        let c = types.intern(vec![1, 0]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_field_index() {
        let ty = RecordType {
            fields: vec![4, 2, 9],
        };
        assert_eq!(ty.field_index(2), Some(1));
        assert_eq!(ty.field_index(5), None);
    }
}
