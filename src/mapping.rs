//! Immutable lookup from a message key (status byte + first data byte) to the
//! ordered key-sequence names bound to it.

use std::{collections::HashMap, ops::Range};

use thiserror::Error;

use crate::message::MessageKind;

/// Bytes of a raw message that take part in the lookup.
pub const KEY_LEN: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("mapping #{index}: key is empty")]
    EmptyKey { index: usize },
    #[error("mapping #{index}: key {key:02x?} is longer than status + first data byte")]
    KeyTooLong { index: usize, key: Vec<u8> },
    #[error("mapping #{index}: key {key:02x?} is missing the first data byte")]
    KeyTooShort { index: usize, key: Vec<u8> },
    #[error("mapping #{index}: {byte:#04x} is not a status byte")]
    NotStatus { index: usize, byte: u8 },
    #[error("mapping #{index}: data byte {byte:#04x} is above 0x7f")]
    BadData { index: usize, byte: u8 },
    #[error("mapping #{index}: key {key:02x?} is already mapped")]
    Duplicate { index: usize, key: Vec<u8> },
}

/// Position of a name in the table's flat name list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NameId(usize);

impl NameId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Built once on the startup thread, then only read.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: HashMap<Vec<u8>, Range<usize>>,
    names: Vec<String>,
}

impl MappingTable {
    pub fn build<I>(pairs: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<String>)>,
    {
        let mut table = Self::default();

        for (index, (key, names)) in pairs.into_iter().enumerate() {
            validate_key(index, &key)?;
            if table.entries.contains_key(&key) {
                return Err(MappingError::Duplicate { index, key });
            }

            let start = table.names.len();
            table.names.extend(names);
            table.entries.insert(key, start..table.names.len());
        }

        Ok(table)
    }

    /// Lookup key for a raw event: its first `KEY_LEN` bytes.
    pub fn key_of(raw: &[u8]) -> &[u8] {
        &raw[..raw.len().min(KEY_LEN)]
    }

    /// Exact match on `key`. Never allocates.
    pub fn lookup(&self, key: &[u8]) -> Option<Names<'_>> {
        let range = self.entries.get(key)?;
        Some(Names {
            first: range.start,
            names: &self.names[range.clone()],
        })
    }

    pub fn name(&self, id: NameId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    /// Every configured name, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = (NameId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (NameId(i), name.as_str()))
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Channel messages are keyed by status and first data byte; a status-only
/// key is reserved for kinds that carry no data.
fn validate_key(index: usize, key: &[u8]) -> Result<(), MappingError> {
    match key {
        [] => Err(MappingError::EmptyKey { index }),
        _ if key.len() > KEY_LEN => Err(MappingError::KeyTooLong {
            index,
            key: key.to_vec(),
        }),
        [status, ..] if *status < 0x80 => Err(MappingError::NotStatus {
            index,
            byte: *status,
        }),
        [status] if MessageKind::from_status(*status).data_len() > 0 => {
            Err(MappingError::KeyTooShort {
                index,
                key: key.to_vec(),
            })
        }
        [_, data] if *data > 0x7F => Err(MappingError::BadData { index, byte: *data }),
        _ => Ok(()),
    }
}

/// Names bound to one key, in configuration order.
#[derive(Clone, Copy, Debug)]
pub struct Names<'t> {
    first: usize,
    names: &'t [String],
}

impl<'t> Names<'t> {
    pub fn iter(&self) -> impl Iterator<Item = (NameId, &'t str)> + use<'t> {
        let first = self.first;
        self.names
            .iter()
            .enumerate()
            .map(move |(i, name)| (NameId(first + i), name.as_str()))
    }

    pub fn get(&self, i: usize) -> Option<(NameId, &'t str)> {
        let name = self.names.get(i)?;
        Some((NameId(self.first + i), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &[u8], names: &[&str]) -> (Vec<u8>, Vec<String>) {
        (key.to_vec(), names.iter().map(|n| n.to_string()).collect())
    }

    fn collect(names: Names<'_>) -> Vec<String> {
        names.iter().map(|(_, n)| n.to_string()).collect()
    }

    #[test]
    fn looks_up_exact_key() {
        let table = MappingTable::build([
            entry(&[0x90, 0x3C], &["a", "b"]),
            entry(&[0xB0, 0x07], &["volup"]),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(collect(table.lookup(&[0x90, 0x3C]).unwrap()), ["a", "b"]);
        assert_eq!(collect(table.lookup(&[0xB0, 0x07]).unwrap()), ["volup"]);
        assert!(table.lookup(&[0x90, 0x3D]).is_none());
        assert!(table.lookup(&[0x91, 0x3C]).is_none());
        assert!(table.lookup(&[0x90]).is_none());
    }

    #[test]
    fn lookup_is_deterministic() {
        let table = MappingTable::build([entry(&[0x90, 0x3C], &["a", "b", "c"])]).unwrap();
        let first = collect(table.lookup(&[0x90, 0x3C]).unwrap());
        for _ in 0..100 {
            assert_eq!(collect(table.lookup(&[0x90, 0x3C]).unwrap()), first);
        }
    }

    #[test]
    fn key_of_truncates_to_status_and_data1() {
        assert_eq!(MappingTable::key_of(&[0x90, 0x3C, 0x64]), &[0x90, 0x3C]);
        assert_eq!(MappingTable::key_of(&[0xC0, 0x01]), &[0xC0, 0x01]);
        assert_eq!(MappingTable::key_of(&[0xF8]), &[0xF8]);
    }

    #[test]
    fn name_ids_index_the_flat_list() {
        let table = MappingTable::build([
            entry(&[0x90, 0x3C], &["a", "b"]),
            entry(&[0x90, 0x3E], &["c"]),
        ])
        .unwrap();

        let ids: Vec<_> = table
            .lookup(&[0x90, 0x3E])
            .unwrap()
            .iter()
            .map(|(id, _)| id.index())
            .collect();
        assert_eq!(ids, [2]);
        assert_eq!(table.name(NameId(1)), Some("b"));
        assert_eq!(table.name(NameId(3)), None);
        assert_eq!(table.names().count(), 3);
    }

    #[test]
    fn empty_name_list_is_still_a_match() {
        let table = MappingTable::build([entry(&[0x80, 0x10], &[])]).unwrap();
        assert!(table.lookup(&[0x80, 0x10]).unwrap().iter().next().is_none());
    }

    #[test]
    fn rejects_bad_keys() {
        assert_eq!(
            MappingTable::build([entry(&[], &["a"])]).unwrap_err(),
            MappingError::EmptyKey { index: 0 }
        );
        assert_eq!(
            MappingTable::build([entry(&[0x90, 0x3C, 0x64], &["a"])]).unwrap_err(),
            MappingError::KeyTooLong {
                index: 0,
                key: vec![0x90, 0x3C, 0x64]
            }
        );
        assert_eq!(
            MappingTable::build([entry(&[0x3C, 0x64], &["a"])]).unwrap_err(),
            MappingError::NotStatus {
                index: 0,
                byte: 0x3C
            }
        );
        assert_eq!(
            MappingTable::build([entry(&[0x90, 0x80], &["a"])]).unwrap_err(),
            MappingError::BadData {
                index: 0,
                byte: 0x80
            }
        );
    }

    #[test]
    fn status_only_keys_need_a_dataless_kind() {
        for status in [0x90, 0xB3, 0xC0, 0xD0] {
            assert_eq!(
                MappingTable::build([entry(&[status], &["a"])]).unwrap_err(),
                MappingError::KeyTooShort {
                    index: 0,
                    key: vec![status]
                }
            );
        }
        let table =
            MappingTable::build([entry(&[0xF8], &["a"]), entry(&[0xFA], &["b"])]).unwrap();
        assert!(table.lookup(&[0xF8]).is_some());
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = MappingTable::build([
            entry(&[0x90, 0x3C], &["a"]),
            entry(&[0x90, 0x3C], &["b"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            MappingError::Duplicate {
                index: 1,
                key: vec![0x90, 0x3C]
            }
        );
    }
}
