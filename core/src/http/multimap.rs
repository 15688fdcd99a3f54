/*
 * multimap.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tramite, a pluggable synchronous HTTP client.
 *
 * Tramite is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tramite is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tramite.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Ordered multi-valued map used for headers and query parameters.
//!
//! Keys are unique and keep their first insertion position; each key maps to its values in the
//! order they were added. Header maps compare names case-insensitively (the first spelling is
//! kept); query maps compare exactly.

/// Ordered name → values map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: Vec<(String, Vec<String>)>,
    ignore_case: bool,
}

impl MultiMap {
    /// Exact-match map (query parameters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive map (header names).
    pub fn headers() -> Self {
        Self {
            entries: Vec::new(),
            ignore_case: true,
        }
    }

    fn key_matches(&self, a: &str, b: &str) -> bool {
        if self.ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| self.key_matches(k, name))
    }

    /// Append a value under `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Append several values under `name`. An empty list still registers the key.
    pub fn add_all<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let i = match self.position(&name) {
            Some(i) => i,
            None => {
                self.entries.push((name, Vec::new()));
                self.entries.len() - 1
            }
        };
        self.entries[i].1.extend(values.into_iter().map(Into::into));
    }

    /// Replace all values under `name` with one value; keeps the key's position if present.
    pub fn replace(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = vec![value.into()],
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// Remove `name`; returns its values if present.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let i = self.position(name)?;
        Some(self.entries.remove(i).1)
    }

    /// First value under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values under `name` (empty slice if absent).
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].1,
            None => &[],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Flattened (name, value) pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Values accepted by the bulk-merge operations: collections flatten into repeated entries,
/// scalars are stringified.
pub trait ParamValues {
    fn into_values(self) -> Vec<String>;
}

impl ParamValues for String {
    fn into_values(self) -> Vec<String> {
        vec![self]
    }
}

impl ParamValues for &str {
    fn into_values(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl ParamValues for &String {
    fn into_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<T: ToString> ParamValues for Vec<T> {
    fn into_values(self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

impl<T: ToString> ParamValues for &[T] {
    fn into_values(self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

impl<T: ToString, const N: usize> ParamValues for [T; N] {
    fn into_values(self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

macro_rules! scalar_param_values {
    ($($t:ty),*) => {
        $(
            impl ParamValues for $t {
                fn into_values(self) -> Vec<String> {
                    vec![self.to_string()]
                }
            }
        )*
    };
}

scalar_param_values!(bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
