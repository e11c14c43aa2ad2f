//! Name-keyed maps that keep document order.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A JSON object whose entry order is significant.
///
/// Progress and task maps are consulted "first entry wins", so the order the
/// backend sent them in has to survive deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedCounters<T>(Vec<(String, T)>);

impl<T> Default for NamedCounters<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> NamedCounters<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn first(&self) -> Option<(&str, &T)> {
        self.0.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> FromIterator<(String, T)> for NamedCounters<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut counters = Self::new();
        for (k, v) in iter {
            counters.insert(k, v);
        }
        counters
    }
}

impl<T: Serialize> Serialize for NamedCounters<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct CountersVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for CountersVisitor<T> {
    type Value = NamedCounters<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of named entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut counters = NamedCounters(Vec::with_capacity(access.size_hint().unwrap_or(0)));
        while let Some((k, v)) = access.next_entry::<String, T>()? {
            counters.insert(k, v);
        }
        Ok(counters)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for NamedCounters<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CountersVisitor(PhantomData))
    }
}
