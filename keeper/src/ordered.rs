//! A mapping that keeps the order in which its keys were authored. Axis order drives the order
//! of the expansion and build arguments are passed in the order they are written, so neither can
//! go through a hash map or a sorted map.

use std::{fmt, marker::PhantomData};

use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

/// The matrix values of one build instance, axis name to chosen value.
pub type Assignment = OrderedMap<String>;

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value in place when the key exists, otherwise appends it.
    pub fn insert(&mut self, key: String, value: V) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &V)> + Clone {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: the entries of `overrides` replace those of `self` with the same key.
    pub fn merged(mut self, overrides: Self) -> Self {
        for (key, value) in overrides.0 {
            self.insert(key, value);
        }
        self
    }

    pub fn map_values<W, E>(
        &self,
        mut f: impl FnMut(&str, &V) -> Result<W, E>,
    ) -> Result<OrderedMap<W>, E> {
        self.0
            .iter()
            .map(|(k, v)| Ok((k.clone(), f(k, v)?)))
            .collect::<Result<Vec<_>, E>>()
            .map(OrderedMap)
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<V, K: Into<String>, W: Into<V>> FromIterator<(K, W)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, W)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert(key.into(), value.into());
        }
        map
    }
}

impl fmt::Display for OrderedMap<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping with string keys")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, V)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!("duplicate key {key:?}")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization_keeps_authored_order() {
        let map: OrderedMap<String> = serde_yaml::from_str("zeta: a\nalpha: b\nmid: c\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"zeta":"a","alpha":"b","mid":"c"}"#);
    }

    #[test]
    fn merged_overrides_in_place_and_appends_new_keys() {
        let base: OrderedMap<String> = [("A", "1"), ("B", "2")].into_iter().collect();
        let child: OrderedMap<String> = [("C", "3"), ("A", "9")].into_iter().collect();
        assert_eq!(
            base.merged(child),
            [("A", "9"), ("B", "2"), ("C", "3")].into_iter().collect()
        );
    }

    #[test]
    fn values_iterate_from_both_ends() {
        let map: Assignment = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(map.values().rev().collect::<Vec<_>>(), ["3", "2", "1"]);
    }

    #[test]
    fn display_lists_entries_in_order() {
        let map: Assignment = [("base", "4.14"), ("coq", "8.18")].into_iter().collect();
        assert_eq!(map.to_string(), "{base: 4.14, coq: 8.18}");
    }
}
