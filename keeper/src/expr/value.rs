use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ordered::OrderedMap;

/// A node of the evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    /// A list as is, a string as a list of one. Mappings have no list form.
    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Value::Str(s) => Some(vec![s]),
            Value::List(list) => Some(list),
            Value::Map(_) => None,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl<V: Into<Value> + Clone> From<&OrderedMap<V>> for Value {
    fn from(value: &OrderedMap<V>) -> Self {
        Value::Map(
            value
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone().into()))
                .collect(),
        )
    }
}

/// The immutable, nested key-value store that placeholders are looked up in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    root: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.root.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }
}
