//! Per-request template data.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use minijinja::Value;

/// Ad-hoc values a handler passes into templates as `data`.
///
/// A fresh `Data` is created for every request, stamped with the time the
/// render middleware saw it, so nothing here is shared between requests.
#[derive(Clone, Debug)]
pub struct Data {
    started: Instant,
    values: BTreeMap<String, Value>,
}

impl Data {
    pub fn new() -> Self {
        Self { started: Instant::now(), values: BTreeMap::new() }
    }

    /// Time since the request entered the render middleware.
    pub fn elapsed(&self) -> Duration { self.started.elapsed() }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> { self.values.get(key) }

    /// The template view: every inserted value plus `elapsed_us`, the
    /// microseconds since the request started, unless a handler set its own.
    pub(crate) fn to_value(&self) -> Value {
        let mut view: BTreeMap<&str, Value> = self.values.iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        view.entry("elapsed_us")
            .or_insert_with(|| Value::from(self.elapsed().as_micros() as u64));
        Value::from_serialize(&view)
    }
}

impl Default for Data {
    fn default() -> Self { Self::new() }
}
