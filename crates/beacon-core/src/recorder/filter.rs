//! Filter callbacks.
//!
//! Global filters run first, then filters registered for the event's type,
//! each group in registration order. The first `Reject` ends evaluation.

use std::collections::HashMap;

use beacon_common::Payload;

/// Verdict of one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Reject,
}

/// What a filter gets to look at. The payload is not yet redacted.
#[derive(Debug, Clone, Copy)]
pub struct FilterInput<'a> {
    pub event_type: &'a str,
    pub name: &'a str,
    pub payload: &'a Payload,
}

type FilterFn = Box<dyn Fn(&FilterInput<'_>) -> FilterDecision + Send + Sync>;

#[derive(Default)]
pub struct FilterRegistry {
    global: Vec<FilterFn>,
    by_type: HashMap<String, Vec<FilterFn>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global<F>(&mut self, filter: F)
    where
        F: Fn(&FilterInput<'_>) -> FilterDecision + Send + Sync + 'static,
    {
        self.global.push(Box::new(filter));
    }

    pub fn add_for_type<F>(&mut self, event_type: impl Into<String>, filter: F)
    where
        F: Fn(&FilterInput<'_>) -> FilterDecision + Send + Sync + 'static,
    {
        self.by_type
            .entry(event_type.into())
            .or_default()
            .push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.by_type.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evaluate(&self, input: &FilterInput<'_>) -> FilterDecision {
        let typed = self.by_type.get(input.event_type).into_iter().flatten();
        for filter in self.global.iter().chain(typed) {
            if filter(input) == FilterDecision::Reject {
                return FilterDecision::Reject;
            }
        }
        FilterDecision::Keep
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("global", &self.global.len())
            .field("types", &self.by_type.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn input<'a>(event_type: &'a str, name: &'a str, payload: &'a Payload) -> FilterInput<'a> {
        FilterInput {
            event_type,
            name,
            payload,
        }
    }

    #[test]
    fn test_empty_registry_keeps() {
        let registry = FilterRegistry::new();
        let p = Payload::new();
        assert!(registry.is_empty());
        assert_eq!(registry.evaluate(&input("t", "n", &p)), FilterDecision::Keep);
    }

    #[test]
    fn test_order_and_short_circuit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = FilterRegistry::new();

        let log = calls.clone();
        registry.add_for_type("query", move |_: &FilterInput<'_>| {
            log.lock().unwrap().push("type-1");
            FilterDecision::Reject
        });
        let log = calls.clone();
        registry.add_global(move |_: &FilterInput<'_>| {
            log.lock().unwrap().push("global-1");
            FilterDecision::Keep
        });
        let log = calls.clone();
        registry.add_for_type("query", move |_: &FilterInput<'_>| {
            log.lock().unwrap().push("type-2");
            FilterDecision::Keep
        });

        let p = Payload::new();
        assert_eq!(
            registry.evaluate(&input("query", "select", &p)),
            FilterDecision::Reject
        );
        assert_eq!(*calls.lock().unwrap(), vec!["global-1", "type-1"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_type_filters_scoped_to_their_type() {
        let mut registry = FilterRegistry::new();
        registry.add_for_type("job", |_: &FilterInput<'_>| FilterDecision::Reject);

        let p = Payload::new();
        assert_eq!(registry.evaluate(&input("request", "GET /", &p)), FilterDecision::Keep);
        assert_eq!(registry.evaluate(&input("job", "sync", &p)), FilterDecision::Reject);
    }

    #[test]
    fn test_filter_sees_name_and_payload() {
        let mut registry = FilterRegistry::new();
        registry.add_global(|i: &FilterInput<'_>| {
            if i.name.starts_with("GET /health") || i.payload.contains_key("bot") {
                FilterDecision::Reject
            } else {
                FilterDecision::Keep
            }
        });

        let mut bot = Payload::new();
        bot.insert("bot".into(), true.into());
        let empty = Payload::new();
        assert_eq!(registry.evaluate(&input("request", "GET /health", &empty)), FilterDecision::Reject);
        assert_eq!(registry.evaluate(&input("request", "GET /", &bot)), FilterDecision::Reject);
        assert_eq!(registry.evaluate(&input("request", "GET /", &empty)), FilterDecision::Keep);
    }
}
