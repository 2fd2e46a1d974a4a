//! In-memory stand-in for `qf_bus`'s delivery contract (spec.md §4.1),
//! enough to unit-test a handler's idempotency/DLQ behavior without
//! Postgres. Not a drop-in replacement for `qf_bus::consume`'s claim-batch
//! concurrency semantics — single-threaded test use only.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Entry {
    pub id: i64,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<Entry>,
    next_id: i64,
    dlq: Vec<Entry>,
    acked: HashSet<i64>,
    failures: HashMap<i64, i32>,
    idempotency_seen: HashSet<String>,
}

/// A single in-process fake bus instance, one `StreamState` per named
/// stream, guarded by a `Mutex` since tests may drive it from an async
/// handler.
#[derive(Default)]
pub struct FakeBus {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, stream: &str, payload: serde_json::Value) -> i64 {
        let mut streams = self.streams.lock().unwrap();
        let state = streams.entry(stream.to_string()).or_default();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.push(Entry { id, payload });
        id
    }

    pub fn pending_count(&self, stream: &str) -> usize {
        let streams = self.streams.lock().unwrap();
        match streams.get(stream) {
            Some(state) => state
                .entries
                .iter()
                .filter(|e| !state.acked.contains(&e.id))
                .count(),
            None => 0,
        }
    }

    pub fn dlq(&self, stream: &str) -> Vec<Entry> {
        let streams = self.streams.lock().unwrap();
        streams
            .get(stream)
            .map(|s| s.dlq.clone())
            .unwrap_or_default()
    }

    /// Drive one handler pass over every unacked entry in `stream`,
    /// following the delivery contract of spec.md §4.1 (idempotency check,
    /// invoke, ack/fail/DLQ).
    pub fn drive<F>(&self, stream: &str, idempotency_key_fn: F, max_failures: i32, mut handler: impl FnMut(&serde_json::Value) -> Result<(), String>)
    where
        F: Fn(&serde_json::Value) -> String,
    {
        let pending_ids: Vec<i64> = {
            let streams = self.streams.lock().unwrap();
            let state = match streams.get(stream) {
                Some(s) => s,
                None => return,
            };
            state
                .entries
                .iter()
                .filter(|e| !state.acked.contains(&e.id))
                .map(|e| e.id)
                .collect()
        };

        for id in pending_ids {
            let (payload, key) = {
                let streams = self.streams.lock().unwrap();
                let state = streams.get(stream).unwrap();
                let entry = state.entries.iter().find(|e| e.id == id).unwrap();
                let key = idempotency_key_fn(&entry.payload);
                (entry.payload.clone(), key)
            };

            {
                let mut streams = self.streams.lock().unwrap();
                let state = streams.get_mut(stream).unwrap();
                if state.idempotency_seen.contains(&key) {
                    state.acked.insert(id);
                    continue;
                }
            }

            match handler(&payload) {
                Ok(()) => {
                    let mut streams = self.streams.lock().unwrap();
                    let state = streams.get_mut(stream).unwrap();
                    state.idempotency_seen.insert(key);
                    state.acked.insert(id);
                }
                Err(_) => {
                    let mut streams = self.streams.lock().unwrap();
                    let state = streams.get_mut(stream).unwrap();
                    let failures = state.failures.entry(id).or_insert(0);
                    *failures += 1;
                    if *failures >= max_failures {
                        let entry = state.entries.iter().find(|e| e.id == id).unwrap().clone();
                        state.dlq.push(entry);
                        state.acked.insert(id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idempotency_key_suppresses_second_delivery() {
        let bus = FakeBus::new();
        bus.append("risk.requests", json!({"requestId": "r1"}));
        let mut calls = 0;

        for _ in 0..2 {
            bus.drive(
                "risk.requests",
                |p| p["requestId"].as_str().unwrap().to_string(),
                5,
                |_p| {
                    calls += 1;
                    Ok(())
                },
            );
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn entry_dlqs_after_max_failures() {
        let bus = FakeBus::new();
        bus.append("exec.orders", json!({"orderId": "o1"}));

        for _ in 0..5 {
            bus.drive(
                "exec.orders",
                |p| p["orderId"].as_str().unwrap().to_string(),
                3,
                |_p| Err("boom".to_string()),
            );
        }

        assert_eq!(bus.dlq("exec.orders").len(), 1);
        assert_eq!(bus.pending_count("exec.orders"), 0);
    }
}
