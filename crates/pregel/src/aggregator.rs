//! Named, concurrent-safe reduction registers.
//!
//! Aggregators let compute functions and executor callbacks coordinate
//! across supersteps without any locking inside the engine: every
//! implementation is required to be concurrency-safe on its own.
//! Values are exchanged as `serde_json::Value` so heterogeneous
//! aggregators can share one registry.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde_json::Value;

/// A concurrent-safe reduction register.
pub trait Aggregator: Send + Sync {
    /// A short tag describing the aggregation this register performs.
    fn kind(&self) -> &str;

    /// Overwrites the current value.
    fn set(&self, value: Value);

    /// The current value.
    fn get(&self) -> Value;

    /// Folds `value` into the register.
    fn aggregate(&self, value: Value);

    /// The change in value since the previous call to `delta`.
    fn delta(&self) -> Value;
}

/// A lock-free signed integer adder. Non-numeric inputs count as zero.
#[derive(Debug, Default)]
pub struct IntAggregator {
    current: AtomicI64,
    last_delta: AtomicI64,
}

impl IntAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for IntAggregator {
    fn kind(&self) -> &str {
        "int"
    }

    fn set(&self, value: Value) {
        self.current
            .store(value.as_i64().unwrap_or(0), Ordering::SeqCst);
    }

    fn get(&self) -> Value {
        Value::from(self.current.load(Ordering::SeqCst))
    }

    fn aggregate(&self, value: Value) {
        self.current
            .fetch_add(value.as_i64().unwrap_or(0), Ordering::SeqCst);
    }

    fn delta(&self) -> Value {
        let current = self.current.load(Ordering::SeqCst);
        let previous = self.last_delta.swap(current, Ordering::SeqCst);
        Value::from(current - previous)
    }
}

/// A lock-free float adder built on compare-and-swap over the value's
/// bit pattern. Non-numeric inputs count as zero.
#[derive(Debug, Default)]
pub struct Float64Aggregator {
    current: AtomicU64,
    last_delta: AtomicU64,
}

impl Float64Aggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for Float64Aggregator {
    fn kind(&self) -> &str {
        "float64"
    }

    fn set(&self, value: Value) {
        self.current
            .store(value.as_f64().unwrap_or(0.0).to_bits(), Ordering::SeqCst);
    }

    fn get(&self) -> Value {
        Value::from(f64::from_bits(self.current.load(Ordering::SeqCst)))
    }

    fn aggregate(&self, value: Value) {
        let addend = value.as_f64().unwrap_or(0.0);
        loop {
            let old = self.current.load(Ordering::SeqCst);
            let new = (f64::from_bits(old) + addend).to_bits();
            if self
                .current
                .compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }

    fn delta(&self) -> Value {
        let current = self.current.load(Ordering::SeqCst);
        let previous = self.last_delta.swap(current, Ordering::SeqCst);
        Value::from(f64::from_bits(current) - f64::from_bits(previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn int_aggregator_accumulates() {
        let aggr = IntAggregator::new();
        aggr.aggregate(Value::from(3));
        aggr.aggregate(Value::from(4));
        assert_eq!(aggr.get(), Value::from(7));
        assert_eq!(aggr.delta(), Value::from(7));
        aggr.aggregate(Value::from(1));
        assert_eq!(aggr.delta(), Value::from(1));
    }

    #[test]
    fn float_aggregator_accumulates() {
        let aggr = Float64Aggregator::new();
        aggr.aggregate(Value::from(0.5));
        aggr.aggregate(Value::from(1.25));
        assert_eq!(aggr.get(), Value::from(1.75));
    }

    #[test]
    fn set_overwrites() {
        let aggr = IntAggregator::new();
        aggr.aggregate(Value::from(41));
        aggr.set(Value::from(5));
        assert_eq!(aggr.get(), Value::from(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_aggregation_is_lossless() {
        let aggr = Arc::new(Float64Aggregator::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let aggr = aggr.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    aggr.aggregate(Value::from(1.0));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(aggr.get(), Value::from(8000.0));
    }
}
