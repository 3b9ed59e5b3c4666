//! In-process map / shuffle / reduce engine.
//!
//! A [`Job`] maps every input to keyed values, the engine groups them by key and
//! hands each key with all of its values to exactly one `reduce` call.
//!
//! Execution has two barriers: every mapper finishes before the shuffle, and the
//! shuffle finishes before any reducer starts. The first error from any mapper or
//! reducer fails the whole job and no partial output escapes.
//!
//! Within a partition keys are reduced in ascending order. Values of one key
//! arrive in input order, but jobs must not rely on it.

use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::{FxHashMap, FxHasher};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// A key-grouped aggregation.
pub trait Job: Sync {
    type Input: Send;
    type Key: Hash + Eq + Ord + Send;
    type Value: Send;
    type Output: Send;

    fn map(&self, input: Self::Input, emit: &mut Emitter<Self::Key, Self::Value>) -> Result<()>;

    fn reduce(&self, key: Self::Key, values: Vec<Self::Value>, out: &mut Vec<Self::Output>) -> Result<()>;
}

/// Collects one mapper's output, already split by destination partition.
pub struct Emitter<K, V> {
    buckets: Vec<FxHashMap<K, Vec<V>>>,
    emitted: usize,
}

impl<K: Hash + Eq, V> Emitter<K, V> {
    fn new(partitions: usize) -> Self {
        Self { buckets: (0..partitions).map(|_| FxHashMap::default()).collect(), emitted: 0 }
    }

    pub fn emit(&mut self, key: K, value: V) {
        let p = partition_of(&key, self.buckets.len());
        self.buckets[p].entry(key).or_default().push(value);
        self.emitted += 1;
    }
}

/// Partition a key is routed to. Stable across runs and machines.
pub fn partition_of<K: Hash + ?Sized>(key: &K, partitions: usize) -> usize {
    let mut h = FxHasher::default();
    key.hash(&mut h);
    (h.finish() % partitions as u64) as usize
}

pub struct Engine {
    pool: ThreadPool,
    partitions: usize,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let workers = config.workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tfidf-worker-{i}"))
            .build()
            .map_err(|e| Error::Engine(e.to_string()))?;
        Ok(Self { pool, partitions: config.partitions.max(1) })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Runs a job and returns its output per partition, each in ascending key order.
    pub fn run<J: Job>(&self, job: &J, inputs: Vec<J::Input>) -> Result<Vec<Vec<J::Output>>> {
        let partitions = self.partitions;
        let num_inputs = inputs.len();

        let mapped: Vec<Emitter<J::Key, J::Value>> = self.pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| {
                    let mut emitter = Emitter::new(partitions);
                    job.map(input, &mut emitter)?;
                    Ok(emitter)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let emitted: usize = mapped.iter().map(|e| e.emitted).sum();
        let mut groups: Vec<FxHashMap<J::Key, Vec<J::Value>>> =
            (0..partitions).map(|_| FxHashMap::default()).collect();
        for emitter in mapped {
            for (p, bucket) in emitter.buckets.into_iter().enumerate() {
                for (key, mut values) in bucket {
                    groups[p].entry(key).or_default().append(&mut values);
                }
            }
        }
        let keys: usize = groups.iter().map(|g| g.len()).sum();
        tracing::debug!(inputs = num_inputs, emitted, keys, partitions, "shuffle complete");

        self.pool.install(|| {
            groups
                .into_par_iter()
                .map(|group| {
                    let mut entries: Vec<(J::Key, Vec<J::Value>)> = group.into_iter().collect();
                    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
                    let mut out = Vec::new();
                    for (key, values) in entries {
                        job.reduce(key, values, &mut out)?;
                    }
                    Ok(out)
                })
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Runs `f` over `items` on the worker pool, keeping input order.
    pub fn map_all<T, U, F>(&self, items: Vec<T>, f: F) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Result<U> + Sync + Send,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordLengths;

    impl Job for WordLengths {
        type Input = &'static str;
        type Key = usize;
        type Value = String;
        type Output = (usize, Vec<String>);

        fn map(&self, input: &'static str, emit: &mut Emitter<usize, String>) -> Result<()> {
            for w in input.split_whitespace() {
                emit.emit(w.len(), w.to_string());
            }
            Ok(())
        }

        fn reduce(&self, key: usize, mut values: Vec<String>, out: &mut Vec<(usize, Vec<String>)>) -> Result<()> {
            values.sort();
            out.push((key, values));
            Ok(())
        }
    }

    fn engine(workers: usize, partitions: usize) -> Engine {
        Engine::new(&EngineConfig { workers, partitions }).unwrap()
    }

    #[test]
    fn groups_every_value_of_a_key_once() {
        let out = engine(4, 3).run(&WordLengths, vec!["a bb ccc", "dd e", "fff g"]).unwrap();
        assert_eq!(out.len(), 3);
        let mut all: Vec<(usize, Vec<String>)> = out.into_iter().flatten().collect();
        all.sort();
        assert_eq!(
            all,
            vec![
                (1, vec!["a".to_string(), "e".into(), "g".into()]),
                (2, vec!["bb".to_string(), "dd".into()]),
                (3, vec!["ccc".to_string(), "fff".into()]),
            ]
        );
    }

    #[test]
    fn keys_are_ascending_within_a_partition() {
        let out = engine(2, 1).run(&WordLengths, vec!["ccc a", "bb"]).unwrap();
        let keys: Vec<usize> = out[0].iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    struct FailOn(&'static str);

    impl Job for FailOn {
        type Input = &'static str;
        type Key = String;
        type Value = ();
        type Output = String;

        fn map(&self, input: &'static str, emit: &mut Emitter<String, ()>) -> Result<()> {
            if input == self.0 {
                return Err(Error::Engine(format!("bad input {input}")));
            }
            emit.emit(input.to_string(), ());
            Ok(())
        }

        fn reduce(&self, key: String, _: Vec<()>, out: &mut Vec<String>) -> Result<()> {
            out.push(key);
            Ok(())
        }
    }

    #[test]
    fn a_failing_mapper_fails_the_job() {
        let err = engine(2, 2).run(&FailOn("x"), vec!["a", "x", "b"]).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn partitioning_is_stable() {
        let p = partition_of("term", 7);
        assert!(p < 7);
        assert_eq!(p, partition_of("term", 7));
    }
}
