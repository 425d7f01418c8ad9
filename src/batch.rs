//! Partitioned blocking work for the per-file stages.
//!
//! The funnel and the API extractor split their file lists into
//! `concurrency` partitions, process each on a blocking thread, and merge
//! the partition results. Callers always re-sort after merging.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::error::Result;

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum partitions processed concurrently
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl BatchConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

/// Result of batch processing.
#[derive(Debug, Clone)]
pub struct BatchResult<R> {
    pub total_items: usize,
    /// One output per partition, in partition order
    pub outputs: Vec<R>,
}

/// Splits work into partitions run on tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Split `items` into at most `concurrency` contiguous partitions.
    pub fn partition<T>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        if items.is_empty() {
            return Vec::new();
        }
        let partitions = self.config.concurrency.max(1).min(items.len());
        let size = items.len().div_ceil(partitions);

        let mut out = Vec::with_capacity(partitions);
        let mut iter = items.into_iter().peekable();
        while iter.peek().is_some() {
            out.push(iter.by_ref().take(size).collect());
        }
        out
    }

    /// Run `work` over every partition concurrently.
    pub async fn process<T, R, F>(&self, label: &str, items: Vec<T>, work: F) -> Result<BatchResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(Vec<T>) -> R + Send + Sync + 'static,
    {
        let total_items = items.len();
        let partitions = self.partition(items);
        let work = Arc::new(work);

        info!(label, total_items, partitions = partitions.len(), "Starting batch processing");

        let handles = partitions.into_iter().enumerate().map(|(idx, partition)| {
            let work = Arc::clone(&work);
            let size = partition.len();
            async move {
                debug!(partition = idx, size, "Partition started");
                tokio::task::spawn_blocking(move || work(partition)).await
            }
        });

        let outputs = try_join_all(handles).await?;

        info!(label, total_items, "Batch processing complete");

        Ok(BatchResult {
            total_items,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        let processor = BatchProcessor::new(BatchConfig::new(3));
        let parts = processor.partition((0..10).collect::<Vec<_>>());
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.concat(), (0..10).collect::<Vec<_>>());

        let parts = processor.partition(vec![1, 2]);
        assert_eq!(parts, vec![vec![1], vec![2]]);

        assert!(processor.partition(Vec::<u8>::new()).is_empty());
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let processor = BatchProcessor::new(BatchConfig { concurrency: 0 });
        assert_eq!(processor.partition(vec![1, 2, 3]), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_process_merges_partitions() {
        let processor = BatchProcessor::new(BatchConfig::new(4));
        let result = processor
            .process("sum", (1..=100u64).collect(), |part: Vec<u64>| part.iter().sum::<u64>())
            .await
            .unwrap();

        assert_eq!(result.total_items, 100);
        assert_eq!(result.outputs.len(), 4);
        assert_eq!(result.outputs.iter().sum::<u64>(), 5050);
    }

    #[test]
    fn test_process_from_sync_context() {
        let processor = BatchProcessor::new(BatchConfig::new(2));
        let result = tokio_test::block_on(processor.process("len", vec![1, 2, 3], |p: Vec<i32>| p.len())).unwrap();
        assert_eq!(result.outputs, vec![2, 1]);

        let empty = tokio_test::block_on(processor.process("empty", Vec::<u8>::new(), |p| p.len())).unwrap();
        assert!(empty.outputs.is_empty());
    }
}
