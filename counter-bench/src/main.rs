//! # Counter Service Benchmark Harness
//!
//! Dependency-free, repeatable workload driver for [`CounterService`]
//! throughput against a real shard cluster, adapted from the engine
//! benchmark's fixed-seed-PRNG design to drive async increment/read
//! traffic instead of direct in-memory engine calls.

use std::env;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use counter_client::ShardClientPool;
use counter_common::{PageId, ServiceConfig};
use counter_core::CounterService;

const DEFAULT_KEY_COUNT: usize = 1 << 10;
const DEFAULT_OP_COUNT: usize = 100_000;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);

        let key_count = normalize_power_of_two(requested_keys);
        let key_mask = key_count - 1;

        BenchConfig {
            requested_keys,
            key_count,
            key_mask,
            op_count,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG used to avoid external benchmark dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_page_ids(count: usize) -> Vec<PageId> {
    (0..count)
        .map(|i| PageId::new(format!("bench-page-{i}")).expect("non-empty id"))
        .collect()
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("counter-bench failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = BenchConfig::from_args();
    let service_config = ServiceConfig::from_env()?;

    println!(
        "keys: requested={}, actual={}, ops={}, shards={}",
        config.requested_keys,
        config.key_count,
        config.op_count,
        service_config.shards.len()
    );

    let router = ShardClientPool::new(
        &service_config.shards,
        service_config.virtual_nodes,
        service_config.shard_pool_max_conns,
        service_config.shard_call_timeout,
    )?;
    let service = Arc::new(CounterService::new(
        Arc::new(router),
        service_config.cache_ttl,
        service_config.flush_interval,
    ));

    let pages = build_page_ids(config.key_count);

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        service.increment(pages[idx].clone());
    }
    report("INCREMENT", config.op_count, start.elapsed());

    let read_ops = config.op_count.min(10_000);
    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..read_ops {
        let idx = rng.next_index(config.key_mask);
        let read = service.get(&pages[idx]).await?;
        black_box(read);
    }
    report("GET", read_ops, start.elapsed());

    service.flush_all().await.ok();

    Ok(())
}
