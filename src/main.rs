use clap::{Parser, ValueEnum};
use crossbeam_queue::SegQueue;
use log::{info, warn};
use rand::Rng;
use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    thread,
    time::Duration,
};

use wait_queues::{
    shared::{CountableWrapper, SharedWaitQueue},
    wait_queues::{LinkedWaitQueue, ScanWaitQueue},
    ConcurrentWaitQueue, Handle, Mode, ReleasePolicy, ResourceKey, WaitQueue,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() {
    env_logger::init();
    let config = BenchConfig::parse();
    let policy = match config.policy {
        PolicyArg::LeadingReaders => ReleasePolicy::LeadingReaders,
        PolicyArg::AllReaders => ReleasePolicy::AllReaders,
    };
    info!(
        "running {:?} layout with capacity {} and {:?}",
        config.layout, config.capacity, policy
    );
    match config.layout {
        Layout::Linked => {
            let queue = LinkedWaitQueue::with_policy(config.capacity, policy);
            benchmark_producer_consumer(CountableWrapper::new(SharedWaitQueue::new(queue)), config);
        }
        Layout::Scan => {
            let queue = ScanWaitQueue::with_policy(config.capacity, policy);
            benchmark_producer_consumer(CountableWrapper::new(SharedWaitQueue::new(queue)), config);
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    /// slot arena with per-resource linked chains
    Linked,
    /// arrival-order list scanned linearly
    Scan,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    LeadingReaders,
    AllReaders,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct BenchConfig {
    /// maximum number of requests queued at once.
    #[arg(long, default_value_t = 1024)]
    capacity: usize,
    /// number of distinct resource keys requests are spread over.
    #[arg(long, default_value_t = 16)]
    resources: ResourceKey,
    /// number of threads adding requests.
    #[arg(long)]
    producer_threads: usize,
    /// number of threads releasing requests.
    #[arg(long)]
    consumer_threads: usize,
    /// duration in seconds to run the test
    #[arg(long)]
    duration: usize,
    /// share of added requests that are read-only, in percent.
    #[arg(long, default_value_t = 80)]
    read_percent: u8,
    #[arg(long, value_enum, default_value_t = Layout::Linked)]
    layout: Layout,
    #[arg(long, value_enum, default_value_t = PolicyArg::LeadingReaders)]
    policy: PolicyArg,
    /// pin every worker thread to its own core.
    #[arg(long)]
    pin_threads: bool,
}

fn pin_to_core(index: usize) {
    let Some(cores) = core_affinity::get_core_ids() else {
        warn!("could not list cores, thread {index} stays unpinned");
        return;
    };
    if cores.is_empty() || !core_affinity::set_for_current(cores[index % cores.len()]) {
        warn!("failed to pin thread {index}");
    }
}

fn benchmark_producer_consumer<C>(queue: CountableWrapper<C>, config: BenchConfig)
where
    C: ConcurrentWaitQueue<u64>,
    for<'a> &'a CountableWrapper<C>: Send,
{
    let done: AtomicBool = AtomicBool::new(false);
    let next_requester = AtomicU64::new(0);
    let released: SegQueue<u64> = SegQueue::new();
    let read_share = f64::from(config.read_percent.min(100)) / 100.0;
    let resources = config.resources.max(1);

    thread::scope(|s| {
        for thread_index in 0..config.producer_threads {
            let (queue, done, next_requester) = (&queue, &done, &next_requester);
            let pin = config.pin_threads;
            s.spawn(move || {
                if pin {
                    pin_to_core(thread_index);
                }
                let mut rng = rand::thread_rng();
                let mut handle = ConcurrentWaitQueue::<u64>::register(queue);
                while !done.load(Ordering::Relaxed) {
                    let key = rng.gen_range(0..resources);
                    let mode = Mode::from_read_only(rng.gen_bool(read_share));
                    let requester = next_requester.fetch_add(1, Ordering::Relaxed);
                    let _ = handle.add(key, requester, mode);
                }
            });
        }
        for thread_index in 0..config.consumer_threads {
            let (queue, done, released) = (&queue, &done, &released);
            let pin_index = config.pin_threads.then_some(config.producer_threads + thread_index);
            s.spawn(move || {
                if let Some(index) = pin_index {
                    pin_to_core(index);
                }
                let mut rng = rand::thread_rng();
                let mut handle = ConcurrentWaitQueue::<u64>::register(queue);
                while !done.load(Ordering::Relaxed) {
                    if let Ok(batch) = handle.pop(rng.gen_range(0..resources)) {
                        batch.into_iter().for_each(|requester| released.push(requester));
                    }
                }
            });
        }

        std::thread::sleep(Duration::from_secs(config.duration as u64));
        done.store(true, Ordering::Relaxed);
    });

    let mut seen = HashSet::new();
    while let Some(requester) = released.pop() {
        assert!(seen.insert(requester), "requester {requester} released twice");
    }

    let admitted = queue.admitted();
    let rejected = queue.rejected();
    let releases = queue.released();
    assert_eq!(seen.len(), releases);
    println!(
        "throughput: {}",
        (admitted + rejected + releases) as f64 / config.duration as f64
    );
    println!("number of admitted requests: {}", admitted);
    println!("number of rejected requests: {}", rejected);
    println!("number of released requests: {}", releases);
}
