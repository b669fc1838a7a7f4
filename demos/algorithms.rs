//! Algorithm comparison example.
//!
//! Run with:
//! ```
//! cargo run --example algorithms
//! ```

use std::time::Duration;

use ratewarden::{
    Algorithm, BucketQuota, FixedWindow, ManualClock, Quota, SlidingCounter, SlidingLog,
    TokenBucket,
};

fn main() {
    let quota = Quota::per_second(5);
    let clock = ManualClock::new(0);

    println!("=== Algorithm Comparison Demo ===\n");
    println!("Quota: 5 requests/second (token bucket: capacity 5, refill 5/s)");
    println!("8 requests in a burst, then 8 more half a second later\n");

    let engines: Vec<(&str, Box<dyn Algorithm>)> = vec![
        (
            "Fixed Window",
            Box::new(FixedWindow::with_clock(quota, clock.clone())),
        ),
        (
            "Sliding Log",
            Box::new(SlidingLog::with_clock(quota, clock.clone())),
        ),
        (
            "Sliding Counter",
            Box::new(SlidingCounter::with_clock(quota, clock.clone())),
        ),
        (
            "Token Bucket",
            Box::new(TokenBucket::with_clock(BucketQuota::new(5, 5), clock.clone())),
        ),
    ];

    for (name, engine) in &engines {
        clock.set(800);
        let first = burst(engine.as_ref(), 8);
        clock.set(1_300);
        let second = burst(engine.as_ref(), 8);
        println!("{:16} | {} | {}", name, first, second);
    }

    println!("\n=== Algorithm Characteristics ===\n");
    println!("| Algorithm       | Memory | Burst Handling | Best For           |");
    println!("|-----------------|--------|----------------|--------------------|");
    println!("| Fixed Window    | Low    | Poor at edges  | Simple use cases   |");
    println!("| Sliding Log     | High   | Exact          | Precision critical |");
    println!("| Sliding Counter | Low    | Good           | General purpose    |");
    println!("| Token Bucket    | Low    | Good           | Bursty traffic     |");

    // Sweeps drop what can no longer affect a decision
    clock.advance(Duration::from_secs(10));
    for (name, engine) in &engines {
        let evicted = engine.sweep();
        println!("\n{} swept {} entries, {} left", name, evicted, engine.len());
    }
}

fn burst(engine: &dyn Algorithm, requests: usize) -> String {
    (0..requests)
        .map(|_| if engine.allow("demo") { "✅" } else { "❌" })
        .collect::<Vec<_>>()
        .join(" ")
}
