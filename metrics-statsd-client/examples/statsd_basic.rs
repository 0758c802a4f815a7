use std::time::{Duration, Instant};

use metrics_statsd_client::{StatsdBuilder, Timer};

fn main() {
    tracing_subscriber::fmt::init();

    let client = StatsdBuilder::default()
        .with_host("localhost")
        .with_port(9125)
        .with_prefix("example")
        .build()
        .expect("failed to build StatsD client");

    let started = Instant::now();
    let timed_sum = Timer::new("sum").with_client(client.clone()).decorate(|n: u64| (0..n).sum::<u64>());

    // Loop over and over, pretending to do some work.
    for i in 0..100u64 {
        client.incr("loops");
        client.set("iteration", i, 1.0);
        client.increment("lucky_iterations", 1, 0.5, true);
        client.distinct("buckets", i % 7);

        {
            let _guard = Timer::new("nap").with_client(client.clone()).guard();
            std::thread::sleep(Duration::from_millis(10));
        }

        timed_sum(i * 1_000);
    }

    client.timing_since("total", started, 1.0);
    client.stop().expect("dispatcher failed");

    println!("{:?}", client.telemetry());
}
