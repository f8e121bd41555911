// Isolation overhead benchmark
// Measures the cost of running a trivial check through the fork-per-check
// executor, and the time to stop a check that overruns its timeout.
// Budget: p50 < 20ms, p95 < 50ms for a passing no-op check.

use gradebox::{CheckExecutor, CheckSpec, ExecutorConfig, IsolatedExecutor, Outcome, Verdict};
use std::time::{Duration, Instant};

const ITERATIONS: usize = 200;
const WARMUP_ITERATIONS: usize = 20;
const TIMEOUT_ITERATIONS: usize = 10;

/// Latency summary over one scenario's samples.
struct Latency {
    p50: Duration,
    p95: Duration,
    max: Duration,
}

impl Latency {
    fn of(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let last = samples.len() - 1;
        let at = |q: f64| samples[((samples.len() as f64 * q) as usize).min(last)];
        Self {
            p50: at(0.50),
            p95: at(0.95),
            max: samples[last],
        }
    }
}

struct BenchmarkResult {
    scenario: String,
    latency: Latency,
    failure: Option<String>,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n=== {} ===", self.scenario);
        let Latency { p50, p95, max } = &self.latency;
        println!("  p50: {:?}  p95: {:?}  max: {:?}", p50, p95, max);
        match &self.failure {
            None => println!("PASS"),
            Some(reason) => println!("FAIL: {}", reason),
        }
    }
}

fn sample(
    executor: &IsolatedExecutor,
    spec: &CheckSpec,
    iterations: usize,
    expect: Verdict,
) -> Vec<Duration> {
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let result = executor.run(spec);
        samples.push(start.elapsed());
        assert_eq!(result.verdict, expect, "unexpected verdict: {}", result.render());
    }
    samples
}

fn benchmark_noop_check(executor: &IsolatedExecutor) -> BenchmarkResult {
    let spec = CheckSpec::new("noop", 1, || Ok(Outcome::Pass));

    sample(executor, &spec, WARMUP_ITERATIONS, Verdict::Pass);
    let latency = Latency::of(sample(executor, &spec, ITERATIONS, Verdict::Pass));

    let within = latency.p50 < Duration::from_millis(20) && latency.p95 < Duration::from_millis(50);
    let failure = (!within).then(|| {
        format!(
            "p50={:?} (target <20ms), p95={:?} (target <50ms)",
            latency.p50, latency.p95
        )
    });

    BenchmarkResult {
        scenario: "No-op check".to_string(),
        latency,
        failure,
    }
}

fn benchmark_timeout_stop(executor: &IsolatedExecutor) -> BenchmarkResult {
    let limit = Duration::from_millis(100);
    let spec = CheckSpec::new("hang", 1, || loop {
        std::thread::sleep(Duration::from_secs(60));
    })
    .timeout(limit);

    let latency = Latency::of(sample(executor, &spec, TIMEOUT_ITERATIONS, Verdict::Timeout));

    // Timeout plus the SIGTERM round trip; the grace period is never reached.
    let budget = limit + Duration::from_millis(100);
    let failure =
        (latency.max >= budget).then(|| format!("max={:?} (target <{:?})", latency.max, budget));

    BenchmarkResult {
        scenario: "Timeout stop".to_string(),
        latency,
        failure,
    }
}

fn main() {
    println!("=== gradebox isolation overhead ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let executor = IsolatedExecutor::new(ExecutorConfig::default());
    let results = vec![benchmark_noop_check(&executor), benchmark_timeout_stop(&executor)];

    for result in &results {
        result.print();
    }

    let failed = results.iter().filter(|r| r.failure.is_some()).count();
    println!("\n=== Summary ===");
    println!("{}/{} scenarios within budget", results.len() - failed, results.len());
    if failed > 0 {
        std::process::exit(1);
    }
}
