//! Benchmark suite for the flip, scale and rotate operators.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin benchmark_op_transform                 # Run all benchmarks
//! cargo run --release --bin benchmark_op_transform -- --json       # JSON output
//! cargo run --release --bin benchmark_op_transform -- --filter Rotate_  # Filter by pattern
//! cargo run --release --bin benchmark_op_transform -- --list-tests # List available tests
//! ```
//!
//! Set `RUST_LOG=surface_transform=debug` to see one log line per transform.
//!
//! # Notes
//!
//! - Timings measure the kernels with preallocated input/output surfaces.
//! - Surfaces use the default allocation strategy, so Linux and macOS runs
//!   request huge pages for large buffers.
//!
//! # Benchmark Categories
//!
//! - **Rotate size**: 256×256 to 4096×4096 (RGB888, 45°)
//! - **Rotate depth**: 1/2/3/4 bytes per pixel at 512×512
//! - **Rotate angle**: Right angles vs arbitrary angles
//! - **Scale**: Down and up scaling factors at 1024×1024
//! - **Flip**: Every axis combination per depth at 1024×1024

use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use env_logger::Env;
use log::info;
use serde::Serialize;
use surface_transform::{
    OpFlipSurface, OpRotateSurface, OpScaleSurface, RotateDirection, Surface, bench_utils,
};

const DEFAULT_ITERATIONS: usize = 20;
const WARMUPS: usize = 3;

/// Results from a single benchmark run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BenchmarkResult {
    test_name: String,
    mean_time_ms: f64,
    median_time_ms: f64,
    standard_deviation: f64,
    min_time_ms: f64,
    max_time_ms: f64,
    p95_time_ms: f64,
    iterations: usize,

    input_width: usize,
    input_height: usize,
    output_width: usize,
    output_height: usize,
    format_name: String,

    output_surface_bytes: usize,
    megapixels_per_second: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BenchmarkReport<'a> {
    suite: &'static str,
    results: &'a [BenchmarkResult],
}

/// Timing samples of one case, sorted ascending, in milliseconds.
struct Timings {
    sorted_ms: Vec<f64>,
}

impl Timings {
    fn new(mut samples_ms: Vec<f64>) -> Self {
        samples_ms.sort_by(f64::total_cmp);
        Self {
            sorted_ms: samples_ms,
        }
    }

    fn min(&self) -> f64 {
        self.sorted_ms.first().copied().unwrap_or(0.0)
    }

    fn max(&self) -> f64 {
        self.sorted_ms.last().copied().unwrap_or(0.0)
    }

    fn mean(&self) -> f64 {
        if self.sorted_ms.is_empty() {
            return 0.0;
        }
        self.sorted_ms.iter().sum::<f64>() / self.sorted_ms.len() as f64
    }

    /// Sample standard deviation (n - 1 denominator).
    fn std_dev(&self) -> f64 {
        let n = self.sorted_ms.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.sorted_ms.iter().map(|t| (t - mean).powi(2)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }

    /// Quantile `q` in [0, 1], interpolated between neighbouring samples.
    /// The median is `quantile(0.5)`.
    fn quantile(&self, q: f64) -> f64 {
        let n = self.sorted_ms.len();
        if n == 0 {
            return 0.0;
        }
        let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        self.sorted_ms[lo] + (self.sorted_ms[hi] - self.sorted_ms[lo]) * frac
    }
}

/// Which operator a benchmark drives.
#[derive(Clone, Copy, Debug)]
enum Transform {
    Rotate(f32),
    Scale(usize, usize),
    Flip(bool, bool),
}

/// One named benchmark case.
#[derive(Clone, Debug)]
struct BenchmarkCase {
    name: String,
    size: usize,
    bytes_per_pixel: u8,
    transform: Transform,
}

/// Orchestrates the full benchmark suite with filtering and output formatting.
struct BenchmarkSuite {
    results: Vec<BenchmarkResult>,
    filter: String,
    iterations: usize,
}

impl BenchmarkSuite {
    fn new() -> Self {
        Self {
            results: Vec::new(),
            filter: String::new(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    fn set_filter(&mut self, filter: String) {
        self.filter = filter;
    }

    fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations.max(1);
    }

    fn should_run_test(&self, test_name: &str) -> bool {
        self.filter.is_empty() || test_name.contains(&self.filter)
    }

    fn cases() -> Vec<BenchmarkCase> {
        let mut cases = Vec::new();
        for size in bench_utils::BENCH_SIZES {
            cases.push(BenchmarkCase {
                name: format!("Rotate_Size_{size}x{size}"),
                size,
                bytes_per_pixel: 3,
                transform: Transform::Rotate(45.0),
            });
        }
        for bpp in bench_utils::BENCH_BYTES_PER_PIXEL {
            cases.push(BenchmarkCase {
                name: format!("Rotate_Depth_{}_512x512", bench_utils::format_to_string(bpp)),
                size: 512,
                bytes_per_pixel: bpp,
                transform: Transform::Rotate(45.0),
            });
        }
        for angle in bench_utils::BENCH_ANGLES {
            cases.push(BenchmarkCase {
                name: format!("Rotate_Angle_{}deg", angle as i32),
                size: 512,
                bytes_per_pixel: 4,
                transform: Transform::Rotate(angle),
            });
        }
        for factor in bench_utils::BENCH_SCALE_FACTORS {
            let target = (1024.0 * factor) as usize;
            cases.push(BenchmarkCase {
                name: format!("Scale_1024_to_{target}"),
                size: 1024,
                bytes_per_pixel: 4,
                transform: Transform::Scale(target, target),
            });
        }
        for bpp in bench_utils::BENCH_BYTES_PER_PIXEL {
            for (flip_x, flip_y) in [(false, false), (false, true), (true, false), (true, true)] {
                cases.push(BenchmarkCase {
                    name: format!(
                        "Flip_{}_x{}_y{}",
                        bench_utils::format_to_string(bpp),
                        flip_x as u8,
                        flip_y as u8
                    ),
                    size: 1024,
                    bytes_per_pixel: bpp,
                    transform: Transform::Flip(flip_x, flip_y),
                });
            }
        }
        cases
    }

    fn list_tests(&self) {
        let mut names: Vec<String> = Self::cases().into_iter().map(|case| case.name).collect();
        names.sort();
        for name in names {
            println!("{name}");
        }
    }

    fn run_all(&mut self, json_output: bool, output_file: Option<String>) -> io::Result<()> {
        if !json_output {
            println!("=== Surface Transform Benchmark Suite ===\n");
        }

        for case in Self::cases() {
            if !self.should_run_test(&case.name) {
                continue;
            }
            let result = self.run_case(&case).map_err(io::Error::other)?;
            if !json_output {
                println!(
                    "  {:<32} {:>10.3} ms  {:>8.1} MP/s",
                    result.test_name, result.mean_time_ms, result.megapixels_per_second
                );
            }
            self.results.push(result);
        }

        if json_output {
            let report = BenchmarkReport {
                suite: "surface_transform",
                results: &self.results,
            };
            let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
            if let Some(path) = output_file {
                let mut file = File::create(path)?;
                file.write_all(json.as_bytes())?;
            } else {
                println!("{json}");
            }
        } else {
            self.print_report();
        }

        Ok(())
    }

    /// Runs a single case: setup once, warmup iterations, then timed iterations.
    fn run_case(&self, case: &BenchmarkCase) -> surface_transform::Result<BenchmarkResult> {
        let input = bench_utils::create_test_surface(case.size, case.size, case.bytes_per_pixel);
        let mut run: Box<dyn FnMut(&mut Surface) -> surface_transform::Result<()>>;
        let (out_w, out_h) = match case.transform {
            Transform::Rotate(angle) => {
                let mut op = OpRotateSurface::new();
                op.set_rotation(angle, RotateDirection::Ccw);
                let dims = op.compute_output_dimensions(&input)?;
                run = Box::new(move |dst| op.apply_to_preallocated(&input, dst));
                dims
            }
            Transform::Scale(width, height) => {
                let op = OpScaleSurface::new(width, height);
                run = Box::new(move |dst| op.apply_to_preallocated(&input, dst));
                (width, height)
            }
            Transform::Flip(flip_x, flip_y) => {
                let op = OpFlipSurface::new(flip_x, flip_y);
                let dims = (input.width(), input.height());
                run = Box::new(move |dst| op.apply_to_preallocated(&input, dst));
                dims
            }
        };
        let mut output =
            Surface::allocate(&bench_utils::bench_format(case.bytes_per_pixel), out_w, out_h)?;
        info!("running {} ({}x{} -> {}x{})", case.name, case.size, case.size, out_w, out_h);

        for _ in 0..WARMUPS {
            run(&mut output)?;
        }

        let mut samples = Vec::with_capacity(self.iterations);
        for _ in 0..self.iterations {
            let start = Instant::now();
            run(&mut output)?;
            samples.push(duration_to_ms(start.elapsed()));
        }

        let timings = Timings::new(samples);
        let mean_time_ms = timings.mean();
        let output_pixels = (out_w * out_h) as f64;
        Ok(BenchmarkResult {
            test_name: case.name.clone(),
            mean_time_ms,
            median_time_ms: timings.quantile(0.5),
            standard_deviation: timings.std_dev(),
            min_time_ms: timings.min(),
            max_time_ms: timings.max(),
            p95_time_ms: timings.quantile(0.95),
            iterations: self.iterations,
            input_width: case.size,
            input_height: case.size,
            output_width: out_w,
            output_height: out_h,
            format_name: bench_utils::format_to_string(case.bytes_per_pixel).to_string(),
            output_surface_bytes: output.pixels().len(),
            megapixels_per_second: if mean_time_ms > 0.0 {
                output_pixels / (mean_time_ms / 1000.0) / 1_000_000.0
            } else {
                0.0
            },
        })
    }

    fn print_report(&self) {
        println!();
        println!("================================================================");
        println!("                    DETAILED RESULTS");
        println!("================================================================\n");
        println!(
            "{:<32} {:<12} {:<12} {:<12} {:<12} {:<12} {:<12} {:<12}",
            "Test Name", "Mean (ms)", "Median", "Std Dev", "Min", "Max", "P95", "MP/s"
        );
        println!("{}", "-".repeat(116));
        for r in &self.results {
            println!(
                "{:<32} {:<12.3} {:<12.3} {:<12.3} {:<12.3} {:<12.3} {:<12.3} {:<12.1}",
                r.test_name,
                r.mean_time_ms,
                r.median_time_ms,
                r.standard_deviation,
                r.min_time_ms,
                r.max_time_ms,
                r.p95_time_ms,
                r.megapixels_per_second
            );
        }
    }
}

fn duration_to_ms(dur: Duration) -> f64 {
    dur.as_secs_f64() * 1000.0
}

const USAGE: &str = "\
Runs the flip, scale and rotate benchmark cases.

Usage: benchmark_op_transform [--json] [--output FILE] [--filter TEXT]
                              [--iterations N] [--list-tests]

  --json           print a JSON report instead of the table
  --output FILE    write the JSON report to FILE
  --filter TEXT    only run cases whose name contains TEXT
  --iterations N   timed runs per case (default 20)
  --list-tests     print case names and exit
  -h, --help       print this message";

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Options {
    json: bool,
    output: Option<String>,
    filter: Option<String>,
    iterations: Option<usize>,
    list_tests: bool,
    help: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut options = Options::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| format!("{flag} expects a value"))
            };
            match arg.as_str() {
                "--json" => options.json = true,
                "--list-tests" => options.list_tests = true,
                "-h" | "--help" => options.help = true,
                "--output" => options.output = Some(value("--output")?),
                "--filter" => options.filter = Some(value("--filter")?),
                "--iterations" => {
                    let raw = value("--iterations")?;
                    let count = raw
                        .parse()
                        .map_err(|_| format!("--iterations expects a count, got {raw:?}"))?;
                    options.iterations = Some(count);
                }
                other => return Err(format!("unknown option {other:?}")),
            }
        }
        Ok(options)
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let options = match Options::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }

    let mut suite = BenchmarkSuite::new();
    if options.list_tests {
        suite.list_tests();
        return Ok(());
    }
    if let Some(filter) = options.filter {
        suite.set_filter(filter);
    }
    if let Some(iterations) = options.iterations {
        suite.set_iterations(iterations);
    }

    suite.run_all(options.json, options.output)
}
