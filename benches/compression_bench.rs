//! Benchmarks for background compression of elapsed-period logs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use log_archive_uploader::rollover::{CompressionHandle, CompressionMode};
use log_archive_uploader::utils::compress::CompressionJob;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn log_lines(bytes: usize) -> Vec<u8> {
    let line = b"2024-01-01 12:00:00.000 INFO  [rollover-upload-1] request served in 12ms\n";
    line.iter().cycle().take(bytes).copied().collect()
}

/// Gzip and zip jobs over the same log content, start to finish
fn bench_compression_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_modes");
    let temp_dir = TempDir::new().unwrap();
    let size = 4 * 1024 * 1024;
    let data = log_lines(size);

    group.throughput(Throughput::Bytes(size as u64));
    for mode in [CompressionMode::Gz, CompressionMode::Zip] {
        let source = temp_dir.path().join(format!("app.{}.log", mode));

        group.bench_with_input(BenchmarkId::new("compress", mode), &mode, |b, &mode| {
            b.iter(|| {
                // The job removes its source, so every iteration starts fresh.
                fs::write(&source, &data).unwrap();
                let job = CompressionJob::start(&source, mode).unwrap();
                job.wait_timeout(Duration::from_secs(60)).unwrap();
                fs::remove_file(job.target()).ok();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compression_modes);
criterion_main!(benches);
