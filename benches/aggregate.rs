//! Post-run cost: reducing a long sample series and drawing a chart.
//! Run: cargo bench

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glbench::chart::render_chart;
use glbench::glyphs::LabelFont;
use glbench::sampler::{reduce, Sample, SampleSeries};
use glbench::schema::{
    BenchmarkConfiguration, BenchmarkResult, RendererInfo, ResultFile, SuiteKind, SystemInfo,
};
use glbench::settings::ChartSettings;

fn synthetic_series(frames: u64) -> SampleSeries {
    let mut series = SampleSeries::default();
    let mut at = Duration::ZERO;
    for index in 0..frames {
        // Alternate 2ms and 3ms frames, poll every 200 frames.
        at += Duration::from_micros(if index % 2 == 0 { 2_000 } else { 3_000 });
        series.push(Sample::frame(at));
        if index % 200 == 0 {
            series.push(Sample::utilization(at, Some(25.0), None));
        }
    }
    series
}

fn triangle_file() -> ResultFile {
    let results = [1_u32, 10, 50, 100, 200, 500, 1000, 2000]
        .into_iter()
        .map(|count| {
            let avg_fps = 60_000.0 / f64::from(count).sqrt();
            BenchmarkResult {
                config: BenchmarkConfiguration::plain(count).expect("count is positive"),
                avg_fps,
                min_fps: avg_fps * 0.8,
                max_fps: avg_fps * 1.2,
                avg_cpu: 20.0,
                avg_gpu: Some(55.0),
                total_frames: (avg_fps * 5.0) as u64,
                duration_seconds: 5.0,
            }
        })
        .collect();

    ResultFile {
        timestamp: "2024-05-01T10:00:00+02:00".to_owned(),
        suite: SuiteKind::Triangles,
        build_profile: "release".to_owned(),
        renderer: RendererInfo {
            adapter: "bench".to_owned(),
            backend: "gl".to_owned(),
        },
        duration_per_test_seconds: 5.0,
        system_info: SystemInfo {
            cpu_physical_cores: Some(8),
            cpu_logical_cores: 16,
            cpu_max_freq_mhz: None,
            ram_gb: 32.0,
            gpu_available: true,
            gpu_count: 1,
            gpu_info: Vec::new(),
            os_name: None,
            os_version: None,
            arch: "x86_64".to_owned(),
        },
        results,
    }
}

fn bench_reduce(c: &mut Criterion) {
    let series = synthetic_series(100_000);
    c.bench_function("reduce_100k_frames", |b| {
        b.iter(|| black_box(reduce(black_box(&series)).expect("series has frames")))
    });
}

fn bench_chart(c: &mut Criterion) {
    let file = triangle_file();
    let settings = ChartSettings {
        width: 1200,
        height: 900,
        font_path: None,
    };

    let mut group = c.benchmark_group("chart");
    group.sample_size(20);
    group.bench_function("triangles_1200x900", |b| {
        let mut font = LabelFont::Bitmap;
        b.iter(|| black_box(render_chart(&file, &settings, &mut font).expect("chart renders")))
    });
    group.finish();
}

criterion_group!(benches, bench_reduce, bench_chart);
criterion_main!(benches);
