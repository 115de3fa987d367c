//! Fixed-duration frame loop and the reduction of its samples.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::json;

use crate::errors::{CodedError, NO_FRAMES};
use crate::schema::{BenchmarkConfiguration, BenchmarkResult};
use crate::settings::SamplingSettings;
use crate::stats::{mean_of_present, Summary};

/// Monotonic time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Something that draws frames. `render_frame` must not return before the
/// frame is complete, otherwise the measured rate is the submit rate.
pub trait FrameTarget {
    fn advance(&mut self, delta: Duration);
    fn render_frame(&mut self) -> Result<()>;
}

/// Utilization counters polled inline by the frame loop.
pub trait UtilizationProbe {
    /// Called once before the loop; counters that report usage since the
    /// previous read need a baseline.
    fn prime(&mut self) {}
    fn cpu_percent(&mut self) -> Option<f64>;
    fn gpu_percent(&mut self) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Offset from the start of the run.
    pub at: Duration,
    pub frame_rendered: bool,
    pub cpu_percent: Option<f64>,
    pub gpu_percent: Option<f64>,
}

impl Sample {
    pub fn frame(at: Duration) -> Self {
        Self {
            at,
            frame_rendered: true,
            cpu_percent: None,
            gpu_percent: None,
        }
    }

    pub fn utilization(at: Duration, cpu_percent: Option<f64>, gpu_percent: Option<f64>) -> Self {
        Self {
            at,
            frame_rendered: false,
            cpu_percent,
            gpu_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    pub samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn frame_count(&self) -> u64 {
        self.samples
            .iter()
            .filter(|sample| sample.frame_rendered)
            .count() as u64
    }
}

/// Renders frames until `settings.duration` has elapsed, polling the probe
/// every `settings.interval`.
pub fn run_timed<T, P, C>(
    settings: &SamplingSettings,
    target: &mut T,
    probe: &mut P,
    clock: &C,
) -> Result<SampleSeries>
where
    T: FrameTarget + ?Sized,
    P: UtilizationProbe + ?Sized,
    C: Clock + ?Sized,
{
    let mut series = SampleSeries::default();
    probe.prime();

    let start = clock.now();
    let mut previous_start = Duration::ZERO;
    let mut next_poll = settings.interval;

    loop {
        let elapsed = clock.now().saturating_sub(start);
        if elapsed >= settings.duration {
            break;
        }

        // Animate by the length of the previous frame.
        target.advance(elapsed.saturating_sub(previous_start));
        previous_start = elapsed;
        target.render_frame()?;

        let rendered_at = clock.now().saturating_sub(start);
        series.push(Sample::frame(rendered_at));

        if rendered_at >= next_poll {
            series.push(Sample::utilization(
                rendered_at,
                probe.cpu_percent(),
                probe.gpu_percent(),
            ));
            while next_poll <= rendered_at {
                next_poll += settings.interval;
            }
        }
    }

    let end = clock.now().saturating_sub(start);
    series.push(Sample::utilization(
        end,
        probe.cpu_percent(),
        probe.gpu_percent(),
    ));
    Ok(series)
}

/// Reduced form of one [`SampleSeries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub avg_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub avg_cpu: f64,
    pub avg_gpu: Option<f64>,
    pub total_frames: u64,
    /// Time from the start of the run to the last completed frame.
    pub frame_time: Duration,
}

impl Aggregate {
    pub fn into_result(self, config: BenchmarkConfiguration) -> BenchmarkResult {
        BenchmarkResult {
            config,
            avg_fps: self.avg_fps,
            min_fps: self.min_fps,
            max_fps: self.max_fps,
            avg_cpu: self.avg_cpu,
            avg_gpu: self.avg_gpu,
            total_frames: self.total_frames,
            duration_seconds: self.frame_time.as_secs_f64(),
        }
    }
}

/// Frame intervals are the gaps between consecutive frame timestamps,
/// starting at t=0. The average rate is frames over the summed intervals, so
/// it always lies between the slowest and the fastest single frame.
pub fn reduce(series: &SampleSeries) -> Result<Aggregate> {
    let mut previous = Duration::ZERO;
    let mut total_frames = 0_u64;
    let mut shortest: Option<Duration> = None;
    let mut longest = Duration::ZERO;

    for sample in series.samples.iter().filter(|sample| sample.frame_rendered) {
        let interval = sample.at.saturating_sub(previous);
        previous = sample.at;
        total_frames += 1;

        if interval.is_zero() {
            continue;
        }
        shortest = Some(shortest.map_or(interval, |current| current.min(interval)));
        longest = longest.max(interval);
    }

    let frame_time = previous;
    let Some(shortest) = shortest.filter(|_| !frame_time.is_zero()) else {
        return Err(anyhow::Error::new(
            CodedError::measurement(NO_FRAMES, "no frame completed during the run")
                .with_details(json!({ "frames": total_frames })),
        ));
    };

    let avg_fps = total_frames as f64 / frame_time.as_secs_f64();
    let max_fps = 1.0 / shortest.as_secs_f64();
    let min_fps = 1.0 / longest.as_secs_f64();

    let avg_cpu = Summary::of_iter(series.samples.iter().filter_map(|sample| sample.cpu_percent))
        .map_or(0.0, |summary| summary.mean);
    let avg_gpu = mean_of_present(series.samples.iter().map(|sample| sample.gpu_percent));

    Ok(Aggregate {
        avg_fps,
        min_fps: min_fps.min(avg_fps),
        max_fps: max_fps.max(avg_fps),
        avg_cpu,
        avg_gpu,
        total_frames,
        frame_time,
    })
}
