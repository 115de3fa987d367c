//! The three benchmark suites, the run-all sequence and the quick demo.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::chart::render_charts;
use crate::renderer::SceneRenderer;
use crate::results::{build_summary, save_results, save_summary};
use crate::sampler::{reduce, run_timed, Clock, FrameTarget, UtilizationProbe};
use crate::scene::Scene;
use crate::schema::{
    BenchmarkConfiguration, BenchmarkResult, RendererInfo, ResultFile, SuiteKind, SystemInfo,
};
use crate::settings::{seconds_to_duration, BenchSettings, DemoSettings, SamplingSettings};

pub const BUILD_PROFILE: &str = env!("GLBENCH_BUILD_PROFILE");

/// A frame target that can be pointed at a new scene between runs.
pub trait SceneTarget: FrameTarget {
    fn load_scene(&mut self, scene: Scene) -> Result<()>;
    fn renderer_info(&self) -> RendererInfo;
}

impl SceneTarget for SceneRenderer {
    fn load_scene(&mut self, scene: Scene) -> Result<()> {
        SceneRenderer::load_scene(self, scene)
    }

    fn renderer_info(&self) -> RendererInfo {
        self.info().clone()
    }
}

/// Runs every configuration in order; the first failure aborts the rest.
pub fn run_configurations<T, P, C>(
    configurations: &[BenchmarkConfiguration],
    sampling: &SamplingSettings,
    target: &mut T,
    probe: &mut P,
    clock: &C,
) -> Result<Vec<BenchmarkResult>>
where
    T: SceneTarget + ?Sized,
    P: UtilizationProbe + ?Sized,
    C: Clock + ?Sized,
{
    let total = configurations.len();
    let mut results = Vec::with_capacity(total);

    for (index, config) in configurations.iter().enumerate() {
        println!("[glbench] [{}/{}] {}", index + 1, total, config.label());

        target
            .load_scene(Scene::build(*config))
            .with_context(|| format!("failed to load scene for {}", config.label()))?;
        let series = run_timed(sampling, target, probe, clock)
            .with_context(|| format!("benchmark run failed for {}", config.label()))?;
        let result = reduce(&series)
            .with_context(|| format!("no usable samples for {}", config.label()))?
            .into_result(*config);

        println!("[glbench]   {}", progress_line(&result));
        results.push(result);
    }

    Ok(results)
}

pub fn progress_line(result: &BenchmarkResult) -> String {
    let mut line = format!(
        "avg FPS {:.1} (min {:.1}, max {:.1}), CPU {:.1}%",
        result.avg_fps, result.min_fps, result.max_fps, result.avg_cpu
    );
    if let Some(gpu) = result.avg_gpu {
        line.push_str(&format!(", GPU {:.1}%", gpu));
    }
    line
}

pub fn run_suite<T, P, C>(
    suite: SuiteKind,
    settings: &BenchSettings,
    system_info: &SystemInfo,
    target: &mut T,
    probe: &mut P,
    clock: &C,
) -> Result<ResultFile>
where
    T: SceneTarget + ?Sized,
    P: UtilizationProbe + ?Sized,
    C: Clock + ?Sized,
{
    let configurations = settings.configurations(suite)?;
    println!(
        "[glbench] {}: {} configurations, {:.1}s each",
        suite.title(),
        configurations.len(),
        settings.duration_seconds
    );

    let results = run_configurations(&configurations, &settings.sampling()?, target, probe, clock)
        .with_context(|| format!("{} suite failed", suite))?;

    Ok(ResultFile {
        timestamp: Local::now().to_rfc3339(),
        suite,
        build_profile: BUILD_PROFILE.to_owned(),
        renderer: target.renderer_info(),
        duration_per_test_seconds: settings.duration_seconds,
        system_info: system_info.clone(),
        results,
    })
}

/// Runs one suite and writes its result file. Returns where it was written.
pub fn run_and_save_suite<T, P, C>(
    suite: SuiteKind,
    settings: &BenchSettings,
    system_info: &SystemInfo,
    target: &mut T,
    probe: &mut P,
    clock: &C,
) -> Result<(PathBuf, ResultFile)>
where
    T: SceneTarget + ?Sized,
    P: UtilizationProbe + ?Sized,
    C: Clock + ?Sized,
{
    let file = run_suite(suite, settings, system_info, target, probe, clock)?;
    let path = settings.result_path(suite);
    save_results(&path, &file)?;
    println!("[glbench] wrote {}", path.display());
    Ok((path, file))
}

/// Every suite in order, then the summary file, then the charts.
pub fn run_all<T, P, C>(
    settings: &BenchSettings,
    system_info: &SystemInfo,
    target: &mut T,
    probe: &mut P,
    clock: &C,
) -> Result<Vec<PathBuf>>
where
    T: SceneTarget + ?Sized,
    P: UtilizationProbe + ?Sized,
    C: Clock + ?Sized,
{
    let mut files = Vec::with_capacity(SuiteKind::ALL.len());
    for suite in SuiteKind::ALL {
        files.push(run_and_save_suite(
            suite,
            settings,
            system_info,
            target,
            probe,
            clock,
        )?);
    }

    let summary = build_summary(Local::now().to_rfc3339(), system_info.clone(), &files)?;
    let summary_path = settings.summary_path();
    save_summary(&summary_path, &summary)?;
    println!("[glbench] wrote {}", summary_path.display());

    let mut written = files.into_iter().map(|(path, _)| path).collect::<Vec<_>>();
    written.push(summary_path);
    written.extend(render_charts(settings)?);
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoReport {
    pub frames: u64,
    pub elapsed: Duration,
    pub avg_fps: f64,
}

/// One rotating triangle, paced to at most `fps_cap` frames per second.
pub fn run_demo<T, C>(settings: &DemoSettings, target: &mut T, clock: &C) -> Result<DemoReport>
where
    T: SceneTarget + ?Sized,
    C: Clock + ?Sized,
{
    let duration = seconds_to_duration("demo.duration_seconds", settings.duration_seconds)?;
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(settings.fps_cap));

    target.load_scene(Scene::build(BenchmarkConfiguration::plain(1)?))?;
    println!(
        "[glbench] demo: one rotating triangle for {:.1}s at up to {} FPS",
        settings.duration_seconds, settings.fps_cap
    );

    let start = clock.now();
    let mut previous_start = Duration::ZERO;
    let mut frames = 0_u64;

    loop {
        let frame_start = clock.now().saturating_sub(start);
        if frame_start >= duration {
            break;
        }

        target.advance(frame_start.saturating_sub(previous_start));
        previous_start = frame_start;
        target.render_frame()?;
        frames += 1;

        let spent = clock.now().saturating_sub(start).saturating_sub(frame_start);
        if spent < frame_budget {
            clock.sleep(frame_budget - spent);
        }
    }

    let elapsed = clock.now().saturating_sub(start);
    let avg_fps = if elapsed.is_zero() {
        0.0
    } else {
        frames as f64 / elapsed.as_secs_f64()
    };
    println!(
        "[glbench] demo finished: {} frames in {:.2}s, average {:.1} FPS",
        frames,
        elapsed.as_secs_f64(),
        avg_fps
    );

    Ok(DemoReport {
        frames,
        elapsed,
        avg_fps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::testing::{FixedProbe, ManualClock, SteppingTarget};
    use crate::schema::{LightingMode, TextureMode};
    use crate::settings::parse_settings;

    struct FakeRenderer<'a> {
        frames: SteppingTarget<'a>,
        loaded: Vec<BenchmarkConfiguration>,
    }

    impl<'a> FakeRenderer<'a> {
        fn new(clock: &'a ManualClock, frame_cost: Duration) -> Self {
            Self {
                frames: SteppingTarget::new(clock, frame_cost),
                loaded: Vec::new(),
            }
        }
    }

    impl FrameTarget for FakeRenderer<'_> {
        fn advance(&mut self, delta: Duration) {
            self.frames.advance(delta);
        }

        fn render_frame(&mut self) -> Result<()> {
            self.frames.render_frame()
        }
    }

    impl SceneTarget for FakeRenderer<'_> {
        fn load_scene(&mut self, scene: Scene) -> Result<()> {
            self.loaded.push(scene.config);
            Ok(())
        }

        fn renderer_info(&self) -> RendererInfo {
            RendererInfo {
                adapter: "fake".to_owned(),
                backend: "none".to_owned(),
            }
        }
    }

    fn quick_settings(yaml: &str) -> BenchSettings {
        parse_settings(yaml, "test").expect("test settings should validate")
    }

    #[test]
    fn suite_runs_every_configuration_in_order() {
        let settings = quick_settings(
            r#"
duration_seconds: 0.1
sample_interval_ms: 50
suites:
  lighting:
    triangle_counts: [10, 20]
    modes: [none, spot]
"#,
        );
        let clock = ManualClock::default();
        let mut target = FakeRenderer::new(&clock, Duration::from_millis(5));
        let mut probe = FixedProbe::new(Some(12.0), None);
        let system_info = crate::results::fixtures::system_info(false);

        let file = run_suite(
            SuiteKind::Lighting,
            &settings,
            &system_info,
            &mut target,
            &mut probe,
            &clock,
        )
        .unwrap();

        let modes = target
            .loaded
            .iter()
            .map(|config| (config.lighting_mode, config.triangle_count))
            .collect::<Vec<_>>();
        assert_eq!(
            modes,
            vec![
                (LightingMode::None, 10),
                (LightingMode::None, 20),
                (LightingMode::Spot, 10),
                (LightingMode::Spot, 20),
            ]
        );
        assert_eq!(file.results.len(), 4);
        assert_eq!(file.renderer.adapter, "fake");
        for result in &file.results {
            assert!(result.avg_fps > 0.0);
            assert!(result.min_fps <= result.avg_fps && result.avg_fps <= result.max_fps);
            assert_eq!(result.total_frames, 20);
            assert_eq!(result.avg_gpu, None);
            assert_eq!(result.avg_cpu, 12.0);
        }
    }

    #[test]
    fn saved_suite_lands_in_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut settings = quick_settings(
            r#"
duration_seconds: 0.05
suites:
  textures:
    triangle_counts: [5]
    modes: [64x64]
"#,
        );
        settings.output_dir = dir.path().to_path_buf();

        let clock = ManualClock::default();
        let mut target = FakeRenderer::new(&clock, Duration::from_millis(10));
        let mut probe = FixedProbe::new(Some(3.0), Some(70.0));
        let system_info = crate::results::fixtures::system_info(true);

        let (path, file) = run_and_save_suite(
            SuiteKind::Textures,
            &settings,
            &system_info,
            &mut target,
            &mut probe,
            &clock,
        )
        .unwrap();

        assert_eq!(path, dir.path().join("benchmark_textures.json"));
        assert_eq!(file.results[0].config.texture_mode, TextureMode::Size64);
        assert_eq!(file.results[0].avg_gpu, Some(70.0));
        let loaded = crate::results::load_results(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn demo_is_capped_to_frame_budget() {
        let settings = DemoSettings {
            duration_seconds: 1.0,
            fps_cap: 50,
        };
        let clock = ManualClock::default();
        let mut target = FakeRenderer::new(&clock, Duration::from_millis(2));

        let report = run_demo(&settings, &mut target, &clock).unwrap();

        assert_eq!(report.frames, 50);
        assert!((report.avg_fps - 50.0).abs() < 1e-6);
        assert_eq!(target.loaded, vec![BenchmarkConfiguration::plain(1).unwrap()]);
    }

    #[test]
    fn demo_rejects_unrepresentable_durations() {
        let clock = ManualClock::default();
        let mut target = FakeRenderer::new(&clock, Duration::from_millis(2));
        for duration_seconds in [1e20, 1e-12, f64::NAN] {
            let settings = DemoSettings {
                duration_seconds,
                fps_cap: 60,
            };
            let error = run_demo(&settings, &mut target, &clock).expect_err("duration should fail");
            assert!(error.to_string().contains("demo.duration_seconds"), "{error}");
        }
        assert!(target.loaded.is_empty());
    }

    #[test]
    fn progress_line_mentions_gpu_only_when_present() {
        let mut result = crate::results::fixtures::result(
            100,
            LightingMode::None,
            TextureMode::None,
            250.0,
            None,
        );
        assert!(!progress_line(&result).contains("GPU"));
        result.avg_gpu = Some(42.0);
        assert!(progress_line(&result).contains("GPU 42.0%"));
    }
}
