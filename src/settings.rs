use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::errors::{CodedError, INVALID_CONFIG};
use crate::schema::{BenchmarkConfiguration, LightingMode, SuiteKind, TextureMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: f64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub backend: BackendPreference,
    #[serde(default)]
    pub suites: SuiteSettings,
    #[serde(default)]
    pub demo: DemoSettings,
    #[serde(default)]
    pub charts: ChartSettings,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            duration_seconds: default_duration_seconds(),
            sample_interval_ms: default_sample_interval_ms(),
            output_dir: default_output_dir(),
            backend: BackendPreference::default(),
            suites: SuiteSettings::default(),
            demo: DemoSettings::default(),
            charts: ChartSettings::default(),
        }
    }
}

impl BenchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            bail!(
                "resolution must be positive, got {}x{}",
                self.resolution.width,
                self.resolution.height
            );
        }

        seconds_to_duration("duration_seconds", self.duration_seconds)?;

        if self.sample_interval_ms == 0 {
            bail!("sample_interval_ms must be > 0");
        }

        seconds_to_duration("demo.duration_seconds", self.demo.duration_seconds)?;

        if self.demo.fps_cap == 0 {
            bail!("demo.fps_cap must be > 0");
        }

        self.suites
            .triangles
            .validate()
            .context("invalid suites.triangles")?;
        self.suites
            .lighting
            .validate()
            .context("invalid suites.lighting")?;
        self.suites
            .textures
            .validate()
            .context("invalid suites.textures")?;

        if self.charts.width < 200 || self.charts.height < 150 {
            bail!(
                "charts must be at least 200x150, got {}x{}",
                self.charts.width,
                self.charts.height
            );
        }

        Ok(())
    }

    pub fn sampling(&self) -> Result<SamplingSettings> {
        Ok(SamplingSettings {
            duration: seconds_to_duration("duration_seconds", self.duration_seconds)?,
            interval: Duration::from_millis(self.sample_interval_ms),
        })
    }

    pub fn result_path(&self, suite: SuiteKind) -> PathBuf {
        self.output_dir.join(suite.result_file_name())
    }

    pub fn chart_path(&self, suite: SuiteKind) -> PathBuf {
        self.output_dir.join(suite.chart_file_name())
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("benchmark_summary.json")
    }

    /// Ordered configurations of one suite: variant-major, count-minor.
    pub fn configurations(&self, suite: SuiteKind) -> Result<Vec<BenchmarkConfiguration>> {
        let mut configurations = Vec::new();
        match suite {
            SuiteKind::Triangles => {
                for &count in &self.suites.triangles.triangle_counts {
                    configurations.push(BenchmarkConfiguration::plain(count)?);
                }
            }
            SuiteKind::Lighting => {
                for &mode in &self.suites.lighting.modes {
                    for &count in &self.suites.lighting.triangle_counts {
                        configurations.push(BenchmarkConfiguration::new(
                            count,
                            mode,
                            TextureMode::None,
                        )?);
                    }
                }
            }
            SuiteKind::Textures => {
                for &mode in &self.suites.textures.modes {
                    for &count in &self.suites.textures.triangle_counts {
                        configurations.push(BenchmarkConfiguration::new(
                            count,
                            LightingMode::None,
                            mode,
                        )?);
                    }
                }
            }
        }
        Ok(configurations)
    }
}

/// Timing parameters of one fixed-duration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingSettings {
    pub duration: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// OpenGL when the platform exposes it, otherwise whatever wgpu finds.
    Auto,
    Gl,
    Vulkan,
    Metal,
    Dx12,
}

impl Default for BackendPreference {
    fn default() -> Self {
        Self::Auto
    }
}

impl BackendPreference {
    /// Backend sets to try, in order.
    pub fn candidates(self) -> Vec<wgpu::Backends> {
        match self {
            Self::Auto => vec![wgpu::Backends::GL, wgpu::Backends::all()],
            Self::Gl => vec![wgpu::Backends::GL],
            Self::Vulkan => vec![wgpu::Backends::VULKAN],
            Self::Metal => vec![wgpu::Backends::METAL],
            Self::Dx12 => vec![wgpu::Backends::DX12],
        }
    }
}

impl std::str::FromStr for BackendPreference {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gl" | "opengl" | "gles" => Ok(Self::Gl),
            "vulkan" | "vk" => Ok(Self::Vulkan),
            "metal" => Ok(Self::Metal),
            "dx12" | "d3d12" => Ok(Self::Dx12),
            other => Err(anyhow!(
                "unknown backend '{}'. Expected one of: auto, gl, vulkan, metal, dx12",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSettings {
    #[serde(default = "default_triangle_suite")]
    pub triangles: CountSuite,
    #[serde(default = "default_lighting_suite")]
    pub lighting: VariantSuite<LightingMode>,
    #[serde(default = "default_texture_suite")]
    pub textures: VariantSuite<TextureMode>,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            triangles: default_triangle_suite(),
            lighting: default_lighting_suite(),
            textures: default_texture_suite(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountSuite {
    pub triangle_counts: Vec<u32>,
}

impl CountSuite {
    fn validate(&self) -> Result<()> {
        validate_counts(&self.triangle_counts)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSuite<M> {
    pub triangle_counts: Vec<u32>,
    pub modes: Vec<M>,
}

impl<M> VariantSuite<M> {
    fn validate(&self) -> Result<()> {
        validate_counts(&self.triangle_counts)?;
        if self.modes.is_empty() {
            bail!("modes must not be empty");
        }
        Ok(())
    }
}

fn validate_counts(counts: &[u32]) -> Result<()> {
    if counts.is_empty() {
        bail!("triangle_counts must not be empty");
    }
    if let Some(position) = counts.iter().position(|&count| count == 0) {
        bail!("triangle_counts[{}] must be >= 1", position);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoSettings {
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: f64,
    #[serde(default = "default_demo_fps_cap")]
    pub fps_cap: u32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            fps_cap: default_demo_fps_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartSettings {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
    /// TTF used for labels instead of the built-in bitmap glyphs.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
            font_path: None,
        }
    }
}

fn default_duration_seconds() -> f64 {
    5.0
}

fn default_sample_interval_ms() -> u64 {
    500
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_demo_fps_cap() -> u32 {
    60
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    900
}

fn default_triangle_suite() -> CountSuite {
    CountSuite {
        triangle_counts: vec![1, 10, 50, 100, 200, 500, 1000, 2000],
    }
}

fn default_lighting_suite() -> VariantSuite<LightingMode> {
    VariantSuite {
        triangle_counts: vec![100, 500, 1000],
        modes: LightingMode::ALL.to_vec(),
    }
}

fn default_texture_suite() -> VariantSuite<TextureMode> {
    VariantSuite {
        triangle_counts: vec![100, 500, 1000, 2000],
        modes: TextureMode::ALL.to_vec(),
    }
}

/// Shortest run a duration setting may ask for.
pub const MIN_DURATION: Duration = Duration::from_millis(1);

/// Converts a seconds setting, rejecting values below [`MIN_DURATION`] and
/// values too large for a `Duration`.
pub fn seconds_to_duration(field: &str, seconds: f64) -> Result<Duration> {
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| anyhow!("{field} must be a positive, finite number of seconds, got {seconds}"))?;
    if duration < MIN_DURATION {
        bail!("{field} must be at least 0.001, got {seconds}");
    }
    Ok(duration)
}

pub fn load_settings(path: &Path) -> Result<BenchSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    parse_settings(&contents, &path.display().to_string())
}

pub fn parse_settings(contents: &str, origin: &str) -> Result<BenchSettings> {
    let settings: BenchSettings = serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow::Error::new(
            CodedError::usage(
                INVALID_CONFIG,
                format!("failed to parse yaml in {} at {}: {}", origin, location, error),
            )
            .with_details(json!({ "origin": origin })),
        )
    })?;

    settings.validate().map_err(|error| {
        anyhow::Error::new(
            CodedError::usage(INVALID_CONFIG, format!("{}: {:#}", origin, error))
                .with_details(json!({ "origin": origin })),
        )
    })?;
    Ok(settings)
}
