use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingMode {
    None,
    Omnidirectional,
    Spot,
    Multiple,
}

impl LightingMode {
    pub const ALL: [LightingMode; 4] = [
        LightingMode::None,
        LightingMode::Omnidirectional,
        LightingMode::Spot,
        LightingMode::Multiple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Omnidirectional => "omnidirectional",
            Self::Spot => "spot",
            Self::Multiple => "multiple",
        }
    }
}

impl Default for LightingMode {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightingMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "omnidirectional" | "omni" | "point" => Ok(Self::Omnidirectional),
            "spot" => Ok(Self::Spot),
            "multiple" | "multi" => Ok(Self::Multiple),
            other => bail!(
                "unknown lighting mode '{}'. Expected one of: none, omnidirectional, spot, multiple",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureMode {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "64x64")]
    Size64,
    #[serde(rename = "128x128")]
    Size128,
    #[serde(rename = "256x256")]
    Size256,
}

impl TextureMode {
    pub const ALL: [TextureMode; 4] = [
        TextureMode::None,
        TextureMode::Size64,
        TextureMode::Size128,
        TextureMode::Size256,
    ];

    /// Edge length of the square texture, `None` when untextured.
    pub fn edge(self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Size64 => Some(64),
            Self::Size128 => Some(128),
            Self::Size256 => Some(256),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Size64 => "64x64",
            Self::Size128 => "128x128",
            Self::Size256 => "256x256",
        }
    }
}

impl Default for TextureMode {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for TextureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "64" | "64x64" => Ok(Self::Size64),
            "128" | "128x128" => Ok(Self::Size128),
            "256" | "256x256" => Ok(Self::Size256),
            other => bail!(
                "unknown texture mode '{}'. Expected one of: none, 64x64, 128x128, 256x256",
                other
            ),
        }
    }
}

/// One (triangle count, lighting/texture variant) combination under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfiguration {
    pub triangle_count: u32,
    #[serde(default)]
    pub lighting_mode: LightingMode,
    #[serde(default)]
    pub texture_mode: TextureMode,
}

impl BenchmarkConfiguration {
    pub fn new(
        triangle_count: u32,
        lighting_mode: LightingMode,
        texture_mode: TextureMode,
    ) -> Result<Self> {
        if triangle_count == 0 {
            bail!("triangle_count must be >= 1");
        }
        Ok(Self {
            triangle_count,
            lighting_mode,
            texture_mode,
        })
    }

    pub fn plain(triangle_count: u32) -> Result<Self> {
        Self::new(triangle_count, LightingMode::None, TextureMode::None)
    }

    pub fn label(&self) -> String {
        let mut label = format!("{} triangles", self.triangle_count);
        if self.lighting_mode != LightingMode::None {
            label.push_str(&format!(", lighting {}", self.lighting_mode));
        }
        if self.texture_mode != TextureMode::None {
            label.push_str(&format!(", texture {}", self.texture_mode));
        }
        label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    #[serde(flatten)]
    pub config: BenchmarkConfiguration,
    pub avg_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub avg_cpu: f64,
    /// `None` when GPU load could not be read on this machine.
    pub avg_gpu: Option<f64>,
    pub total_frames: u64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_physical_cores: Option<usize>,
    pub cpu_logical_cores: usize,
    pub cpu_max_freq_mhz: Option<u64>,
    pub ram_gb: f64,
    pub gpu_available: bool,
    pub gpu_count: usize,
    pub gpu_info: Vec<GpuInfo>,
    #[serde(default)]
    pub os_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub arch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    Triangles,
    Lighting,
    Textures,
}

impl SuiteKind {
    pub const ALL: [SuiteKind; 3] = [SuiteKind::Triangles, SuiteKind::Lighting, SuiteKind::Textures];

    pub fn result_file_name(self) -> &'static str {
        match self {
            Self::Triangles => "benchmark_triangles.json",
            Self::Lighting => "benchmark_lighting.json",
            Self::Textures => "benchmark_textures.json",
        }
    }

    pub fn chart_file_name(self) -> &'static str {
        match self {
            Self::Triangles => "chart_fps_triangles.png",
            Self::Lighting => "chart_lighting.png",
            Self::Textures => "chart_textures.png",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Triangles => "Triangle benchmark",
            Self::Lighting => "Lighting benchmark",
            Self::Textures => "Texture benchmark",
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Triangles => "triangles",
            Self::Lighting => "lighting",
            Self::Textures => "textures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererInfo {
    pub adapter: String,
    pub backend: String,
}

/// Everything one suite run persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub timestamp: String,
    pub suite: SuiteKind,
    pub build_profile: String,
    pub renderer: RendererInfo,
    pub duration_per_test_seconds: f64,
    pub system_info: SystemInfo,
    pub results: Vec<BenchmarkResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub suite: SuiteKind,
    pub source: String,
    pub configurations: usize,
    pub total_frames: u64,
    pub peak_avg_fps: f64,
    pub peak_config: BenchmarkConfiguration,
    pub lowest_avg_fps: f64,
    pub lowest_config: BenchmarkConfiguration,
    pub mean_cpu: f64,
    pub mean_gpu: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFile {
    pub generated_at: String,
    pub system_info: SystemInfo,
    pub suites: Vec<SuiteSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_cli_spellings() {
        assert_eq!("omni".parse::<LightingMode>().unwrap(), LightingMode::Omnidirectional);
        assert_eq!("SPOT".parse::<LightingMode>().unwrap(), LightingMode::Spot);
        assert_eq!("128".parse::<TextureMode>().unwrap(), TextureMode::Size128);
        assert_eq!("256x256".parse::<TextureMode>().unwrap(), TextureMode::Size256);
        assert!("sunlight".parse::<LightingMode>().is_err());
        assert!("512x512".parse::<TextureMode>().is_err());
    }

    #[test]
    fn configuration_rejects_zero_triangles() {
        assert!(BenchmarkConfiguration::plain(0).is_err());
        let config =
            BenchmarkConfiguration::new(500, LightingMode::Spot, TextureMode::None).unwrap();
        assert_eq!(config.label(), "500 triangles, lighting spot");
    }

    #[test]
    fn result_serializes_flat_with_null_gpu() {
        let result = BenchmarkResult {
            config: BenchmarkConfiguration::new(100, LightingMode::None, TextureMode::Size64)
                .unwrap(),
            avg_fps: 120.5,
            min_fps: 90.25,
            max_fps: 144.0,
            avg_cpu: 12.5,
            avg_gpu: None,
            total_frames: 602,
            duration_seconds: 4.996,
        };

        let value = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(value["triangle_count"], 100);
        assert_eq!(value["lighting_mode"], "none");
        assert_eq!(value["texture_mode"], "64x64");
        assert!(value["avg_gpu"].is_null());

        let back: BenchmarkResult = serde_json::from_value(value).expect("result should parse");
        assert_eq!(back, result);
    }
}
