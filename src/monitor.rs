use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use sysinfo::System;

use crate::sampler::UtilizationProbe;

pub const DRM_CLASS_DIR: &str = "/sys/class/drm";

/// Where GPU load comes from on this machine.
pub trait GpuLoadSource {
    fn label(&self) -> &'static str;
    fn read_percent(&mut self) -> Option<f64>;
}

/// Kernel-exported busy percentage (amdgpu and some i915/xe builds).
pub struct SysfsGpuLoad {
    path: PathBuf,
}

impl SysfsGpuLoad {
    /// First `card*/device/gpu_busy_percent` under `drm_dir` that reads as a
    /// number.
    pub fn discover(drm_dir: &Path) -> Option<Self> {
        let mut cards = fs::read_dir(drm_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_card_node(path))
            .collect::<Vec<_>>();
        cards.sort();

        cards
            .into_iter()
            .map(|card| card.join("device").join("gpu_busy_percent"))
            .find(|path| read_percent_file(path).is_some())
            .map(|path| Self { path })
    }
}

impl GpuLoadSource for SysfsGpuLoad {
    fn label(&self) -> &'static str {
        "sysfs"
    }

    fn read_percent(&mut self) -> Option<f64> {
        read_percent_file(&self.path)
    }
}

fn is_card_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("card"))
        .map_or(false, |suffix| {
            !suffix.is_empty() && suffix.chars().all(|ch| ch.is_ascii_digit())
        })
}

fn read_percent_file(path: &Path) -> Option<f64> {
    let raw = fs::read_to_string(path).ok()?;
    parse_percent(&raw)
}

fn parse_percent(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.min(100.0))
}

/// Load of the first NVIDIA GPU as reported by `nvidia-smi`.
pub struct NvidiaSmiLoad;

impl NvidiaSmiLoad {
    pub fn discover() -> Option<Self> {
        let mut probe = Self;
        probe.read_percent().map(|_| probe)
    }
}

impl GpuLoadSource for NvidiaSmiLoad {
    fn label(&self) -> &'static str {
        "nvidia-smi"
    }

    fn read_percent(&mut self) -> Option<f64> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=utilization.gpu",
                "--format=csv,noheader,nounits",
            ])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().next().and_then(parse_percent)
    }
}

/// Picks the first GPU load source that works here, or `None` when GPU load
/// cannot be read (integrated and Apple GPUs, containers).
pub fn discover_gpu_load() -> Option<Box<dyn GpuLoadSource>> {
    if let Some(sysfs) = SysfsGpuLoad::discover(Path::new(DRM_CLASS_DIR)) {
        return Some(Box::new(sysfs));
    }
    NvidiaSmiLoad::discover().map(|smi| Box::new(smi) as Box<dyn GpuLoadSource>)
}

/// Production probe: sysinfo for CPU, whatever GPU source was discovered.
pub struct SystemProbe {
    system: System,
    gpu: Option<Box<dyn GpuLoadSource>>,
}

impl SystemProbe {
    pub fn new(gpu: Option<Box<dyn GpuLoadSource>>) -> Self {
        Self {
            system: System::new(),
            gpu,
        }
    }

    pub fn discover() -> Self {
        Self::new(discover_gpu_load())
    }

    pub fn gpu_source_label(&self) -> Option<&'static str> {
        self.gpu.as_ref().map(|source| source.label())
    }
}

impl UtilizationProbe for SystemProbe {
    fn prime(&mut self) {
        self.system.refresh_cpu_usage();
    }

    fn cpu_percent(&mut self) -> Option<f64> {
        self.system.refresh_cpu_usage();
        let usage = f64::from(self.system.global_cpu_usage());
        usage.is_finite().then_some(usage)
    }

    fn gpu_percent(&mut self) -> Option<f64> {
        self.gpu.as_mut().and_then(|source| source.read_percent())
    }
}
