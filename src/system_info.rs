use std::io::Write;

use anyhow::Result;
use sysinfo::System;

use crate::schema::{GpuInfo, SystemInfo};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Static snapshot taken once per process and embedded in every result file.
pub fn capture_system_info() -> SystemInfo {
    let mut system = System::new();
    system.refresh_cpu_all();
    system.refresh_memory();

    let gpus = detect_gpus();
    build_system_info(&system, gpus)
}

fn build_system_info(system: &System, gpu_info: Vec<GpuInfo>) -> SystemInfo {
    let cpu_max_freq_mhz = system
        .cpus()
        .iter()
        .map(|cpu| cpu.frequency())
        .max()
        .filter(|&mhz| mhz > 0);

    let gpu_available = gpu_info.iter().any(is_hardware_gpu);

    SystemInfo {
        cpu_physical_cores: system.physical_core_count(),
        cpu_logical_cores: system.cpus().len().max(1),
        cpu_max_freq_mhz,
        ram_gb: system.total_memory() as f64 / BYTES_PER_GB,
        gpu_available,
        gpu_count: gpu_info.len(),
        gpu_info,
        os_name: System::name(),
        os_version: System::os_version(),
        arch: std::env::consts::ARCH.to_owned(),
    }
}

/// Adapters wgpu can see on any backend, one entry per distinct device name.
pub fn detect_gpus() -> Vec<GpuInfo> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let infos = instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| gpu_info_from(&adapter.get_info()))
        .collect::<Vec<_>>();
    dedupe_by_name(infos)
}

pub fn gpu_info_from(info: &wgpu::AdapterInfo) -> GpuInfo {
    let device_type = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => "discrete",
        wgpu::DeviceType::IntegratedGpu => "integrated",
        wgpu::DeviceType::VirtualGpu => "virtual",
        wgpu::DeviceType::Cpu => "cpu",
        wgpu::DeviceType::Other => "other",
    };

    let driver = match (info.driver.is_empty(), info.driver_info.is_empty()) {
        (false, false) => format!("{} {}", info.driver, info.driver_info),
        (false, true) => info.driver.clone(),
        (true, false) => info.driver_info.clone(),
        (true, true) => "unknown".to_owned(),
    };

    GpuInfo {
        name: info.name.clone(),
        backend: format!("{:?}", info.backend).to_ascii_lowercase(),
        device_type: device_type.to_owned(),
        driver,
    }
}

/// The same device usually shows up once per backend; keep the first.
fn dedupe_by_name(infos: Vec<GpuInfo>) -> Vec<GpuInfo> {
    let mut unique: Vec<GpuInfo> = Vec::with_capacity(infos.len());
    for info in infos {
        if !unique.iter().any(|seen| seen.name == info.name) {
            unique.push(info);
        }
    }
    unique
}

fn is_hardware_gpu(info: &GpuInfo) -> bool {
    info.device_type != "cpu"
}

/// Human-readable hardware report for the `system` command.
pub fn write_system_report(out: &mut impl Write, info: &SystemInfo) -> Result<()> {
    let mut system = System::new();
    system.refresh_cpu_all();
    system.refresh_memory();

    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "SYSTEM INFORMATION")?;
    writeln!(out, "{}", "=".repeat(60))?;

    writeln!(out)?;
    writeln!(
        out,
        "System: {}",
        info.os_name.as_deref().unwrap_or("unknown")
    )?;
    writeln!(
        out,
        "Release: {}",
        info.os_version.as_deref().unwrap_or("unknown")
    )?;
    writeln!(out, "Machine: {}", info.arch)?;
    if let Some(cpu) = system.cpus().first() {
        writeln!(out, "Processor: {}", cpu.brand().trim())?;
    }

    writeln!(out)?;
    match info.cpu_physical_cores {
        Some(cores) => writeln!(out, "Physical cores: {cores}")?,
        None => writeln!(out, "Physical cores: unknown")?,
    }
    writeln!(out, "Logical cores: {}", info.cpu_logical_cores)?;
    if let Some(mhz) = info.cpu_max_freq_mhz {
        writeln!(out, "Frequency: {mhz} MHz")?;
    }

    let total = system.total_memory() as f64;
    let available = system.available_memory() as f64;
    writeln!(out)?;
    writeln!(out, "RAM total: {:.2} GB", info.ram_gb)?;
    writeln!(out, "RAM available: {:.2} GB", available / BYTES_PER_GB)?;
    if total > 0.0 {
        writeln!(out, "RAM used: {:.1}%", (total - available) / total * 100.0)?;
    }

    writeln!(out)?;
    write_gpu_section(out, info)?;
    Ok(())
}

fn write_gpu_section(out: &mut impl Write, info: &SystemInfo) -> Result<()> {
    if info.gpu_info.is_empty() {
        writeln!(out, "GPU: not detected")?;
        writeln!(out, "(normal for some integrated and Apple GPUs)")?;
        return Ok(());
    }

    for (index, gpu) in info.gpu_info.iter().enumerate() {
        writeln!(out, "GPU {index}: {}", gpu.name)?;
        writeln!(
            out,
            "  type: {}, backend: {}, driver: {}",
            gpu.device_type, gpu.backend, gpu.driver
        )?;
    }
    if !info.gpu_available {
        writeln!(out, "(only software adapters found)")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(name: &str, backend: &str, device_type: &str) -> GpuInfo {
        GpuInfo {
            name: name.to_owned(),
            backend: backend.to_owned(),
            device_type: device_type.to_owned(),
            driver: "test".to_owned(),
        }
    }

    fn info_with(gpu_info: Vec<GpuInfo>) -> SystemInfo {
        SystemInfo {
            cpu_physical_cores: Some(4),
            cpu_logical_cores: 8,
            cpu_max_freq_mhz: Some(3200),
            ram_gb: 16.0,
            gpu_available: gpu_info.iter().any(is_hardware_gpu),
            gpu_count: gpu_info.len(),
            gpu_info,
            os_name: Some("Linux".to_owned()),
            os_version: Some("6.1".to_owned()),
            arch: "x86_64".to_owned(),
        }
    }

    #[test]
    fn duplicate_adapters_across_backends_collapse() {
        let unique = dedupe_by_name(vec![
            gpu("Radeon", "vulkan", "discrete"),
            gpu("Radeon", "gl", "discrete"),
            gpu("llvmpipe", "gl", "cpu"),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].backend, "vulkan");
    }

    #[test]
    fn software_only_adapters_do_not_count_as_gpu() {
        assert!(!is_hardware_gpu(&gpu("llvmpipe", "gl", "cpu")));
        assert!(is_hardware_gpu(&gpu("Apple M2", "metal", "integrated")));
    }

    #[test]
    fn report_mentions_missing_gpu_as_normal() {
        let mut out = Vec::new();
        write_gpu_section(&mut out, &info_with(Vec::new())).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("GPU: not detected"));
    }

    #[test]
    fn report_lists_each_gpu() {
        let mut out = Vec::new();
        let info = info_with(vec![gpu("GeForce RTX", "vulkan", "discrete")]);
        write_system_report(&mut out, &info).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("GPU 0: GeForce RTX"));
        assert!(text.contains("Logical cores: 8"));
        assert!(text.contains("Machine: x86_64"));
    }
}
