use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use glbench::benchmark::{run_all, run_and_save_suite, run_demo};
use glbench::chart::render_charts;
use glbench::errors::{
    envelope_for, exit_code_for, find_coded_error, CodedError, GPU_ADAPTER_UNAVAILABLE,
    INVALID_CONFIG,
};
use glbench::menu::{run_menu, MenuChoice};
use glbench::monitor::SystemProbe;
use glbench::renderer::SceneRenderer;
use glbench::sampler::MonotonicClock;
use glbench::schema::{SuiteKind, SystemInfo};
use glbench::settings::{load_settings, BackendPreference, BenchSettings};
use glbench::system_info::{capture_system_info, write_system_report};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GLBENCH_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "glbench")]
#[command(version = VERSION)]
#[command(about = "Rendering benchmark: FPS, CPU and GPU usage across triangle counts, lighting and textures")]
struct Cli {
    /// YAML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for result files and charts.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Seconds per benchmark configuration.
    #[arg(long, global = true)]
    duration: Option<f64>,
    /// auto, gl, vulkan, metal or dx12.
    #[arg(long, global = true)]
    backend: Option<BackendPreference>,
    /// Print errors as a JSON envelope on stderr.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    /// Print CPU, memory and GPU information.
    System,
    /// Render one rotating triangle for a few seconds.
    Demo,
    /// FPS versus triangle count.
    Triangles,
    /// FPS per lighting mode.
    Lighting,
    /// FPS per texture size.
    Textures,
    /// Every suite, then the summary and charts.
    All,
    /// Charts from existing result files.
    Charts,
    /// Interactive menu (the default).
    Menu,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_error(&error, cli.json);
            ExitCode::from(exit_code_for(&error).clamp(1, 255) as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = resolve_settings(cli)?;
    let mut app = App::new(settings);

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::System => app.dispatch(MenuChoice::SystemInfo),
        Commands::Demo => app.dispatch(MenuChoice::Demo),
        Commands::Triangles => app.dispatch(MenuChoice::Suite(SuiteKind::Triangles)),
        Commands::Lighting => app.dispatch(MenuChoice::Suite(SuiteKind::Lighting)),
        Commands::Textures => app.dispatch(MenuChoice::Suite(SuiteKind::Textures)),
        Commands::All => app.dispatch(MenuChoice::RunAll),
        Commands::Charts => app.dispatch(MenuChoice::Charts),
        Commands::Menu => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            run_menu(&mut input, &mut output, |choice| app.dispatch(choice))
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<BenchSettings> {
    let mut settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => BenchSettings::default(),
    };

    if let Some(output_dir) = &cli.output_dir {
        settings.output_dir = output_dir.clone();
    }
    if let Some(duration) = cli.duration {
        settings.duration_seconds = duration;
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }

    settings.validate().map_err(|error| {
        anyhow::Error::new(
            CodedError::usage(INVALID_CONFIG, format!("{:#}", error))
                .with_details(json!({ "origin": "command line" })),
        )
    })?;
    Ok(settings)
}

struct App {
    settings: BenchSettings,
    system_info: SystemInfo,
    renderer: Option<SceneRenderer>,
}

impl App {
    fn new(settings: BenchSettings) -> Self {
        Self {
            settings,
            system_info: capture_system_info(),
            renderer: None,
        }
    }

    /// Renderer, created on first use and kept for the rest of the process.
    fn ready(&mut self) -> Result<(&BenchSettings, &SystemInfo, &mut SceneRenderer)> {
        if self.renderer.is_none() {
            let renderer = pollster::block_on(SceneRenderer::new(
                self.settings.backend,
                &self.settings.resolution,
            ))?;
            println!(
                "[glbench] renderer: {} ({}), {}x{} offscreen",
                renderer.info().adapter,
                renderer.info().backend,
                self.settings.resolution.width,
                self.settings.resolution.height
            );
            self.renderer = Some(renderer);
        }

        match &mut self.renderer {
            Some(renderer) => Ok((&self.settings, &self.system_info, renderer)),
            None => Err(anyhow!("renderer was not initialized")),
        }
    }

    fn dispatch(&mut self, choice: MenuChoice) -> Result<()> {
        match choice {
            MenuChoice::SystemInfo => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                write_system_report(&mut out, &self.system_info)?;
                out.flush()?;
                Ok(())
            }
            MenuChoice::Demo => {
                let (settings, _, renderer) = self.ready()?;
                run_demo(&settings.demo, renderer, &MonotonicClock::new())?;
                Ok(())
            }
            MenuChoice::Suite(suite) => {
                let (settings, system_info, renderer) = self.ready()?;
                let mut probe = discover_probe();
                run_and_save_suite(
                    suite,
                    settings,
                    system_info,
                    renderer,
                    &mut probe,
                    &MonotonicClock::new(),
                )?;
                Ok(())
            }
            MenuChoice::RunAll => {
                let (settings, system_info, renderer) = self.ready()?;
                let mut probe = discover_probe();
                let written = run_all(
                    settings,
                    system_info,
                    renderer,
                    &mut probe,
                    &MonotonicClock::new(),
                )?;
                println!("[glbench] run complete, {} files written", written.len());
                Ok(())
            }
            MenuChoice::Charts => {
                render_charts(&self.settings)?;
                Ok(())
            }
            MenuChoice::Exit => Ok(()),
        }
    }
}

fn discover_probe() -> SystemProbe {
    let probe = SystemProbe::discover();
    match probe.gpu_source_label() {
        Some(label) => println!("[glbench] GPU load source: {}", label),
        None => eprintln!("[glbench] GPU load not readable here; avg_gpu will be null"),
    }
    probe
}

fn report_error(error: &anyhow::Error, json: bool) {
    if json {
        match serde_json::to_string(&envelope_for(error)) {
            Ok(envelope) => eprintln!("{}", envelope),
            Err(_) => eprintln!("[glbench] error: {:#}", error),
        }
        return;
    }

    eprintln!("[glbench] error: {:#}", error);
    if find_coded_error(error).map(|coded| coded.code) == Some(GPU_ADAPTER_UNAVAILABLE) {
        eprintln!(
            "[glbench] rendering needs an OpenGL, Vulkan, Metal or DX12 capable adapter; `glbench system` still works"
        );
    }
}
