pub mod benchmark;
pub mod chart;
pub mod errors;
pub mod glyphs;
pub mod menu;
pub mod monitor;
pub mod renderer;
pub mod results;
pub mod sampler;
pub mod scene;
pub mod schema;
pub mod settings;
pub mod stats;
pub mod system_info;
