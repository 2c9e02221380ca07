#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod dump;
pub mod error;
pub mod figure;
pub mod format;
pub mod ir;
pub mod plot;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, ResolutionConfig};
pub use error::{ChartError, ConfigError};
pub use plot::Chart;
