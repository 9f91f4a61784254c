use crate::error::MonitorError;
use crate::types::LogFilter;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const MAX_FRAME_RATE_HZ: u32 = 1000;

#[derive(Parser, Debug)]
#[clap(name = "sitescope", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long, default_value = "./sitescope.toml")]
    pub config: PathBuf,

    /// Override the directory holding the persisted log
    #[clap(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Override the directory CSV exports are written to
    #[clap(long, global = true)]
    pub export_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sample noise and vibration until interrupted
    Monitor {
        /// Unsigned 8-bit PCM capture source, `-` for stdin
        #[clap(long)]
        audio: Option<String>,

        /// Serial accelerometer device
        #[clap(long)]
        motion_port: Option<String>,

        #[clap(long)]
        motion_baud: Option<u32>,

        /// Stream of `x,y,z` readings, `-` for stdin
        #[clap(long)]
        motion_file: Option<String>,

        /// Keep the log in memory only
        #[clap(long)]
        ephemeral: bool,
    },

    /// Write the persisted log as CSV
    Export {
        /// all, noise or vibration
        #[clap(long, default_value = "all")]
        filter: LogFilter,
    },

    /// Print the persisted log
    List {
        #[clap(long, default_value = "all")]
        filter: LogFilter,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio_device: Option<String>,
    pub motion_port: Option<String>,
    pub motion_baud: u32,
    pub motion_file: Option<String>,
    pub storage_dir: PathBuf,
    pub export_dir: PathBuf,
    pub frame_rate_hz: u32,
    pub fft_size: usize,
    /// Only set by `monitor --ephemeral`.
    #[serde(skip)]
    pub ephemeral: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_device: None,
            motion_port: None,
            motion_baud: 115200,
            motion_file: None,
            storage_dir: PathBuf::from("./.sitescope"),
            export_dir: PathBuf::from("."),
            frame_rate_hz: 60,
            fft_size: 2048,
            ephemeral: false,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(ref dir) = cli.storage_dir {
            self.storage_dir = dir.clone();
        }

        if let Some(ref dir) = cli.export_dir {
            self.export_dir = dir.clone();
        }

        if let Command::Monitor {
            audio,
            motion_port,
            motion_baud,
            motion_file,
            ephemeral,
        } = &cli.command
        {
            if let Some(audio) = audio {
                self.audio_device = Some(audio.clone());
            }
            if let Some(port) = motion_port {
                self.motion_port = Some(port.clone());
            }
            if let Some(baud) = motion_baud {
                self.motion_baud = *baud;
            }
            if let Some(file) = motion_file {
                self.motion_file = Some(file.clone());
            }
            if *ephemeral {
                self.ephemeral = true;
            }
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.frame_rate_hz == 0 || self.frame_rate_hz > MAX_FRAME_RATE_HZ {
            return Err(MonitorError::Config(format!(
                "frame_rate_hz must be between 1 and {}",
                MAX_FRAME_RATE_HZ
            )));
        }
        if self.fft_size == 0 {
            return Err(MonitorError::Config("fft_size must be > 0".to_string()));
        }
        Ok(())
    }

    /// True when some channel would read from stdin.
    pub fn uses_stdin(&self) -> bool {
        self.audio_device.as_deref() == Some("-")
            || (self.motion_port.is_none() && self.motion_file.as_deref() == Some("-"))
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        let content = fs::read_to_string(&cli.config)
            .with_context(|| format!("Failed to read config file: {:?}", cli.config))?;
        Config::from_toml(&content)?
    } else {
        info!("No config file at {:?}, using defaults", cli.config);
        Config::default()
    };

    config.apply_overrides(cli);
    config.validate()?;

    Ok(config)
}
