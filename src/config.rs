use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for frame-studio
///
/// Every component receives the parts it needs from one `Config` value;
/// nothing reads process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Working directories and font lookup
    pub paths: PathsConfig,

    /// Raster drawing settings
    pub imaging: ImagingConfig,

    /// Video encoding settings
    pub video: VideoConfig,

    /// Side-by-side stitching settings
    pub stitch: StitchConfig,

    /// Batch image editing settings
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.imaging.validate()?;
        self.video.validate()?;
        self.stitch.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Working directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Scratch space for intermediate frames
    pub tmp_dir: PathBuf,

    /// Where "deleted" intermediates are moved instead of being removed
    pub trash_dir: PathBuf,

    /// TrueType font used for every text overlay. When unset, a list of
    /// common system fonts is searched.
    pub font_path: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let tmp_dir = std::env::temp_dir().join("frame_studio");
        Self {
            trash_dir: tmp_dir.join("trash"),
            tmp_dir,
            font_path: None,
        }
    }
}

/// Raster drawing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Height of a subtitle bar as a fraction of the image height
    pub subtitle_height_fraction: f32,

    /// Share of a text box the text may occupy in each direction
    pub text_fill_fraction: f32,

    /// Starting point of the best-fit font size search
    pub initial_font_size: u32,

    /// Resolution written into saved PNGs and used for print layouts
    pub dpi: u32,

    /// Frame-info box width as a fraction of the frame width
    pub info_box_width_fraction: f32,

    /// Frame-info box height as a fraction of the frame height
    pub info_box_height_fraction: f32,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            subtitle_height_fraction: 0.1,
            text_fill_fraction: 0.8,
            initial_font_size: 100,
            dpi: 300,
            info_box_width_fraction: 0.4,
            info_box_height_fraction: 0.25,
        }
    }
}

impl ImagingConfig {
    fn validate(&self) -> Result<()> {
        let fractions = [
            ("imaging.subtitle_height_fraction", self.subtitle_height_fraction),
            ("imaging.text_fill_fraction", self.text_fill_fraction),
            ("imaging.info_box_width_fraction", self.info_box_width_fraction),
            ("imaging.info_box_height_fraction", self.info_box_height_fraction),
        ];
        for (key, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(key, value).into());
            }
        }

        if self.initial_font_size == 0 {
            return Err(invalid("imaging.initial_font_size", self.initial_font_size).into());
        }

        if self.dpi == 0 {
            return Err(invalid("imaging.dpi", self.dpi).into());
        }

        Ok(())
    }
}

/// Video encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame rate used when neither the caller nor the frame directory names one
    pub default_fps: f64,

    /// ffmpeg video encoder
    pub codec: String,

    /// Constant rate factor handed to the encoder (0-51)
    pub crf: u8,

    /// Default length of a freeze, in seconds
    pub freeze_seconds: f64,

    /// ffmpeg executable
    pub ffmpeg: PathBuf,

    /// ffprobe executable
    pub ffprobe: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            default_fps: 30.0,
            codec: "libx264".to_string(),
            crf: 23,
            freeze_seconds: 2.0,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(invalid("video.default_fps", self.default_fps).into());
        }

        if self.crf > 51 {
            return Err(invalid("video.crf", self.crf).into());
        }

        if !(self.freeze_seconds.is_finite() && self.freeze_seconds >= 0.0) {
            return Err(invalid("video.freeze_seconds", self.freeze_seconds).into());
        }

        Ok(())
    }
}

/// Side-by-side stitching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Width of the black column between adjacent videos
    pub padding_width: u32,

    /// Optional pre-rendered timer clip overlaid on each column
    pub timer_asset: Option<PathBuf>,

    /// Timer height as a fraction of the output height
    pub timer_height_fraction: f32,

    /// Largest slow-motion factor the audio time-stretch can follow
    pub max_audio_tempo_factor: f64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            padding_width: 20,
            timer_asset: None,
            timer_height_fraction: 0.08,
            max_audio_tempo_factor: 2.0,
        }
    }
}

impl StitchConfig {
    fn validate(&self) -> Result<()> {
        if !(self.timer_height_fraction > 0.0 && self.timer_height_fraction <= 1.0) {
            return Err(invalid("stitch.timer_height_fraction", self.timer_height_fraction).into());
        }

        // atempo accepts 0.5..=100, so 1/factor must stay >= 0.5
        if !(self.max_audio_tempo_factor >= 1.0 && self.max_audio_tempo_factor <= 2.0) {
            return Err(invalid("stitch.max_audio_tempo_factor", self.max_audio_tempo_factor).into());
        }

        Ok(())
    }
}

/// Batch image editing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Size of the worker pool
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("batch.workers", self.workers).into());
        }
        Ok(())
    }
}
