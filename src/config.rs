use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lowest render resolution accepted for recognition.
pub const MIN_RECOGNITION_DPI: u32 = 72;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub operations: Operations,
    #[serde(default)]
    pub recognition: Recognition,
    #[serde(default)]
    pub output: OutputOptions,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(&self.run_config()).unwrap_or_default()
    }

    /// Snapshot of the options a job runs with. Taken once at job start.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            operations: self.operations.clone(),
            recognition: RecognitionParams {
                dpi: self.recognition.dpi.max(MIN_RECOGNITION_DPI),
                language: self.recognition.language.clone(),
            },
            output: self.output.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
    /// Read pause/resume/stop commands from stdin while a job runs.
    pub interactive: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            interactive: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operations {
    pub scan_for_missing_text: bool,
    pub ignore_first_page_in_scan: bool,
    pub perform_recognition: bool,
    pub remove_first_page: bool,
}

impl Operations {
    /// True when at least one operation that does work is selected.
    /// `ignore_first_page_in_scan` only modifies the scan and does not count.
    pub fn any_selected(&self) -> bool {
        self.scan_for_missing_text || self.perform_recognition || self.remove_first_page
    }

    pub fn mutates(&self) -> bool {
        self.perform_recognition || self.remove_first_page
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    pub dpi: u32,
    pub language: String,
    pub tesseract_exe: String,
    pub tessdata_dir: String,
    pub pdftoppm_exe: String,
}
impl Default for Recognition {
    fn default() -> Self {
        Self {
            dpi: 200,
            language: "eng".into(),
            tesseract_exe: "tesseract".into(),
            tessdata_dir: "".into(),
            pdftoppm_exe: "pdftoppm".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Write into a sibling `processed_pdfs` directory, never replacing an existing file.
    #[default]
    Copy,
    /// Write next to the input under the computed name, replacing whatever is there.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    #[default]
    None,
    Underscore,
    Hyphen,
}

impl CleanMode {
    pub fn separator(self) -> Option<char> {
        match self {
            CleanMode::None => None,
            CleanMode::Underscore => Some('_'),
            CleanMode::Hyphen => Some('-'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub save_mode: SaveMode,
    pub filename_prefix: String,
    pub filename_suffix: String,
    pub clean_mode: CleanMode,
    pub processed_dir_name: String,
    pub normalize_unicode: bool,
}
impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::Copy,
            filename_prefix: "".into(),
            filename_suffix: "".into(),
            clean_mode: CleanMode::None,
            processed_dir_name: "processed_pdfs".into(),
            normalize_unicode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub dir: String,
    pub filename_stem: String,
    pub write_csv: bool,
    pub write_json: bool,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            dir: ".".into(),
            filename_stem: "pdf_processing_log".into(),
            write_csv: true,
            write_json: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub tick_interval_ms: u64,
}
impl Default for Progress {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionParams {
    pub dpi: u32,
    pub language: String,
}

/// Immutable per-job options. The worker receives its own copy; nothing the
/// control surface does afterwards is visible to a running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub operations: Operations,
    pub recognition: RecognitionParams,
    pub output: OutputOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Config::default().run_config()
    }
}
