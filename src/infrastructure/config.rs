// Configuration - TOML file layered with FLARES__* environment overrides
use crate::domain::archive::{MonthRange, YearMonth};
use crate::domain::integration::{BackgroundMethod, IntegrationMode, IntegrationRule};
use crate::infrastructure::http_archive::RetryPolicy;
use anyhow::{Context, anyhow, bail};
use chrono_tz::Tz;
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/flares.toml";
pub const ENV_PREFIX: &str = "FLARES";

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// IANA zone the catalog times are written in. Deliberately no default.
    pub timezone: String,
    pub catalog: CatalogSettings,
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub variables: VariableLayout,
    #[serde(default)]
    pub integration: IntegrationSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSettings {
    pub path: PathBuf,
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    #[serde(default)]
    pub date_column: usize,
    #[serde(default = "default_start_column")]
    pub start_column: usize,
    #[serde(default = "default_end_column")]
    pub end_column: usize,
    /// `None` means the last field on the line.
    #[serde(default)]
    pub class_column: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub start_month: String,
    pub end_month: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ArchiveSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Names of the variables read from each data file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct VariableLayout {
    #[serde(default = "default_time_variable")]
    pub time: String,
    #[serde(default = "default_flag_variable")]
    pub flag: String,
    #[serde(default = "default_data_variable")]
    pub data: String,
    #[serde(default)]
    pub channel_a: usize,
    #[serde(default = "default_channel_c")]
    pub channel_c: usize,
    /// Spacecraft-Sun distance, copied into converted tables when set.
    #[serde(default)]
    pub sun_distance: Option<String>,
}

impl Default for VariableLayout {
    fn default() -> Self {
        Self {
            time: default_time_variable(),
            flag: default_flag_variable(),
            data: default_data_variable(),
            channel_a: 0,
            channel_c: default_channel_c(),
            sun_distance: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntegrationSettings {
    #[serde(default = "default_background")]
    pub background: BackgroundMethod,
    #[serde(default = "default_rules")]
    pub rules: Vec<IntegrationRule>,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            background: default_background(),
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default)]
    pub plot_dir: Option<PathBuf>,
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            plot_dir: None,
            summary_path: None,
            concurrency: default_concurrency(),
        }
    }
}

fn default_header_lines() -> usize {
    12
}

fn default_classes() -> Vec<String> {
    vec!["M".to_string(), "X".to_string()]
}

fn default_start_column() -> usize {
    1
}

fn default_end_column() -> usize {
    3
}

fn default_base_url() -> String {
    "https://lasp.colorado.edu/maven/sdc/public/data/sci/euv/l2/".to_string()
}

fn default_extension() -> String {
    ".cdf".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_time_variable() -> String {
    "time_unix".to_string()
}

fn default_flag_variable() -> String {
    "flag".to_string()
}

fn default_data_variable() -> String {
    "data".to_string()
}

fn default_channel_c() -> usize {
    2
}

fn default_background() -> BackgroundMethod {
    BackgroundMethod::LinearEndpoints
}

fn default_rules() -> Vec<IntegrationRule> {
    vec![IntegrationRule::Trapezoid, IntegrationRule::Simpson]
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("energy_analysis_results.csv")
}

fn default_concurrency() -> usize {
    1
}

/// Configuration after startup validation.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub timezone: Tz,
    pub months: MonthRange,
    pub base_url: Url,
    pub mode: IntegrationMode,
    pub config: PipelineConfig,
}

impl PipelineConfig {
    /// Checks everything that would make the whole run pointless.
    pub fn resolve(self) -> anyhow::Result<PipelineSettings> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("unknown time zone '{}': {}", self.timezone, e))?;

        let start: YearMonth = self
            .archive
            .start_month
            .parse()
            .map_err(|e: String| anyhow!("archive.start_month: {}", e))?;
        let end: YearMonth = self
            .archive
            .end_month
            .parse()
            .map_err(|e: String| anyhow!("archive.end_month: {}", e))?;
        let months = MonthRange::new(start, end)
            .ok_or_else(|| anyhow!("archive.start_month {} is after end_month {}", start, end))?;

        let mut base = self.archive.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).with_context(|| format!("archive.base_url '{}'", base))?;

        if self.archive.extension.is_empty() {
            bail!("archive.extension must not be empty");
        }
        if self.integration.rules.is_empty() {
            bail!("integration.rules must name at least one rule");
        }
        if self.output.concurrency == 0 {
            bail!("output.concurrency must be at least 1");
        }
        if self.catalog.classes.is_empty() {
            bail!("catalog.classes must name at least one flare class");
        }
        if !self.catalog.path.is_file() {
            bail!("catalog file '{}' not found", self.catalog.path.display());
        }

        let mut rules = Vec::new();
        for rule in &self.integration.rules {
            if !rules.contains(rule) {
                rules.push(*rule);
            }
        }
        let mode = IntegrationMode {
            background: self.integration.background,
            rules,
        };

        Ok(PipelineSettings {
            timezone,
            months,
            base_url,
            mode,
            config: self,
        })
    }
}

pub fn load_pipeline_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("loading configuration from '{}'", path.display()))?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(toml: &str) -> PipelineConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn minimal(catalog: &Path) -> String {
        format!(
            r#"
timezone = "UTC"

[catalog]
path = "{}"

[archive]
start_month = "2023-01"
end_month = "2023-11"
"#,
            catalog.display()
        )
    }

    fn catalog_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let catalog = catalog_file();
        let config = parse(&minimal(catalog.path()));
        assert_eq!(config.catalog.header_lines, 12);
        assert_eq!(config.catalog.classes, vec!["M", "X"]);
        assert_eq!(
            (config.catalog.date_column, config.catalog.start_column, config.catalog.end_column),
            (0, 1, 3)
        );
        assert_eq!(config.catalog.class_column, None);
        assert_eq!(config.variables, VariableLayout::default());
        assert_eq!(config.output.concurrency, 1);

        let settings = config.resolve().unwrap();
        assert_eq!(settings.timezone, chrono_tz::UTC);
        assert_eq!(settings.months.months().count(), 11);
        assert_eq!(settings.mode, IntegrationMode::default());
    }

    #[test]
    fn test_timezone_is_required() {
        let catalog = catalog_file();
        let toml = minimal(catalog.path()).replace("timezone = \"UTC\"", "");
        let result = config::Config::builder()
            .add_source(config::File::from_str(&toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<PipelineConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let catalog = catalog_file();
        let toml = minimal(catalog.path()).replace("\"UTC\"", "\"Mars/Olympus_Mons\"");
        assert!(parse(&toml).resolve().is_err());
    }

    #[test]
    fn test_rejects_reversed_month_range() {
        let catalog = catalog_file();
        let toml = minimal(catalog.path()).replace("2023-11", "2022-11");
        let err = parse(&toml).resolve().unwrap_err();
        assert!(err.to_string().contains("after end_month"));
    }

    #[test]
    fn test_rejects_missing_catalog() {
        let toml = minimal(Path::new("/definitely/not/here.txt"));
        let err = parse(&toml).resolve().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_integration_modes() {
        let catalog = catalog_file();
        let toml = format!(
            "{}\n[integration]\nbackground = \"none\"\nrules = [\"simpson\", \"simpson\"]\n",
            minimal(catalog.path())
        );
        let settings = parse(&toml).resolve().unwrap();
        assert_eq!(settings.mode.background, BackgroundMethod::None);
        assert_eq!(settings.mode.rules, vec![IntegrationRule::Simpson]);

        let empty = format!("{}\n[integration]\nrules = []\n", minimal(catalog.path()));
        assert!(parse(&empty).resolve().is_err());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let catalog = catalog_file();
        let toml = minimal(catalog.path()).replace(
            "[archive]",
            "[archive]\nbase_url = \"https://example.org/l2\"",
        );
        let settings = parse(&toml).resolve().unwrap();
        assert_eq!(settings.base_url.as_str(), "https://example.org/l2/");
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let catalog = catalog_file();
        let config = parse(&minimal(catalog.path()));
        let policy = config.archive.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_secs(2));
        assert_eq!(policy.default_retry_after, Duration::from_secs(5));
    }
}
