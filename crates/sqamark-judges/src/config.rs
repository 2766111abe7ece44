//! `sqamark.toml` configuration and the judge factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sqamark_core::engine::MarkingEngineConfig;
use sqamark_core::grading::GradeBandTable;
use sqamark_core::mastery::MasteryThresholds;
use sqamark_core::matching::IllustrativeJudge;
use sqamark_core::traits::BulletJudge;

use crate::anthropic::AnthropicJudge;
use crate::ollama::OllamaJudge;
use crate::openai::OpenAiJudge;

/// Name of the built-in rule-based judge, always available.
pub const RULES_JUDGE: &str = "rules";

/// Key of the grade band table used when an exam's level has none of its own.
pub const DEFAULT_BANDS: &str = "default";

/// Configuration for a single judge.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JudgeConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default)]
        model: Option<String>,
    },
    Rules,
}

impl JudgeConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeConfig::OpenAI { .. } => "openai",
            JudgeConfig::Anthropic { .. } => "anthropic",
            JudgeConfig::Ollama { .. } => "ollama",
            JudgeConfig::Rules => "rules",
        }
    }

    /// The model pinned in this judge's table, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            JudgeConfig::OpenAI { model, .. }
            | JudgeConfig::Anthropic { model, .. }
            | JudgeConfig::Ollama { model, .. } => model.as_deref(),
            JudgeConfig::Rules => None,
        }
    }
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JudgeConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .field("model", model)
                .finish(),
            JudgeConfig::Anthropic {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            JudgeConfig::Ollama { base_url, model } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            JudgeConfig::Rules => f.write_str("Rules"),
        }
    }
}

fn default_ollama_url() -> String {
    crate::ollama::DEFAULT_BASE_URL.to_string()
}

/// Top-level sqamark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqamarkConfig {
    /// Judge configurations keyed by name.
    #[serde(default)]
    pub judges: BTreeMap<String, JudgeConfig>,
    #[serde(default = "default_judge")]
    pub default_judge: String,
    /// Model used by LLM judges that do not pin one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Upper bound on a single bullet judgment.
    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,
    /// Max concurrent bullet judgments per evaluation.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub full_topic_coverage: bool,
    /// Grade band tables keyed by qualification level, plus `default`.
    #[serde(default = "default_grade_bands")]
    pub grade_bands: BTreeMap<String, GradeBandTable>,
    #[serde(default)]
    pub mastery: MasteryThresholds,
    /// Where `evaluate` writes results when no output path is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_judge() -> String {
    RULES_JUDGE.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_judge_timeout() -> u64 {
    30
}
fn default_parallelism() -> usize {
    4
}
fn default_grade_bands() -> BTreeMap<String, GradeBandTable> {
    BTreeMap::from([(DEFAULT_BANDS.to_string(), GradeBandTable::default())])
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./sqamark-results")
}

impl Default for SqamarkConfig {
    fn default() -> Self {
        Self {
            judges: BTreeMap::new(),
            default_judge: default_judge(),
            default_model: default_model(),
            judge_timeout_secs: default_judge_timeout(),
            parallelism: default_parallelism(),
            full_topic_coverage: false,
            grade_bands: default_grade_bands(),
            mastery: MasteryThresholds::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl SqamarkConfig {
    /// Check every threshold table for ordering and range.
    pub fn validate(&self) -> Result<()> {
        for (level, table) in &self.grade_bands {
            table
                .validate()
                .with_context(|| format!("invalid grade_bands.{level}"))?;
        }
        self.mastery.validate().context("invalid mastery thresholds")?;
        if self.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }
        if self.judge_timeout_secs == 0 {
            anyhow::bail!("judge_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// The grade band table for a qualification level, falling back to `default`.
    pub fn grade_bands_for(&self, level: &str) -> GradeBandTable {
        self.grade_bands
            .get(level)
            .or_else(|| self.grade_bands.get(DEFAULT_BANDS))
            .copied()
            .unwrap_or_default()
    }

    /// Engine configuration for an exam at `level`.
    pub fn engine_config(&self, level: &str) -> MarkingEngineConfig {
        MarkingEngineConfig {
            grade_bands: self.grade_bands_for(level),
            mastery: self.mastery,
            judge_timeout: Duration::from_secs(self.judge_timeout_secs),
            parallelism: self.parallelism,
            full_topic_coverage: self.full_topic_coverage,
        }
    }

    /// Build the named judge (or the default judge), with an optional model override.
    pub fn judge(&self, name: Option<&str>, model: Option<&str>) -> Result<Arc<dyn BulletJudge>> {
        let name = name.unwrap_or(self.default_judge.as_str());
        match self.judges.get(name) {
            Some(config) => {
                let model = model
                    .or_else(|| config.model())
                    .unwrap_or(self.default_model.as_str());
                create_judge(config, model)
            }
            None if name == RULES_JUDGE => Ok(Arc::new(IllustrativeJudge)),
            None => {
                let mut available: Vec<&str> = self.judges.keys().map(String::as_str).collect();
                if !available.contains(&RULES_JUDGE) {
                    available.push(RULES_JUDGE);
                }
                anyhow::bail!(
                    "judge '{name}' not configured (available: {})",
                    available.join(", ")
                )
            }
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result.replace_range(start..start + end + 1, &value);
    }
    result
}

fn resolve_judge_config(config: &JudgeConfig) -> JudgeConfig {
    let resolve = |v: &Option<String>| v.as_deref().map(resolve_env_vars);
    match config {
        JudgeConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            model,
        } => JudgeConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve(base_url),
            org_id: resolve(org_id),
            model: model.clone(),
        },
        JudgeConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => JudgeConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve(base_url),
            model: model.clone(),
        },
        JudgeConfig::Ollama { base_url, model } => JudgeConfig::Ollama {
            base_url: resolve_env_vars(base_url),
            model: model.clone(),
        },
        JudgeConfig::Rules => JudgeConfig::Rules,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `sqamark.toml` in the current directory
/// 2. `~/.config/sqamark/config.toml`
///
/// Environment variable overrides: `SQAMARK_ANTHROPIC_KEY`, `SQAMARK_OPENAI_KEY`.
pub fn load_config() -> Result<SqamarkConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SqamarkConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => [Some(PathBuf::from("sqamark.toml")), global_config_path()]
            .into_iter()
            .flatten()
            .find(|p| p.exists()),
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => SqamarkConfig::default(),
    };

    apply_env_overrides(&mut config);
    config.judges = config
        .judges
        .iter()
        .map(|(k, v)| (k.clone(), resolve_judge_config(v)))
        .collect();

    config.validate()?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<SqamarkConfig> {
    let mut config: SqamarkConfig = toml::from_str(content)?;
    config
        .grade_bands
        .entry(DEFAULT_BANDS.to_string())
        .or_default();
    Ok(config)
}

fn apply_env_overrides(config: &mut SqamarkConfig) {
    if let Ok(key) = std::env::var("SQAMARK_ANTHROPIC_KEY") {
        let entry = config
            .judges
            .entry("anthropic".into())
            .or_insert(JudgeConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
                model: None,
            });
        if let JudgeConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("SQAMARK_OPENAI_KEY") {
        let entry = config.judges.entry("openai".into()).or_insert(JudgeConfig::OpenAI {
            api_key: String::new(),
            base_url: None,
            org_id: None,
            model: None,
        });
        if let JudgeConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("sqamark").join("config.toml"))
}

/// Create a judge instance from its configuration.
pub fn create_judge(config: &JudgeConfig, model: &str) -> Result<Arc<dyn BulletJudge>> {
    match config {
        JudgeConfig::Anthropic {
            api_key, base_url, ..
        } => {
            if api_key.is_empty() {
                anyhow::bail!("anthropic judge has no API key (set SQAMARK_ANTHROPIC_KEY)");
            }
            Ok(Arc::new(AnthropicJudge::new(api_key, base_url.clone(), model)))
        }
        JudgeConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            ..
        } => {
            if api_key.is_empty() {
                anyhow::bail!("openai judge has no API key (set SQAMARK_OPENAI_KEY)");
            }
            Ok(Arc::new(OpenAiJudge::new(
                api_key,
                base_url.clone(),
                org_id.clone(),
                model,
            )))
        }
        JudgeConfig::Ollama { base_url, .. } => Ok(Arc::new(OllamaJudge::new(base_url, model))),
        JudgeConfig::Rules => Ok(Arc::new(IllustrativeJudge)),
    }
}
