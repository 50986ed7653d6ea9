//! Typed view over the merged YAML config.
//!
//! Every value has a default so an empty config yields a working setup.
//! Values are clamped into the ranges `validate_config` enforces, which keeps
//! settings sane when they are built from a config that skipped validation.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MAX_ITERATIONS: usize = 3;
pub const DEFAULT_EVALUATION_THRESHOLD: u8 = 7;
pub const DEFAULT_PER_CALL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct ResearchSettings {
    pub max_iterations: usize,
    pub evaluation_threshold: u8,
    pub per_call_timeout_secs: u64,
    pub strategy: StrategySettings,
    pub evaluator: EvaluatorSettings,
    pub synthesizer: SynthesizerSettings,
    pub llm: LlmSettings,
    pub local: LocalSettings,
    pub web: WebSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategySettings {
    /// Best relevance below this marks an iteration as unproductive.
    pub low_relevance_threshold: f32,
    pub plateau_window: usize,
    pub stall_window: usize,
    pub min_improvement: f32,
    pub llm_rewrite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatorSettings {
    pub max_documents: usize,
    pub max_document_chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesizerSettings {
    pub max_context_chars: usize,
    pub include_citations: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalSettings {
    pub corpus_dir: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks_per_document: usize,
    pub max_results: usize,
    pub min_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSettings {
    pub enabled: bool,
    pub provider: String,
    pub max_results: usize,
    #[serde(skip_serializing)]
    pub brave_search_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub bing_search_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub google_search_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub google_search_engine_id: Option<String>,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self::from_config(&Value::Null)
    }
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self::from_section(None)
    }
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self::from_section(None)
    }
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self::from_section(None)
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self::from_section(None)
    }
}

impl ResearchSettings {
    pub fn from_config(config: &Value) -> Self {
        let research = config.get("research");

        let max_iterations = get_u64(research, "max_iterations")
            .unwrap_or(DEFAULT_MAX_ITERATIONS as u64)
            .clamp(1, 20) as usize;
        let evaluation_threshold = get_u64(research, "evaluation_threshold")
            .unwrap_or(DEFAULT_EVALUATION_THRESHOLD as u64)
            .min(10) as u8;
        let per_call_timeout_secs = get_u64(research, "per_call_timeout_secs")
            .unwrap_or(DEFAULT_PER_CALL_TIMEOUT_SECS)
            .clamp(1, 600);

        Self {
            max_iterations,
            evaluation_threshold,
            per_call_timeout_secs,
            strategy: StrategySettings::from_section(config.get("strategy")),
            evaluator: EvaluatorSettings::from_section(config.get("evaluator")),
            synthesizer: SynthesizerSettings::from_section(config.get("synthesizer")),
            llm: LlmSettings::from_section(config.get("llm")),
            local: LocalSettings::from_section(config.get("local")),
            web: WebSettings::from_section(config.get("web")),
        }
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }
}

impl StrategySettings {
    fn from_section(section: Option<&Value>) -> Self {
        Self {
            low_relevance_threshold: get_f64(section, "low_relevance_threshold")
                .unwrap_or(0.5)
                .clamp(0.0, 1.0) as f32,
            plateau_window: get_u64(section, "plateau_window").unwrap_or(2).clamp(1, 20) as usize,
            stall_window: get_u64(section, "stall_window").unwrap_or(2).clamp(1, 20) as usize,
            min_improvement: get_f64(section, "min_improvement")
                .unwrap_or(0.0)
                .clamp(0.0, 1.0) as f32,
            llm_rewrite: get_bool(section, "llm_rewrite").unwrap_or(false),
        }
    }
}

impl EvaluatorSettings {
    fn from_section(section: Option<&Value>) -> Self {
        Self {
            max_documents: get_u64(section, "max_documents").unwrap_or(8).clamp(1, 100) as usize,
            max_document_chars: get_u64(section, "max_document_chars")
                .unwrap_or(1200)
                .clamp(50, 100_000) as usize,
        }
    }
}

impl SynthesizerSettings {
    fn from_section(section: Option<&Value>) -> Self {
        Self {
            max_context_chars: get_u64(section, "max_context_chars")
                .unwrap_or(6000)
                .clamp(100, 1_000_000) as usize,
            include_citations: get_bool(section, "include_citations").unwrap_or(true),
        }
    }
}

impl LlmSettings {
    fn from_section(section: Option<&Value>) -> Self {
        Self {
            base_url: get_string(section, "base_url")
                .unwrap_or_else(|| "http://127.0.0.1:8088".to_string()),
            model: get_string(section, "model").unwrap_or_else(|| "default".to_string()),
            api_key: get_string(section, "api_key"),
            temperature: get_f64(section, "temperature").unwrap_or(0.0).clamp(0.0, 2.0),
        }
    }
}

impl LocalSettings {
    fn from_section(section: Option<&Value>) -> Self {
        let chunk_size = get_u64(section, "chunk_size").unwrap_or(800).clamp(50, 100_000) as usize;
        Self {
            corpus_dir: get_string(section, "corpus_dir").unwrap_or_else(|| "corpus".to_string()),
            chunk_size,
            // overlap must leave a positive stride
            chunk_overlap: (get_u64(section, "chunk_overlap").unwrap_or(100) as usize)
                .min(chunk_size / 2),
            max_chunks_per_document: get_u64(section, "max_chunks_per_document")
                .unwrap_or(500)
                .clamp(1, 100_000) as usize,
            max_results: get_u64(section, "max_results").unwrap_or(5).clamp(1, 100) as usize,
            min_score: get_f64(section, "min_score").unwrap_or(0.1).clamp(0.0, 1.0) as f32,
        }
    }
}

impl WebSettings {
    fn from_section(section: Option<&Value>) -> Self {
        Self {
            enabled: get_bool(section, "enabled").unwrap_or(true),
            provider: get_string(section, "provider").unwrap_or_else(|| "duckduckgo".to_string()),
            max_results: get_u64(section, "max_results").unwrap_or(5).clamp(1, 50) as usize,
            brave_search_api_key: get_string(section, "brave_search_api_key"),
            bing_search_api_key: get_string(section, "bing_search_api_key"),
            google_search_api_key: get_string(section, "google_search_api_key"),
            google_search_engine_id: get_string(section, "google_search_engine_id"),
        }
    }
}

fn get_u64(section: Option<&Value>, key: &str) -> Option<u64> {
    section.and_then(|v| v.get(key)).and_then(|v| v.as_u64())
}

fn get_f64(section: Option<&Value>, key: &str) -> Option<f64> {
    section.and_then(|v| v.get(key)).and_then(|v| v.as_f64())
}

fn get_bool(section: Option<&Value>, key: &str) -> Option<bool> {
    section.and_then(|v| v.get(key)).and_then(|v| v.as_bool())
}

/// Non-blank trimmed string value.
fn get_string(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
