use serde_json::{Map, Value};
use crate::core::errors::ApiError;

const WEB_PROVIDERS: [&str; 4] = ["duckduckgo", "brave", "bing", "google"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(research) = expect_optional_object(root, "research")? {
        validate_u64_field(
            research,
            "research.max_iterations",
            "max_iterations",
            1,
            20,
        )?;
        validate_u64_field(
            research,
            "research.evaluation_threshold",
            "evaluation_threshold",
            0,
            10,
        )?;
        validate_u64_field(
            research,
            "research.per_call_timeout_secs",
            "per_call_timeout_secs",
            1,
            600,
        )?;
    }

    if let Some(strategy) = expect_optional_object(root, "strategy")? {
        validate_f64_field(
            strategy,
            "strategy.low_relevance_threshold",
            "low_relevance_threshold",
            0.0,
            1.0,
        )?;
        validate_u64_field(
            strategy,
            "strategy.plateau_window",
            "plateau_window",
            1,
            20,
        )?;
        validate_u64_field(strategy, "strategy.stall_window", "stall_window", 1, 20)?;
        validate_f64_field(
            strategy,
            "strategy.min_improvement",
            "min_improvement",
            0.0,
            1.0,
        )?;
        validate_bool_field(strategy, "strategy.llm_rewrite", "llm_rewrite")?;
    }

    if let Some(evaluator) = expect_optional_object(root, "evaluator")? {
        validate_u64_field(
            evaluator,
            "evaluator.max_documents",
            "max_documents",
            1,
            100,
        )?;
        validate_u64_field(
            evaluator,
            "evaluator.max_document_chars",
            "max_document_chars",
            50,
            100_000,
        )?;
    }

    if let Some(synthesizer) = expect_optional_object(root, "synthesizer")? {
        validate_u64_field(
            synthesizer,
            "synthesizer.max_context_chars",
            "max_context_chars",
            100,
            1_000_000,
        )?;
        validate_bool_field(
            synthesizer,
            "synthesizer.include_citations",
            "include_citations",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
    }

    if let Some(local) = expect_optional_object(root, "local")? {
        validate_optional_string_field(local, "local.corpus_dir", "corpus_dir")?;
        validate_u64_field(local, "local.chunk_size", "chunk_size", 50, 100_000)?;
        validate_u64_field(local, "local.chunk_overlap", "chunk_overlap", 0, 50_000)?;
        validate_u64_field(
            local,
            "local.max_chunks_per_document",
            "max_chunks_per_document",
            1,
            100_000,
        )?;
        validate_u64_field(local, "local.max_results", "max_results", 1, 100)?;
        validate_f64_field(local, "local.min_score", "min_score", 0.0, 1.0)?;
    }

    if let Some(web) = expect_optional_object(root, "web")? {
        validate_bool_field(web, "web.enabled", "enabled")?;
        validate_u64_field(web, "web.max_results", "max_results", 1, 50)?;
        if let Some(provider) = web.get("provider") {
            let Some(name) = provider.as_str() else {
                return Err(config_type_error("web.provider", "string"));
            };
            if !WEB_PROVIDERS.contains(&name) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'web.provider': must be one of {}",
                    WEB_PROVIDERS.join(", ")
                )));
            }
        }
        for key in [
            "brave_search_api_key",
            "bing_search_api_key",
            "google_search_api_key",
            "google_search_engine_id",
        ] {
            validate_optional_string_field(web, &format!("web.{}", key), key)?;
        }
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_full_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "research": {
                "max_iterations": 3,
                "evaluation_threshold": 7,
                "per_call_timeout_secs": 30
            },
            "strategy": {
                "low_relevance_threshold": 0.5,
                "plateau_window": 2,
                "stall_window": 2,
                "min_improvement": 0.0,
                "llm_rewrite": true
            },
            "evaluator": { "max_documents": 8, "max_document_chars": 1200 },
            "synthesizer": { "max_context_chars": 6000, "include_citations": true },
            "llm": { "base_url": "http://127.0.0.1:8088", "model": "m", "temperature": 0.2 },
            "local": {
                "corpus_dir": "corpus",
                "chunk_size": 800,
                "chunk_overlap": 100,
                "max_chunks_per_document": 500,
                "max_results": 5,
                "min_score": 0.1
            },
            "web": {
                "enabled": true,
                "provider": "brave",
                "max_results": 5,
                "brave_search_api_key": "k"
            },
            "server": { "host": "127.0.0.1", "cors_allowed_origins": ["http://localhost:3000"] }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_non_object_root_and_sections() {
        assert!(validate_config(&json!([])).is_err());
        let err = validate_config(&json!({ "research": 3 })).unwrap_err();
        assert!(err.to_string().contains("'research': expected object"));
    }

    #[test]
    fn rejects_zero_iteration_budget() {
        let err = validate_config(&json!({ "research": { "max_iterations": 0 } })).unwrap_err();
        assert!(err.to_string().contains("research.max_iterations"));
    }

    #[test]
    fn rejects_wrong_types() {
        let err =
            validate_config(&json!({ "strategy": { "llm_rewrite": "yes" } })).unwrap_err();
        assert!(err.to_string().contains("expected boolean"));

        let err = validate_config(&json!({ "local": { "min_score": "high" } })).unwrap_err();
        assert!(err.to_string().contains("expected number"));
    }

    #[test]
    fn rejects_unknown_web_provider() {
        let err = validate_config(&json!({ "web": { "provider": "altavista" } })).unwrap_err();
        assert!(err.to_string().contains("web.provider"));
    }

    #[test]
    fn rejects_blank_cors_origin() {
        let err = validate_config(&json!({ "server": { "cors_allowed_origins": [" "] } }))
            .unwrap_err();
        assert!(err.to_string().contains("server.cors_allowed_origins[0]"));
    }
}
