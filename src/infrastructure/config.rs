use crate::domain::models::DEFAULT_QUOTES;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let value = serde_json::json!({
            "schema": 1,
            "appName": "Ritmo",
            "defaultQuotes": DEFAULT_QUOTES,
        });
        let formatted = serde_json::to_string_pretty(&value)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            InfraError::InvalidInput(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(InfraError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_app_name(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("appName")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("Ritmo");
    Ok(name.to_string())
}

/// Quote list seeded into new profiles; the built-in set when the config
/// carries none.
pub fn read_default_quotes(config_dir: &Path) -> Result<Vec<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let quotes = app
        .get("defaultQuotes")
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if quotes.is_empty() {
        return Ok(DEFAULT_QUOTES.iter().map(|quote| quote.to_string()).collect());
    }
    Ok(quotes)
}
