pub mod export;
pub mod resolve;
pub mod run;
pub mod supports;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "text" => Ok(Self::Text),
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown format '{other}', expected 'text', 'yaml', or 'json'"
            )),
        }
    }
}

/// Render a serializable report as YAML or JSON.
///
/// Text rendering is command specific and never reaches here.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => Err("text output has no structured form".into()),
    }
}
