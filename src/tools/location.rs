//! Location and weather lookups.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;

const WEATHER_URL: &str = "https://wttr.in";

/// Report the user's current location.
pub struct GetLocation {
    location: String,
}

impl GetLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

#[async_trait]
impl Tool for GetLocation {
    fn name(&self) -> &str {
        "get_location"
    }

    fn description(&self) -> &str {
        "Get the current location of the user"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        Ok(self.location.clone())
    }
}

/// Fetch a one-line weather summary for a location.
pub struct GetWeather {
    client: reqwest::Client,
}

impl GetWeather {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GetWeather {
    fn default() -> Self {
        Self::new()
    }
}

fn location_arg(args: &Value) -> anyhow::Result<&str> {
    args.get("location")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing 'location' argument"))
}

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the weather at the given location"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City or place name, e.g. 'Vancouver, BC, Canada'"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let location = location_arg(&args)?;
        tracing::info!(location = %location, "fetching weather");

        let url = format!(
            "{}/{}?format=3",
            WEATHER_URL,
            urlencoding::encode(location)
        );
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Weather lookup failed: {} - {}", status, text.trim());
        }
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_location_returns_configured_value() {
        let tool = GetLocation::new("Vancouver, BC, Canada");
        let out = tool.execute(Value::Null).await.unwrap();
        assert_eq!(out, "Vancouver, BC, Canada");
    }

    #[test]
    fn test_location_arg() {
        assert_eq!(location_arg(&json!({"location": " Paris "})).unwrap(), "Paris");
        assert!(location_arg(&json!({"location": ""})).is_err());
        assert!(location_arg(&json!({})).is_err());
        assert!(location_arg(&Value::Null).is_err());
    }

    #[tokio::test]
    async fn test_get_weather_requires_location() {
        let err = GetWeather::new().execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("location"));
    }
}
