//! Weather and air-quality summarization.
//!
//! Reads the weather JSON blob produced by the forecast fetcher, picks one
//! hour out of the parallel time series, and formats a fixed-layout text
//! block for the synthesis prompt. No side effects.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Typed lookup failures for the weather summarizer.
///
/// There is no fallback besides "most recent", so a bad hour or location
/// is fatal for the call.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location id '{0}' not found in weather file")]
    LocationNotFound(String),
    #[error("Hour '{0}' not found in the forecast time series")]
    HourNotFound(String),
    #[error("Weather file has no hourly time entries")]
    EmptyTimeSeries,
}

/// Scalar weather and air-quality fields for one timestamp.
///
/// Each metric is optional: a missing series yields `None` rather than
/// failing the whole summary.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub time: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub air_quality_index: Option<f64>,
    pub pm2_5: Option<f64>,
    pub ozone: Option<f64>,
}

impl WeatherSnapshot {
    /// Formats the snapshot into the fixed summary layout used in prompts
    /// and in the final report.
    pub fn format(&self) -> String {
        format!(
            "Weather conditions at {}:\n\
             - Temperature: {} °C\n\
             - Humidity: {}%\n\
             - Wind Speed: {} km/h\n\
             - Precipitation: {} mm\n\
             - Cloud Cover: {}%\n\
             - Air Quality Index (EAQI): {}\n\
             - PM2.5 (Fine particles): {} µg/m³\n\
             - Ozone (O₃): {} µg/m³",
            self.time,
            fmt_metric(self.temperature),
            fmt_metric(self.humidity),
            fmt_metric(self.wind_speed),
            fmt_metric(self.precipitation),
            fmt_metric(self.cloud_cover),
            fmt_metric(self.air_quality_index),
            fmt_metric(self.pm2_5),
            fmt_metric(self.ozone),
        )
    }
}

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "n/a".to_string(),
    }
}

/// Extract one hour's snapshot from the weather file.
///
/// `hour` must match an entry of `forecast.hourly.time` exactly; `None`
/// selects the last available entry.
pub fn load_snapshot(
    weather_path: &Path,
    location_id: &str,
    hour: Option<&str>,
) -> Result<WeatherSnapshot> {
    let content = std::fs::read_to_string(weather_path)
        .with_context(|| format!("Failed to read weather file: {}", weather_path.display()))?;

    let root: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse weather file: {}", weather_path.display()))?;

    let location = root
        .get("weather_infos")
        .and_then(|infos| infos.get(location_id))
        .ok_or_else(|| WeatherError::LocationNotFound(location_id.to_string()))?;

    let forecast = &location["forecast"]["hourly"];
    let air = &location["airquality"]["hourly"];
    // Section name contains a literal dot, it is not a nested path.
    let aqi = &location["airquality.forecast"]["hourly"];

    let times: Vec<&str> = forecast
        .get("time")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if times.is_empty() {
        return Err(WeatherError::EmptyTimeSeries.into());
    }

    let idx = match hour {
        Some(hour) => times
            .iter()
            .position(|t| *t == hour)
            .ok_or_else(|| WeatherError::HourNotFound(hour.to_string()))?,
        None => times.len() - 1,
    };

    Ok(WeatherSnapshot {
        time: times[idx].to_string(),
        temperature: metric_at(forecast, "temperature_2m", idx),
        humidity: metric_at(forecast, "relativehumidity_2m", idx),
        wind_speed: metric_at(forecast, "windspeed_10m", idx),
        precipitation: metric_at(forecast, "precipitation", idx),
        cloud_cover: metric_at(forecast, "cloudcover", idx),
        air_quality_index: metric_at(aqi, "european_aqi", idx),
        pm2_5: metric_at(air, "pm2_5", idx),
        ozone: metric_at(air, "ozone", idx),
    })
}

/// Summarize the weather conditions for one hour as a text block.
pub fn summarize_weather(
    weather_path: &Path,
    location_id: &str,
    hour: Option<&str>,
) -> Result<String> {
    Ok(load_snapshot(weather_path, location_id, hour)?.format())
}

/// Read one value out of a time-aligned metric array, if present.
fn metric_at(section: &Value, key: &str, idx: usize) -> Option<f64> {
    section
        .get(key)
        .and_then(Value::as_array)
        .and_then(|values| values.get(idx))
        .and_then(Value::as_f64)
}
