use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Raw daily series includes today; the "current" card already covers it,
/// so the projection drops index 0 and exposes the remaining days.
const FORECAST_DAYS: u32 = 4;

// ── Model ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherData {
    pub current: CurrentWeather,
    pub forecast: Vec<DayForecast>,
    pub location_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub weather_code: u32,
    pub condition_text: &'static str,
    pub condition_icon: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub day_name: String,
    pub high: f64,
    pub low: f64,
    pub weather_code: u32,
    pub condition_icon: &'static str,
}

/// WMO weather interpretation codes → human-readable text + glyph.
pub fn condition(code: u32) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear Sky", "☀"),
        1 => ("Mainly Clear", "🌤"),
        2 => ("Partly Cloudy", "⛅"),
        3 => ("Overcast", "☁"),
        45 | 48 => ("Fog", "🌫"),
        51 | 53 | 55 => ("Drizzle", "🌦"),
        56 | 57 => ("Freezing Drizzle", "🌧"),
        61 | 63 | 65 => ("Rain", "🌧"),
        66 | 67 => ("Freezing Rain", "🌧"),
        71 | 73 | 75 => ("Snow", "🌨"),
        77 => ("Snow Grains", "🌨"),
        80 | 81 | 82 => ("Showers", "🌧"),
        85 | 86 => ("Snow Showers", "🌨"),
        95 => ("Thunderstorm", "⛈"),
        96 | 99 => ("Thunderstorm + Hail", "⛈"),
        _ => ("Unknown", "?"),
    }
}

// ── API response shapes ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentResponse,
    daily: DailyResponse,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(rename = "temperature_2m")]
    temperature: f64,
    #[serde(rename = "weathercode")]
    weather_code: u32,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    time: Vec<String>,
    #[serde(rename = "temperature_2m_max")]
    temperature_max: Vec<f64>,
    #[serde(rename = "temperature_2m_min")]
    temperature_min: Vec<f64>,
    #[serde(rename = "weathercode")]
    weather_code: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    results: Option<Vec<GeoResult>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeoResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Open-Meteo client (free, no API key). Both calls are single round trips;
/// transport and decode failures come back as `Err`, never panics, and
/// there is no retry — callers keep their last-known-good value.
pub struct WeatherClient {
    http: reqwest::blocking::Client,
}

impl WeatherClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http })
    }

    /// Current conditions plus the upcoming-day forecast for the given
    /// coordinates.
    pub fn fetch_weather(&self, lat: f64, lon: f64, use_celsius: bool) -> Result<WeatherData> {
        let unit = if use_celsius { "celsius" } else { "fahrenheit" };
        let response: ForecastResponse = self
            .http
            .get(FORECAST_URL)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "temperature_2m,weathercode".to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,weathercode".to_string(),
                ),
                ("forecast_days", FORECAST_DAYS.to_string()),
                ("timezone", "auto".to_string()),
                ("temperature_unit", unit.to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        project_forecast(response)
    }

    /// Resolve a free-text place name or postcode to coordinates.
    pub fn geocode(&self, query: &str) -> Result<GeoResult> {
        let response: GeoResponse = self
            .http
            .get(GEOCODE_URL)
            .query(&[("name", query), ("count", "1"), ("language", "en")])
            .send()?
            .error_for_status()?
            .json()?;
        response
            .results
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| anyhow!("location not found: {query}"))
    }
}

/// Shape the raw response into the display model. Index 0 of the daily
/// series duplicates the "current" card and is dropped.
fn project_forecast(response: ForecastResponse) -> Result<WeatherData> {
    let (condition_text, condition_icon) = condition(response.current.weather_code);
    let daily = &response.daily;
    if daily.temperature_max.len() < daily.time.len()
        || daily.temperature_min.len() < daily.time.len()
        || daily.weather_code.len() < daily.time.len()
    {
        return Err(anyhow!("daily series lengths disagree"));
    }

    let forecast = daily
        .time
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, date)| {
            let code = daily.weather_code[i];
            DayForecast {
                day_name: day_name(date),
                high: daily.temperature_max[i],
                low: daily.temperature_min[i],
                weather_code: code,
                condition_icon: condition(code).1,
            }
        })
        .collect();

    Ok(WeatherData {
        current: CurrentWeather {
            temperature: response.current.temperature,
            weather_code: response.current.weather_code,
            condition_text,
            condition_icon,
        },
        forecast,
        location_name: String::new(),
    })
}

/// "2026-08-24" → "Mon"; unparseable dates fall back to the raw string.
fn day_name(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%a").to_string())
        .unwrap_or_else(|_| date.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_response(days: usize) -> ForecastResponse {
        ForecastResponse {
            current: CurrentResponse {
                temperature: 18.5,
                weather_code: 2,
            },
            daily: DailyResponse {
                time: (0..days).map(|i| format!("2026-08-{:02}", 24 + i)).collect(),
                temperature_max: vec![20.0; days],
                temperature_min: vec![11.0; days],
                weather_code: vec![61; days],
            },
        }
    }

    #[test]
    fn projection_drops_today() {
        let data = project_forecast(raw_response(4)).unwrap();
        assert_eq!(data.forecast.len(), 3);
        // 2026-08-25 is a Tuesday.
        assert_eq!(data.forecast[0].day_name, "Tue");
    }

    #[test]
    fn current_card_maps_condition_code() {
        let data = project_forecast(raw_response(2)).unwrap();
        assert_eq!(data.current.condition_text, "Partly Cloudy");
        assert_eq!(data.forecast[0].condition_icon, condition(61).1);
    }

    #[test]
    fn mismatched_series_is_an_error() {
        let mut bad = raw_response(4);
        bad.daily.temperature_min.truncate(2);
        assert!(project_forecast(bad).is_err());
    }

    #[test]
    fn unknown_code_has_fallback_text() {
        assert_eq!(condition(1234).0, "Unknown");
    }

    #[test]
    fn unparseable_day_falls_back_to_raw_string() {
        assert_eq!(day_name("not-a-date"), "not-a-date");
    }

    #[test]
    fn client_construction_reports_errors_instead_of_panicking() {
        assert!(WeatherClient::new().is_ok());
    }
}
