use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// Rendering used for every local civil timestamp in a snapshot.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// OpenWeather "current weather" document, reduced to the fields the snapshot needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawObservation {
    pub name: String,
    pub weather: Vec<ObservedCondition>,
    pub main: ObservedMain,
    pub wind: ObservedWind,
    pub dt: i64,
    pub timezone: i64,
    pub sys: ObservedSun,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedCondition {
    pub description: String,
}

/// Temperatures are in kelvin.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: i64,
    pub humidity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedWind {
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedSun {
    pub sunrise: i64,
    pub sunset: i64,
}

/// One flat row of the uploaded CSV. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Temperature (F)")]
    pub temperature_f: f64,
    #[serde(rename = "Feels Like (F)")]
    pub feels_like_f: f64,
    #[serde(rename = "Minimum Temp (F)")]
    pub min_temp_f: f64,
    #[serde(rename = "Maximum Temp (F)")]
    pub max_temp_f: f64,
    #[serde(rename = "Pressure")]
    pub pressure: i64,
    #[serde(rename = "Humidity")]
    pub humidity: i64,
    #[serde(rename = "Wind Speed")]
    pub wind_speed: f64,
    #[serde(rename = "Time of Record", serialize_with = "serialize_local_time")]
    pub time_of_record: NaiveDateTime,
    #[serde(rename = "Sunrise (Local Time)", serialize_with = "serialize_local_time")]
    pub sunrise: NaiveDateTime,
    #[serde(rename = "Sunset (Local Time)", serialize_with = "serialize_local_time")]
    pub sunset: NaiveDateTime,
}

fn serialize_local_time<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&value.format(LOCAL_TIME_FORMAT))
}
