//! Turns one raw OpenWeather document into a flat snapshot record.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    convert::kelvin_to_fahrenheit,
    error::EtlError,
    model::{RawObservation, SnapshotRecord},
};

/// Decode and flatten an observation. Pure: no I/O happens here.
pub fn transform(document: &Value) -> Result<SnapshotRecord, EtlError> {
    let observation = RawObservation::from_document(document)?;
    flatten(&observation)
}

impl RawObservation {
    pub fn from_document(document: &Value) -> Result<Self, EtlError> {
        RawObservation::deserialize(document).map_err(|e| EtlError::malformed(e.to_string()))
    }
}

fn flatten(obs: &RawObservation) -> Result<SnapshotRecord, EtlError> {
    let description = obs
        .weather
        .first()
        .map(|w| w.description.clone())
        .ok_or_else(|| EtlError::malformed("`weather` list is empty"))?;

    Ok(SnapshotRecord {
        city: obs.name.clone(),
        description,
        temperature_f: kelvin_to_fahrenheit(obs.main.temp),
        feels_like_f: kelvin_to_fahrenheit(obs.main.feels_like),
        min_temp_f: kelvin_to_fahrenheit(obs.main.temp_min),
        max_temp_f: kelvin_to_fahrenheit(obs.main.temp_max),
        pressure: obs.main.pressure,
        humidity: obs.main.humidity,
        wind_speed: obs.wind.speed,
        time_of_record: local_civil_time(obs.dt, obs.timezone, "dt")?,
        sunrise: local_civil_time(obs.sys.sunrise, obs.timezone, "sys.sunrise")?,
        sunset: local_civil_time(obs.sys.sunset, obs.timezone, "sys.sunset")?,
    })
}

/// Shift an epoch by a UTC offset and drop the zone. The host timezone is never consulted.
pub fn local_civil_time(
    epoch: i64,
    utc_offset: i64,
    field: &str,
) -> Result<NaiveDateTime, EtlError> {
    epoch
        .checked_add(utc_offset)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            EtlError::malformed(format!(
                "`{field}` {epoch} with offset {utc_offset} is out of range"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn pune() -> Value {
        json!({
            "name": "Pune",
            "weather": [{"description": "clear sky"}],
            "main": {
                "temp": 300.0,
                "feels_like": 301.0,
                "temp_min": 298.0,
                "temp_max": 302.0,
                "pressure": 1010,
                "humidity": 40
            },
            "wind": {"speed": 3.1},
            "dt": 1700000000,
            "timezone": 19800,
            "sys": {"sunrise": 1699970000, "sunset": 1700010000}
        })
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .unwrap()
    }

    #[test]
    fn transforms_pune_observation() {
        let record = transform(&pune()).unwrap();

        assert_eq!(record.city, "Pune");
        assert_eq!(record.description, "clear sky");
        assert!((record.temperature_f - 80.33).abs() < 1e-9);
        assert_eq!(record.pressure, 1010);
        assert_eq!(record.humidity, 40);
        assert_eq!(record.wind_speed, 3.1);
        assert_eq!(record.time_of_record, at(2023, 11, 15, 3, 43, 20));
        assert_eq!(record.sunrise, at(2023, 11, 14, 19, 23, 20));
        assert_eq!(record.sunset, at(2023, 11, 15, 6, 30, 0));
    }

    #[test]
    fn converts_all_four_temperatures() {
        let record = transform(&pune()).unwrap();

        assert_eq!(record.temperature_f, kelvin_to_fahrenheit(300.0));
        assert_eq!(record.feels_like_f, kelvin_to_fahrenheit(301.0));
        assert_eq!(record.min_temp_f, kelvin_to_fahrenheit(298.0));
        assert_eq!(record.max_temp_f, kelvin_to_fahrenheit(302.0));
    }

    #[test]
    fn local_time_is_epoch_plus_offset_as_utc() {
        let local = local_civil_time(1700000000, 19800, "dt").unwrap();
        let expected = DateTime::from_timestamp(1700019800, 0).unwrap().naive_utc();
        assert_eq!(local, expected);
    }

    #[test]
    fn negative_offset_moves_time_backwards() {
        let local = local_civil_time(1700000000, -18000, "dt").unwrap();
        assert_eq!(local, at(2023, 11, 14, 17, 13, 20));
    }

    #[test]
    fn missing_weather_list_is_malformed() {
        let mut doc = pune();
        doc.as_object_mut().unwrap().remove("weather");

        let err = transform(&doc).unwrap_err();
        assert!(matches!(err, EtlError::MalformedInput(_)));
        assert!(err.to_string().contains("weather"));
    }

    #[test]
    fn empty_weather_list_is_malformed() {
        let mut doc = pune();
        doc["weather"] = json!([]);

        let err = transform(&doc).unwrap_err();
        assert!(matches!(err, EtlError::MalformedInput(_)));
    }

    #[test]
    fn missing_nested_field_is_malformed() {
        let mut doc = pune();
        doc["sys"].as_object_mut().unwrap().remove("sunset");

        let err = transform(&doc).unwrap_err();
        assert!(err.to_string().contains("sunset"));
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let mut doc = pune();
        doc["dt"] = json!(i64::MAX);

        let err = transform(&doc).unwrap_err();
        assert!(matches!(err, EtlError::MalformedInput(_)));
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut doc = pune();
        doc["visibility"] = json!(10000);
        doc["coord"] = json!({"lon": 73.85, "lat": 18.52});

        assert!(transform(&doc).is_ok());
    }
}
