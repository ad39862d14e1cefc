//! Serde helpers that keep report JSON parseable when a metric is
//! non-finite. `serde_json` would emit `null` for NaN and infinities;
//! downstream consumers expect the textual form instead.

use serde::Serializer;

pub fn float<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if *value > 0.0 {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_str("-Infinity")
    }
}

pub fn float_opt<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) => float(v, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    #[derive(Serialize)]
    struct Probe {
        #[serde(serialize_with = "super::float")]
        value: f64,
    }

    fn encode(value: f64) -> String {
        serde_json::to_string(&Probe { value }).unwrap()
    }

    #[test]
    fn test_finite_floats_stay_numeric() {
        assert_eq!(encode(2.5), r#"{"value":2.5}"#);
        assert_eq!(encode(-8.0), r#"{"value":-8.0}"#);
    }

    #[test]
    fn test_non_finite_floats_become_text() {
        assert_eq!(encode(f64::INFINITY), r#"{"value":"Infinity"}"#);
        assert_eq!(encode(f64::NEG_INFINITY), r#"{"value":"-Infinity"}"#);
        assert_eq!(encode(f64::NAN), r#"{"value":"NaN"}"#);
    }

    #[test]
    fn test_encoded_report_remains_parseable() {
        let text = encode(f64::INFINITY);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["value"], "Infinity");
    }
}
