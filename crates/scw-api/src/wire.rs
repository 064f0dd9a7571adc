//! Wire encodings shared by the API types

/// `Option<Duration>` as a seconds string (`"1.5s"`)
pub mod duration_opt {
    use scw_core::duration::parse_duration;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&format!("{}s", d.as_secs_f64())),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => parse_duration(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        #[serde(default, with = "super::duration_opt")]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_duration_wire() {
        let p = Probe {
            timeout: Some(Duration::from_millis(1500)),
        };
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"timeout":"1.5s"}"#);
        let back: Probe = serde_json::from_str(r#"{"timeout":"1.5s"}"#).unwrap();
        assert_eq!(back, p);
        let none: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(none.timeout, None);
    }
}
