//! serde field adapters for the textual formats used in GTFS tables.

/// `HH:MM:SS` service-day times, where `HH` may exceed 23 for trips
/// continuing past midnight
pub mod time_format {
    use journey_search::time::Time;
    use serde::de::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Time, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map_err(de::Error::custom)
    }
}

/// `YYYYMMDD` calendar dates
pub mod date_format {
    use chrono::NaiveDate;
    use serde::de::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(text.trim(), "%Y%m%d").map_err(de::Error::custom)
    }
}
