//! Timestamps as the API sends them:
//! RFC 3339 or a bare `YYYY-MM-DD`
//! (read as UTC midnight). Always written
//! back as RFC 3339.

use chrono::{
  DateTime,
  NaiveDate,
  SecondsFormat,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serializer
};

pub fn parse(
  raw: &str
) -> Result<DateTime<Utc>, String> {
  let trimmed = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .ok()
  .and_then(|date| {
    date.and_hms_opt(0, 0, 0)
  })
  .map(|ndt| ndt.and_utc())
  .ok_or_else(|| {
    format!("invalid timestamp: {raw}")
  })
}

#[must_use]
pub fn format(
  dt: &DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

pub fn serialize<S>(
  dt: &DateTime<Utc>,
  serializer: S
) -> Result<S::Ok, S::Error>
where
  S: Serializer
{
  serializer.serialize_str(&format(dt))
}

pub fn deserialize<'de, D>(
  deserializer: D
) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>
{
  let raw =
    String::deserialize(deserializer)?;
  parse(&raw)
    .map_err(serde::de::Error::custom)
}

pub mod option {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &Option<DateTime<Utc>>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match dt {
      | Some(value) => {
        super::serialize(
          value, serializer
        )
      }
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<
    Option<DateTime<Utc>>,
    D::Error
  >
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    match opt {
      | Some(raw)
        if raw.trim().is_empty() =>
      {
        Ok(None)
      }
      | Some(raw) => super::parse(&raw)
        .map(Some)
        .map_err(
          serde::de::Error::custom
        ),
      | None => Ok(None)
    }
  }
}
