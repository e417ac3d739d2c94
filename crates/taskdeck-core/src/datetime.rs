use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  Local,
  NaiveDate,
  Utc
};

/// Calendar date of `now` in the local
/// timezone.
#[must_use]
pub fn local_today(
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&Local).date_naive()
}

#[must_use]
pub fn format_local_date(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d")
    .to_string()
}

/// A date-only due date is stored by the
/// API as UTC midnight of that day.
#[must_use]
pub fn date_to_utc(
  date: NaiveDate
) -> DateTime<Utc> {
  date
    .and_hms_opt(0, 0, 0)
    .map(|ndt| ndt.and_utc())
    .unwrap_or_else(|| {
      NaiveDate::MIN
        .and_hms_opt(0, 0, 0)
        .map(|ndt| ndt.and_utc())
        .unwrap_or_default()
    })
}

/// Parses the due-date input accepted by
/// the CLI: `today`, `tomorrow`,
/// `yesterday`, `nextweek`, `+3d`, `+2w`,
/// or `YYYY-MM-DD`.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_due_input(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = local_today(now);

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(
        today + Duration::days(1)
      );
    }
    | "yesterday" => {
      return Ok(
        today - Duration::days(1)
      );
    }
    | "nextweek" | "next-week" => {
      return Ok(
        today + Duration::days(7)
      );
    }
    | _ => {}
  }

  if let Some(rest) =
    lower.strip_prefix('+')
  {
    let unit_at = rest
      .char_indices()
      .last()
      .map_or(0, |(idx, _)| idx);
    let (digits, unit) =
      rest.split_at(unit_at);
    let count: i64 =
      digits.parse().with_context(|| {
        format!(
          "invalid relative date: \
           {token}"
        )
      })?;
    let days = match unit {
      | "d" => count,
      | "w" => count * 7,
      | _ => {
        return Err(anyhow!(
          "relative dates use d or w: \
           {token}"
        ));
      }
    };
    return Ok(
      today + Duration::days(days)
    );
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {token} \
       (expected YYYY-MM-DD)"
    )
  })
}
