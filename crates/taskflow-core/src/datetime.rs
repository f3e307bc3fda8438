use anyhow::anyhow;
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;

pub const TIMEZONE_ENV_VAR: &str =
  "TASKFLOW_TIMEZONE";

/// Display bucket for a task's due date.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(
  tag = "kind",
  content = "text",
  rename_all = "lowercase"
)]
pub enum DueBucket {
  None,
  Today,
  Tomorrow,
  Overdue,
  Other(String)
}

impl DueBucket {
  pub fn is_urgent(&self) -> bool {
    matches!(
      self,
      Self::Today | Self::Overdue
    )
  }

  pub fn label(&self) -> &str {
    match self {
      | Self::None => "",
      | Self::Today => "Today",
      | Self::Tomorrow => "Tomorrow",
      | Self::Overdue => "Overdue",
      | Self::Other(text) => text
    }
  }
}

/// Buckets `due` relative to the calendar day of `now` in `tz`.
///
/// Today wins over Overdue: a time earlier today is still Today.
pub fn classify_due(
  due: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
  tz: &Tz
) -> DueBucket {
  let Some(due) = due else {
    return DueBucket::None;
  };

  let today =
    now.with_timezone(tz).date_naive();
  let local_due = due.with_timezone(tz);
  let due_day = local_due.date_naive();

  if due_day == today {
    DueBucket::Today
  } else if today.succ_opt()
    == Some(due_day)
  {
    DueBucket::Tomorrow
  } else if due_day < today {
    DueBucket::Overdue
  } else {
    DueBucket::Other(
      local_due
        .format("%b %-d")
        .to_string()
    )
  }
}

/// Picks the timezone used for calendar-day comparisons.
///
/// `TASKFLOW_TIMEZONE` wins over the configured value; anything
/// unparsable falls through to UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Lenient timestamp parser for records coming from a store.
///
/// Accepts RFC 3339, naive ISO date-times (read as UTC) and bare
/// `YYYY-MM-DD` dates (UTC midnight). Returns `None` for anything
/// else.
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Some(dt.with_timezone(&Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S"
  ] {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        trimmed, fmt
      )
    {
      return Some(naive.and_utc());
    }
  }

  NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .ok()
  .and_then(|date| {
    date.and_hms_opt(0, 0, 0)
  })
  .map(|naive| naive.and_utc())
}

/// Parses a due date typed by the user: `today`, `tomorrow`,
/// `YYYY-MM-DD` (local midnight in `tz`) or a full RFC 3339
/// timestamp.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_due_input(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today =
    now.with_timezone(tz).date_naive();

  match lower.as_str() {
    | "today" => {
      return local_midnight(today, tz);
    }
    | "tomorrow" => {
      return local_midnight(today, tz)
        .map(|dt| dt + Duration::days(1));
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return local_midnight(date, tz);
  }

  DateTime::parse_from_rfc3339(token)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|err| {
      anyhow!(
        "unrecognized due date \
         '{token}': {err}"
      )
    })
}

fn local_midnight(
  date: NaiveDate,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {date}"
      )
    })?;

  match tz.from_local_datetime(&midnight)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        first = %first,
        second = %second,
        "ambiguous local midnight; using earliest"
      );
      Ok(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => {
      Err(anyhow!(
        "midnight of {date} does not \
         exist in timezone {tz}"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::*;

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 3, 4, 15, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn missing_date_has_no_bucket() {
    assert_eq!(
      classify_due(
        None,
        now(),
        &chrono_tz::UTC
      ),
      DueBucket::None
    );
  }

  #[test]
  fn earlier_today_is_today_not_overdue()
  {
    let bucket = classify_due(
      Some(now() - Duration::hours(1)),
      now(),
      &chrono_tz::UTC
    );
    assert_eq!(bucket, DueBucket::Today);
    assert!(bucket.is_urgent());
  }

  #[test]
  fn tomorrow_overdue_and_other() {
    let utc = chrono_tz::UTC;
    let tomorrow = classify_due(
      Some(now() + Duration::days(1)),
      now(),
      &utc
    );
    assert_eq!(
      tomorrow,
      DueBucket::Tomorrow
    );
    assert!(!tomorrow.is_urgent());

    assert_eq!(
      classify_due(
        Some(
          now() - Duration::hours(16)
        ),
        now(),
        &utc
      ),
      DueBucket::Overdue
    );

    let later = classify_due(
      Some(now() + Duration::days(10)),
      now(),
      &utc
    );
    assert_eq!(
      later,
      DueBucket::Other(
        "Mar 14".to_string()
      )
    );
    assert_eq!(later.label(), "Mar 14");
  }

  #[test]
  fn calendar_day_follows_timezone() {
    let tz: Tz = "America/Mexico_City"
      .parse()
      .expect("valid tz");
    // 02:00 UTC on the 5th is still the 4th in Mexico City.
    let due = Utc
      .with_ymd_and_hms(
        2026, 3, 5, 2, 0, 0
      )
      .single()
      .expect("valid due");
    assert_eq!(
      classify_due(Some(due), now(), &tz),
      DueBucket::Today
    );
    assert_eq!(
      classify_due(
        Some(due),
        now(),
        &chrono_tz::UTC
      ),
      DueBucket::Tomorrow
    );
  }

  #[test]
  fn parses_store_timestamps() {
    assert_eq!(
      parse_timestamp(
        "2026-03-04T15:00:00Z"
      ),
      Some(now())
    );
    assert_eq!(
      parse_timestamp(
        "2026-03-04T15:00:00.000"
      ),
      Some(now())
    );
    assert!(
      parse_timestamp("2026-03-04")
        .is_some()
    );
    assert!(
      parse_timestamp("next week")
        .is_none()
    );
  }

  #[test]
  fn parses_due_input_keywords() {
    let utc = chrono_tz::UTC;
    let today =
      parse_due_input("today", now(), &utc)
        .expect("today");
    assert_eq!(
      classify_due(
        Some(today),
        now(),
        &utc
      ),
      DueBucket::Today
    );
    let tomorrow = parse_due_input(
      "Tomorrow", now(), &utc
    )
    .expect("tomorrow");
    assert_eq!(
      classify_due(
        Some(tomorrow),
        now(),
        &utc
      ),
      DueBucket::Tomorrow
    );
    assert!(
      parse_due_input(
        "someday", now(), &utc
      )
      .is_err()
    );
  }
}
