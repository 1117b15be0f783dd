//! Date and time operators (feature `datetime`)
//!
//! Dates are carried as Unix timestamps in seconds. Operators that take a
//! date accept either a timestamp number or a date string, which is parsed
//! like `$dateParse`. Formatting uses the token syntax `YYYY`, `MM`, `DD`,
//! `HH`, `mm`, `ss` with an optional IANA timezone name; everything else
//! works in UTC.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use super::{
    Operator, OperatorRegistry, args_as_array, check_arg_count, check_min_arg_count, get_int_arg,
    get_string_arg, object_payload, require_field,
};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::value_type_name;

/// Iteration cap for `$dateShift` when `maxIterations` is not given.
///
/// Ten years of calendar days; a shift that scans further than that is
/// almost certainly a malformed holiday list or runaway `days` value.
pub const DEFAULT_SHIFT_ITERATIONS: usize = 3650;

const SECONDS_PER_DAY: i64 = 86_400;

const PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
];

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$now", Operator::Eager(now));
    registry.register("$nowIso", Operator::Eager(now_iso));
    registry.register("$dateParse", Operator::Eager(date_parse));
    registry.register("$dateFormat", Operator::Eager(date_format));
    registry.register("$dateAdd", Operator::Eager(date_add));
    registry.register("$dateSubtract", Operator::Eager(date_subtract));
    registry.register("$dateDiff", Operator::Eager(date_diff));
    registry.register("$dateYear", Operator::Eager(date_year));
    registry.register("$dateMonth", Operator::Eager(date_month));
    registry.register("$dateDay", Operator::Eager(date_day));
    registry.register("$dayOfWeek", Operator::Eager(day_of_week));
    registry.register("$isBusinessDay", Operator::Eager(is_business_day));
    registry.register("$dateShift", Operator::Lazy(date_shift));
}

fn parse_timestamp(text: &str) -> EvalResult<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp());
    }
    for format in PARSE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc().timestamp());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp());
        }
    }
    Err(EvalError::invalid_date(format!(
        "unrecognized date string '{text}'"
    )))
}

fn timestamp_arg(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| EvalError::invalid_date("timestamp out of range")),
        Value::String(s) => parse_timestamp(s),
        other => Err(EvalError::type_mismatch(
            "timestamp or date string",
            value_type_name(other),
        )),
    }
}

fn to_datetime(timestamp: i64) -> EvalResult<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| EvalError::invalid_date("timestamp out of range"))
}

fn unit_seconds(operator: &str, unit: &str) -> EvalResult<i64> {
    match unit {
        "seconds" => Ok(1),
        "minutes" => Ok(60),
        "hours" => Ok(3_600),
        "days" => Ok(SECONDS_PER_DAY),
        "weeks" => Ok(7 * SECONDS_PER_DAY),
        other => Err(EvalError::invalid_argument(
            operator,
            format!("unknown unit '{other}'"),
        )),
    }
}

/// Current time as a Unix timestamp in seconds
pub fn now(_scope: &Scope<'_>, _payload: &Value) -> EvalResult<Value> {
    Ok(Value::Number(Utc::now().timestamp().into()))
}

/// Current time as an RFC 3339 string
pub fn now_iso(_scope: &Scope<'_>, _payload: &Value) -> EvalResult<Value> {
    Ok(Value::String(
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    ))
}

/// Parse a date string to a timestamp.
///
/// RFC 3339 is tried first, then a list of common formats
/// (`2024-03-15 12:30:00`, `2024-03-15`, `2024/03/15`, `15.03.2024`,
/// `03/15/2024`). Bare dates resolve to midnight UTC. A numeric payload
/// passes through unchanged.
pub fn date_parse(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Number(timestamp_arg(payload)?.into()))
}

/// Format a timestamp: `[date, format?, timezone?]`.
///
/// The format defaults to `"YYYY-MM-DD HH:mm:ss"`; the timezone is an IANA
/// name like `"Europe/Kyiv"` and defaults to UTC.
pub fn date_format(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$dateFormat", payload)?;
    check_min_arg_count("$dateFormat", args, 1)?;
    let timestamp = timestamp_arg(&args[0])?;
    let format = if args.len() >= 2 {
        get_string_arg("$dateFormat", args, 1, "format")?
    } else {
        "YYYY-MM-DD HH:mm:ss"
    };
    let strftime = format
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S");

    let utc = to_datetime(timestamp)?;
    let formatted = if args.len() >= 3 {
        let tz_name = get_string_arg("$dateFormat", args, 2, "timezone")?;
        let tz: Tz = tz_name
            .parse()
            .map_err(|_| EvalError::invalid_date(format!("unknown timezone '{tz_name}'")))?;
        utc.with_timezone(&tz).format(&strftime).to_string()
    } else {
        utc.format(&strftime).to_string()
    };
    Ok(Value::String(formatted))
}

/// Add to a date: `[date, amount, unit]` with unit one of `seconds`,
/// `minutes`, `hours`, `days`, `weeks`
pub fn date_add(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    shift_by_unit("$dateAdd", payload, 1)
}

/// Subtract from a date: `[date, amount, unit]`
pub fn date_subtract(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    shift_by_unit("$dateSubtract", payload, -1)
}

fn shift_by_unit(operator: &str, payload: &Value, sign: i64) -> EvalResult<Value> {
    let args = args_as_array(operator, payload)?;
    check_arg_count(operator, args, 3)?;
    let timestamp = timestamp_arg(&args[0])?;
    let amount = get_int_arg(operator, args, 1, "amount")?;
    let unit = get_string_arg(operator, args, 2, "unit")?;
    let delta = amount
        .checked_mul(unit_seconds(operator, unit)?)
        .and_then(|d| d.checked_mul(sign))
        .and_then(|d| timestamp.checked_add(d))
        .ok_or_else(|| EvalError::invalid_date("timestamp out of range"))?;
    Ok(Value::Number(delta.into()))
}

/// Difference between two dates in whole units, truncated: `[from, to, unit]`.
///
/// Positive when `to` is later than `from`.
pub fn date_diff(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$dateDiff", payload)?;
    check_arg_count("$dateDiff", args, 3)?;
    let from = timestamp_arg(&args[0])?;
    let to = timestamp_arg(&args[1])?;
    let unit = get_string_arg("$dateDiff", args, 2, "unit")?;
    Ok(Value::Number(((to - from) / unit_seconds("$dateDiff", unit)?).into()))
}

/// Calendar year of a date, in UTC
pub fn date_year(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let dt = to_datetime(timestamp_arg(payload)?)?;
    Ok(Value::Number(i64::from(dt.year()).into()))
}

/// Calendar month of a date (1–12), in UTC
pub fn date_month(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let dt = to_datetime(timestamp_arg(payload)?)?;
    Ok(Value::Number(i64::from(dt.month()).into()))
}

/// Day of the month (1–31), in UTC
pub fn date_day(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let dt = to_datetime(timestamp_arg(payload)?)?;
    Ok(Value::Number(i64::from(dt.day()).into()))
}

/// Day of the week with 0 = Sunday, in UTC
pub fn day_of_week(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let dt = to_datetime(timestamp_arg(payload)?)?;
    Ok(Value::Number(
        i64::from(dt.weekday().num_days_from_sunday()).into(),
    ))
}

fn holiday_set(operator: &str, value: &Value) -> EvalResult<HashSet<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| EvalError::invalid_argument(operator, "'holidays' must be an array"))?;
    let mut set = HashSet::with_capacity(items.len());
    for item in items {
        let day = item.as_str().ok_or_else(|| {
            EvalError::invalid_argument(operator, "holidays must be 'YYYY-MM-DD' strings")
        })?;
        set.insert(day.to_string());
    }
    Ok(set)
}

fn business_day(timestamp: i64, holidays: &HashSet<String>) -> EvalResult<bool> {
    let dt = to_datetime(timestamp)?;
    if dt.weekday().num_days_from_monday() >= 5 {
        return Ok(false);
    }
    if holidays.is_empty() {
        return Ok(true);
    }
    Ok(!holidays.contains(&dt.format("%Y-%m-%d").to_string()))
}

/// Whether a date falls on a business day: a bare date, or
/// `[date, holidays]` with holidays as `"YYYY-MM-DD"` strings.
///
/// Weekends are Saturday and Sunday.
pub fn is_business_day(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let (date, holidays) = match payload {
        Value::Array(args) => {
            check_min_arg_count("$isBusinessDay", args, 1)?;
            let holidays = if args.len() >= 2 {
                holiday_set("$isBusinessDay", &args[1])?
            } else {
                HashSet::new()
            };
            (&args[0], holidays)
        }
        other => (other, HashSet::new()),
    };
    Ok(Value::Bool(business_day(timestamp_arg(date)?, &holidays)?))
}

/// Shift a date by whole business days, skipping weekends and holidays.
///
/// Payload: `{date, days, holidays?, maxIterations?, fallback?}`. Every
/// field is resolved, so any of them may be a path or expression. `days`
/// may be negative. The day-scanning loop is capped by `maxIterations`
/// (default [`DEFAULT_SHIFT_ITERATIONS`]); past the cap the operator fails
/// with an iteration-limit error, or resolves `fallback` when one is given.
pub fn date_shift(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let fields = object_payload("$dateShift", payload)?;
    let fallback = fields.get("fallback");
    match shift_business_days(scope, fields) {
        Ok(value) => Ok(value),
        Err(err) => match fallback {
            Some(fragment) => {
                debug!(operator = "$dateShift", error = %err, "shift failed, resolving fallback");
                scope.resolve(fragment)
            }
            None => Err(err),
        },
    }
}

fn shift_business_days(
    scope: &Scope<'_>,
    fields: &serde_json::Map<String, Value>,
) -> EvalResult<Value> {
    let date = scope.resolve(require_field("$dateShift", fields, "date")?)?;
    let days = scope.resolve(require_field("$dateShift", fields, "days")?)?;
    let days = days
        .as_i64()
        .ok_or_else(|| EvalError::invalid_argument("$dateShift", "'days' must be an integer"))?;

    let holidays = match fields.get("holidays") {
        Some(fragment) => holiday_set("$dateShift", &scope.resolve(fragment)?)?,
        None => HashSet::new(),
    };
    let max_iterations = match fields.get("maxIterations") {
        Some(fragment) => {
            let resolved = scope.resolve(fragment)?;
            resolved
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    EvalError::invalid_argument(
                        "$dateShift",
                        "'maxIterations' must be a positive integer",
                    )
                })?
        }
        None => DEFAULT_SHIFT_ITERATIONS,
    };

    let mut timestamp = timestamp_arg(&date)?;
    let step = if days >= 0 { SECONDS_PER_DAY } else { -SECONDS_PER_DAY };
    let mut remaining = days.unsigned_abs();
    let mut iterations = 0_usize;
    while remaining > 0 {
        iterations += 1;
        if iterations > max_iterations {
            return Err(EvalError::iteration_limit("$dateShift", max_iterations));
        }
        timestamp = timestamp
            .checked_add(step)
            .ok_or_else(|| EvalError::invalid_date("timestamp out of range"))?;
        if business_day(timestamp, &holidays)? {
            remaining -= 1;
        }
    }
    Ok(Value::Number(timestamp.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::resolve::Resolver;

    // 2024-03-15T00:00:00Z, a Friday
    const FRIDAY: i64 = 1_710_460_800;
    const SATURDAY: i64 = FRIDAY + SECONDS_PER_DAY;
    const MONDAY: i64 = FRIDAY + 3 * SECONDS_PER_DAY;

    fn call(name: &str, payload: Value) -> EvalResult<Value> {
        let resolver = Resolver::new(Arc::new(OperatorRegistry::new()));
        resolver.call_operator(&json!({}), name, &payload, None)
    }

    #[test]
    fn test_now() {
        let ts = call("$now", json!(null)).unwrap();
        assert!(ts.as_i64().unwrap() > 1_700_000_000);
        let iso = call("$nowIso", json!(null)).unwrap();
        assert!(DateTime::parse_from_rfc3339(iso.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_date_parse() {
        assert_eq!(call("$dateParse", json!("2024-03-15")).unwrap(), json!(FRIDAY));
        assert_eq!(
            call("$dateParse", json!("2024-03-15T00:00:00Z")).unwrap(),
            json!(FRIDAY)
        );
        assert_eq!(
            call("$dateParse", json!("2024-03-15 12:30:00")).unwrap(),
            json!(FRIDAY + 45_000)
        );
        assert_eq!(call("$dateParse", json!("15.03.2024")).unwrap(), json!(FRIDAY));
        assert_eq!(call("$dateParse", json!(FRIDAY)).unwrap(), json!(FRIDAY));
        let err = call("$dateParse", json!("not a date")).unwrap_err();
        assert_eq!(err.code(), "BLUEPRINT:INVALID_DATE");
    }

    #[test]
    fn test_date_format() {
        assert_eq!(
            call("$dateFormat", json!([FRIDAY, "YYYY-MM-DD"])).unwrap(),
            json!("2024-03-15")
        );
        assert_eq!(
            call("$dateFormat", json!([FRIDAY])).unwrap(),
            json!("2024-03-15 00:00:00")
        );
        assert_eq!(
            call("$dateFormat", json!(["2024-03-15", "DD.MM.YYYY"])).unwrap(),
            json!("15.03.2024")
        );
    }

    #[test]
    fn test_date_format_with_timezone() {
        assert_eq!(
            call("$dateFormat", json!([FRIDAY, "HH:mm", "Europe/Kyiv"])).unwrap(),
            json!("02:00")
        );
        let err = call("$dateFormat", json!([FRIDAY, "HH:mm", "Mars/Olympus"])).unwrap_err();
        assert_eq!(err.code(), "BLUEPRINT:INVALID_DATE");
    }

    #[test]
    fn test_date_arithmetic() {
        assert_eq!(
            call("$dateAdd", json!([FRIDAY, 2, "days"])).unwrap(),
            json!(FRIDAY + 2 * SECONDS_PER_DAY)
        );
        assert_eq!(
            call("$dateAdd", json!([FRIDAY, 90, "minutes"])).unwrap(),
            json!(FRIDAY + 5_400)
        );
        assert_eq!(
            call("$dateSubtract", json!([FRIDAY, 1, "weeks"])).unwrap(),
            json!(FRIDAY - 7 * SECONDS_PER_DAY)
        );
        assert!(call("$dateAdd", json!([FRIDAY, 1, "fortnights"])).is_err());
    }

    #[test]
    fn test_date_diff() {
        assert_eq!(
            call("$dateDiff", json!([FRIDAY, MONDAY, "days"])).unwrap(),
            json!(3)
        );
        assert_eq!(
            call("$dateDiff", json!([MONDAY, FRIDAY, "days"])).unwrap(),
            json!(-3)
        );
        assert_eq!(
            call("$dateDiff", json!([FRIDAY, FRIDAY + 5_000, "hours"])).unwrap(),
            json!(1)
        );
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(call("$dateYear", json!(FRIDAY)).unwrap(), json!(2024));
        assert_eq!(call("$dateMonth", json!(FRIDAY)).unwrap(), json!(3));
        assert_eq!(call("$dateDay", json!(FRIDAY)).unwrap(), json!(15));
        assert_eq!(call("$dayOfWeek", json!(FRIDAY)).unwrap(), json!(5));
        assert_eq!(call("$dayOfWeek", json!(SATURDAY + SECONDS_PER_DAY)).unwrap(), json!(0));
    }

    #[test]
    fn test_is_business_day() {
        assert_eq!(call("$isBusinessDay", json!(FRIDAY)).unwrap(), json!(true));
        assert_eq!(call("$isBusinessDay", json!(SATURDAY)).unwrap(), json!(false));
        assert_eq!(
            call("$isBusinessDay", json!([FRIDAY, ["2024-03-15"]])).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_date_shift_skips_weekend() {
        let result = call("$dateShift", json!({"date": FRIDAY, "days": 1})).unwrap();
        assert_eq!(result, json!(MONDAY));
    }

    #[test]
    fn test_date_shift_skips_holidays() {
        let payload = json!({"date": FRIDAY, "days": 1, "holidays": ["2024-03-18"]});
        assert_eq!(call("$dateShift", payload).unwrap(), json!(MONDAY + SECONDS_PER_DAY));
    }

    #[test]
    fn test_date_shift_backwards() {
        let payload = json!({"date": MONDAY, "days": -1});
        assert_eq!(call("$dateShift", payload).unwrap(), json!(FRIDAY));
    }

    #[test]
    fn test_date_shift_zero_days() {
        let payload = json!({"date": SATURDAY, "days": 0});
        assert_eq!(call("$dateShift", payload).unwrap(), json!(SATURDAY));
    }

    #[test]
    fn test_date_shift_iteration_limit() {
        let payload = json!({"date": FRIDAY, "days": 5, "maxIterations": 2});
        assert_eq!(
            call("$dateShift", payload).unwrap_err(),
            EvalError::iteration_limit("$dateShift", 2)
        );
    }

    #[test]
    fn test_date_shift_fallback() {
        let payload = json!({"date": FRIDAY, "days": 5, "maxIterations": 2, "fallback": null});
        assert_eq!(call("$dateShift", payload).unwrap(), json!(null));
    }

    #[test]
    fn test_date_shift_resolves_fields() {
        let resolver = Resolver::new(Arc::new(OperatorRegistry::new()));
        let source = json!({"order": {"placed": "2024-03-15", "lead": 1}});
        let payload = json!({"date": "$order.placed", "days": "$order.lead"});
        let result = resolver
            .call_operator(&source, "$dateShift", &payload, None)
            .unwrap();
        assert_eq!(result, json!(MONDAY));
    }

    #[test]
    fn test_date_shift_missing_field() {
        let err = call("$dateShift", json!({"days": 1})).unwrap_err();
        assert_eq!(err, EvalError::missing_parameter("$dateShift", "date"));
    }
}
