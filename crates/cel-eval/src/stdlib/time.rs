//! Timestamp and duration accessors.
//!
//! Timestamp accessors read the calendar in UTC, or in the timezone named by
//! an optional second argument (IANA name or fixed `+HH:MM` offset).

use cel_eval_common::CelType;

use super::no_overload;
use crate::func::{Function, Overload};
use crate::value::time::{parse_timezone, TimestampComponent};
use crate::value::{CelError, CelResult, CelVal, Duration, Timestamp};

type DurationPart = fn(&Duration) -> i64;

pub(super) fn functions() -> Vec<Function> {
    vec![
        accessor("getFullYear", "full_year", TimestampComponent::FullYear, None),
        accessor("getMonth", "month", TimestampComponent::Month, None),
        accessor("getDate", "date", TimestampComponent::Date, None),
        accessor("getDayOfMonth", "day_of_month", TimestampComponent::DayOfMonth, None),
        accessor("getDayOfWeek", "day_of_week", TimestampComponent::DayOfWeek, None),
        accessor("getDayOfYear", "day_of_year", TimestampComponent::DayOfYear, None),
        accessor("getHours", "hours", TimestampComponent::Hours, Some(Duration::hours)),
        accessor("getMinutes", "minutes", TimestampComponent::Minutes, Some(Duration::minutes)),
        accessor(
            "getSeconds",
            "seconds",
            TimestampComponent::Seconds,
            Some(Duration::whole_seconds),
        ),
        accessor(
            "getMilliseconds",
            "milliseconds",
            TimestampComponent::Milliseconds,
            Some(Duration::milliseconds),
        ),
    ]
}

fn accessor(
    name: &'static str,
    suffix: &str,
    component: TimestampComponent,
    duration: Option<DurationPart>,
) -> Function {
    let mut function = Function::new(name)
        .with_overload(Overload::unary(
            format!("timestamp_to_{}", suffix),
            CelType::Timestamp,
            move |id, x| match x {
                CelVal::Timestamp(t) => extract(id, t, component, None),
                other => Err(no_overload(id, name, &[other])),
            },
        ))
        .with_overload(Overload::binary(
            format!("timestamp_to_{}_with_tz", suffix),
            CelType::Timestamp,
            CelType::String,
            move |id, x, tz| match (x, tz) {
                (CelVal::Timestamp(t), CelVal::String(zone)) => {
                    extract(id, t, component, Some(zone.as_ref()))
                }
                _ => Err(no_overload(id, name, &[x, tz])),
            },
        ));
    if let Some(part) = duration {
        function = function.with_overload(Overload::unary(
            format!("duration_to_{}", suffix),
            CelType::Duration,
            move |id, x| match x {
                CelVal::Duration(d) => Ok(CelVal::Int(part(d))),
                other => Err(no_overload(id, name, &[other])),
            },
        ));
    }
    function
}

fn extract(id: i64, ts: &Timestamp, component: TimestampComponent, tz: Option<&str>) -> CelResult {
    let value = match tz {
        None => ts.to_datetime_utc().map(|dt| component.extract(&dt)),
        Some(tz) => parse_timezone(id, tz)?
            .localize(ts)
            .map(|dt| component.extract(&dt)),
    };
    value
        .map(CelVal::Int)
        .ok_or_else(|| CelError::bad_timestamp(id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::{dispatch_candidates, Dispatcher, FuncRegistry};

    // 2009-02-13T23:31:30.123Z, a Friday.
    const TS: Timestamp = Timestamp {
        seconds: 1_234_567_890,
        nanos: 123_000_000,
    };

    fn call(name: &str, args: Vec<CelVal>) -> CelResult {
        let mut registry = FuncRegistry::new();
        registry.add_all(functions()).unwrap();
        let candidates: Vec<_> = registry.find(name).into_iter().collect();
        let args: Vec<CelResult> = args.into_iter().map(Ok).collect();
        dispatch_candidates(1, name, &candidates, &args)
    }

    fn get(name: &str) -> i64 {
        call(name, vec![CelVal::Timestamp(TS)]).unwrap().as_int().unwrap()
    }

    #[test]
    fn test_utc_components() {
        assert_eq!(get("getFullYear"), 2009);
        assert_eq!(get("getMonth"), 1);
        assert_eq!(get("getDate"), 13);
        assert_eq!(get("getDayOfMonth"), 12);
        assert_eq!(get("getDayOfWeek"), 5);
        assert_eq!(get("getDayOfYear"), 43);
        assert_eq!(get("getHours"), 23);
        assert_eq!(get("getMinutes"), 31);
        assert_eq!(get("getSeconds"), 30);
        assert_eq!(get("getMilliseconds"), 123);
    }

    #[test]
    fn test_timezone_argument() {
        let ts = CelVal::Timestamp(TS);
        let hours = |tz: &str| call("getHours", vec![ts.clone(), CelVal::from(tz)]).unwrap();
        assert_eq!(hours("+01:00"), CelVal::Int(0));
        assert_eq!(hours("America/New_York"), CelVal::Int(18));
        assert_eq!(
            call("getDate", vec![ts.clone(), CelVal::from("+01:00")]).unwrap(),
            CelVal::Int(14)
        );
        let err = call("getHours", vec![ts, CelVal::from("Mars/Base")]).unwrap_err();
        assert_eq!(err.as_error().unwrap().message, "invalid timezone: Mars/Base");
    }

    #[test]
    fn test_duration_components() {
        let d = CelVal::Duration(Duration {
            seconds: 3730,
            nanos: 250_000_000,
        });
        assert_eq!(call("getHours", vec![d.clone()]).unwrap(), CelVal::Int(1));
        assert_eq!(call("getMinutes", vec![d.clone()]).unwrap(), CelVal::Int(62));
        assert_eq!(call("getSeconds", vec![d.clone()]).unwrap(), CelVal::Int(3730));
        assert_eq!(call("getMilliseconds", vec![d.clone()]).unwrap(), CelVal::Int(250));
        assert!(call("getFullYear", vec![d]).is_err());
    }
}
