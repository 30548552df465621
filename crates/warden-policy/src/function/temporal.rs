//! Date arithmetic and `time-in-range`.

use warden_core::DataType;

use super::{boolean, processing, single, Arity, FunctionRegistry, NativeFunction, NS_1_0, NS_2_0, NS_3_0};
use crate::value::{AttributeValue, Value};

pub fn register(registry: &mut FunctionRegistry) {
    for ns in [NS_1_0, NS_3_0] {
        for (verb, negate) in [("add", false), ("subtract", true)] {
            registry.add(NativeFunction::new(
                format!("{}:dateTime-{}-dayTimeDuration", ns, verb),
                Arity::Exact(2),
                Some(DataType::DateTime),
                move |id, args, _| {
                    let (dt, dur) = match (
                        single(id, args, 0, DataType::DateTime)?,
                        single(id, args, 1, DataType::DayTimeDuration)?,
                    ) {
                        (AttributeValue::DateTime(dt), AttributeValue::DayTimeDuration(d)) => (dt, d),
                        _ => return Err(processing(id, "unexpected argument types")),
                    };
                    dt.add_duration(dur, negate)
                        .map(|v| Value::Single(AttributeValue::DateTime(v)))
                        .ok_or_else(|| processing(id, "result out of range"))
                },
            ));
            registry.add(NativeFunction::new(
                format!("{}:dateTime-{}-yearMonthDuration", ns, verb),
                Arity::Exact(2),
                Some(DataType::DateTime),
                move |id, args, _| {
                    let (dt, months) = match (
                        single(id, args, 0, DataType::DateTime)?,
                        single(id, args, 1, DataType::YearMonthDuration)?,
                    ) {
                        (AttributeValue::DateTime(dt), AttributeValue::YearMonthDuration(d)) => {
                            (dt, d.months)
                        }
                        _ => return Err(processing(id, "unexpected argument types")),
                    };
                    let months = if negate { months.checked_neg() } else { Some(months) };
                    months
                        .and_then(|m| dt.add_months(m))
                        .map(|v| Value::Single(AttributeValue::DateTime(v)))
                        .ok_or_else(|| processing(id, "result out of range"))
                },
            ));
            registry.add(NativeFunction::new(
                format!("{}:date-{}-yearMonthDuration", ns, verb),
                Arity::Exact(2),
                Some(DataType::Date),
                move |id, args, _| {
                    let (date, months) = match (
                        single(id, args, 0, DataType::Date)?,
                        single(id, args, 1, DataType::YearMonthDuration)?,
                    ) {
                        (AttributeValue::Date(date), AttributeValue::YearMonthDuration(d)) => {
                            (date, d.months)
                        }
                        _ => return Err(processing(id, "unexpected argument types")),
                    };
                    let months = if negate { months.checked_neg() } else { Some(months) };
                    months
                        .and_then(|m| date.add_months(m))
                        .map(|v| Value::Single(AttributeValue::Date(v)))
                        .ok_or_else(|| processing(id, "result out of range"))
                },
            ));
        }
    }

    // True when the first time lies in the inclusive range given by the other
    // two; an upper bound earlier than the lower bound wraps past midnight.
    // Zone-less bounds take the zone of the first argument, which in turn
    // defaults to the implicit zone.
    registry.add(NativeFunction::new(
        format!("{}:time-in-range", NS_2_0),
        Arity::Exact(3),
        Some(DataType::Boolean),
        |id, args, env| {
            let mut times = Vec::with_capacity(3);
            for index in 0..3 {
                match single(id, args, index, DataType::Time)? {
                    AttributeValue::Time(t) => times.push(*t),
                    _ => return Err(processing(id, "unexpected argument types")),
                }
            }
            let zone = times[0].offset.unwrap_or(env.implicit_offset);
            let at = |index: usize| times[index].nanos_of_day_utc(times[index].offset.unwrap_or(zone));
            let (t, lower, upper) = (at(0), at(1), at(2));
            let inside = if lower <= upper {
                lower <= t && t <= upper
            } else {
                t >= lower || t <= upper
            };
            Ok(boolean(inside))
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_date_time_add_day_time_duration() {
        let r = FunctionRegistry::standard();
        let out = call(
            &r,
            &format!("{}:dateTime-add-dayTimeDuration", NS_3_0),
            vec![
                typed(DataType::DateTime, "2024-03-01T23:00:00Z"),
                typed(DataType::DayTimeDuration, "PT2H"),
            ],
        )
        .unwrap();
        assert_eq!(out, typed(DataType::DateTime, "2024-03-02T01:00:00Z"));
    }

    #[test]
    fn test_subtract_year_month_duration() {
        let r = FunctionRegistry::standard();
        let out = call(
            &r,
            &format!("{}:date-subtract-yearMonthDuration", NS_1_0),
            vec![
                typed(DataType::Date, "2024-03-31"),
                typed(DataType::YearMonthDuration, "P1M"),
            ],
        )
        .unwrap();
        assert_eq!(out, typed(DataType::Date, "2024-02-29"));
    }

    #[test]
    fn test_time_in_range_plain_and_wrapping() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:time-in-range", NS_2_0);
        let t = |raw: &str| typed(DataType::Time, raw);
        assert_eq!(
            call(&r, &id, vec![t("10:00:00"), t("09:00:00"), t("17:00:00")]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &id, vec![t("18:00:00"), t("09:00:00"), t("17:00:00")]).unwrap(),
            b(false)
        );
        // Night shift crossing midnight.
        assert_eq!(
            call(&r, &id, vec![t("23:30:00"), t("22:00:00"), t("06:00:00")]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &id, vec![t("12:00:00"), t("22:00:00"), t("06:00:00")]).unwrap(),
            b(false)
        );
    }

    #[test]
    fn test_time_in_range_bounds_inherit_zone() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:time-in-range", NS_2_0);
        let t = |raw: &str| typed(DataType::Time, raw);
        // Bounds are read in +05:00, the zone of the first argument.
        assert_eq!(
            call(&r, &id, vec![t("10:00:00+05:00"), t("09:00:00"), t("11:00:00")]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &id, vec![t("10:00:00+05:00"), t("09:00:00Z"), t("11:00:00Z")]).unwrap(),
            b(false)
        );
    }
}
