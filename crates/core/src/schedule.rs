use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

const DEFAULT_HOUR: u32 = 16;
const DEFAULT_MINUTE: u32 = 0;
const DEFAULT_TZ: Tz = chrono_tz::Asia::Kolkata;
const DEFAULT_CATCH_UP_MINUTES: i64 = 60;

/// Fires once a day at a fixed local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
    pub tz: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Send the digest for `fire_date` now.
    Fire { fire_date: NaiveDate },
    /// Nothing due; sleep until `until`.
    Wait { until: DateTime<Utc> },
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
            tz: DEFAULT_TZ,
        }
    }
}

impl DailySchedule {
    /// `DIGEST_TIME=HH:MM` and `DIGEST_TZ=<IANA name>`; defaults 16:00 Asia/Kolkata.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("DIGEST_TIME") {
            let (hour, minute) = parse_time_of_day(&s)
                .with_context(|| format!("invalid DIGEST_TIME {s:?}"))?;
            out.hour = hour;
            out.minute = minute;
        }

        if let Ok(s) = std::env::var("DIGEST_TZ") {
            out.tz = s
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("invalid DIGEST_TZ {s:?}: {e}"))?;
        }

        Ok(out)
    }

    /// Local calendar date of `now` in the schedule's timezone.
    pub fn fire_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// The instant the schedule fires on `date`; `None` if that local time does not exist.
    pub fn fire_time_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_hms_opt(self.hour, self.minute, 0)?;
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Decides whether a run is due.
    ///
    /// Today's run fires if its time has passed, no run is recorded for today
    /// or later, and it is no more than `catch_up` late. Otherwise the plan is
    /// to wait for the next fire time not already covered by `last_fired`.
    pub fn plan(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<NaiveDate>,
        catch_up: Duration,
    ) -> Plan {
        let today = self.fire_date(now);
        let fired_today = last_fired.is_some_and(|d| d >= today);

        if !fired_today {
            if let Some(fire_at) = self.fire_time_on(today) {
                if now < fire_at {
                    return Plan::Wait { until: fire_at };
                }
                if now - fire_at <= catch_up {
                    return Plan::Fire { fire_date: today };
                }
            }
        }

        let mut date = today;
        loop {
            date = match date.succ_opt() {
                Some(d) => d,
                None => return Plan::Wait { until: now + Duration::days(1) },
            };
            if last_fired.is_some_and(|d| d >= date) {
                continue;
            }
            if let Some(fire_at) = self.fire_time_on(date) {
                return Plan::Wait { until: fire_at };
            }
        }
    }
}

/// `DIGEST_CATCHUP_MINUTES`, default 60. How late a missed run may still fire after a restart.
pub fn catch_up_from_env() -> anyhow::Result<Duration> {
    let minutes = match std::env::var("DIGEST_CATCHUP_MINUTES") {
        Ok(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|m| (0..=24 * 60).contains(m))
            .with_context(|| format!("invalid DIGEST_CATCHUP_MINUTES {s:?}"))?,
        Err(_) => DEFAULT_CATCH_UP_MINUTES,
    };
    Ok(Duration::minutes(minutes))
}

pub fn parse_time_of_day(s: &str) -> anyhow::Result<(u32, u32)> {
    let (h, m) = s.trim().split_once(':').context("expected HH:MM")?;
    let hour: u32 = h.trim().parse().context("hour must be a number")?;
    let minute: u32 = m.trim().parse().context("minute must be a number")?;
    anyhow::ensure!(hour < 24, "hour out of range: {hour}");
    anyhow::ensure!(minute < 60, "minute out of range: {minute}");
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap()
    }

    fn hour() -> Duration {
        Duration::minutes(60)
    }

    #[test]
    fn default_fires_at_1030_utc() {
        // 16:00 IST = 10:30 UTC
        let s = DailySchedule::default();
        assert_eq!(s.fire_time_on(date(2026, 3, 10)), Some(utc(2026, 3, 10, 10, 30)));
    }

    #[test]
    fn waits_for_todays_fire_time() {
        // 2026-03-10 09:00 UTC = 14:30 IST
        let plan = DailySchedule::default().plan(utc(2026, 3, 10, 9, 0), None, hour());
        assert_eq!(plan, Plan::Wait { until: utc(2026, 3, 10, 10, 30) });
    }

    #[test]
    fn fires_when_due_and_not_yet_fired() {
        let plan = DailySchedule::default().plan(
            utc(2026, 3, 10, 10, 45),
            Some(date(2026, 3, 9)),
            hour(),
        );
        assert_eq!(plan, Plan::Fire { fire_date: date(2026, 3, 10) });
    }

    #[test]
    fn already_fired_waits_for_tomorrow() {
        let plan = DailySchedule::default().plan(
            utc(2026, 3, 10, 10, 45),
            Some(date(2026, 3, 10)),
            hour(),
        );
        assert_eq!(plan, Plan::Wait { until: utc(2026, 3, 11, 10, 30) });
    }

    #[test]
    fn restart_beyond_catch_up_skips_the_day() {
        // 12:00 UTC = 17:30 IST, 90 minutes late.
        let plan = DailySchedule::default().plan(utc(2026, 3, 10, 12, 0), None, hour());
        assert_eq!(plan, Plan::Wait { until: utc(2026, 3, 11, 10, 30) });
    }

    #[test]
    fn local_date_rolls_over_before_utc() {
        // 2026-03-10 19:00 UTC = 2026-03-11 00:30 IST
        let s = DailySchedule::default();
        let now = utc(2026, 3, 10, 19, 0);
        assert_eq!(s.fire_date(now), date(2026, 3, 11));
        assert_eq!(
            s.plan(now, Some(date(2026, 3, 10)), hour()),
            Plan::Wait { until: utc(2026, 3, 11, 10, 30) }
        );
    }

    #[test]
    fn honors_other_timezones() {
        let s = DailySchedule {
            hour: 9,
            minute: 15,
            tz: chrono_tz::America::New_York,
        };
        // EDT (UTC-4) in July.
        assert_eq!(s.fire_time_on(date(2026, 7, 1)), Some(utc(2026, 7, 1, 13, 15)));
    }

    #[test]
    fn parses_time_of_day() {
        assert_eq!(parse_time_of_day("16:00").unwrap(), (16, 0));
        assert_eq!(parse_time_of_day(" 7:05 ").unwrap(), (7, 5));
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("16:60").is_err());
        assert!(parse_time_of_day("1600").is_err());
    }
}
