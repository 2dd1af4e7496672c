//! Spoken Hebrew time phrases for message intros.

use chrono::{Timelike, Utc};
use chrono_tz::Tz;

/// Indexed by `hour % 12`; index 0 is twelve o'clock.
const HOURS: [&str; 12] = [
    "שתים עשרה",
    "אחת",
    "שתיים",
    "שלוש",
    "ארבע",
    "חמש",
    "שש",
    "שֶׁבַע",
    "שמונה",
    "תֵּשַׁע",
    "עשר",
    "אחת עשרה",
];

const MINUTES: [&str; 60] = [
    "אפס",
    "ודקה",
    "ושתי דקות",
    "ושלוש דקות",
    "וארבע דקות",
    "וחמשה",
    "ושש דקות",
    "ושבע דקות",
    "ושמונה דקות",
    "ותשע דקות",
    "וַעֲשָׂרָה",
    "ואחת עשרה דקות",
    "ושתים עשרה דקות",
    "ושלוש עשרה דקות",
    "וארבע עשרה דקות",
    "ורבע",
    "ושש עשרה דקות",
    "ושבע עשרה דקות",
    "ושמונה עשרה דקות",
    "ותשע עשרה דקות",
    "ועשרים",
    "עשרים ואחת",
    "עשרים ושתיים",
    "עשרים ושלוש",
    "עשרים וארבע",
    "עשרים וחמש",
    "עשרים ושש",
    "עשרים ושבע",
    "עשרים ושמונה",
    "עשרים ותשע",
    "וחצי",
    "שלושים ואחת",
    "שלושים ושתיים",
    "שלושים ושלוש",
    "שלושים וארבע",
    "שלושים וחמש",
    "שלושים ושש",
    "שלושים ושבע",
    "שלושים ושמונה",
    "שלושים ותשע",
    "וארבעים דקות",
    "ארבעים ואחת",
    "ארבעים ושתיים",
    "ארבעים ושלוש",
    "ארבעים וארבע",
    "ארבעים וחמש",
    "ארבעים ושש",
    "ארבעים ושבע",
    "ארבעים ושמונה",
    "ארבעים ותשע",
    "וחמישים דקות",
    "חמישים ואחת",
    "חמישים ושתיים",
    "חמישים ושלוש",
    "חמישים וארבע",
    "חמישים וחמש",
    "חמישים ושש",
    "חמישים ושבע",
    "חמישים ושמונה",
    "חמישים ותשע",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeOfDay;
}

/// Wall clock read in a fixed IANA zone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for ZonedClock {
    fn now(&self) -> TimeOfDay {
        let local = Utc::now().with_timezone(&self.tz);
        TimeOfDay::new(local.hour(), local.minute())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub TimeOfDay);

impl Clock for FixedClock {
    fn now(&self) -> TimeOfDay {
        self.0
    }
}

pub fn speak_time(hour: u32, minute: u32) -> String {
    let hour_name = HOURS[(hour % 12) as usize];
    if minute == 0 {
        return format!("השעה {hour_name} בדיוק");
    }
    match MINUTES.get(minute as usize) {
        Some(phrase) => format!("{hour_name} {phrase}"),
        None => format!("{hour_name} ו{minute} דקות"),
    }
}

/// Spoken preamble: the current time followed by the channel's suffix.
pub fn intro_phrase(time: TimeOfDay, suffix: &str) -> String {
    format!("{} {}", speak_time(time.hour, time.minute), suffix)
}
