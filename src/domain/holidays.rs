//! Public holiday tables keyed by ISO country code.
//!
//! Holiday data is a dependency of the calendar policy, not part of it: the
//! policy code only talks to [`HolidayCalendar`], and [`RuleHolidayCalendar`]
//! is the deterministic built-in table.

use chrono_tz::Tz;
use time::{Date, Duration, Month, Weekday};

pub trait HolidayCalendar: Send + Sync {
    /// Name of the public holiday on `date` in `country`, if any.
    fn holiday_name(&self, country: &str, date: Date) -> Option<String>;

    /// Every holiday of `year` in `country`, ordered by date.
    fn holidays_in_year(&self, country: &str, year: i32) -> Vec<(Date, String)>;

    fn is_holiday(&self, country: &str, date: Date) -> bool {
        self.holiday_name(country, date).is_some()
    }

    /// A holiday eve is the day before a holiday that is not itself a holiday.
    fn is_holiday_eve(&self, country: &str, date: Date) -> bool {
        if self.is_holiday(country, date) {
            return false;
        }
        date.next_day()
            .is_some_and(|next| self.is_holiday(country, next))
    }
}

/// Map an IANA timezone onto the country whose holidays apply to it.
pub fn country_for_timezone(tz: Tz) -> Option<&'static str> {
    let country = match tz.name() {
        "Europe/Berlin" | "Europe/Busingen" => "DE",
        "Europe/Vienna" => "AT",
        "Europe/Zurich" => "CH",
        "Europe/Paris" => "FR",
        "Europe/London" => "GB",
        "Europe/Amsterdam" => "NL",
        "Europe/Rome" => "IT",
        "Europe/Madrid" | "Atlantic/Canary" => "ES",
        "America/New_York" | "America/Chicago" | "America/Denver" | "America/Phoenix"
        | "America/Los_Angeles" | "America/Anchorage" | "America/Detroit" | "Pacific/Honolulu"
        | "US/Eastern" | "US/Central" | "US/Mountain" | "US/Pacific" => "US",
        "America/Toronto" | "America/Vancouver" | "America/Edmonton" | "America/Winnipeg"
        | "America/Halifax" | "America/St_Johns" | "America/Regina" => "CA",
        _ => return None,
    };
    Some(country)
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Fixed(Month, u8, &'static str),
    /// Days relative to Easter Sunday.
    Easter(i64, &'static str),
    /// `n`-th weekday of the month; negative counts from the end.
    NthWeekday(Month, Weekday, i8, &'static str),
    /// Last given weekday on or before the day.
    WeekdayOnOrBefore(Month, u8, Weekday, &'static str),
}

impl Rule {
    fn name(self) -> &'static str {
        match self {
            Rule::Fixed(_, _, name)
            | Rule::Easter(_, name)
            | Rule::NthWeekday(_, _, _, name)
            | Rule::WeekdayOnOrBefore(_, _, _, name) => name,
        }
    }

    fn resolve(self, year: i32) -> Option<Date> {
        match self {
            Rule::Fixed(month, day, _) => Date::from_calendar_date(year, month, day).ok(),
            Rule::Easter(offset, _) => easter_sunday(year)?.checked_add(Duration::days(offset)),
            Rule::NthWeekday(month, weekday, n, _) => nth_weekday(year, month, weekday, n),
            Rule::WeekdayOnOrBefore(month, day, weekday, _) => {
                let mut date = Date::from_calendar_date(year, month, day).ok()?;
                while date.weekday() != weekday {
                    date = date.previous_day()?;
                }
                Some(date)
            }
        }
    }
}

const NEW_YEAR: Rule = Rule::Fixed(Month::January, 1, "New Year's Day");
const GOOD_FRIDAY: Rule = Rule::Easter(-2, "Good Friday");
const EASTER_MONDAY: Rule = Rule::Easter(1, "Easter Monday");
const ASCENSION: Rule = Rule::Easter(39, "Ascension Day");
const WHIT_MONDAY: Rule = Rule::Easter(50, "Whit Monday");
const LABOUR_DAY: Rule = Rule::Fixed(Month::May, 1, "Labour Day");
const CHRISTMAS: Rule = Rule::Fixed(Month::December, 25, "Christmas Day");
const BOXING_DAY: Rule = Rule::Fixed(Month::December, 26, "St. Stephen's Day");
const EPIPHANY: Rule = Rule::Fixed(Month::January, 6, "Epiphany");
const ASSUMPTION: Rule = Rule::Fixed(Month::August, 15, "Assumption Day");
const ALL_SAINTS: Rule = Rule::Fixed(Month::November, 1, "All Saints' Day");
const IMMACULATE_CONCEPTION: Rule = Rule::Fixed(Month::December, 8, "Immaculate Conception");

const DE: &[Rule] = &[
    NEW_YEAR,
    GOOD_FRIDAY,
    EASTER_MONDAY,
    LABOUR_DAY,
    ASCENSION,
    WHIT_MONDAY,
    Rule::Fixed(Month::October, 3, "German Unity Day"),
    CHRISTMAS,
    BOXING_DAY,
];

const AT: &[Rule] = &[
    NEW_YEAR,
    EPIPHANY,
    EASTER_MONDAY,
    LABOUR_DAY,
    ASCENSION,
    WHIT_MONDAY,
    Rule::Easter(60, "Corpus Christi"),
    ASSUMPTION,
    Rule::Fixed(Month::October, 26, "National Day"),
    ALL_SAINTS,
    IMMACULATE_CONCEPTION,
    CHRISTMAS,
    BOXING_DAY,
];

const CH: &[Rule] = &[
    NEW_YEAR,
    GOOD_FRIDAY,
    EASTER_MONDAY,
    ASCENSION,
    WHIT_MONDAY,
    Rule::Fixed(Month::August, 1, "Swiss National Day"),
    CHRISTMAS,
    BOXING_DAY,
];

const FR: &[Rule] = &[
    NEW_YEAR,
    EASTER_MONDAY,
    LABOUR_DAY,
    Rule::Fixed(Month::May, 8, "Victory in Europe Day"),
    ASCENSION,
    WHIT_MONDAY,
    Rule::Fixed(Month::July, 14, "Bastille Day"),
    ASSUMPTION,
    ALL_SAINTS,
    Rule::Fixed(Month::November, 11, "Armistice Day"),
    CHRISTMAS,
];

const GB: &[Rule] = &[
    NEW_YEAR,
    GOOD_FRIDAY,
    EASTER_MONDAY,
    Rule::NthWeekday(Month::May, Weekday::Monday, 1, "Early May Bank Holiday"),
    Rule::NthWeekday(Month::May, Weekday::Monday, -1, "Spring Bank Holiday"),
    Rule::NthWeekday(Month::August, Weekday::Monday, -1, "Summer Bank Holiday"),
    CHRISTMAS,
    Rule::Fixed(Month::December, 26, "Boxing Day"),
];

const NL: &[Rule] = &[
    NEW_YEAR,
    EASTER_MONDAY,
    Rule::Fixed(Month::April, 27, "King's Day"),
    Rule::Fixed(Month::May, 5, "Liberation Day"),
    ASCENSION,
    WHIT_MONDAY,
    CHRISTMAS,
    BOXING_DAY,
];

const IT: &[Rule] = &[
    NEW_YEAR,
    EPIPHANY,
    EASTER_MONDAY,
    Rule::Fixed(Month::April, 25, "Liberation Day"),
    LABOUR_DAY,
    Rule::Fixed(Month::June, 2, "Republic Day"),
    ASSUMPTION,
    ALL_SAINTS,
    IMMACULATE_CONCEPTION,
    CHRISTMAS,
    BOXING_DAY,
];

const ES: &[Rule] = &[
    NEW_YEAR,
    EPIPHANY,
    GOOD_FRIDAY,
    LABOUR_DAY,
    ASSUMPTION,
    Rule::Fixed(Month::October, 12, "National Day"),
    ALL_SAINTS,
    Rule::Fixed(Month::December, 6, "Constitution Day"),
    IMMACULATE_CONCEPTION,
    CHRISTMAS,
];

const US: &[Rule] = &[
    NEW_YEAR,
    Rule::NthWeekday(Month::January, Weekday::Monday, 3, "Martin Luther King Jr. Day"),
    Rule::NthWeekday(Month::February, Weekday::Monday, 3, "Washington's Birthday"),
    Rule::NthWeekday(Month::May, Weekday::Monday, -1, "Memorial Day"),
    Rule::Fixed(Month::June, 19, "Juneteenth"),
    Rule::Fixed(Month::July, 4, "Independence Day"),
    Rule::NthWeekday(Month::September, Weekday::Monday, 1, "Labor Day"),
    Rule::NthWeekday(Month::October, Weekday::Monday, 2, "Columbus Day"),
    Rule::Fixed(Month::November, 11, "Veterans Day"),
    Rule::NthWeekday(Month::November, Weekday::Thursday, 4, "Thanksgiving Day"),
    CHRISTMAS,
];

const CA: &[Rule] = &[
    NEW_YEAR,
    GOOD_FRIDAY,
    Rule::WeekdayOnOrBefore(Month::May, 24, Weekday::Monday, "Victoria Day"),
    Rule::Fixed(Month::July, 1, "Canada Day"),
    Rule::NthWeekday(Month::September, Weekday::Monday, 1, "Labour Day"),
    Rule::NthWeekday(Month::October, Weekday::Monday, 2, "Thanksgiving"),
    Rule::Fixed(Month::November, 11, "Remembrance Day"),
    CHRISTMAS,
    Rule::Fixed(Month::December, 26, "Boxing Day"),
];

/// Built-in holiday table computed from fixed-date, Easter-relative and
/// weekday-of-month rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleHolidayCalendar;

impl RuleHolidayCalendar {
    fn rules(country: &str) -> &'static [Rule] {
        match country.to_ascii_uppercase().as_str() {
            "DE" => DE,
            "AT" => AT,
            "CH" => CH,
            "FR" => FR,
            "GB" => GB,
            "NL" => NL,
            "IT" => IT,
            "ES" => ES,
            "US" => US,
            "CA" => CA,
            _ => &[],
        }
    }
}

impl HolidayCalendar for RuleHolidayCalendar {
    fn holiday_name(&self, country: &str, date: Date) -> Option<String> {
        Self::rules(country)
            .iter()
            .find(|rule| rule.resolve(date.year()) == Some(date))
            .map(|rule| rule.name().to_string())
    }

    fn holidays_in_year(&self, country: &str, year: i32) -> Vec<(Date, String)> {
        let mut holidays: Vec<(Date, String)> = Self::rules(country)
            .iter()
            .filter_map(|rule| rule.resolve(year).map(|date| (date, rule.name().to_string())))
            .collect();
        holidays.sort_by_key(|(date, _)| *date);
        holidays.dedup_by_key(|(date, _)| *date);
        holidays
    }
}

/// Easter Sunday in the Gregorian calendar (anonymous algorithm).
pub fn easter_sunday(year: i32) -> Option<Date> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

fn nth_weekday(year: i32, month: Month, weekday: Weekday, n: i8) -> Option<Date> {
    if n > 0 {
        let mut date = Date::from_calendar_date(year, month, 1).ok()?;
        while date.weekday() != weekday {
            date = date.next_day()?;
        }
        date.checked_add(Duration::weeks(i64::from(n - 1)))
            .filter(|candidate| candidate.month() == month)
    } else {
        let mut date = last_day_of_month(year, month)?;
        while date.weekday() != weekday {
            date = date.previous_day()?;
        }
        date.checked_sub(Duration::weeks(i64::from(-n - 1)))
            .filter(|candidate| candidate.month() == month)
    }
}

fn last_day_of_month(year: i32, month: Month) -> Option<Date> {
    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        other => (year, other.next()),
    };
    Date::from_calendar_date(next_year, next_month, 1)
        .ok()?
        .previous_day()
}
