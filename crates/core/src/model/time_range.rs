use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use tuneline_protocol::TimeRange;

/// Quick-pick windows offered by the range picker, in days.
pub const PRESETS: [u32; 4] = [7, 30, 90, 365];

/// How far (in days) a range may drift from a preset's canonical endpoints
/// and still count as that preset. Absorbs day-boundary crossings between
/// two reads of "now".
const PRESET_TOLERANCE_DAYS: i64 = 1;

/// Source of "now". Swapped for [`FixedClock`] in tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// First instant of `date` in the display offset, or `None` when that
/// instant falls outside the representable range.
pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    date.and_time(NaiveTime::MIN)
        .checked_sub_signed(shift)
        .map(|t| t.and_utc())
}

/// Last millisecond of `date` in the display offset.
pub fn end_of_day(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    start_of_day(date, offset)?
        .checked_add_signed(TimeDelta::days(1))?
        .checked_sub_signed(TimeDelta::milliseconds(1))
}

/// Calendar date of `at` in the display offset.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// The selected window plus the rules for editing it.
///
/// Every mutator either applies fully or leaves the range untouched and
/// returns `false`; an edit that would put `start` after `end` is rejected
/// rather than swapped.
#[derive(Debug, Clone)]
pub struct TimeRangeModel<C: Clock = SystemClock> {
    range: TimeRange,
    offset: FixedOffset,
    clock: C,
}

impl<C: Clock> TimeRangeModel<C> {
    /// Start with the `default_days` preset.
    pub fn new(clock: C, offset: FixedOffset, default_days: u32) -> Self {
        let today = local_date(clock.now(), offset);
        Self {
            range: preset_window(today, offset, default_days),
            offset,
            clock,
        }
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn today(&self) -> NaiveDate {
        local_date(self.clock.now(), self.offset)
    }

    /// Canonical window for "last `n_days` days": from the start of the day
    /// `n_days` ago to the end of today.
    pub fn preset(&self, n_days: u32) -> TimeRange {
        preset_window(self.today(), self.offset, n_days)
    }

    pub fn apply_preset(&mut self, n_days: u32) -> TimeRange {
        self.range = self.preset(n_days);
        self.range
    }

    /// Whether the current window is (within a day) the `n_days` preset.
    pub fn is_preset_active(&self, n_days: u32) -> bool {
        let canonical = self.preset(n_days);
        let tolerance = TimeDelta::days(PRESET_TOLERANCE_DAYS);
        (self.range.start - canonical.start).abs() <= tolerance
            && (self.range.end - canonical.end).abs() <= tolerance
    }

    /// The preset the current window matches, if any.
    pub fn active_preset(&self) -> Option<u32> {
        PRESETS.into_iter().find(|&days| self.is_preset_active(days))
    }

    /// Move the start to the beginning of `date`.
    pub fn set_start(&mut self, date: NaiveDate) -> bool {
        let Some(start) = start_of_day(date, self.offset) else {
            return false;
        };
        if start > self.range.end {
            return false;
        }
        self.range.start = start;
        true
    }

    /// Move the end to the close of `date`, never past now.
    pub fn set_end(&mut self, date: NaiveDate) -> bool {
        let Some(end) = end_of_day(date, self.offset) else {
            return false;
        };
        let end = end.min(self.clock.now());
        if end < self.range.start {
            return false;
        }
        self.range.end = end;
        true
    }

    /// Replace the whole window. The end is clamped to now before the
    /// ordering check.
    pub fn set_range(&mut self, range: TimeRange) -> bool {
        let end = range.end.min(self.clock.now());
        if range.start > end {
            return false;
        }
        self.range = TimeRange::new(range.start, end);
        true
    }

    /// Move the start by whole days relative to its current calendar date.
    pub fn shift_start(&mut self, days: i64) -> bool {
        match shift_date(local_date(self.range.start, self.offset), days) {
            Some(date) => self.set_start(date),
            None => false,
        }
    }

    /// Move the end by whole days relative to its current calendar date.
    pub fn shift_end(&mut self, days: i64) -> bool {
        match shift_date(local_date(self.range.end, self.offset), days) {
            Some(date) => self.set_end(date),
            None => false,
        }
    }
}

fn preset_window(today: NaiveDate, offset: FixedOffset, n_days: u32) -> TimeRange {
    let first = today
        .checked_sub_days(Days::new(u64::from(n_days)))
        .unwrap_or(NaiveDate::MIN);
    let start = start_of_day(first, offset).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = end_of_day(today, offset).unwrap_or(DateTime::<Utc>::MAX_UTC);
    TimeRange::new(start, end)
}

fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let step = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    }
}
