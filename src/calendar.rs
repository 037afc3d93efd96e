use crate::filter::FilterState;
use crate::types::CrimeRecord;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

pub const LEVELS: u8 = 5;

/// Incidents per day for the calendar heatmap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalendarData {
    pub days: BTreeMap<NaiveDate, u32>,
    pub max: u32,
}

impl CalendarData {
    /// Counts dated records the filter admits; undated ones are left out.
    pub fn from_crimes(crimes: &[CrimeRecord], filter: &FilterState) -> Self {
        let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for crime in crimes.iter().filter(|c| filter.admits(&c.category)) {
            if let Some(date) = crime.date {
                *days.entry(date).or_default() += 1;
            }
        }
        let max = days.values().copied().max().unwrap_or(0);
        Self { days, max }
    }

    pub fn count(&self, date: NaiveDate) -> u32 {
        self.days.get(&date).copied().unwrap_or(0)
    }

    /// Heat level 0..LEVELS; 0 only for days without incidents.
    pub fn level(&self, date: NaiveDate) -> u8 {
        let count = self.count(date);
        if count == 0 || self.max == 0 {
            return 0;
        }
        let steps = u32::from(LEVELS - 1);
        (1 + (count * steps - 1) / self.max) as u8
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    /// Monday-aligned weeks spanning every counted day.
    pub fn weeks(&self) -> Vec<[NaiveDate; 7]> {
        let (Some(first), Some(last)) = (self.first_day(), self.last_day()) else {
            return Vec::new();
        };
        let mut monday = first - chrono::Duration::days(i64::from(first.weekday().num_days_from_monday()));
        let mut weeks = Vec::new();
        while monday <= last {
            let mut week = [monday; 7];
            for (offset, day) in week.iter_mut().enumerate() {
                *day = monday + chrono::Duration::days(offset as i64);
            }
            weeks.push(week);
            monday += chrono::Duration::days(7);
        }
        weeks
    }
}
