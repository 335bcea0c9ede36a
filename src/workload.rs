//! Two-week workload for the logged-in user.

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::Value;

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::Result;
use crate::models::CalendarDetail;
use crate::week::DateWindow;

/// Capacity assumed for each weekday.
pub const HOURS_PER_WORKDAY: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Low,
    Medium,
    High,
}

impl Availability {
    /// Up to 20% free is low, up to 40% medium, above that high.
    pub fn classify(percent: f64) -> Self {
        if percent <= 20.0 {
            Self::Low
        } else if percent <= 40.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub allocated: f64,
    pub worked: f64,
}

impl WorkloadDay {
    pub fn is_workday(&self) -> bool {
        !matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub window: DateWindow,
    pub days: Vec<WorkloadDay>,
}

impl Workload {
    /// Sums allocations and worked time per day of `window`.
    pub fn from_calendar(window: DateWindow, today: NaiveDate, rows: Vec<CalendarDetail>) -> Self {
        let mut days: Vec<WorkloadDay> = window
            .days()
            .into_iter()
            .map(|date| WorkloadDay { date, is_today: date == today, allocated: 0.0, worked: 0.0 })
            .collect();
        for row in rows {
            for slot in row.allocation {
                if let Some(day) = slot.planned_day().and_then(|d| days.iter_mut().find(|x| x.date == d)) {
                    day.allocated += slot.hours.into_hours();
                }
            }
            for t in row.time {
                if let Some(day) = t.worked_date.and_then(|d| days.iter_mut().find(|x| x.date == d)) {
                    day.worked += t.hours.into_hours();
                }
            }
        }
        Self { window, days }
    }

    pub fn total_allocated(&self) -> f64 {
        self.days.iter().map(|d| d.allocated).sum()
    }

    pub fn available_hours(&self) -> f64 {
        self.days.iter().filter(|d| d.is_workday()).count() as f64 * HOURS_PER_WORKDAY
    }

    /// Percentage of capacity left unallocated, never negative.
    pub fn availability(&self) -> f64 {
        let available = self.available_hours();
        if available <= 0.0 {
            return 0.0;
        }
        ((available - self.total_allocated()) / available * 100.0).max(0.0)
    }

    pub fn availability_class(&self) -> Availability {
        Availability::classify(self.availability())
    }
}

pub async fn load(api: &ApiClient, user_id: &str, window: DateWindow, today: NaiveDate) -> Result<Workload> {
    let raw: Value = api
        .get(
            "planner/calendardetail/",
            &[
                ("userId", Some(user_id.to_string())),
                ("start", Some(window.start.to_string())),
                ("end", Some(window.end().to_string())),
            ],
        )
        .await?;
    Ok(Workload::from_calendar(window, today, parse::parse_calendar_detail(&raw)))
}
