use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::search_data::ServiceId;

/// A weekly service pattern from calendar.txt: the service runs on the
/// flagged weekdays within the inclusive date window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRule {
    pub service_id: ServiceId,
    /// indexed by days from Monday
    pub weekdays: [bool; 7],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionKind {
    Added,
    Removed,
}

/// A date-specific override from calendar_dates.txt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarException {
    pub service_id: ServiceId,
    pub date: NaiveDate,
    pub kind: ExceptionKind,
}

/// Resolves a calendar date to the set of services running on it.
/// Exceptions override rules: an added service runs regardless of any rule,
/// a removed service does not run even if a rule matches.
#[derive(Serialize, Deserialize)]
pub struct ServiceCalendar {
    rules: Vec<CalendarRule>,
    exceptions: HashMap<NaiveDate, HashMap<ServiceId, ExceptionKind>>,
}

impl ServiceCalendar {
    pub fn new(rules: Vec<CalendarRule>, exceptions: Vec<CalendarException>) -> ServiceCalendar {
        let mut by_date: HashMap<NaiveDate, HashMap<ServiceId, ExceptionKind>> = HashMap::new();
        for exception in exceptions {
            by_date
                .entry(exception.date)
                .or_default()
                .insert(exception.service_id, exception.kind);
        }
        ServiceCalendar {
            rules,
            exceptions: by_date,
        }
    }

    /// The set of service ids active on the given date
    pub fn active_services(&self, date: NaiveDate) -> HashSet<ServiceId> {
        let overrides = self.exceptions.get(&date);
        let mut active = HashSet::new();
        if let Some(overrides) = overrides {
            for (service_id, kind) in overrides {
                if *kind == ExceptionKind::Added {
                    active.insert(service_id.clone());
                }
            }
        }
        let weekday = date.weekday().num_days_from_monday() as usize;
        for rule in &self.rules {
            if overrides
                .map(|o| o.contains_key(&rule.service_id))
                .unwrap_or(false)
            {
                continue; // the exception already decided this service
            }
            if rule.start_date <= date && date <= rule.end_date && rule.weekdays[weekday] {
                active.insert(rule.service_id.clone());
            }
        }
        active
    }
}
