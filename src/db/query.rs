//! Filtered, sorted task listings.
//!
//! A [`TaskQuery`] is resolved from the `filter`, `q` and `sort` request
//! parameters. The filter and ordering run in SQL; calendar-day filters are
//! turned into half-open UTC millisecond ranges computed from the caller's
//! clock and time zone. The title search runs over the ordered rows so the
//! match is case-insensitive for any script, not just ASCII.

use super::Database;
use super::tasks::{DEFAULT_ORDER, TASK_COLUMNS, parse_task_row};
use crate::types::{Priority, Task};
use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

/// Named predicate selecting the base subset of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    Incomplete,
    Completed,
    /// Open tasks due on the current calendar date.
    Today,
    /// Open tasks due between today and seven days from today, inclusive.
    Week,
    All,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 5] = [
        TaskFilter::Incomplete,
        TaskFilter::Completed,
        TaskFilter::Today,
        TaskFilter::Week,
        TaskFilter::All,
    ];

    /// Parse a `filter` parameter value. Returns `None` for unknown names.
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "incomplete" => Some(TaskFilter::Incomplete),
            "completed" => Some(TaskFilter::Completed),
            "today" => Some(TaskFilter::Today),
            "week" => Some(TaskFilter::Week),
            "all" => Some(TaskFilter::All),
            _ => None,
        }
    }

    /// Resolve an optional parameter; missing or unknown values select `Incomplete`.
    pub fn resolve(param: Option<&str>) -> Self {
        param.and_then(Self::from_param).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskFilter::Incomplete => "incomplete",
            TaskFilter::Completed => "completed",
            TaskFilter::Today => "today",
            TaskFilter::Week => "week",
            TaskFilter::All => "all",
        }
    }

    /// Page heading for a listing with this filter.
    pub fn label(self) -> &'static str {
        match self {
            TaskFilter::Incomplete => "unfinished tasks",
            TaskFilter::Completed => "finished tasks",
            TaskFilter::Today => "today's tasks",
            TaskFilter::Week => "this week's tasks",
            TaskFilter::All => "all tasks",
        }
    }

    /// Number of calendar days covered by a date-window filter, starting today.
    fn window_days(self) -> Option<u64> {
        match self {
            TaskFilter::Today => Some(1),
            TaskFilter::Week => Some(8),
            _ => None,
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Open tasks first, then by ascending expiration.
    #[default]
    Default,
    /// Descending priority rank, then ascending expiration.
    Priority,
}

impl SortOrder {
    /// Only `priority` selects a non-default order.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("priority") => SortOrder::Priority,
            _ => SortOrder::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Default => "default",
            SortOrder::Priority => "priority",
        }
    }
}

/// A resolved listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    /// Case-insensitive title substring; never empty.
    pub search: Option<String>,
    pub sort: SortOrder,
}

impl TaskQuery {
    /// Build a query from raw request parameters.
    pub fn from_params(filter: Option<&str>, q: Option<&str>, sort: Option<&str>) -> Self {
        Self {
            filter: TaskFilter::resolve(filter),
            search: None,
            sort: SortOrder::from_param(sort),
        }
        .with_search(q)
    }

    pub fn with_filter(mut self, filter: TaskFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the title search; empty text clears it.
    pub fn with_search(mut self, q: Option<&str>) -> Self {
        self.search = q.filter(|q| !q.is_empty()).map(str::to_string);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Build the SELECT statement and its parameters, evaluated at `now`.
    pub(crate) fn to_sql<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> (String, Vec<i64>) {
        let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
        let mut conditions: Vec<String> = Vec::new();
        let mut params_vec: Vec<i64> = Vec::new();

        match self.filter {
            TaskFilter::Incomplete | TaskFilter::Today | TaskFilter::Week => {
                conditions.push("completed = 0".to_string());
            }
            TaskFilter::Completed => conditions.push("completed = 1".to_string()),
            TaskFilter::All => {}
        }

        if let Some(days) = self.filter.window_days() {
            let (start, end) = day_window(now, days);
            params_vec.push(start);
            params_vec.push(end);
            conditions.push(format!(
                "expiration_date >= ?{} AND expiration_date < ?{}",
                params_vec.len() - 1,
                params_vec.len()
            ));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        match self.sort {
            SortOrder::Default => {
                sql.push_str(" ORDER BY ");
                sql.push_str(DEFAULT_ORDER);
            }
            SortOrder::Priority => {
                sql.push_str(&format!(
                    " ORDER BY {} DESC, expiration_date ASC, id ASC",
                    priority_rank_sql()
                ));
            }
        }

        (sql, params_vec)
    }
}

/// SQL expression mapping the `priority` column to its rank.
pub fn priority_rank_sql() -> String {
    let arms: Vec<String> = Priority::ALL
        .iter()
        .map(|p| format!("WHEN '{}' THEN {}", p.code(), p.rank()))
        .collect();
    format!("CASE priority {} ELSE 0 END", arms.join(" "))
}

/// UTC millisecond timestamp of the start of local day `date` in `tz`.
///
/// When a transition skips midnight, the day starts at the first local
/// time that exists.
fn local_midnight_ms<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    // Gaps never exceed a day and start on whole minutes.
    (0..=24 * 60)
        .filter_map(|minutes| naive.checked_add_signed(TimeDelta::minutes(minutes)))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| {
            let offset = tz.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            naive.and_utc().timestamp_millis() - i64::from(offset) * 1000
        })
}

/// Half-open UTC millisecond range covering `days` calendar days from the
/// local date of `now`.
pub fn day_window<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> (i64, i64) {
    let tz = now.timezone();
    let today = now.date_naive();
    let last = today
        .checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX);
    (local_midnight_ms(&tz, today), local_midnight_ms(&tz, last))
}

/// Single-pass iterator over the tasks of a listing, in listing order.
#[derive(Debug)]
pub struct TaskIter {
    rows: std::vec::IntoIter<Task>,
    needle: Option<String>,
}

impl TaskIter {
    fn new(rows: Vec<Task>, search: Option<&str>) -> Self {
        Self {
            rows: rows.into_iter(),
            needle: search.map(str::to_lowercase),
        }
    }
}

impl Iterator for TaskIter {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        let needle = self.needle.as_deref();
        self.rows.find(|task| match needle {
            Some(needle) => task.title.to_lowercase().contains(needle),
            None => true,
        })
    }
}

impl Database {
    /// Run a listing query against the server's local clock.
    pub fn query_tasks(&self, query: &TaskQuery) -> Result<TaskIter> {
        self.query_tasks_at(query, &Local::now())
    }

    /// Run a listing query with calendar filters evaluated at `now`.
    pub fn query_tasks_at<Tz: TimeZone>(
        &self,
        query: &TaskQuery,
        now: &DateTime<Tz>,
    ) -> Result<TaskIter> {
        let (sql, params_vec) = query.to_sql(now);

        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(rusqlite::params_from_iter(params_vec.iter()), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })?;

        tracing::debug!(
            filter = query.filter.as_str(),
            sort = query.sort.as_str(),
            search = query.search.as_deref().unwrap_or(""),
            rows = rows.len(),
            "Task listing query"
        );

        Ok(TaskIter::new(rows, query.search.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn unknown_filter_falls_back_to_incomplete() {
        assert_eq!(TaskFilter::resolve(None), TaskFilter::Incomplete);
        assert_eq!(TaskFilter::resolve(Some("bogus")), TaskFilter::Incomplete);
        assert_eq!(TaskFilter::resolve(Some("week")), TaskFilter::Week);
        for filter in TaskFilter::ALL {
            assert_eq!(TaskFilter::from_param(filter.as_str()), Some(filter));
        }
    }

    #[test]
    fn only_priority_changes_sort() {
        assert_eq!(SortOrder::from_param(Some("priority")), SortOrder::Priority);
        assert_eq!(SortOrder::from_param(Some("title")), SortOrder::Default);
        assert_eq!(SortOrder::from_param(None), SortOrder::Default);
    }

    #[test]
    fn empty_search_is_ignored() {
        let query = TaskQuery::from_params(None, Some(""), None);
        assert!(query.search.is_none());

        let query = TaskQuery::from_params(Some("all"), Some("rent"), Some("priority"));
        assert_eq!(query.filter, TaskFilter::All);
        assert_eq!(query.search.as_deref(), Some("rent"));
        assert_eq!(query.sort, SortOrder::Priority);
    }

    #[test]
    fn rank_expression_covers_every_priority() {
        assert_eq!(
            priority_rank_sql(),
            "CASE priority WHEN 'H' THEN 3 WHEN 'M' THEN 2 WHEN 'L' THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn day_window_uses_local_midnight() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        // 2024-05-10 01:30 at +03:00 is still 2024-05-09 in UTC
        let now = tz.with_ymd_and_hms(2024, 5, 10, 1, 30, 0).unwrap();

        let (start, end) = day_window(&now, 1);
        let expected_start = tz.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let expected_end = tz.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap();
        assert_eq!(start, expected_start.timestamp_millis());
        assert_eq!(end, expected_end.timestamp_millis());

        let (_, week_end) = day_window(&now, 8);
        let expected_week_end = tz.with_ymd_and_hms(2024, 5, 18, 0, 0, 0).unwrap();
        assert_eq!(week_end, expected_week_end.timestamp_millis());
    }

    /// Zone at -04:00 that jumps to -03:00 at local midnight of 2024-09-08,
    /// so that midnight never happens.
    #[derive(Debug, Clone, Copy)]
    struct SkippedMidnight;

    impl SkippedMidnight {
        fn switch_utc() -> chrono::NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 9, 8)
                .unwrap()
                .and_hms_opt(4, 0, 0)
                .unwrap()
        }

        fn before() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn after() -> FixedOffset {
            FixedOffset::west_opt(3 * 3600).unwrap()
        }
    }

    impl TimeZone for SkippedMidnight {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SkippedMidnight
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> chrono::MappedLocalTime<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(
            &self,
            local: &chrono::NaiveDateTime,
        ) -> chrono::MappedLocalTime<FixedOffset> {
            let gap_start = Self::switch_utc() - TimeDelta::hours(4);
            let gap_end = gap_start + TimeDelta::hours(1);
            if *local < gap_start {
                chrono::MappedLocalTime::Single(Self::before())
            } else if *local < gap_end {
                chrono::MappedLocalTime::None
            } else {
                chrono::MappedLocalTime::Single(Self::after())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &chrono::NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch_utc() {
                Self::before()
            } else {
                Self::after()
            }
        }
    }

    #[test]
    fn skipped_midnight_starts_day_at_first_valid_instant() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap();
        assert_eq!(
            local_midnight_ms(&SkippedMidnight, date),
            expected.timestamp_millis()
        );

        // Days without a transition are plain midnight.
        let before = NaiveDate::from_ymd_opt(2024, 9, 7).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 9, 7, 4, 0, 0).unwrap();
        assert_eq!(
            local_midnight_ms(&SkippedMidnight, before),
            expected.timestamp_millis()
        );
    }

    #[test]
    fn sql_for_each_filter() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

        let (sql, params) = TaskQuery::default().to_sql(&now);
        assert!(sql.ends_with("WHERE completed = 0 ORDER BY completed ASC, expiration_date ASC, id ASC"));
        assert!(params.is_empty());

        let (sql, _) = TaskQuery::default().with_filter(TaskFilter::All).to_sql(&now);
        assert!(!sql.contains("WHERE"));

        let (sql, _) = TaskQuery::default()
            .with_filter(TaskFilter::Completed)
            .to_sql(&now);
        assert!(sql.contains("WHERE completed = 1"));

        let (sql, params) = TaskQuery::default()
            .with_filter(TaskFilter::Today)
            .to_sql(&now);
        assert!(sql.contains("completed = 0 AND expiration_date >= ?1 AND expiration_date < ?2"));
        assert_eq!(params.len(), 2);
        assert_eq!(params[1] - params[0], 24 * 3600 * 1000);

        let (sql, _) = TaskQuery::default()
            .with_sort(SortOrder::Priority)
            .to_sql(&now);
        assert!(sql.contains("ELSE 0 END DESC, expiration_date ASC"));
    }
}
