use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::{Datelike, Days, Months, NaiveDate};
use tracing::debug;

use crate::duedate;
use crate::task::Task;

/// Weekday header emitted once per monthly/weekly grid. Index 0 is Sunday,
/// matching the week layout the rest of the calendar arithmetic uses.
pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Monthly,
    Weekly,
    Daily,
}

impl Granularity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Some(Self::Monthly),
            "weekly" | "week" => Some(Self::Weekly),
            "daily" | "day" => Some(Self::Daily),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Back,
    Forward,
}

#[derive(Debug, Clone)]
pub struct CalendarCell {
    pub date: NaiveDate,
    /// False on the lead/trail cells that pad a month grid to whole weeks.
    pub in_current_period: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct HourSlot {
    pub hour: u32,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub enum CalendarGrid {
    Monthly { weeks: Vec<Vec<CalendarCell>> },
    Weekly { days: Vec<CalendarCell> },
    Daily { date: NaiveDate, hours: Vec<HourSlot> },
}

/// Builds the grid for one granularity anchored at `reference`, bucketing
/// every task whose due date normalizes to a cell's date into that cell.
/// Tasks with absent or unparseable due dates appear in no cell. The only
/// error is a reference date whose grid arithmetic leaves chrono's
/// representable range.
pub fn build_grid(
    tasks: &[Task],
    reference: NaiveDate,
    granularity: Granularity,
) -> anyhow::Result<CalendarGrid> {
    let buckets = bucket_by_date(tasks);
    debug!(
        reference = %reference,
        granularity = granularity.as_str(),
        dated_tasks = buckets.values().map(Vec::len).sum::<usize>(),
        "building calendar grid"
    );

    match granularity {
        Granularity::Monthly => build_monthly(&buckets, reference),
        Granularity::Weekly => build_weekly(&buckets, reference),
        Granularity::Daily => Ok(build_daily(tasks, reference)),
    }
}

/// Shifts the reference date by one grid unit. Total: month arithmetic
/// clamps to the last valid day of the target month (Jan 31 forward lands
/// on Feb 28/29), and a shift that would leave the representable date range
/// leaves the reference unchanged.
pub fn advance(reference: NaiveDate, granularity: Granularity, direction: Direction) -> NaiveDate {
    let shifted = match (granularity, direction) {
        (Granularity::Monthly, Direction::Forward) => reference.checked_add_months(Months::new(1)),
        (Granularity::Monthly, Direction::Back) => reference.checked_sub_months(Months::new(1)),
        (Granularity::Weekly, Direction::Forward) => reference.checked_add_days(Days::new(7)),
        (Granularity::Weekly, Direction::Back) => reference.checked_sub_days(Days::new(7)),
        (Granularity::Daily, Direction::Forward) => reference.checked_add_days(Days::new(1)),
        (Granularity::Daily, Direction::Back) => reference.checked_sub_days(Days::new(1)),
    };
    shifted.unwrap_or(reference)
}

/// One normalization pass over the collection; cells then look their date up
/// here. Comparison happens on the canonical date, so different raw encodings
/// of the same calendar day collide into the same bucket.
fn bucket_by_date(tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<Task>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        let Some(date) = task.due_date.as_deref().and_then(duedate::normalize) else {
            continue;
        };
        buckets.entry(date).or_default().push(task.clone());
    }
    buckets
}

fn build_monthly(
    buckets: &BTreeMap<NaiveDate, Vec<Task>>,
    reference: NaiveDate,
) -> anyhow::Result<CalendarGrid> {
    let first = NaiveDate::from_ymd_opt(reference.year(), reference.month(), 1)
        .ok_or_else(|| anyhow!("invalid reference date: {reference}"))?;
    let next_first = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| anyhow!("reference date out of range: {reference}"))?;
    let days_in_month = (next_first - first).num_days() as usize;

    let lead = first.weekday().num_days_from_sunday() as usize;
    let start = first
        .checked_sub_days(Days::new(lead as u64))
        .ok_or_else(|| anyhow!("reference date out of range: {reference}"))?;

    let rows = (days_in_month + lead).div_ceil(7);
    let mut weeks = Vec::with_capacity(rows);
    let mut week = Vec::with_capacity(7);

    for offset in 0..rows * 7 {
        let date = start
            .checked_add_days(Days::new(offset as u64))
            .ok_or_else(|| anyhow!("reference date out of range: {reference}"))?;
        week.push(cell_for(
            buckets,
            date,
            date.year() == reference.year() && date.month() == reference.month(),
        ));
        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }
    }

    Ok(CalendarGrid::Monthly { weeks })
}

fn build_weekly(
    buckets: &BTreeMap<NaiveDate, Vec<Task>>,
    reference: NaiveDate,
) -> anyhow::Result<CalendarGrid> {
    let back = reference.weekday().num_days_from_sunday() as u64;
    let start = reference
        .checked_sub_days(Days::new(back))
        .ok_or_else(|| anyhow!("reference date out of range: {reference}"))?;

    let mut days = Vec::with_capacity(7);
    for offset in 0..7u64 {
        let date = start
            .checked_add_days(Days::new(offset))
            .ok_or_else(|| anyhow!("reference date out of range: {reference}"))?;
        days.push(cell_for(buckets, date, true));
    }

    Ok(CalendarGrid::Weekly { days })
}

fn build_daily(tasks: &[Task], reference: NaiveDate) -> CalendarGrid {
    let mut day_tasks: Vec<Task> = tasks
        .iter()
        .filter(|task| task.due_date.as_deref().and_then(duedate::normalize) == Some(reference))
        .cloned()
        .collect();

    // Stable sort: within an hour, ties keep collection order; a missing
    // clock reading sorts first.
    day_tasks.sort_by_key(|task| task.due_date.as_deref().and_then(duedate::due_datetime));

    let mut hours: Vec<HourSlot> = (0..24)
        .map(|hour| HourSlot {
            hour,
            tasks: Vec::new(),
        })
        .collect();

    for task in day_tasks {
        let hour = task
            .due_date
            .as_deref()
            .and_then(duedate::due_hour)
            .unwrap_or(0);
        hours[hour as usize].tasks.push(task);
    }

    CalendarGrid::Daily {
        date: reference,
        hours,
    }
}

fn cell_for(
    buckets: &BTreeMap<NaiveDate, Vec<Task>>,
    date: NaiveDate,
    in_current_period: bool,
) -> CalendarCell {
    CalendarCell {
        date,
        in_current_period,
        tasks: buckets.get(&date).cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn task_due(title: &str, due: Option<&str>) -> Task {
        let mut task = Task::new(title.to_string(), Utc::now());
        task.due_date = due.map(str::to_string);
        task
    }

    fn month_cells(grid: &CalendarGrid) -> Vec<&CalendarCell> {
        match grid {
            CalendarGrid::Monthly { weeks } => weeks.iter().flatten().collect(),
            other => panic!("expected monthly grid, got {other:?}"),
        }
    }

    #[test]
    fn monthly_rows_are_whole_weeks() {
        // October 2025 starts on a Wednesday: (31 + 3) / 7 rounds up to 5.
        let grid = build_grid(&[], date(2025, 10, 7), Granularity::Monthly).expect("grid");
        let CalendarGrid::Monthly { weeks } = &grid else {
            panic!("expected monthly grid");
        };
        assert_eq!(weeks.len(), 5);
        assert!(weeks.iter().all(|week| week.len() == 7));
    }

    #[test]
    fn monthly_cells_are_contiguous() {
        let grid = build_grid(&[], date(2025, 10, 7), Granularity::Monthly).expect("grid");
        let cells = month_cells(&grid);
        for pair in cells.windows(2) {
            assert_eq!(pair[1].date, pair[0].date.succ_opt().expect("in range"));
        }
    }

    #[test]
    fn monthly_lead_and_trail_cells_are_marked() {
        let grid = build_grid(&[], date(2025, 10, 7), Granularity::Monthly).expect("grid");
        let cells = month_cells(&grid);

        assert_eq!(cells[0].date, date(2025, 9, 28));
        assert!(!cells[0].in_current_period);
        assert_eq!(cells[3].date, date(2025, 10, 1));
        assert!(cells[3].in_current_period);

        let current: usize = cells.iter().filter(|c| c.in_current_period).count();
        assert_eq!(current, 31);
    }

    #[test]
    fn february_starting_on_sunday_needs_no_lead_row() {
        // February 2026 starts on a Sunday and has 28 days: exactly 4 rows.
        let grid = build_grid(&[], date(2026, 2, 14), Granularity::Monthly).expect("grid");
        let CalendarGrid::Monthly { weeks } = &grid else {
            panic!("expected monthly grid");
        };
        assert_eq!(weeks.len(), 4);
        assert!(month_cells(&grid).iter().all(|c| c.in_current_period));
    }

    #[test]
    fn equal_calendar_days_in_different_encodings_share_a_cell() {
        let tasks = vec![
            task_due("iso", Some("2025-10-07T18:03:00.000Z")),
            task_due("db", Some("2025-10-07 18:03:00+00")),
            task_due("plain", Some("2025-10-07")),
            task_due("other day", Some("2025-10-08 09:15:00+00")),
            task_due("undated", None),
        ];

        let grid = build_grid(&tasks, date(2025, 10, 1), Granularity::Monthly).expect("grid");
        let cells = month_cells(&grid);

        let oct7 = cells
            .iter()
            .find(|c| c.date == date(2025, 10, 7))
            .expect("cell");
        assert_eq!(oct7.tasks.len(), 3);

        let oct8 = cells
            .iter()
            .find(|c| c.date == date(2025, 10, 8))
            .expect("cell");
        assert_eq!(oct8.tasks.len(), 1);
    }

    #[test]
    fn undated_and_malformed_tasks_reach_no_cell() {
        let tasks = vec![
            task_due("undated", None),
            task_due("garbage", Some("soonish")),
            task_due("invalid day", Some("2025-02-30")),
        ];

        let grid = build_grid(&tasks, date(2025, 2, 1), Granularity::Monthly).expect("grid");
        assert!(month_cells(&grid).iter().all(|c| c.tasks.is_empty()));
    }

    #[test]
    fn lead_and_trail_cells_still_bucket_tasks() {
        // Sep 30 falls on the lead row of the October 2025 grid; it is a real
        // date and keeps its tasks.
        let tasks = vec![task_due("lead", Some("2025-09-30"))];
        let grid = build_grid(&tasks, date(2025, 10, 1), Granularity::Monthly).expect("grid");
        let cell = month_cells(&grid)
            .into_iter()
            .find(|c| c.date == date(2025, 9, 30))
            .expect("lead cell");
        assert!(!cell.in_current_period);
        assert_eq!(cell.tasks.len(), 1);
    }

    #[test]
    fn weekly_grid_is_seven_contiguous_current_cells() {
        // 2025-10-07 is a Tuesday; its week starts Sunday 2025-10-05.
        let grid = build_grid(&[], date(2025, 10, 7), Granularity::Weekly).expect("grid");
        let CalendarGrid::Weekly { days } = &grid else {
            panic!("expected weekly grid");
        };
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, date(2025, 10, 5));
        assert_eq!(days[6].date, date(2025, 10, 11));
        assert!(days.iter().all(|c| c.in_current_period));
    }

    #[test]
    fn weekly_start_is_stable_across_the_week() {
        for day in 5..=11 {
            let grid = build_grid(&[], date(2025, 10, day), Granularity::Weekly).expect("grid");
            let CalendarGrid::Weekly { days } = &grid else {
                panic!("expected weekly grid");
            };
            assert_eq!(days[0].date, date(2025, 10, 5));
        }
    }

    #[test]
    fn daily_grid_buckets_by_hour_in_clock_order() {
        let tasks = vec![
            task_due("evening", Some("2025-10-07T18:03:00.000Z")),
            task_due("morning", Some("2025-10-07 09:15:00+00")),
            task_due("midnight", Some("2025-10-07")),
            task_due("elsewhere", Some("2025-10-08")),
            task_due("undated", None),
        ];

        let grid = build_grid(&tasks, date(2025, 10, 7), Granularity::Daily).expect("grid");
        let CalendarGrid::Daily { date: day, hours } = &grid else {
            panic!("expected daily grid");
        };
        assert_eq!(*day, date(2025, 10, 7));
        assert_eq!(hours.len(), 24);

        assert_eq!(hours[0].tasks.len(), 1);
        assert_eq!(hours[0].tasks[0].title, "midnight");
        assert_eq!(hours[9].tasks.len(), 1);
        assert_eq!(hours[18].tasks.len(), 1);

        let total: usize = hours.iter().map(|slot| slot.tasks.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn empty_collection_yields_empty_grid_everywhere() {
        for granularity in [Granularity::Monthly, Granularity::Weekly, Granularity::Daily] {
            let grid = build_grid(&[], date(2025, 10, 7), granularity).expect("grid");
            match grid {
                CalendarGrid::Monthly { weeks } => {
                    assert!(weeks.iter().flatten().all(|c| c.tasks.is_empty()));
                }
                CalendarGrid::Weekly { days } => {
                    assert!(days.iter().all(|c| c.tasks.is_empty()));
                }
                CalendarGrid::Daily { hours, .. } => {
                    assert!(hours.iter().all(|slot| slot.tasks.is_empty()));
                }
            }
        }
    }

    #[test]
    fn advance_round_trips_for_each_granularity() {
        let reference = date(2025, 10, 15);
        for granularity in [Granularity::Monthly, Granularity::Weekly, Granularity::Daily] {
            let forward = advance(reference, granularity, Direction::Forward);
            assert_ne!(forward, reference);
            assert_eq!(advance(forward, granularity, Direction::Back), reference);
        }
    }

    #[test]
    fn month_advance_clamps_at_month_end() {
        let jan31 = date(2025, 1, 31);
        let feb = advance(jan31, Granularity::Monthly, Direction::Forward);
        assert_eq!(feb, date(2025, 2, 28));

        // The clamp makes the round trip asymmetric on purpose.
        let mar = advance(feb, Granularity::Monthly, Direction::Forward);
        assert_eq!(mar, date(2025, 3, 28));
        assert_ne!(
            advance(feb, Granularity::Monthly, Direction::Back),
            jan31
        );
    }

    #[test]
    fn leap_year_february_keeps_day_29() {
        let jan31 = date(2024, 1, 31);
        assert_eq!(
            advance(jan31, Granularity::Monthly, Direction::Forward),
            date(2024, 2, 29)
        );
    }
}
