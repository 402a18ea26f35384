use chrono::NaiveDate;

use crate::calendar::{self, CalendarGrid, Direction, Granularity};
use crate::filter::{self, StatusFilter};
use crate::summary::{self, AggregateSummary};
use crate::task::Task;

/// Everything one view change needs, computed in a single pass over the
/// caller-owned collection. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct Projection {
    pub grid: CalendarGrid,
    pub summary: AggregateSummary,
    pub visible: Vec<Task>,
}

#[tracing::instrument(skip(tasks), fields(task_count = tasks.len()))]
pub fn project(
    tasks: &[Task],
    reference: NaiveDate,
    granularity: Granularity,
    status_filter: StatusFilter,
) -> anyhow::Result<Projection> {
    let grid = calendar::build_grid(tasks, reference, granularity)?;
    // The summary always covers the unfiltered collection; only the visible
    // list honors the status tab.
    let summary = summary::summarize(tasks);
    let visible = filter::visible_tasks(status_filter, tasks);

    Ok(Projection {
        grid,
        summary,
        visible,
    })
}

pub fn advance(reference: NaiveDate, granularity: Granularity, direction: Direction) -> NaiveDate {
    calendar::advance(reference, granularity, direction)
}
