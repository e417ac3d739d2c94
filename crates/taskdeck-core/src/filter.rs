use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

impl StatusFilter {
  pub fn as_str(self) -> &'static str {
    match self {
      | StatusFilter::All => "all",
      | StatusFilter::Pending => {
        "pending"
      }
      | StatusFilter::Completed => {
        "completed"
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" | "" => {
        Ok(StatusFilter::All)
      }
      | "pending" | "open" => {
        Ok(StatusFilter::Pending)
      }
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | other => Err(anyhow!(
        "status must be all, pending, \
         or completed (got {other})"
      ))
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("all")
    {
      return Ok(PriorityFilter::All);
    }
    trimmed
      .parse::<Priority>()
      .map(PriorityFilter::Only)
      .map_err(|e| anyhow!("{e}"))
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortKey {
  #[default]
  DueDate,
  Priority,
  CreatedAt,
  Title
}

impl SortKey {
  /// Name used by the API's `sort`
  /// query parameter.
  pub fn as_str(self) -> &'static str {
    match self {
      | SortKey::DueDate => "dueDate",
      | SortKey::Priority => "priority",
      | SortKey::CreatedAt => {
        "createdAt"
      }
      | SortKey::Title => "title"
    }
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .replace(['-', '_'], "")
      .as_str()
    {
      | "duedate" | "due" => {
        Ok(SortKey::DueDate)
      }
      | "priority" => {
        Ok(SortKey::Priority)
      }
      | "createdat" | "created" => {
        Ok(SortKey::CreatedAt)
      }
      | "title" => Ok(SortKey::Title),
      | other => Err(anyhow!(
        "sort must be dueDate, \
         priority, createdAt, or title \
         (got {other})"
      ))
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortOrder {
  #[default]
  Asc,
  Desc
}

impl FromStr for SortOrder {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "asc" | "ascending" => {
        Ok(SortOrder::Asc)
      }
      | "desc" | "descending" => {
        Ok(SortOrder::Desc)
      }
      | other => Err(anyhow!(
        "order must be asc or desc \
         (got {other})"
      ))
    }
  }
}

/// Ephemeral view settings. Every field
/// is always populated; "no constraint"
/// is `All` or an empty search.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct FilterSpec {
  pub status:   StatusFilter,
  pub priority: PriorityFilter,
  pub search:   String,
  pub sort_by:  SortKey,
  pub order:    SortOrder
}

impl FilterSpec {
  pub fn has_filters(&self) -> bool {
    self.status != StatusFilter::All
      || self.priority
        != PriorityFilter::All
      || !self.search.is_empty()
  }

  pub fn clear(&mut self) {
    *self = Self::default();
  }
}

impl fmt::Display for FilterSpec {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let priority = match self.priority {
      | PriorityFilter::All => "all",
      | PriorityFilter::Only(p) => {
        p.as_str()
      }
    };
    write!(
      f,
      "status={} priority={} \
       search={:?} sort={}{}",
      self.status.as_str(),
      priority,
      self.search,
      if self.order == SortOrder::Desc {
        "-"
      } else {
        ""
      },
      self.sort_by.as_str()
    )
  }
}

pub fn filter_by_status(
  tasks: &[Task],
  status: StatusFilter
) -> Vec<Task> {
  match status {
    | StatusFilter::All => {
      tasks.to_vec()
    }
    | StatusFilter::Pending => tasks
      .iter()
      .filter(|t| !t.completed)
      .cloned()
      .collect(),
    | StatusFilter::Completed => tasks
      .iter()
      .filter(|t| t.completed)
      .cloned()
      .collect()
  }
}

pub fn filter_by_priority(
  tasks: &[Task],
  priority: PriorityFilter
) -> Vec<Task> {
  match priority {
    | PriorityFilter::All => {
      tasks.to_vec()
    }
    | PriorityFilter::Only(wanted) => {
      tasks
        .iter()
        .filter(|t| t.priority == wanted)
        .cloned()
        .collect()
    }
  }
}

/// Case-insensitive substring match on
/// title or description; blank queries
/// match everything.
pub fn filter_by_search(
  tasks: &[Task],
  query: &str
) -> Vec<Task> {
  if query.trim().is_empty() {
    return tasks.to_vec();
  }

  let q = query.to_lowercase();
  tasks
    .iter()
    .filter(|task| {
      task
        .title
        .to_lowercase()
        .contains(&q)
        || task
          .description
          .to_lowercase()
          .contains(&q)
    })
    .cloned()
    .collect()
}

/// Stable sort. Tasks without a due
/// date always trail when sorting by due
/// date, whatever the order.
pub fn sort(
  tasks: &[Task],
  key: SortKey,
  order: SortOrder
) -> Vec<Task> {
  let mut sorted = tasks.to_vec();
  sorted.sort_by(|a, b| {
    compare(a, b, key, order)
  });
  sorted
}

fn directed(
  ord: Ordering,
  order: SortOrder
) -> Ordering {
  match order {
    | SortOrder::Asc => ord,
    | SortOrder::Desc => ord.reverse()
  }
}

fn compare(
  a: &Task,
  b: &Task,
  key: SortKey,
  order: SortOrder
) -> Ordering {
  match key {
    | SortKey::DueDate => {
      match (a.due_date, b.due_date) {
        | (None, None) => Ordering::Equal,
        | (None, Some(_)) => {
          Ordering::Greater
        }
        | (Some(_), None) => {
          Ordering::Less
        }
        | (Some(x), Some(y)) => {
          directed(x.cmp(&y), order)
        }
      }
    }
    | SortKey::Priority => directed(
      b.priority
        .rank()
        .cmp(&a.priority.rank()),
      order
    ),
    | SortKey::Title => directed(
      compare_titles(&a.title, &b.title),
      order
    ),
    | SortKey::CreatedAt => directed(
      a.created_at.cmp(&b.created_at),
      order
    )
  }
}

fn compare_titles(
  a: &str,
  b: &str
) -> Ordering {
  a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| a.cmp(b))
}

/// status → priority → search → sort.
#[tracing::instrument(skip_all, fields(count = tasks.len(), spec = %spec))]
pub fn apply(
  tasks: &[Task],
  spec: &FilterSpec
) -> Vec<Task> {
  let result =
    filter_by_status(tasks, spec.status);
  let result = filter_by_priority(
    &result,
    spec.priority
  );
  let result =
    filter_by_search(&result, &spec.search);
  let result = sort(
    &result,
    spec.sort_by,
    spec.order
  );
  trace!(
    visible = result.len(),
    "applied filter spec"
  );
  result
}

#[derive(Debug, Clone, Default)]
pub struct StatusGroups {
  pub pending:   Vec<Task>,
  pub completed: Vec<Task>
}

pub fn group_by_status(
  tasks: &[Task]
) -> StatusGroups {
  let (completed, pending): (
    Vec<Task>,
    Vec<Task>
  ) = tasks
    .iter()
    .cloned()
    .partition(|t| t.completed);
  StatusGroups {
    pending,
    completed
  }
}

#[derive(Debug, Clone, Default)]
pub struct PriorityGroups {
  pub high:   Vec<Task>,
  pub medium: Vec<Task>,
  pub low:    Vec<Task>
}

pub fn group_by_priority(
  tasks: &[Task]
) -> PriorityGroups {
  let mut groups =
    PriorityGroups::default();
  for task in tasks {
    let bucket = match task.priority {
      | Priority::High => &mut groups.high,
      | Priority::Medium => {
        &mut groups.medium
      }
      | Priority::Low => &mut groups.low
    };
    bucket.push(task.clone());
  }
  groups
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::task::fixtures::{
    at,
    task
  };

  fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks
      .iter()
      .map(|t| t.id.as_str())
      .collect()
  }

  fn sample() -> Vec<Task> {
    let base = at(2026, 2, 17, 12);
    let mut a = task("a", "Write report");
    a.priority = Priority::High;
    a.due_date =
      Some(base + Duration::days(2));
    a.description =
      "quarterly numbers".to_string();

    let mut b = task("b", "buy milk");
    b.priority = Priority::Low;
    b.completed = true;
    b.created_at = base;

    let mut c = task("c", "Call Mom");
    c.priority = Priority::High;
    c.due_date =
      Some(base - Duration::days(1));
    c.created_at =
      base - Duration::days(3);

    let mut d = task("d", "Archive");
    d.priority = Priority::Medium;
    d.created_at =
      base - Duration::days(5);

    vec![a, b, c, d]
  }

  #[test]
  fn status_filter_is_idempotent_subset() {
    let tasks = sample();
    for status in [
      StatusFilter::All,
      StatusFilter::Pending,
      StatusFilter::Completed
    ] {
      let once =
        filter_by_status(&tasks, status);
      let twice =
        filter_by_status(&once, status);
      assert_eq!(once, twice);
      assert!(once.iter().all(|t| {
        tasks.contains(t)
      }));
    }
    assert_eq!(
      ids(&filter_by_status(
        &tasks,
        StatusFilter::Completed
      )),
      vec!["b"]
    );
  }

  #[test]
  fn search_matches_title_or_description() {
    let tasks = sample();
    assert_eq!(
      ids(&filter_by_search(
        &tasks, "QUARTERLY"
      )),
      vec!["a"]
    );
    assert_eq!(
      ids(&filter_by_search(
        &tasks, "mil"
      )),
      vec!["b"]
    );
    assert_eq!(
      filter_by_search(&tasks, "   ")
        .len(),
      4
    );
  }

  #[test]
  fn missing_due_dates_trail_in_both_directions()
  {
    let tasks = sample();
    let asc = sort(
      &tasks,
      SortKey::DueDate,
      SortOrder::Asc
    );
    assert_eq!(
      ids(&asc),
      vec!["c", "a", "b", "d"]
    );

    let desc = sort(
      &tasks,
      SortKey::DueDate,
      SortOrder::Desc
    );
    assert_eq!(
      ids(&desc),
      vec!["a", "c", "b", "d"]
    );
  }

  #[test]
  fn priority_sort_is_stable_and_high_first()
  {
    let tasks = sample();
    let asc = sort(
      &tasks,
      SortKey::Priority,
      SortOrder::Asc
    );
    assert_eq!(
      ids(&asc),
      vec!["a", "c", "d", "b"]
    );
    let desc = sort(
      &tasks,
      SortKey::Priority,
      SortOrder::Desc
    );
    assert_eq!(
      ids(&desc),
      vec!["b", "d", "a", "c"]
    );
  }

  #[test]
  fn title_sort_ignores_case() {
    let tasks = sample();
    let sorted = sort(
      &tasks,
      SortKey::Title,
      SortOrder::Asc
    );
    assert_eq!(
      ids(&sorted),
      vec!["d", "b", "c", "a"]
    );
  }

  #[test]
  fn apply_composes_and_leaves_input_alone()
  {
    let tasks = sample();
    let before = tasks.clone();
    let spec = FilterSpec {
      status: StatusFilter::Pending,
      priority: PriorityFilter::Only(
        Priority::High
      ),
      search: String::new(),
      sort_by: SortKey::CreatedAt,
      order: SortOrder::Desc
    };
    assert_eq!(
      ids(&apply(&tasks, &spec)),
      vec!["c", "a"]
    );
    assert_eq!(tasks, before);
    assert!(spec.has_filters());
    assert!(!FilterSpec::default()
      .has_filters());
  }

  #[test]
  fn parses_filter_words() {
    assert_eq!(
      "done"
        .parse::<StatusFilter>()
        .expect("status"),
      StatusFilter::Completed
    );
    assert_eq!(
      "created_at"
        .parse::<SortKey>()
        .expect("sort key"),
      SortKey::CreatedAt
    );
    assert_eq!(
      "ALL"
        .parse::<PriorityFilter>()
        .expect("priority"),
      PriorityFilter::All
    );
    assert_eq!(
      "DESC"
        .parse::<SortOrder>()
        .expect("order"),
      SortOrder::Desc
    );
    assert!(
      "sideways"
        .parse::<SortOrder>()
        .is_err()
    );
  }

  #[test]
  fn groups_partition_collection() {
    let tasks = sample();
    let by_status =
      group_by_status(&tasks);
    assert_eq!(
      by_status.pending.len()
        + by_status.completed.len(),
      tasks.len()
    );
    let by_priority =
      group_by_priority(&tasks);
    assert_eq!(
      ids(&by_priority.high),
      vec!["a", "c"]
    );
  }
}
