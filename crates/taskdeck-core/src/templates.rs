//! Built-in task templates used by `taskdeck template`.

use anyhow::anyhow;
use chrono::{Duration, NaiveDate};

use crate::task::{Priority, TaskCreate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateFields {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
    pub category: &'static str,
    /// Days after today for the due date; `None` leaves it unset.
    pub due_in_days: Option<i64>,
    pub fields: TemplateFields,
    pub variations: &'static [TemplateFields],
}

pub const MEETING: TaskTemplate = TaskTemplate {
    id: "meeting",
    name: "Meeting",
    summary: "Schedule team meetings, client calls, and discussions",
    category: "Work",
    due_in_days: Some(0),
    fields: TemplateFields {
        name: "Meeting",
        title: "Team Meeting",
        description: "Agenda:\n- Project status update\n- Discussion points\n- Action items\n\nDuration: 1 hour\nAttendees: Team members",
        priority: Priority::Medium,
    },
    variations: &[
        TemplateFields {
            name: "Team Standup",
            title: "Daily Standup Meeting",
            description: "Agenda:\n- What did you do yesterday?\n- What will you do today?\n- Any blockers?\n\nDuration: 15 minutes",
            priority: Priority::Medium,
        },
        TemplateFields {
            name: "Client Meeting",
            title: "Client Meeting",
            description: "Agenda:\n- Project progress review\n- Client feedback\n- Next milestones\n- Q&A session\n\nDuration: 1 hour",
            priority: Priority::High,
        },
        TemplateFields {
            name: "Sprint Planning",
            title: "Sprint Planning Meeting",
            description: "Agenda:\n- Review sprint goals\n- Task estimation\n- Sprint backlog creation\n- Team capacity planning\n\nDuration: 2 hours",
            priority: Priority::High,
        },
    ],
};

pub const STUDY: TaskTemplate = TaskTemplate {
    id: "study",
    name: "Study",
    summary: "Plan study sessions, exam prep, and learning activities",
    category: "Education",
    due_in_days: Some(1),
    fields: TemplateFields {
        name: "Study",
        title: "Study Session",
        description: "Study plan:\n- Review lecture notes\n- Read chapters 1-3\n- Practice problems\n- Create summary notes\n\nDuration: 2 hours\nGoal: Master key concepts",
        priority: Priority::Medium,
    },
    variations: &[
        TemplateFields {
            name: "Exam Preparation",
            title: "Exam Preparation",
            description: "Exam prep:\n- Review all course materials\n- Practice past papers\n- Focus on weak areas\n- Create formula sheets\n\nStudy time: 3-4 hours",
            priority: Priority::High,
        },
        TemplateFields {
            name: "Assignment Work",
            title: "Complete Assignment",
            description: "Assignment tasks:\n- Read assignment requirements\n- Research and gather materials\n- Create outline\n- Write draft\n- Review and submit",
            priority: Priority::High,
        },
        TemplateFields {
            name: "Practice Session",
            title: "Practice & Review",
            description: "Practice plan:\n- Solve practice problems\n- Review mistakes\n- Understand concepts\n- Take notes\n\nDuration: 1.5 hours",
            priority: Priority::Medium,
        },
    ],
};

pub const PERSONAL: TaskTemplate = TaskTemplate {
    id: "personal",
    name: "Personal",
    summary: "Manage personal tasks, errands, and self-care activities",
    category: "Personal",
    due_in_days: Some(0),
    fields: TemplateFields {
        name: "Personal",
        title: "Personal Task",
        description: "Task details:\n- Add specific task details\n- Set personal goals\n- Track progress",
        priority: Priority::Low,
    },
    variations: &[
        TemplateFields {
            name: "Workout",
            title: "Workout Session",
            description: "Workout plan:\n- Warm-up (10 min)\n- Main workout (30-45 min)\n- Cool down & stretch (10 min)",
            priority: Priority::Medium,
        },
        TemplateFields {
            name: "Shopping",
            title: "Shopping List",
            description: "Shopping items:\n- Groceries\n- Household items\n- Personal care",
            priority: Priority::Low,
        },
        TemplateFields {
            name: "Self Care",
            title: "Self-Care Time",
            description: "Self-care activities:\n- Meditation (15 min)\n- Reading (30 min)\n- Hobby time\n- Relaxation",
            priority: Priority::Medium,
        },
        TemplateFields {
            name: "Home Chores",
            title: "Home Maintenance",
            description: "Chores:\n- Clean living room\n- Organize workspace\n- Laundry\n- Kitchen cleanup\n\nEstimated time: 1-2 hours",
            priority: Priority::Low,
        },
    ],
};

pub const ALL_TEMPLATES: [TaskTemplate; 3] = [MEETING, STUDY, PERSONAL];

pub fn find(id: &str) -> Option<&'static TaskTemplate> {
    ALL_TEMPLATES
        .iter()
        .find(|t| t.id.eq_ignore_ascii_case(id.trim()))
}

impl TaskTemplate {
    /// Matches a variation by name, case-insensitively, ignoring spaces and
    /// dashes so `team-standup` finds "Team Standup".
    pub fn variation(&self, name: &str) -> Option<&'static TemplateFields> {
        let wanted = normalize(name);
        self.variations.iter().find(|v| normalize(v.name) == wanted)
    }

    /// Builds the create payload for the base template or one of its
    /// variations.
    pub fn instantiate(&self, variation: Option<&str>, today: NaiveDate) -> anyhow::Result<TaskCreate> {
        let fields = match variation {
            None => &self.fields,
            Some(name) => self.variation(name).ok_or_else(|| {
                let known: Vec<&str> = self.variations.iter().map(|v| v.name).collect();
                anyhow!(
                    "template {} has no variation {name:?} (known: {})",
                    self.id,
                    known.join(", ")
                )
            })?,
        };
        Ok(TaskCreate {
            title: fields.title.to_string(),
            description: fields.description.to_string(),
            priority: fields.priority,
            due_date: self.due_in_days.map(|days| today + Duration::days(days)),
            due_time: None,
        })
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
