use serde::Serialize;

/// Number of observation days in the special-needs assessment window.
pub const ASSESSMENT_DAYS: u8 = 14;

/// Scripted cognitive exercise bound to one observation day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThinkingTaskDefinition {
    pub task_id: u8,
    pub description: &'static str,
}

const THINKING_TASKS: [ThinkingTaskDefinition; ASSESSMENT_DAYS as usize] = [
    ThinkingTaskDefinition {
        task_id: 1,
        description: "Sort coloured blocks into matching groups",
    },
    ThinkingTaskDefinition {
        task_id: 2,
        description: "Complete a three-piece picture puzzle",
    },
    ThinkingTaskDefinition {
        task_id: 3,
        description: "Point to the larger of two objects",
    },
    ThinkingTaskDefinition {
        task_id: 4,
        description: "Follow a two-step spoken instruction",
    },
    ThinkingTaskDefinition {
        task_id: 5,
        description: "Match shapes to their outlines on a board",
    },
    ThinkingTaskDefinition {
        task_id: 6,
        description: "Count five objects by touching each one",
    },
    ThinkingTaskDefinition {
        task_id: 7,
        description: "Find the hidden toy under one of three cups",
    },
    ThinkingTaskDefinition {
        task_id: 8,
        description: "Arrange three pictures in story order",
    },
    ThinkingTaskDefinition {
        task_id: 9,
        description: "Name the odd one out in a group of four pictures",
    },
    ThinkingTaskDefinition {
        task_id: 10,
        description: "Copy a simple bead pattern",
    },
    ThinkingTaskDefinition {
        task_id: 11,
        description: "Identify everyday sounds from a recording",
    },
    ThinkingTaskDefinition {
        task_id: 12,
        description: "Group pictures of food, animals and clothes",
    },
    ThinkingTaskDefinition {
        task_id: 13,
        description: "Choose the correct item to finish a daily routine picture",
    },
    ThinkingTaskDefinition {
        task_id: 14,
        description: "Build a tower of blocks matching a model",
    },
];

/// Full ordered catalog; entry `N - 1` belongs to day `N`.
pub fn thinking_tasks() -> &'static [ThinkingTaskDefinition] {
    &THINKING_TASKS
}

/// The task bound to `day`, if the day is inside the observation window.
pub fn task_for_day(day: u8) -> Option<&'static ThinkingTaskDefinition> {
    if day == 0 {
        return None;
    }
    THINKING_TASKS.get(usize::from(day) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_one_distinct_task_per_day() {
        let tasks = thinking_tasks();
        assert_eq!(tasks.len(), usize::from(ASSESSMENT_DAYS));

        let descriptions: HashSet<_> = tasks.iter().map(|task| task.description).collect();
        assert_eq!(descriptions.len(), tasks.len());

        for day in 1..=ASSESSMENT_DAYS {
            let task = task_for_day(day).expect("task for every day");
            assert_eq!(task.task_id, day);
        }
    }

    #[test]
    fn days_outside_window_have_no_task() {
        assert!(task_for_day(0).is_none());
        assert!(task_for_day(ASSESSMENT_DAYS + 1).is_none());
    }
}
