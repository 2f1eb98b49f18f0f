use std::time::Duration;

use anyhow::Context;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::context::UserValuesConstraint;
use crate::definition::AgentHookMut;

/// A set of agent tasks with relative weights.
///
/// Each behaviour cycle picks one task at random, in proportion to its weight. A task with a
/// weight of zero stays part of the set but is never picked, which makes it easy to switch tasks
/// off without removing them from the scenario.
pub struct TaskSet<RV: UserValuesConstraint, V: UserValuesConstraint> {
    tasks: Vec<Task<RV, V>>,
}

pub(crate) struct Task<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) weight: u32,
    pub(crate) hook: AgentHookMut<RV, V>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> TaskSet<RV, V> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn task(mut self, name: &str, weight: u32, hook: AgentHookMut<RV, V>) -> Self {
        self.tasks.push(Task {
            name: name.to_string(),
            weight,
            hook,
        });
        self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Default for TaskSet<RV, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [TaskSet] that has been checked and is ready to sample from.
pub(crate) struct WeightedTasks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    tasks: Vec<Task<RV, V>>,
    index: WeightedIndex<u32>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> WeightedTasks<RV, V> {
    /// Fails if the set is empty or if every weight is zero.
    pub(crate) fn new(task_set: TaskSet<RV, V>) -> anyhow::Result<Self> {
        let index = WeightedIndex::new(task_set.tasks.iter().map(|t| t.weight))
            .with_context(|| {
                let names = task_set
                    .tasks
                    .iter()
                    .map(|t| format!("{}={}", t.name, t.weight))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Invalid task weights [{names}]")
            })?;

        Ok(Self {
            tasks: task_set.tasks,
            index,
        })
    }

    pub(crate) fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Task<RV, V> {
        &self.tasks[self.index.sample(rng)]
    }
}

/// How long an agent waits between behaviour cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTime {
    /// Always wait the same time. `Constant(Duration::ZERO)` runs cycles back to back.
    Constant(Duration),
    /// Wait a uniformly random time between the two bounds, inclusive.
    Between(Duration, Duration),
}

impl WaitTime {
    pub fn constant(wait: Duration) -> Self {
        WaitTime::Constant(wait)
    }

    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            WaitTime::Between(min, max)
        } else {
            WaitTime::Between(max, min)
        }
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            WaitTime::Constant(wait) => wait,
            WaitTime::Between(min, max) if min < max => rng.gen_range(min..=max),
            WaitTime::Between(min, _) => min,
        }
    }
}

impl Default for WaitTime {
    fn default() -> Self {
        WaitTime::Constant(Duration::ZERO)
    }
}
