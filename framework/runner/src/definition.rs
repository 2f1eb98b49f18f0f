use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tape_tunnel_instruments::ReporterOpt;

use crate::cli::TapeTunnelScenarioCli;
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::init::init;
use crate::tasks::{TaskSet, WaitTime, WeightedTasks};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

const DEFAULT_BEHAVIOUR: &str = "default";

enum BehaviourDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    Hook(AgentHookMut<RV, V>),
    Tasks(TaskSet<RV, V>),
}

/// What an agent runs on each behaviour cycle.
pub(crate) enum Behaviour<RV: UserValuesConstraint, V: UserValuesConstraint> {
    Hook(AgentHookMut<RV, V>),
    Tasks(Arc<WeightedTasks<RV, V>>),
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for Behaviour<RV, V> {
    fn clone(&self) -> Self {
        match self {
            Behaviour::Hook(hook) => Behaviour::Hook(*hook),
            Behaviour::Tasks(tasks) => Behaviour::Tasks(tasks.clone()),
        }
    }
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: TapeTunnelScenarioCli,
    default_agent_count: Option<usize>,
    default_duration_s: Option<u64>,
    /// Environment variables to record in the run summary, if they are set.
    capture_env: BTreeSet<String>,
    /// How long each agent waits between behaviour cycles.
    wait_time: WaitTime,
    /// Global setup hook for this scenario. It will be run once, before any agents are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for an agent, which will be run once for each agent as it starts.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The agent behaviours for this scenario. There are two ways that this can be used:
    /// - Specify a single behaviour for all agents using [ScenarioDefinitionBuilder::use_agent_behaviour]
    ///   or [ScenarioDefinitionBuilder::use_agent_tasks]. This will then start as many identical agents as you request.
    /// - Specify multiple behaviours using [ScenarioDefinitionBuilder::use_named_agent_behaviour] or
    ///   [ScenarioDefinitionBuilder::use_named_agent_tasks]. You then need to tell the runner how many agents you want to run each behaviour.
    agent_behaviour: HashMap<String, BehaviourDefinition<RV, V>>,
    /// Teardown hook for an agent, run once for each agent when it stops. Errors are logged.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once after every agent has stopped. Errors are logged.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct AssignedBehaviour {
    pub(crate) behaviour_name: String,
    pub(crate) agent_count: usize,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) run_id: String,
    pub(crate) assigned_behaviours: Vec<AssignedBehaviour>,
    pub(crate) duration_s: Option<u64>,
    pub(crate) connection_string: String,
    pub(crate) capture_env: BTreeSet<String>,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) csv_prefix: Option<PathBuf>,
    pub(crate) spawn_rate: Option<f64>,
    pub(crate) run_summary_path: Option<PathBuf>,
    pub(crate) wait_time: WaitTime,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) agent_behaviour: HashMap<String, Behaviour<RV, V>>,
    pub(crate) teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and parsed command line
    /// arguments. See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: TapeTunnelScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_agent_count: None,
            default_duration_s: None,
            capture_env: BTreeSet::new(),
            wait_time: WaitTime::default(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: HashMap::new(),
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise logging, parse the command line and then call [ScenarioDefinitionBuilder::new].
    ///
    /// This is what a scenario `main` should use.
    pub fn new_with_init(name: &str) -> Self {
        let cli = init();
        Self::new(name, cli)
    }

    /// Sets the default number of agents, used when `--agents` is not given.
    pub fn with_default_agent_count(mut self, count: usize) -> Self {
        self.default_agent_count = Some(count);
        self
    }

    /// Sets the default duration, used when `--duration` is not given.
    pub fn with_default_duration_s(mut self, duration: u64) -> Self {
        self.default_duration_s = Some(duration);
        self
    }

    /// Sets the time that agents wait between behaviour cycles. Defaults to no wait.
    pub fn with_wait_time(mut self, wait_time: WaitTime) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Record the value of this environment variable in the run summary, when it is set.
    ///
    /// Use this for variables that change what the scenario does, so that runs with different
    /// settings can be told apart. Never capture credentials.
    pub fn add_capture_env(mut self, key: &str) -> Self {
        self.capture_env.insert(key.to_string());
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the agent setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the default agent behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_agent_behaviour(self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.use_named_agent_behaviour(DEFAULT_BEHAVIOUR, behaviour)
    }

    /// Set a named agent behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_named_agent_behaviour(self, name: &str, behaviour: AgentHookMut<RV, V>) -> Self {
        self.insert_behaviour(name, BehaviourDefinition::Hook(behaviour))
    }

    /// Use a weighted [TaskSet] as the default agent behaviour.
    pub fn use_agent_tasks(self, tasks: TaskSet<RV, V>) -> Self {
        self.use_named_agent_tasks(DEFAULT_BEHAVIOUR, tasks)
    }

    /// Use a weighted [TaskSet] as a named agent behaviour.
    pub fn use_named_agent_tasks(self, name: &str, tasks: TaskSet<RV, V>) -> Self {
        self.insert_behaviour(name, BehaviourDefinition::Tasks(tasks))
    }

    /// Set the agent teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    fn insert_behaviour(mut self, name: &str, behaviour: BehaviourDefinition<RV, V>) -> Self {
        let previous = self.agent_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let agent_count = self
            .cli
            .agents
            .or(self.default_agent_count)
            .unwrap_or(1);

        let assigned_behaviours =
            build_assigned_behaviours(&self.cli, &self.agent_behaviour, agent_count)?;

        if let Some(spawn_rate) = self.cli.spawn_rate {
            if !(spawn_rate.is_finite() && spawn_rate > 0.0) {
                anyhow::bail!("The spawn rate must be a positive number, got {spawn_rate}");
            }
        }

        let mut agent_behaviour = HashMap::with_capacity(self.agent_behaviour.len());
        for (name, definition) in self.agent_behaviour {
            let behaviour = match definition {
                BehaviourDefinition::Hook(hook) => Behaviour::Hook(hook),
                BehaviourDefinition::Tasks(tasks) => Behaviour::Tasks(Arc::new(
                    WeightedTasks::new(tasks)
                        .map_err(|e| e.context(format!("Behaviour [{name}] is not valid")))?,
                )),
            };
            agent_behaviour.insert(name, behaviour);
        }

        let duration_s = if self.cli.soak {
            None
        } else {
            self.cli.duration.or(self.default_duration_s)
        };

        Ok(ScenarioDefinition {
            name: self.name,
            run_id: self.cli.run_id.unwrap_or_else(|| nanoid::nanoid!()),
            assigned_behaviours,
            duration_s,
            connection_string: self.cli.connection_string,
            capture_env: self.capture_env,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            csv_prefix: self.cli.csv,
            spawn_rate: self.cli.spawn_rate,
            run_summary_path: self.cli.run_summary,
            wait_time: self.wait_time,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinition<RV, V> {
    pub(crate) fn agent_count(&self) -> usize {
        self.assigned_behaviours
            .iter()
            .map(|b| b.agent_count)
            .sum()
    }

    /// One behaviour name per agent, in the order that agents are started.
    pub(crate) fn assigned_behaviours_flat(&self) -> Vec<String> {
        self.assigned_behaviours
            .iter()
            .flat_map(|b| std::iter::repeat(b.behaviour_name.clone()).take(b.agent_count))
            .collect()
    }
}

fn build_assigned_behaviours<RV: UserValuesConstraint, V: UserValuesConstraint>(
    cli: &TapeTunnelScenarioCli,
    behaviours: &HashMap<String, BehaviourDefinition<RV, V>>,
    agent_count: usize,
) -> anyhow::Result<Vec<AssignedBehaviour>> {
    let mut assigned = Vec::new();
    let mut total_assigned = 0;
    for (name, count) in &cli.behaviour {
        if !behaviours.contains_key(name) {
            anyhow::bail!("Behaviour [{name}] is not defined by this scenario");
        }

        total_assigned += count;
        assigned.push(AssignedBehaviour {
            behaviour_name: name.clone(),
            agent_count: *count,
        });
    }

    if total_assigned > agent_count {
        anyhow::bail!(
            "Assigned behaviours to {total_assigned} agents but only {agent_count} agents are configured"
        );
    }

    if total_assigned < agent_count {
        assigned.push(AssignedBehaviour {
            behaviour_name: DEFAULT_BEHAVIOUR.to_string(),
            agent_count: agent_count - total_assigned,
        });
    }

    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Default)]
    struct Values;

    impl UserValuesConstraint for Values {}

    fn noop(_ctx: &mut AgentContext<Values, Values>) -> HookResult {
        Ok(())
    }

    fn cli(args: &[&str]) -> TapeTunnelScenarioCli {
        TapeTunnelScenarioCli::try_parse_from(std::iter::once("scenario").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn remaining_agents_get_default_behaviour() {
        let definition = ScenarioDefinitionBuilder::<Values, Values>::new(
            "test",
            cli(&["--agents", "5", "--behaviour", "cancel:2"]),
        )
        .use_agent_behaviour(noop)
        .use_named_agent_behaviour("cancel", noop)
        .build()
        .unwrap();

        assert_eq!(5, definition.agent_count());
        assert_eq!(
            vec!["cancel", "cancel", "default", "default", "default"],
            definition.assigned_behaviours_flat()
        );
    }

    #[test]
    fn reject_unknown_or_oversubscribed_behaviours() {
        let unknown = ScenarioDefinitionBuilder::<Values, Values>::new(
            "test",
            cli(&["--behaviour", "missing"]),
        )
        .use_agent_behaviour(noop)
        .build();
        assert!(unknown.is_err());

        let oversubscribed = ScenarioDefinitionBuilder::<Values, Values>::new(
            "test",
            cli(&["--agents", "1", "--behaviour", "cancel:2"]),
        )
        .use_named_agent_behaviour("cancel", noop)
        .build();
        assert!(oversubscribed.is_err());
    }

    #[test]
    fn reject_all_zero_task_weights() {
        let result = ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&[]))
            .use_agent_tasks(TaskSet::new().task("archive_info", 0, noop))
            .build();

        let err = result.err().unwrap();
        assert_eq!("Behaviour [default] is not valid", err.to_string());
    }

    #[test]
    fn soak_ignores_duration() {
        let definition =
            ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&["--soak"]))
                .with_default_duration_s(10)
                .build()
                .unwrap();
        assert_eq!(None, definition.duration_s);

        let definition = ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&[]))
            .with_default_duration_s(10)
            .build()
            .unwrap();
        assert_eq!(Some(10), definition.duration_s);
    }

    #[test]
    fn reject_zero_spawn_rate() {
        let result =
            ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&["--spawn-rate", "0"]))
                .build();
        assert!(result.is_err());
    }
}
