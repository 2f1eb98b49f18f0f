use std::{fmt::Debug, sync::Arc};

use tape_tunnel_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use tape_tunnel_instruments::Reporter;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// The context shared by every agent in a run.
///
/// It is mutable in the global setup hook, which is where scenario wide configuration should be
/// loaded and stored with [RunnerContext::get_mut]. Agents only get shared read access.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string that was passed on the command line, for tape scenarios this is the
    /// base URL of the service under test.
    pub fn get_connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Stop the scenario early. Agents will finish their current behaviour cycle and then stop.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// The context owned by a single agent.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_name: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_name: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_name,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// A name for this agent which is unique within the run, like `agent-3`.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
