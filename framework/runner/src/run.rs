use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tape_tunnel_core::prelude::{AgentBailError, ShutdownSignalError};
use tape_tunnel_instruments::ReportConfig;
use tape_tunnel_summary_model::{append_run_summary, RunSummary};

use crate::definition::{Behaviour, ScenarioDefinition};
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::{
    context::{AgentContext, RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// Run a scenario.
///
/// Returns the number of agents that were still running when the scenario ended. Agents that fail
/// their setup or bail out with an [AgentBailError] are not counted.
///
/// Errors from the global setup hook stop the run and are returned. Errors from agent hooks and
/// from the teardown hook are logged and do not stop other agents.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<usize> {
    let definition = definition.build()?;

    log::info!(
        "Running scenario: {} with run id {}",
        definition.name,
        definition.run_id
    );

    let mut run_summary = new_run_summary(&definition);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(
        ReportConfig::from_opt(definition.reporter, definition.csv_prefix.clone()).init(),
    );
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        definition.connection_string.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    // After the setup has run, and if this is a time bounded scenario, then we need to take additional actions
    if let Some(duration) = definition.duration_s {
        if !definition.no_progress {
            start_progress(
                Duration::from_secs(duration),
                shutdown_handle.new_listener(),
            )
            .context("Failed to start progress thread")?;
        }

        // Set a timer to shut down the test after the duration has elapsed
        let shutdown_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_secs(duration)).await;
            shutdown_handle.shutdown();
        });
    }

    let runner_context = Arc::new(runner_context);

    // Ready to start spawning agents so start the resource monitor to report high usage by agents
    // which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener()).context("Failed to start monitor thread")?;

    let spawn_interval = definition
        .spawn_rate
        .map(|rate| Duration::from_secs_f64(1.0 / rate));

    let mut handles = Vec::new();
    for (agent_index, assigned_behaviour) in
        definition.assigned_behaviours_flat().into_iter().enumerate()
    {
        let runner_context = runner_context.clone();

        let setup_agent_fn = definition.setup_agent_fn;
        let agent_behaviour = definition.agent_behaviour.get(&assigned_behaviour).cloned();
        let teardown_agent_fn = definition.teardown_agent_fn;
        let wait_time = definition.wait_time;
        let start_delay = spawn_interval
            .map(|interval| interval.mul_f64(agent_index as f64))
            .unwrap_or_default();

        // For us to check if the agent should shut down between behaviour cycles
        let mut cycle_shutdown_receiver = shutdown_handle.new_listener();
        // For the behaviour implementation to listen for shutdown and respond appropriately
        let delegated_shutdown_listener = shutdown_handle.new_listener();

        let agent_name = format!("agent-{}", agent_index);

        handles.push(
            std::thread::Builder::new()
                .name(agent_name.clone())
                .spawn(move || -> bool {
                    if runner_context.executor().sleep(start_delay).is_err() {
                        log::debug!("Agent {} was not started before shutdown", agent_name);
                        return false;
                    }

                    let mut context = AgentContext::new(
                        agent_name.clone(),
                        runner_context,
                        delegated_shutdown_listener,
                    );
                    if let Some(setup_agent_fn) = setup_agent_fn {
                        if let Err(e) = setup_agent_fn(&mut context) {
                            log::error!("Agent setup failed for agent {}: {:?}", agent_name, e);
                            return false;
                        }
                    }

                    let mut rng = rand::thread_rng();
                    let mut bailed = false;
                    if let Some(behaviour) = agent_behaviour {
                        loop {
                            if cycle_shutdown_receiver.should_shutdown() {
                                log::debug!("Stopping agent {}", agent_name);
                                break;
                            }

                            let result = match &behaviour {
                                Behaviour::Hook(hook) => hook(&mut context),
                                Behaviour::Tasks(tasks) => {
                                    let task = tasks.choose(&mut rng);
                                    log::trace!("Agent {} running task {}", agent_name, task.name);
                                    (task.hook)(&mut context)
                                }
                            };

                            match result {
                                Ok(()) => {}
                                Err(e) if e.is::<ShutdownSignalError>() => {
                                    // Do nothing, this is expected if the agent is being shutdown.
                                    // The check at the top of the loop will catch this and break out.
                                }
                                Err(e) if e.is::<AgentBailError>() => {
                                    log::warn!("Agent {} bailed: {}", agent_name, e);
                                    bailed = true;
                                    break;
                                }
                                Err(e) => {
                                    log::error!("Agent behaviour failed for agent {}: {:?}", agent_name, e);
                                }
                            }

                            // Only fails on shutdown, which the next cycle picks up.
                            let _ = context
                                .runner_context()
                                .executor()
                                .sleep(wait_time.sample(&mut rng));
                        }
                    }

                    if let Some(teardown_agent_fn) = teardown_agent_fn {
                        if let Err(e) = teardown_agent_fn(&mut context) {
                            log::error!("Agent teardown failed for agent {}: {:?}", agent_name, e);
                        }
                    }

                    !bailed
                })
                .context("Failed to spawn thread for test agent")?,
        );
    }

    let mut agents_run_to_completion = 0;
    for handle in handles {
        let completed = handle
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining thread for test agent: {:?}", e))?;
        if completed {
            agents_run_to_completion += 1;
        }
    }

    // Agents may all have stopped on their own, make sure the background threads stop too.
    shutdown_handle.shutdown();

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    runner_context.reporter().finalize();

    run_summary.set_agent_end_count(agents_run_to_completion);
    if let Some(path) = &definition.run_summary_path {
        match append_run_summary(&run_summary, path) {
            Ok(()) => log::info!("Appended run summary to {}", path.display()),
            Err(e) => log::error!("Failed to write run summary to {}: {:?}", path.display(), e),
        }
    }

    Ok(agents_run_to_completion)
}

fn new_run_summary<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: &ScenarioDefinition<RV, V>,
) -> RunSummary {
    let assigned_behaviours: HashMap<String, usize> = definition
        .assigned_behaviours
        .iter()
        .map(|b| (b.behaviour_name.clone(), b.agent_count))
        .collect();

    let mut run_summary = RunSummary::new(
        definition.run_id.clone(),
        definition.name.clone(),
        definition.connection_string.clone(),
        chrono::Utc::now().timestamp(),
        definition.duration_s,
        definition.agent_count(),
        assigned_behaviours,
        env!("CARGO_PKG_VERSION").to_string(),
    );

    for key in &definition.capture_env {
        if let Ok(value) = std::env::var(key) {
            run_summary.add_env(key.clone(), value);
        }
    }

    run_summary
}
