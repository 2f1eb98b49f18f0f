use std::sync::Arc;

use tape_tunnel_runner::prelude::{
    run, AgentBailError, AgentContext, HookResult, ReporterOpt, RunnerContext,
    ScenarioDefinitionBuilder, TapeTunnelScenarioCli, TaskSet, UserValuesConstraint,
};

#[derive(Default, Debug)]
struct ServiceValues {}

impl UserValuesConstraint for ServiceValues {}

/// Stands in for a virtual user: counts stage attempts made by one agent.
#[derive(Default, Debug)]
struct StagingValues {
    stage_attempts: usize,
}

impl UserValuesConstraint for StagingValues {}

type Ctx = AgentContext<ServiceValues, StagingValues>;

fn cli() -> TapeTunnelScenarioCli {
    TapeTunnelScenarioCli {
        connection_string: "http://localhost:8080".to_string(),
        agents: None,
        behaviour: vec![],
        duration: None,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        csv: None,
        spawn_rate: None,
        run_summary: None,
    }
}

fn scenario(
    name: &str,
    cli: TapeTunnelScenarioCli,
) -> ScenarioDefinitionBuilder<ServiceValues, StagingValues> {
    ScenarioDefinitionBuilder::new(name, cli).with_default_duration_s(5)
}

/// Fails every stage and stops the run after a few attempts.
fn failing_stage(ctx: &mut Ctx) -> HookResult {
    ctx.get_mut().stage_attempts += 1;
    if ctx.get().stage_attempts >= 5 {
        ctx.runner_context().force_stop_scenario();
    }
    Err(anyhow::anyhow!("Stage failed with status 503"))
}

fn stop(ctx: &mut Ctx) -> HookResult {
    ctx.runner_context().force_stop_scenario();
    Ok(())
}

#[test]
fn unreachable_service_in_setup_stops_the_run() {
    fn setup(_ctx: &mut RunnerContext<ServiceValues>) -> HookResult {
        Err(anyhow::anyhow!("Tape service is not reachable"))
    }

    let result =
        run(scenario("unreachable_service_in_setup_stops_the_run", cli()).use_setup(setup));

    assert_eq!("Tape service is not reachable", result.unwrap_err().to_string());
}

#[test]
fn agent_that_cannot_install_a_user_is_not_counted() {
    fn agent_setup(_ctx: &mut Ctx) -> HookResult {
        Err(anyhow::anyhow!("No tape settings"))
    }

    let mut cfg = cli();
    cfg.agents = Some(2);
    let result = run(
        scenario("agent_that_cannot_install_a_user_is_not_counted", cfg)
            .with_default_duration_s(1)
            .use_agent_setup(agent_setup)
            .use_agent_tasks(TaskSet::new().task("stage_and_status", 1, stop)),
    );

    assert_eq!(0, result.unwrap());
}

#[test]
fn failed_stages_do_not_stop_the_agent() {
    let result = run(
        scenario("failed_stages_do_not_stop_the_agent", cli())
            .use_agent_tasks(TaskSet::new().task("stage_and_status", 3, failing_stage)),
    );

    assert_eq!(1, result.unwrap());
}

#[test]
fn bailing_behaviour_only_stops_its_own_agents() {
    fn out_of_files(_ctx: &mut Ctx) -> HookResult {
        Err(AgentBailError::new("No more files to stage").into())
    }

    fn keep_polling(_ctx: &mut Ctx) -> HookResult {
        Ok(())
    }

    let mut cfg = cli();
    cfg.agents = Some(2);
    cfg.behaviour = vec![("stage".to_string(), 1), ("poll".to_string(), 1)];
    let result = run(
        scenario("bailing_behaviour_only_stops_its_own_agents", cfg)
            .with_default_duration_s(1)
            .use_named_agent_behaviour("stage", out_of_files)
            .use_named_agent_behaviour("poll", keep_polling),
    );

    assert_eq!(1, result.unwrap());
}

#[test]
fn teardown_errors_are_logged_and_the_run_completes() {
    fn cancel_held_request(_ctx: &mut Ctx) -> HookResult {
        Err(anyhow::anyhow!("Cancel failed with status 404"))
    }

    fn teardown(_ctx: Arc<RunnerContext<ServiceValues>>) -> HookResult {
        Err(anyhow::anyhow!("Could not close the tape service session"))
    }

    let result = run(
        scenario("teardown_errors_are_logged_and_the_run_completes", cli())
            .use_agent_tasks(TaskSet::new().task("stage_and_status", 1, stop))
            .use_agent_teardown(cancel_held_request)
            .use_teardown(teardown),
    );

    assert_eq!(1, result.unwrap());
}

#[test]
fn bail_from_weighted_task_stops_agent() {
    fn stage(ctx: &mut Ctx) -> HookResult {
        ctx.get_mut().stage_attempts += 1;
        if ctx.get().stage_attempts >= 3 {
            return Err(AgentBailError::new("No more files to stage").into());
        }
        Ok(())
    }

    fn never(_ctx: &mut Ctx) -> HookResult {
        panic!("A task with no weight must not be run");
    }

    let mut cfg = cli();
    cfg.agents = Some(2);
    let result = run(
        scenario("bail_from_weighted_task_stops_agent", cfg)
            .use_agent_tasks(TaskSet::new().task("stage", 3, stage).task("cancel", 0, never)),
    );

    assert_eq!(0, result.unwrap());
}

#[test]
fn write_run_summary_with_captured_env() {
    let dir = tempfile::tempdir().unwrap();
    let summary_path = dir.path().join("run_summary.jsonl");

    let mut cfg = cli();
    cfg.run_id = Some("fixed-run-id".to_string());
    cfg.run_summary = Some(summary_path.clone());
    cfg.csv = Some(dir.path().join("test_10_files"));
    let result = run(
        scenario("write_run_summary_with_captured_env", cfg)
            .add_capture_env("PATH")
            .use_agent_tasks(TaskSet::new().task("stage_and_status", 1, stop)),
    );
    assert_eq!(1, result.unwrap());

    let content = std::fs::read_to_string(&summary_path).unwrap();
    let line = content.lines().next().unwrap();
    assert!(line.contains("\"run_id\":\"fixed-run-id\""));
    assert!(line.contains("\"agent_end_count\":1"));
    assert!(line.contains("\"PATH\""));

    assert!(dir.path().join("test_10_files_stats.csv").exists());
    assert!(dir.path().join("test_10_files_failures.csv").exists());
}
