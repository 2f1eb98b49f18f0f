use std::path::PathBuf;

use pretty_assertions::assert_eq;
use storm_tape_tunnel_runner::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cli(connection_string: String, csv: Option<PathBuf>) -> TapeTunnelScenarioCli {
    TapeTunnelScenarioCli {
        connection_string,
        agents: Some(1),
        behaviour: vec![],
        duration: None,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        csv,
        spawn_rate: None,
        run_summary: None,
    }
}

fn setup(ctx: &mut RunnerContext<TapeRunnerContext>) -> HookResult {
    configure_tape_settings(ctx)
}

fn agent_setup(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    install_virtual_user(ctx, std::convert::identity)
}

fn stage_once(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    stage_and_check(ctx)?;
    ctx.runner_context().force_stop_scenario();
    Ok(())
}

/// Wiremock runs its server on its own thread, the runtime is only needed to start it.
fn mock_server(stage_status: u16) -> (tokio::runtime::Runtime, MockServer) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/stage"))
            .respond_with(ResponseTemplate::new(stage_status))
            .mount(&server)
            .await;
        server
    });
    (runtime, server)
}

#[test]
fn invalid_connection_string_fails_setup() {
    let scenario = ScenarioDefinitionBuilder::<TapeRunnerContext, TapeAgentContext>::new(
        "invalid_connection_string_fails_setup",
        cli("not a url".to_string(), None),
    )
    .with_default_duration_s(5)
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_tasks(TaskSet::new().task("stage_and_status", 1, stage_once));

    let err = run(scenario).unwrap_err();

    assert!(err.to_string().starts_with("Invalid tape service URL: not a url"));
}

#[test]
fn agent_without_tape_settings_does_not_run() {
    let (runtime, server) = mock_server(201);

    let scenario = ScenarioDefinitionBuilder::<TapeRunnerContext, TapeAgentContext>::new(
        "agent_without_tape_settings_does_not_run",
        cli(server.uri(), None),
    )
    .with_default_duration_s(1)
    .use_agent_setup(agent_setup)
    .use_agent_tasks(TaskSet::new().task("stage_and_status", 1, stage_once));

    assert_eq!(0, run(scenario).unwrap());

    let requests = runtime.block_on(server.received_requests()).unwrap();
    assert!(requests.is_empty());
}

#[test]
fn failed_stage_is_reported_and_the_run_completes() {
    let (runtime, server) = mock_server(500);
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("test_10_files");

    let scenario = ScenarioDefinitionBuilder::<TapeRunnerContext, TapeAgentContext>::new(
        "failed_stage_is_reported_and_the_run_completes",
        cli(server.uri(), Some(prefix.clone())),
    )
    .with_default_duration_s(5)
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_tasks(
        TaskSet::new()
            .task("stage_and_status", 1, stage_once)
            .task("cancel", 0, cancel_stage),
    );

    assert_eq!(1, run(scenario).unwrap());

    let requests = runtime.block_on(server.received_requests()).unwrap();
    assert_eq!(1, requests.len());
    assert_eq!("POST", requests[0].method.as_str());

    let failures = std::fs::read_to_string(dir.path().join("test_10_files_failures.csv")).unwrap();
    assert_eq!(
        "Method,Name,Error,Occurrences\nPOST,stage,Stage failed with status 500,1\n",
        failures
    );
}
