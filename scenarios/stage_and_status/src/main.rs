use storm_tape_tunnel_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<TapeRunnerContext>) -> HookResult {
    configure_tape_settings(ctx)?;
    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    install_virtual_user(ctx, std::convert::identity)?;
    Ok(())
}

fn stage_and_status(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    stage_and_check(ctx)
}

fn archive_info(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    request_archive_info(ctx)
}

fn cancel(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    cancel_stage(ctx)
}

fn main() -> TapeTunnelResult<()> {
    let builder =
        ScenarioDefinitionBuilder::<TapeRunnerContext, TapeAgentContext>::new_with_init(
            env!("CARGO_PKG_NAME"),
        )
        .with_default_duration_s(10)
        .with_wait_time(WaitTime::constant(std::time::Duration::ZERO))
        .add_capture_env(FILES_PER_REQUEST_ENV)
        .use_setup(setup)
        .use_agent_setup(agent_setup)
        // Archive info and cancel stay defined so that they can be weighted back in.
        .use_agent_tasks(
            TaskSet::new()
                .task("stage_and_status", 3, stage_and_status)
                .task("archive_info", 0, archive_info)
                .task("cancel", 0, cancel),
        );

    run(builder)?;

    Ok(())
}
