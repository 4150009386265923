//! Swap, rollback and rolling scenarios against the in-memory runtime

use pretty_assertions::assert_eq;
use tas_core::chain::{StepProgress, StepStatus, TaskChain};
use tas_core::command::{
    CommandResult, PlatformCommand, RollbackResult, RouteOperation, SwapRoutesResult,
};
use tas_core::outcome::{
    ResizeOutcome, StepOutcome, SwapRoutesOutcome, INSTANCES_OUTCOME, RESIZE_OUTCOME,
    ROLLING_DEPLOY_OUTCOME, SETUP_OUTCOME, SWAP_ROUTES_OUTCOME,
};
use tas_core::runtime::StepEnv;
use tas_core::steps::{
    RollbackParams, RollbackStep, RollingDeployParams, RollingDeployStep, RollingRollbackParams,
    RollingRollbackStep, RouteMappingParams, RouteMappingStep, SwapRollbackParams,
    SwapRollbackStep, SwapRoutesParams, SwapRoutesStep,
};
use tas_core::{InstanceCountChange, InstanceRecord, SetupVariant, TasConfig};
use tas_test_utils::*;

const SETUP_PATH: &str = "pipeline.stages.deploy.steps.setup";
const RESIZE_PATH: &str = "pipeline.stages.deploy.steps.resize";
const SWAP_PATH: &str = "pipeline.stages.deploy.steps.swap";
const ROLLING_PATH: &str = "pipeline.stages.deploy.steps.rolling";

fn seed(
    runtime: &InMemoryRuntime,
    builder: SetupOutcomeBuilder,
    changes: Option<Vec<InstanceCountChange>>,
) {
    runtime.insert_output(
        SETUP_PATH,
        SETUP_OUTCOME,
        StepOutcome::Setup(Box::new(builder.build())),
    );
    if let Some(instance_changes) = changes {
        runtime.insert_output(
            RESIZE_PATH,
            RESIZE_OUTCOME,
            StepOutcome::Resize(ResizeOutcome {
                total_desired_count: 4,
                upsize_count: 4,
                downsize_count: 0,
                instance_changes,
            }),
        );
    }
}

fn full_swap_changes() -> Vec<InstanceCountChange> {
    vec![
        InstanceCountChange::new("orders__1", "guid-new", 0, 4),
        InstanceCountChange::new("orders__0", "guid-old", 4, 0),
    ]
}

#[tokio::test]
async fn test_rollback_inverts_resize() {
    init_test_logging();
    let runtime = InMemoryRuntime::new();
    seed(
        &runtime,
        SetupOutcomeBuilder::new(SetupVariant::Canary, 4).with_active(4),
        Some(full_swap_changes()),
    );
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.rollback");
    let chain = TaskChain::new(&RollbackStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RollbackParams::new(SETUP_PATH)
        .unwrap()
        .with_resize_step(RESIZE_PATH);

    let StepProgress::Suspended { state, .. } = chain.start(&params).await.unwrap() else {
        panic!("rollback should wait on its command");
    };
    match runtime.last_dispatched().as_ref().and_then(command_payload) {
        Some(PlatformCommand::Rollback(command)) => {
            assert_eq!(command.upsize.len(), 1);
            assert_eq!(command.upsize[0].name, "orders__0");
            assert_eq!(command.upsize[0].desired_count, 4);
            assert_eq!(command.downsize.len(), 1);
            assert_eq!(command.downsize[0].name, "orders__1");
            assert!(!command.delete_new_application);
        }
        other => panic!("unexpected payload {other:?}"),
    }

    let result = CommandResult::Rollback(RollbackResult {
        instances: vec![InstanceRecord::new("guid-old", "orders__0", "0")],
        deleted_application: None,
    });
    let response = chain
        .resume(&params, state, command_success(result, Vec::new()))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.status, StepStatus::Succeeded);
    assert!(runtime.output(&ctx.step_path, INSTANCES_OUTCOME).is_some());
}

#[tokio::test]
async fn test_rollback_of_first_deployment_deletes() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::Basic, 2), None);
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.rollback");
    let chain = TaskChain::new(&RollbackStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RollbackParams::new(SETUP_PATH)
        .unwrap()
        .with_resize_step(RESIZE_PATH);

    assert!(chain.start(&params).await.unwrap().is_suspended());
    match runtime.last_dispatched().as_ref().and_then(command_payload) {
        Some(PlatformCommand::Rollback(command)) => {
            assert!(command.delete_new_application);
            assert!(!command.enable_old_autoscaler);
            assert!(command.upsize.is_empty());
            assert!(command.downsize.is_empty());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_rollback_publishes_no_instances() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::Basic, 2), None);
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.rollback");
    let chain = TaskChain::new(&RollbackStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RollbackParams::new(SETUP_PATH).unwrap();

    let StepProgress::Suspended { state, .. } = chain.start(&params).await.unwrap() else {
        panic!("rollback should wait on its command");
    };
    let response = chain
        .resume(&params, state, command_failure("cf scale timed out", Vec::new()))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.status, StepStatus::Failed);
    assert!(response
        .failure_message
        .as_deref()
        .is_some_and(|m| m.contains("cf scale timed out")));
    assert!(runtime.output(&ctx.step_path, INSTANCES_OUTCOME).is_none());
}

#[tokio::test]
async fn test_swap_routes_requires_blue_green() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::Canary, 2), None);
    let config = TasConfig::default();
    let ctx = step_context(SWAP_PATH);
    let chain = TaskChain::new(&SwapRoutesStep, StepEnv::new(&ctx, &runtime, &config));
    let params = SwapRoutesParams::new(SETUP_PATH).unwrap();

    let response = chain.start(&params).await.unwrap().into_response().unwrap();
    assert_eq!(response.status, StepStatus::Failed);
    assert!(runtime.dispatched().is_empty());
}

#[tokio::test]
async fn test_swap_then_swap_rollback() {
    init_test_logging();
    let runtime = InMemoryRuntime::new();
    seed(
        &runtime,
        SetupOutcomeBuilder::new(SetupVariant::BlueGreen, 4)
            .with_active(4)
            .with_inactive(),
        Some(full_swap_changes()),
    );
    let config = TasConfig::default();

    let swap_ctx = step_context(SWAP_PATH);
    let chain = TaskChain::new(&SwapRoutesStep, StepEnv::new(&swap_ctx, &runtime, &config));
    let params = SwapRoutesParams::new(SETUP_PATH)
        .unwrap()
        .with_resize_step(RESIZE_PATH)
        .with_downsize_old_application(true);
    let StepProgress::Suspended { state, .. } = chain.start(&params).await.unwrap() else {
        panic!("swap routes should wait on its command");
    };
    match runtime.last_dispatched().as_ref().and_then(command_payload) {
        Some(PlatformCommand::SwapRoutes(command)) => {
            assert_eq!(command.final_routes, vec!["orders.apps.example.com"]);
            assert_eq!(command.temp_routes, vec!["orders-temp.apps.example.com"]);
            assert_eq!(command.instance_changes.len(), 2);
            assert!(command.downsize_old_application);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    let result = CommandResult::SwapRoutes(SwapRoutesResult {
        routes_swapped: true,
        old_app_downsized: true,
        final_application_name: "orders".into(),
        instances: Vec::new(),
    });
    let response = chain
        .resume(&params, state, command_success(result, Vec::new()))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.status, StepStatus::Succeeded);
    assert_eq!(
        runtime
            .output(SWAP_PATH, SWAP_ROUTES_OUTCOME)
            .and_then(StepOutcome::into_swap_routes),
        Some(SwapRoutesOutcome {
            routes_swapped: true,
            old_app_downsized: true,
            final_application_name: "orders".into(),
        })
    );

    let rollback_ctx = step_context("pipeline.stages.deploy.steps.swapRollback");
    let chain = TaskChain::new(&SwapRollbackStep, StepEnv::new(&rollback_ctx, &runtime, &config));
    let params = SwapRollbackParams::new(SETUP_PATH, RESIZE_PATH)
        .unwrap()
        .with_swap_routes_step(SWAP_PATH)
        .with_upsize_inactive_application(true);
    assert!(chain.start(&params).await.unwrap().is_suspended());
    match runtime.last_dispatched().as_ref().and_then(command_payload) {
        Some(PlatformCommand::SwapRollback(command)) => {
            assert!(command.swap_routes_performed);
            assert!(command.upsize_inactive_application);
            assert!(command.delete_new_application);
            assert_eq!(command.upsize[0].name, "orders__0");
            assert!(command.inactive_application.is_some());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_swap_rollback_without_resize_is_skipped() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::BlueGreen, 2), None);
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.swapRollback");
    let chain = TaskChain::new(&SwapRollbackStep, StepEnv::new(&ctx, &runtime, &config));
    let params = SwapRollbackParams::new(SETUP_PATH, RESIZE_PATH).unwrap();

    let response = chain.start(&params).await.unwrap().into_response().unwrap();
    assert_eq!(response.status, StepStatus::Skipped);
    assert!(runtime.dispatched().is_empty());
}

#[tokio::test]
async fn test_failed_rolling_deploy_is_not_rolled_back() {
    init_test_logging();
    let runtime = InMemoryRuntime::new();
    let config = TasConfig::default();
    let ctx = step_context(ROLLING_PATH);
    let chain = TaskChain::new(&RollingDeployStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RollingDeployParams::new(
        vec![inline_primary("manifest", &manifest_yaml("orders", 3))],
        docker_artifact(),
    )
    .unwrap();

    let StepProgress::Suspended { state, .. } = chain.start(&params).await.unwrap() else {
        panic!("rolling deploy should wait on its command");
    };
    let response = chain
        .resume(&params, state, command_failure("staging failed", Vec::new()))
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.status, StepStatus::Failed);

    let deployed = runtime
        .output(ROLLING_PATH, ROLLING_DEPLOY_OUTCOME)
        .and_then(StepOutcome::into_rolling_deploy)
        .unwrap();
    assert!(!deployed.deployment_started);
    assert!(runtime.output(ROLLING_PATH, INSTANCES_OUTCOME).is_none());

    let rollback_ctx = step_context("pipeline.stages.deploy.steps.rollingRollback");
    let chain = TaskChain::new(
        &RollingRollbackStep,
        StepEnv::new(&rollback_ctx, &runtime, &config),
    );
    let params = RollingRollbackParams::new(ROLLING_PATH).unwrap();
    let response = chain.start(&params).await.unwrap().into_response().unwrap();
    assert_eq!(response.status, StepStatus::Skipped);
    assert_eq!(runtime.dispatched().len(), 1);
}

#[tokio::test]
async fn test_route_mapping_uses_setup_application() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::Basic, 2), None);
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.mapRoutes");
    let chain = TaskChain::new(&RouteMappingStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RouteMappingParams::for_setup(
        RouteOperation::Map,
        vec!["orders-canary.apps.example.com".into(), " ".into()],
        SETUP_PATH,
    )
    .unwrap();

    assert!(chain.start(&params).await.unwrap().is_suspended());
    match runtime.last_dispatched().as_ref().and_then(command_payload) {
        Some(PlatformCommand::RouteMapping(command)) => {
            assert_eq!(command.application_name, "orders__1");
            assert_eq!(command.routes, vec!["orders-canary.apps.example.com"]);
            assert_eq!(command.operation, RouteOperation::Map);
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_connector_fails_step() {
    let runtime = InMemoryRuntime::new();
    seed(&runtime, SetupOutcomeBuilder::new(SetupVariant::Basic, 2), None);
    runtime.remove_connector(CONNECTOR);
    let config = TasConfig::default();
    let ctx = step_context("pipeline.stages.deploy.steps.mapRoutes");
    let chain = TaskChain::new(&RouteMappingStep, StepEnv::new(&ctx, &runtime, &config));
    let params = RouteMappingParams::for_application(
        RouteOperation::Unmap,
        vec!["orders.apps.example.com".into()],
        "orders__0",
    )
    .unwrap();

    let response = chain.start(&params).await.unwrap().into_response().unwrap();
    assert_eq!(response.status, StepStatus::Failed);
    assert!(response
        .failure_message
        .as_deref()
        .is_some_and(|m| m.contains(CONNECTOR)));
    assert!(runtime.dispatched().is_empty());
}
