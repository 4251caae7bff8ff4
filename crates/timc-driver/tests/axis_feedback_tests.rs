//! 启动流程、手动轴操作与反馈采样集成测试

use std::time::{Duration, Instant};
use timc_driver::{
    AxisId, Channel, DriverError, FEEDBACK_TABLE, FeedbackSampler, FeedbackTick, JogDirection,
    Timc,
};
use timc_link::mock::{ScriptedLink, SimulatedController};
use timc_protocol::{AxisParameter, ToolKind};

const AXES: [&str; 2] = ["TRANSLATOR", "CIRCUMFERENTIAL"];

fn start(sim: &SimulatedController) -> Timc {
    Timc::builder()
        .link(sim.link())
        .background_workers(false)
        .build()
        .unwrap()
}

#[test]
fn test_startup_reads_parameters_and_disables_axes() {
    let sim = SimulatedController::new(&AXES);
    sim.set_enabled("TRANSLATOR", true);
    sim.set_param("CIRCUMFERENTIAL", 123, "40");
    let timc = start(&sim);
    let ctx = timc.context();

    let log = sim.command_log();
    assert_eq!(&log[..2], ["ACKNOWLEDGEALL", "WAIT MODE NOWAIT"]);
    assert_eq!(log[2], "GETPARM(TRANSLATOR, 32)");
    assert!(log.contains(&"DISABLE TRANSLATOR".to_string()));
    assert!(log.contains(&"DISABLE CIRCUMFERENTIAL".to_string()));

    assert!(timc.is_online());
    assert_eq!(ctx.tool(), ToolKind::Nova);
    assert!(!ctx.axis(AxisId::Axis1).is_enabled());
    assert!(!sim.is_enabled("TRANSLATOR"));
    assert_eq!(ctx.axis(AxisId::Axis2).params().max_jog_speed, 40.0);
    assert_eq!(ctx.axis(AxisId::Axis1).params().units_name, "mm");
}

#[test]
fn test_lapis_reverses_translator_jog() {
    let sim = SimulatedController::new(&AXES);
    sim.set_param("TRANSLATOR", 41, "2");
    let timc = start(&sim);
    let ctx = timc.context();
    assert_eq!(ctx.tool(), ToolKind::Lapis);

    assert!(ctx.enable(AxisId::Axis1).unwrap());
    sim.clear_log();
    ctx.jog(AxisId::Axis1, JogDirection::Forward, 10.0).unwrap();
    assert_eq!(
        sim.command_log(),
        vec!["ABORT TRANSLATOR", "FREERUN TRANSLATOR -10"]
    );
}

#[test]
fn test_handshake_failure_starts_offline() {
    let timc = Timc::builder()
        .link(ScriptedLink::new([""]))
        .build()
        .unwrap();
    let ctx = timc.context();

    assert!(!timc.is_online());
    assert_eq!(ctx.info(), "OFFLINE MODE");
    assert!(!timc.workers_alive());
    assert!(matches!(ctx.enable(AxisId::Axis1), Err(DriverError::Offline)));
    assert_eq!(ctx.axis(AxisId::Axis1).params().max_jog_speed, 25.0);
    assert_eq!(ctx.tool(), ToolKind::Nova);
}

#[test]
fn test_offline_uses_configured_tool() {
    let timc = Timc::builder().offline().offline_tool(ToolKind::Lapis).build().unwrap();
    let ctx = timc.context();
    assert_eq!(ctx.tool(), ToolKind::Lapis);
    assert_eq!(ctx.axis(AxisId::Axis1).jog_multiplier(), -1.0);
    assert_eq!(ctx.axis(AxisId::Axis2).jog_multiplier(), 1.0);
}

#[test]
fn test_enable_requires_confirmation() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();

    // 故障中的轴拒绝使能，状态位不会置位
    sim.set_fault("CIRCUMFERENTIAL", 0b10);
    assert!(!ctx.enable(AxisId::Axis2).unwrap());
    assert!(!ctx.axis(AxisId::Axis2).is_enabled());

    assert!(ctx.enable(AxisId::Axis1).unwrap());
    assert!(ctx.axis(AxisId::Axis1).is_enabled());

    ctx.disable(AxisId::Axis1);
    assert!(!ctx.axis(AxisId::Axis1).is_enabled());
    assert!(!sim.is_enabled("TRANSLATOR"));
}

#[test]
fn test_manual_motion_guards() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();

    assert!(matches!(
        ctx.go_to(AxisId::Axis1, 5.0, 10.0),
        Err(DriverError::AxisDisabled(_))
    ));

    assert!(ctx.enable(AxisId::Axis1).unwrap());
    assert!(matches!(
        ctx.go_to(AxisId::Axis1, 10_000.0, 10.0),
        Err(DriverError::InvalidInput(_))
    ));
    assert!(matches!(
        ctx.move_inc(AxisId::Axis1, 1.0, 0.0),
        Err(DriverError::InvalidInput(_))
    ));

    ctx.axis(AxisId::Axis1).set_channel(Channel::Scan);
    assert!(matches!(
        ctx.jog(AxisId::Axis1, JogDirection::Reverse, 5.0),
        Err(DriverError::AxisBusy(_))
    ));
    ctx.axis(AxisId::Axis1).set_channel(Channel::Control);
}

#[test]
fn test_manual_motion_commands() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();
    assert!(ctx.enable(AxisId::Axis1).unwrap());
    sim.clear_log();

    ctx.go_to(AxisId::Axis1, 20.0, 12.4).unwrap();
    assert_eq!(sim.position("TRANSLATOR"), 20.0);
    ctx.move_inc(AxisId::Axis1, -2.5, 12.4).unwrap();
    assert_eq!(sim.position("TRANSLATOR"), 17.5);
    ctx.set_to(AxisId::Axis1, 0.0).unwrap();
    assert_eq!(sim.position("TRANSLATOR"), 0.0);

    // 点动速度钳位到最大点动速度（25）
    ctx.jog(AxisId::Axis1, JogDirection::Forward, 100.0).unwrap();
    ctx.stop_jog(AxisId::Axis1).unwrap();
    ctx.abort(AxisId::Axis1).unwrap();

    assert_eq!(
        sim.command_log(),
        vec![
            "MOVEABS TRANSLATOR 20 F 12.4",
            "MOVEINC TRANSLATOR -2.5 F 12.4",
            "POSOFFSET SET TRANSLATOR, 0",
            "ABORT TRANSLATOR",
            "FREERUN TRANSLATOR 25",
            "FREERUN TRANSLATOR 0",
            "ABORT TRANSLATOR",
        ]
    );
}

#[test]
fn test_rejected_command_surfaces_reply() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();
    assert!(ctx.enable(AxisId::Axis2).unwrap());

    sim.inject_response("MOVEABS", "#\n");
    match ctx.go_to(AxisId::Axis2, 90.0, 5.0) {
        Err(DriverError::Rejected { command, .. }) => {
            assert_eq!(command, "MOVEABS CIRCUMFERENTIAL 90 F 5")
        },
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(timc.metrics().cannot_execute, 1);
}

#[test]
fn test_set_parameter_updates_local_copy() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();

    ctx.set_parameter(AxisId::Axis1, AxisParameter::MaxJogSpeed, "30")
        .unwrap();
    ctx.commit_parameters().unwrap();
    assert_eq!(sim.param("TRANSLATOR", 123).as_deref(), Some("30"));
    assert_eq!(ctx.axis(AxisId::Axis1).params().max_jog_speed, 30.0);

    assert!(ctx
        .set_parameter(AxisId::Axis1, AxisParameter::MaxJogSpeed, "fast")
        .is_err());
    assert_eq!(ctx.axis(AxisId::Axis1).params().max_jog_speed, 30.0);
}

/// 驱动采样器直到解释了 `count` 个响应，每次 tick 后检查游标关系
fn drive(sampler: &mut FeedbackSampler, count: usize) -> Vec<FeedbackTick> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    while received.len() < count {
        assert!(Instant::now() < deadline, "feedback sampler stalled");
        let tick = sampler.tick();
        assert_ne!(tick, FeedbackTick::Offline);
        if matches!(tick, FeedbackTick::Received(..)) {
            received.push(tick);
        }
        // 写游标最多领先读游标一格
        let lead = (sampler.write_cursor() + FEEDBACK_TABLE.len() - sampler.read_cursor())
            % FEEDBACK_TABLE.len();
        assert!(lead <= 1);
        assert_eq!(lead == 1, sampler.outstanding());
        std::thread::yield_now();
    }
    received
}

#[test]
fn test_feedback_cursors_in_lock_step() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();
    // 启动时的 DISABLE 会清零速度，遥测在启动之后注入
    sim.set_position("TRANSLATOR", 12.344);
    sim.set_telemetry("TRANSLATOR", 1.5, 2.0, 0.1);
    sim.set_position("CIRCUMFERENTIAL", -90.0);
    sim.set_telemetry("CIRCUMFERENTIAL", 0.5, -3.0, 4.0);

    let mut sampler = FeedbackSampler::new(ctx.clone());
    let received = drive(&mut sampler, FEEDBACK_TABLE.len() * 3);

    // 响应按表顺序解释
    for (n, tick) in received.iter().enumerate() {
        let (axis, field) = FEEDBACK_TABLE[n % FEEDBACK_TABLE.len()];
        assert_eq!(*tick, FeedbackTick::Received(axis, field));
    }

    let t1 = ctx.axis(AxisId::Axis1).telemetry();
    assert_eq!(t1.position, 12.34);
    assert_eq!(t1.current, 1.5);
    assert_eq!(t1.velocity, 2.0);
    assert_eq!(t1.position_error, 0.1);
    let t2 = ctx.axis(AxisId::Axis2).telemetry();
    assert_eq!(t2.position, -90.0);
    assert_eq!(t2.velocity, -3.0);
    assert!(ctx.axis(AxisId::Axis2).snapshot().position_error_exceeded());

    let feedback = timc.metrics().exchanges_on(Channel::Feedback);
    assert!(feedback >= (FEEDBACK_TABLE.len() * 3) as u64);
}

#[test]
fn test_feedback_skips_unreadable_response() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let ctx = timc.context();
    sim.set_telemetry("TRANSLATOR", 1.5, 2.0, 0.1);

    sim.inject_response("IFBK(TRANSLATOR)", "%n/a\n");
    let mut sampler = FeedbackSampler::new(ctx.clone());
    drive(&mut sampler, FEEDBACK_TABLE.len());

    // 不可解析的响应被跳过，后续字段仍按顺序对齐
    let t1 = ctx.axis(AxisId::Axis1).telemetry();
    assert_eq!(t1.current, 0.0);
    assert_eq!(t1.velocity, 2.0);
    assert_eq!(t1.position_error, 0.1);
}

#[test]
fn test_feedback_goes_offline() {
    let sim = SimulatedController::new(&AXES);
    let timc = start(&sim);
    let mut sampler = FeedbackSampler::new(timc.context().clone());

    sim.set_link_down(true);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        assert!(Instant::now() < deadline, "offline not observed");
        if sampler.tick() == FeedbackTick::Offline {
            break;
        }
        std::thread::yield_now();
    }
    assert!(!timc.is_online());
}

#[test]
fn test_shutdown_disables_both_axes() {
    let sim = SimulatedController::new(&AXES);
    let timc = Timc::builder().link(sim.link()).build().unwrap();
    for id in AxisId::BOTH {
        assert!(timc.context().enable(id).unwrap());
    }
    assert!(timc.workers_alive());

    drop(timc);

    let log = sim.command_log();
    assert!(log.iter().any(|c| c == "DISABLE TRANSLATOR"));
    assert!(log.iter().any(|c| c == "DISABLE CIRCUMFERENTIAL"));
    assert!(!sim.is_enabled("TRANSLATOR"));
    assert!(!sim.is_enabled("CIRCUMFERENTIAL"));
}
