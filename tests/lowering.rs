//! End-to-end lowering of small schedules through the public API.

use jitlower::{
    compile_function,
    emit::{BlockHandle, Callee, CastKind, Constant, Emitter, Intrinsic, LirEmitter, LirFunction, Op, ValueHandle},
    graph::{BlockId, GraphModel, ValueId},
    liveness::LivenessAnalysis,
    lower::{
        LoweredFunction, SsaBuilder, ISOLATE_EXTERNAL_REFERENCE_MAGIC, RECORD_STUB_CODE_MAGIC,
    },
    schedule::{Instruction, MachineRepresentation, Schedule, ScheduleVisitor},
    stackmap::info::{CallKind, ExceptionInfo, StackMapInfo},
    Backend, Error, LoweringConfig, Result,
};

fn compile_with(text: &str, config: &LoweringConfig) -> Result<(LirFunction, LoweredFunction)> {
    let schedule = Schedule::from_text(text)?;
    let mut emitter = LirEmitter::new("test");
    let lowered = compile_function(Backend::initialize(), &schedule, config, &mut emitter)?;
    Ok((emitter.into_function(), lowered))
}

fn compile(text: &str) -> Result<(LirFunction, LoweredFunction)> {
    compile_with(text, &LoweringConfig::default())
}

fn block(function: &LirFunction, name: &str) -> BlockHandle {
    function
        .block_named(name)
        .unwrap_or_else(|| panic!("no block {name}"))
}

fn calls_in(function: &LirFunction, intrinsic: Intrinsic, name: &str) -> Vec<ValueHandle> {
    let target = block(function, name);
    function
        .calls_to(Callee::Intrinsic(intrinsic))
        .into_iter()
        .filter(|call| function.block_of(*call) == Some(target))
        .collect()
}

fn int(function: &LirFunction, value: ValueHandle) -> i64 {
    match function.constant(value) {
        Some(Constant::Int(c)) => c,
        other => panic!("{value} is not an integer constant: {other:?}"),
    }
}

#[test]
fn graph_scenario_copies_single_predecessor_values() -> Result<()> {
    let (function, _) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         Goto -> B1
         --- BLOCK B1 <- B0 ---
         2: Int32Constant[0]
         3: Return(2, 1)",
    )?;

    assert!(function.phis(block(&function, "B1")).is_empty());
    let returns = calls_in(&function, Intrinsic::Patchpoint, "B1");
    let returned = function.call_args(returns[0])[4];
    assert_eq!(function.param_index(returned), Some(0));
    Ok(())
}

#[test]
fn loop_scenario_defers_then_resolves_the_phi() -> Result<()> {
    let backend = Backend::initialize();
    let config = LoweringConfig::default();
    let schedule = Schedule::from_text(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         Goto -> B1
         --- BLOCK B1 <- B0, B2 ---
         2: Phi[kRepTagged](1, 4)
         3: Int32Constant[1]
         5: Branch(3) -> B2, B3
         --- BLOCK B2 <- B1 ---
         4: Parameter[1, kRepTagged]
         Goto -> B1
         --- BLOCK B3 <- B1 ---
         6: Int32Constant[0]
         7: Return(6, 2)",
    )?;

    let mut graph = GraphModel::new();
    let mut liveness = LivenessAnalysis::new(&mut graph);
    schedule.replay(&mut liveness)?;
    liveness.finish()?;

    let mut emitter = LirEmitter::new("loop");
    {
        let mut builder = SsaBuilder::new(backend, &config, &mut graph, &mut emitter)?;
        let b = BlockId::new;
        let v = ValueId::new;

        builder.visit_block(b(0), false, &[])?;
        builder.visit_instruction(
            v(1),
            &Instruction::Parameter {
                index: 0,
                representation: MachineRepresentation::Tagged,
            },
        )?;
        builder.visit_goto(b(1))?;
        builder.visit_block(b(1), false, &[b(0), b(2)])?;
        builder.visit_instruction(
            v(2),
            &Instruction::Phi {
                representation: MachineRepresentation::Tagged,
                inputs: vec![v(1), v(4)],
            },
        )?;
        assert_eq!(builder.pending_phi_blocks(), vec![b(1)]);
        let placeholder = &builder.phi_placeholders(b(1)).unwrap()[0];
        assert_eq!(placeholder.pending_count(), 1);

        // the rest of the function, straight from the schedule
        for scheduled in &schedule.blocks()[1..] {
            if scheduled.id != b(1) {
                builder.visit_block(scheduled.id, scheduled.deferred, &scheduled.predecessors)?;
            }
            for node in &scheduled.body {
                match node {
                    jitlower::schedule::Node::Instruction(id, instruction) => {
                        if *id != v(2) {
                            builder.visit_instruction(*id, instruction)?;
                        }
                    }
                    jitlower::schedule::Node::Goto(target) => builder.visit_goto(*target)?,
                }
            }
        }
        builder.finish()?;
    }

    let function = emitter.into_function();
    let phis = function.phis(block(&function, "B1"));
    assert_eq!(phis.len(), 1);
    let sources: Vec<_> = function
        .phi_incoming(phis[0])
        .iter()
        .map(|(_, from)| function.block_name(*from).unwrap())
        .collect();
    assert_eq!(sources, vec!["B0", "B2"]);
    assert!(graph.blocks().all(|block| !block.has_attachment()));
    Ok(())
}

fn loop_with_back_edge(back_edge_value: &str) -> String {
    format!(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         Goto -> B1
         --- BLOCK B1 <- B0, B2 ---
         2: Phi[kRepTagged](1, 4)
         3: Int32Constant[1]
         5: Branch(3) -> B2, B3
         --- BLOCK B2 <- B1 ---
         4: {back_edge_value}
         Goto -> B1
         --- BLOCK B3 <- B1 ---
         6: Int32Constant[0]
         7: Return(6, 2)"
    )
}

#[test]
fn word_sized_back_edge_value_is_cast_in_the_latch() -> Result<()> {
    let (function, _) = compile(&loop_with_back_edge("Int64Constant[8]"))?;

    let latch = block(&function, "B2");
    let body = function.instructions(latch);
    assert_eq!(body.len(), 2);
    assert!(matches!(
        function.op(body[0]),
        Some(Op::Cast {
            kind: CastKind::IntToPtr,
            ..
        })
    ));
    assert!(matches!(function.op(body[1]), Some(Op::Br { .. })));

    let phis = function.phis(block(&function, "B1"));
    assert_eq!(phis.len(), 1);
    let incoming = function.phi_incoming(phis[0]);
    assert_eq!(function.param_index(incoming[0].0), Some(0));
    assert_eq!(incoming[1], (body[0], latch));
    Ok(())
}

#[test]
fn narrow_back_edge_value_is_a_representation_defect() {
    let result = compile(&loop_with_back_edge("Int32Constant[8]"));
    assert!(matches!(result, Err(Error::RepresentationDefect { .. })));
}

#[test]
fn sparse_value_ids_compile() -> Result<()> {
    let (function, _) = compile(
        "--- BLOCK B0 ---
         4000000000: Parameter[0, kRepTagged]
         Goto -> B1
         --- BLOCK B1 <- B0 ---
         4000000001: Int32Constant[0]
         4000000002: Return(4000000001, 4000000000)",
    )?;

    let returns = calls_in(&function, Intrinsic::Patchpoint, "B1");
    assert_eq!(function.param_index(function.call_args(returns[0])[4]), Some(0));
    Ok(())
}

#[test]
fn defect_scenario_predecessor_never_scheduled() {
    let schedule = Schedule::from_text(
        "--- BLOCK B0 ---
         1: Int32Constant[0]
         Goto -> B1
         --- BLOCK B1 <- B0, B5 ---
         2: Return(1, 1)",
    )
    .unwrap();

    let mut graph = GraphModel::new();
    let mut liveness = LivenessAnalysis::new(&mut graph);
    schedule.replay(&mut liveness).unwrap();
    let err = liveness.finish().unwrap_err();
    assert!(matches!(err, Error::ScheduleDefect { .. }));
}

#[test]
fn liveness_is_sound_over_a_diamond() -> Result<()> {
    let schedule = Schedule::from_text(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Parameter[1, kRepWord32]
         3: Branch(2) -> B1, B2
         --- BLOCK B1 <- B0 ---
         4: Int32Constant[0]
         Goto -> B3
         --- BLOCK B2 <- B0 ---
         5: Int32Constant[1]
         Goto -> B3
         --- BLOCK B3 <- B1, B2 ---
         6: Phi[kRepWord32](4, 5)
         7: Return(6, 1)",
    )?;

    let mut graph = GraphModel::new();
    let mut liveness = LivenessAnalysis::new(&mut graph);
    schedule.replay(&mut liveness)?;
    liveness.finish()?;

    let live = |id: u32| graph.block_by_id(BlockId::new(id)).unwrap().live_ins().to_vec();
    assert!(live(0).is_empty());
    assert_eq!(live(1), vec![ValueId::new(1)]);
    assert_eq!(live(2), vec![ValueId::new(1)]);
    // phi operands are live out of their predecessor only
    assert_eq!(live(3), vec![ValueId::new(1)]);

    Ok(())
}

#[test]
fn invoke_relocates_into_both_successors() -> Result<()> {
    let (function, lowered) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Parameter[1, kRepTagged]
         3: Parameter[2, kRepTagged]
         4: Invoke[code; ; 1](1) -> B1, B2
         --- BLOCK B1 <- B0 ---
         5: Int32Constant[0]
         6: Return(5, 4, 2)
         --- BLOCK B2 (deferred) <- B0 ---
         7: IfException
         8: Int32Constant[0]
         9: Return(8, 2, 3)",
    )?;

    let entry = block(&function, "B0");
    let Some(Op::Invoke { args, .. }) = function.terminator(entry) else {
        panic!("B0 does not end in an invoke");
    };
    // live v2 is passed once although both successors need it
    assert_eq!(args.len(), 21);
    assert_eq!(function.param_index(args[19]), Some(1));
    assert_eq!(function.param_index(args[20]), Some(2));

    let landing = block(&function, "B2");
    assert!(matches!(
        function.op(function.instructions(landing)[0]),
        Some(Op::LandingPad)
    ));

    let relocated = |name: &str| -> Vec<(i64, Option<u32>)> {
        calls_in(&function, Intrinsic::GcRelocate, name)
            .into_iter()
            .map(|relocate| {
                let relocate_args = function.call_args(relocate);
                let position = int(&function, relocate_args[1]);
                assert_eq!(position, int(&function, relocate_args[2]));
                let index = usize::try_from(position).unwrap();
                (position, function.param_index(args[index]))
            })
            .collect()
    };
    assert_eq!(relocated("B1"), vec![(19, Some(1))]);
    let mut landing_relocations = relocated("B2");
    landing_relocations.sort_unstable();
    assert_eq!(landing_relocations, vec![(19, Some(1)), (20, Some(2))]);

    match lowered.info.get(0) {
        Some(StackMapInfo::Call(call)) => assert_eq!(call.kind, CallKind::Invoke),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        lowered.info.get(2),
        Some(&StackMapInfo::Exception(ExceptionInfo { call_patch_id: 0 }))
    );
    Ok(())
}

#[test]
fn relocated_value_flows_around_the_back_edge() -> Result<()> {
    let (function, _) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         Goto -> B1
         --- BLOCK B1 <- B0, B3 ---
         2: Int32Constant[1]
         3: Branch(2) -> B2, B4
         --- BLOCK B2 <- B1 ---
         4: Call[code; ; 1](1)
         Goto -> B3
         --- BLOCK B3 <- B2 ---
         Goto -> B1
         --- BLOCK B4 <- B1 ---
         5: Int32Constant[0]
         6: Return(5, 1)",
    )?;

    let header = function.phis(block(&function, "B1"));
    assert_eq!(header.len(), 1);
    let incoming = function.phi_incoming(header[0]);
    assert_eq!(function.param_index(incoming[0].0), Some(0));

    let relocates = calls_in(&function, Intrinsic::GcRelocate, "B3");
    assert_eq!(relocates.len(), 1);
    assert_eq!(incoming[1], (relocates[0], block(&function, "B3")));
    assert_eq!(int(&function, function.call_args(relocates[0])[1]), 19);

    // the statepoint keeps the header phi itself live, not the parameter
    let statepoints = calls_in(&function, Intrinsic::Statepoint, "B2");
    assert_eq!(statepoints.len(), 1);
    let args = function.call_args(statepoints[0]);
    assert_eq!(args.len(), 20);
    assert_eq!(args[19], header[0]);
    Ok(())
}

#[test]
fn tail_call_leaves_the_frame() -> Result<()> {
    let (function, lowered) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Parameter[1, kRepTagged]
         3: TailCall[address; 0; 0](1, 2)",
    )?;

    assert!(lowered.needs_frame);
    assert_eq!(calls_in(&function, Intrinsic::Patchpoint, "B0").len(), 1);
    assert!(matches!(
        function.terminator(block(&function, "B0")),
        Some(Op::Unreachable)
    ));
    match lowered.info.get(0) {
        Some(StackMapInfo::Call(call)) => {
            assert_eq!(call.kind, CallKind::TailCall);
            assert_eq!(call.locations, vec![1]);
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn switch_cases_come_from_if_value() -> Result<()> {
    let (function, _) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepWord32]
         2: Switch(1) -> B1, B2, B3
         --- BLOCK B1 <- B0 ---
         3: IfValue[5]
         4: Return(1, 1)
         --- BLOCK B2 <- B0 ---
         5: IfValue[7]
         6: Return(1, 1)
         --- BLOCK B3 <- B0 ---
         7: IfDefault
         8: Return(1, 1)",
    )?;

    let Some(Op::Switch { default, cases, .. }) = function.terminator(block(&function, "B0")) else {
        panic!("B0 does not end in a switch");
    };
    assert_eq!(*default, block(&function, "B3"));
    assert_eq!(
        cases,
        &vec![(5, block(&function, "B1")), (7, block(&function, "B2"))]
    );
    Ok(())
}

#[test]
fn full_store_barrier_skips_small_integers() -> Result<()> {
    let (function, lowered) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Parameter[1, kRepTagged]
         3: Int64Constant[16]
         4: Store[kRepTagged, FullWriteBarrier](1, 3, 2)
         5: Int32Constant[0]
         6: Return(5, 2)",
    )?;

    assert!(matches!(
        function.terminator(block(&function, "B0")),
        Some(Op::CondBr { .. })
    ));
    assert_eq!(calls_in(&function, Intrinsic::Patchpoint, "B0.v4.barrier").len(), 1);
    // the return lands in the continuation
    assert_eq!(
        calls_in(&function, Intrinsic::Patchpoint, "B0.v4.continuation").len(),
        1
    );
    assert_eq!(lowered.info.get(0), Some(&StackMapInfo::StoreBarrier));
    assert!(lowered.constants.query(ISOLATE_EXTERNAL_REFERENCE_MAGIC).is_some());
    assert!(lowered.constants.query(RECORD_STUB_CODE_MAGIC).is_some());
    Ok(())
}

#[test]
fn map_barrier_has_no_small_integer_check() -> Result<()> {
    let (function, _) = compile(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: HeapConstant[0x1000]
         3: Int64Constant[0]
         4: Store[kRepTagged, MapWriteBarrier](1, 3, 2)
         5: Int32Constant[0]
         6: Return(5, 1)",
    )?;

    assert!(matches!(
        function.terminator(block(&function, "B0")),
        Some(Op::Br { .. })
    ));
    Ok(())
}

#[test]
fn mismatched_representation_is_a_defect() {
    let err = compile(
        "--- BLOCK B0 ---
         1: Float64Constant[1.5]
         2: Int32Constant[1]
         3: Int32Add(1, 2)
         4: Return(2, 3)",
    )
    .unwrap_err();
    assert!(matches!(err, Error::RepresentationDefect { .. }));
}

#[test]
fn too_many_stack_operands_exhaust_the_slots() {
    let config = LoweringConfig::default()
        .with_slot_count(3)
        .with_frame_pointer_slot(2);
    let err = compile_with(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Parameter[1, kRepTagged]
         3: Parameter[2, kRepTagged]
         4: Call[code; -1, -1; 1](1, 2, 3)
         Goto -> B1
         --- BLOCK B1 <- B0 ---
         5: Int32Constant[0]
         6: Return(5, 4)",
        &config,
    )
    .unwrap_err();
    assert!(matches!(err, Error::SlotsExhausted { operands: 3, slots: 3 }));
}

#[test]
fn constant_pop_count_includes_stack_parameters() -> Result<()> {
    let config = LoweringConfig::default().with_stack_parameter_count(2);
    let (_, lowered) = compile_with(
        "--- BLOCK B0 ---
         1: Parameter[0, kRepTagged]
         2: Int32Constant[1]
         3: Return(2, 1)",
        &config,
    )?;
    match lowered.info.get(0) {
        Some(StackMapInfo::Return(info)) => {
            assert!(info.pop_count_is_constant);
            assert_eq!(info.constant, 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn emitter_trait_object_is_accepted() -> Result<()> {
    let schedule = Schedule::from_text(
        "--- BLOCK B0 ---
         1: Int32Constant[0]
         2: Return(1, 1)",
    )?;
    let mut recorder = LirEmitter::new("dyn");
    let emitter: &mut dyn Emitter = &mut recorder;
    compile_function(Backend::initialize(), &schedule, &LoweringConfig::new(), emitter)?;
    assert!(recorder.function().to_string().starts_with("define @dyn {"));
    Ok(())
}
