mod common;

use common::{Fixture, call, fixture, literal, load_arg};
use flowcfg::cfg::args::fill_block_arguments;
use flowcfg::cfg::instructions::{ArgPresent, Cast, LoadArg, LoadYieldParams, Return};
use flowcfg::cfg::{
    Binding, BlockParam, CfgBuilder, InsnRef, Instruction, LocalRef, MalformedCfg,
    VariableUseSite,
};
use flowcfg::config::InferenceConfig;
use flowcfg::global::{LocOffsets, NameRef, Type};
use flowcfg::infer::infer;
use test_case::test_case;

fn raw_binding(value: Instruction) -> Binding {
    Binding {
        bind: VariableUseSite::new(LocalRef::no_variable()),
        loc: LocOffsets::none(),
        value,
    }
}

#[test]
fn verify_rejects_unknown_variables() {
    let Fixture {
        mut gs,
        untyped_arg,
        ..
    } = fixture();
    let mut cfg = CfgBuilder::new(untyped_arg).finish(&gs);
    let mut other = CfgBuilder::new(untyped_arg);
    let stray = other.enter_local(gs.names.intern("stray"));

    cfg.basic_blocks[0]
        .exprs
        .push(raw_binding(Instruction::new(Return::new(stray))));

    assert_eq!(
        cfg.verify(&gs),
        Err(MalformedCfg::DanglingVariable {
            at: InsnRef {
                block: cfg.basic_blocks[0].id,
                index: 0,
            },
            variable: stray,
        })
    );
}

#[test]
fn verify_rejects_unknown_links() {
    let Fixture {
        mut gs,
        untyped_arg,
        ..
    } = fixture();
    let mut cfg = CfgBuilder::new(untyped_arg).finish(&gs);
    let mut other = CfgBuilder::new(untyped_arg);
    let link = other.new_link(gs.names.intern("each"), vec![]);

    cfg.basic_blocks[0]
        .exprs
        .push(raw_binding(Instruction::new(LoadYieldParams { link })));

    assert!(
        matches!(cfg.verify(&gs), Err(MalformedCfg::DanglingLink { .. })),
        "{:?}",
        cfg.verify(&gs)
    );
}

#[test]
fn verify_rejects_jumps_to_unknown_blocks() {
    let Fixture { gs, untyped_arg, .. } = fixture();
    let mut other = CfgBuilder::new(untyped_arg);
    other.new_block();
    let far = other.new_block();

    let mut builder = CfgBuilder::new(untyped_arg);
    let entry = builder.entry();
    builder.goto(entry, far);

    assert_eq!(
        builder.cfg().verify(&gs),
        Err(MalformedCfg::DanglingBlock {
            from: entry,
            to: far
        })
    );
}

#[test]
fn verify_rejects_a_link_carried_by_two_calls() {
    let Fixture { mut gs, run, .. } = fixture();
    let tally = gs.names.intern("tally");
    let mut builder = CfgBuilder::new(run);
    let entry = builder.entry();
    let link = builder.new_link(tally, vec![]);
    let first = builder.push(
        entry,
        LocalRef::no_variable(),
        LocOffsets::none(),
        call(LocalRef::self_variable(), tally, &[], Some(link)),
    );
    let mut cfg = builder.finish(&gs);
    assert_eq!(cfg.link(link).owner(), Some(first));

    cfg.basic_blocks[0].exprs.push(raw_binding(Instruction::from(call(
        LocalRef::self_variable(),
        tally,
        &[],
        Some(link),
    ))));

    match cfg.verify(&gs) {
        Err(MalformedCfg::LinkOwnerMismatch {
            recorded, actual, ..
        }) => {
            assert_eq!(recorded, Some(first));
            assert_eq!(actual.index, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn verify_rejects_unknown_cast_kinds() {
    let Fixture {
        mut gs,
        untyped_arg,
        ..
    } = fixture();
    let mut builder = CfgBuilder::new(untyped_arg);
    let entry = builder.entry();
    let v = literal(&mut gs, &mut builder, entry, "v", Type::int_literal(1));
    let mut cfg = builder.finish(&gs);

    cfg.basic_blocks[0].exprs.push(raw_binding(Instruction::new(Cast {
        cast: NameRef::blk(),
        value: VariableUseSite::new(v),
        ty: Type::integer(),
    })));

    assert_eq!(
        cfg.verify(&gs),
        Err(MalformedCfg::UnknownCastKind {
            at: InsnRef { block: entry, index: 1 },
            cast: NameRef::blk(),
        })
    );
}

#[test]
#[should_panic(expected = "unknown cast kind")]
fn casts_are_built_with_a_known_kind() {
    Cast::new(LocalRef::self_variable(), Type::integer(), NameRef::blk());
}

#[test_case(|f: &Fixture| Instruction::new(LoadArg { arg_id: 7, method: f.untyped_arg }) ; "argument past the end")]
#[test_case(|f: &Fixture| Instruction::new(ArgPresent { arg_id: 0, method: f.widget }) ; "class instead of a method")]
fn verify_rejects_dangling_arguments(insn: fn(&Fixture) -> Instruction) {
    let fx = fixture();
    let mut cfg = CfgBuilder::new(fx.untyped_arg).finish(&fx.gs);

    cfg.basic_blocks[0].exprs.push(raw_binding(insn(&fx)));

    assert!(
        matches!(
            cfg.verify(&fx.gs),
            Err(MalformedCfg::DanglingArgument { at: InsnRef { index: 0, .. }, .. })
        ),
        "{:?}",
        cfg.verify(&fx.gs)
    );
}

#[test]
#[should_panic(expected = "already owned")]
fn builder_refuses_to_share_a_link() {
    let Fixture { mut gs, run, .. } = fixture();
    let tally = gs.names.intern("tally");
    let mut builder = CfgBuilder::new(run);
    let entry = builder.entry();
    let link = builder.new_link(tally, vec![BlockParam::new(gs.names.intern("i"))]);
    for _ in 0..2 {
        builder.push(
            entry,
            LocalRef::no_variable(),
            LocOffsets::none(),
            call(LocalRef::self_variable(), tally, &[], Some(link)),
        );
    }
}

#[test]
fn traversal_skips_unreachable_blocks() {
    let Fixture { mut gs, flag, .. } = fixture();
    let mut builder = CfgBuilder::new(flag);
    let entry = builder.entry();
    let left = builder.new_block();
    let right = builder.new_block();
    let join = builder.new_block();
    let orphan = builder.new_block();
    let c = load_arg(&mut gs, &mut builder, entry, "c", flag, 0);
    builder.branch(entry, LocOffsets::none(), c, left, right);
    builder.goto(left, join);
    builder.goto(right, join);
    builder.goto(orphan, join);
    let cfg = builder.finish(&gs);

    let order = cfg.reverse_postorder();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], entry);
    assert_eq!(order[3], join);
    assert!(!order.contains(&orphan));

    let preds = cfg.predecessors();
    assert_eq!(preds[join.to_idx()], vec![left, right, orphan]);
    assert!(preds[entry.to_idx()].is_empty());
}

#[test]
fn loop_header_takes_the_variables_it_carries() {
    let Fixture { mut gs, flag, .. } = fixture();
    let plus = gs.names.intern("+");
    let mut builder = CfgBuilder::new(flag);
    let entry = builder.entry();
    let header = builder.new_block();
    let body = builder.new_block();
    let exit = builder.new_block();

    let c = load_arg(&mut gs, &mut builder, entry, "c", flag, 0);
    let x = literal(&mut gs, &mut builder, entry, "x", Type::int_literal(1));
    builder.goto(entry, header);
    builder.branch(header, LocOffsets::none(), c, body, exit);
    let one = literal(&mut gs, &mut builder, body, "one", Type::int_literal(1));
    builder.push(body, x, LocOffsets::none(), call(x, plus, &[one], None));
    builder.goto(body, header);
    builder.push(exit, LocalRef::no_variable(), LocOffsets::none(), Return::new(x));
    let mut cfg = builder.finish(&gs);

    fill_block_arguments(&mut cfg);

    assert!(cfg.block(entry).args.is_empty());
    assert_eq!(cfg.block(header).args, vec![c, x]);
    assert_eq!(cfg.block(body).args, vec![c, x]);
    assert_eq!(cfg.block(exit).args, vec![x]);
}

#[test]
fn rendering_shows_inferred_use_sites() {
    let Fixture { mut gs, run, .. } = fixture();
    let mut builder = CfgBuilder::new(run);
    let entry = builder.entry();
    let count = load_arg(&mut gs, &mut builder, entry, "count", run, 0);
    let to_s = gs.names.intern("to_s");
    let text = builder.enter_local(gs.names.intern("text"));
    builder.push(entry, text, LocOffsets::none(), call(count, to_s, &[], None));
    builder.push(entry, LocalRef::no_variable(), LocOffsets::none(), Return::new(count));
    let mut cfg = builder.finish(&gs);

    let before = cfg.show(&gs).unwrap();
    assert!(before.starts_with("method Widget#run {"), "{before}");
    assert!(before.contains("return count"), "{before}");
    assert!(!before.contains("count: Integer"), "{before}");

    infer(&gs, &mut cfg, &InferenceConfig::default());

    let after = cfg.show(&gs).unwrap();
    assert!(after.contains("return count: Integer"), "{after}");
    // Rendering reads the graph only.
    assert_eq!(cfg.show(&gs).unwrap(), after);
    let raw = cfg.show_raw(&gs, 0).unwrap();
    assert!(raw.starts_with("Cfg {"), "{raw}");
    assert!(raw.contains("type = Integer"), "{raw}");
    assert!(raw.contains("receiver_loc = 0..4,"), "{raw}");
    assert!(raw.contains("arg_id = 0,"), "{raw}");
    assert_eq!(cfg.show_raw(&gs, 0).unwrap(), raw);
}
