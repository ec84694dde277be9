use flowcfg::cfg::instructions::{LoadArg, Literal, Send};
use flowcfg::cfg::{BlockId, CfgBuilder, LinkRef, LocalRef};
use flowcfg::global::{
    ArgInfo, BlockSig, GlobalState, LocOffsets, MethodInfo, NameRef, SymbolRef, Type, TypePtr,
};
use tracing_subscriber::EnvFilter;

/// Logs go through the test harness; filter with `RUST_LOG`.
#[allow(unused)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The symbols the tests call into.
#[allow(unused)]
pub struct Fixture {
    pub gs: GlobalState,
    pub widget: SymbolRef,
    pub config_class: SymbolRef,
    /// `Widget#run(count: Integer, label: String = _) -> String`
    pub run: SymbolRef,
    /// `Widget#splat(*rest: Integer) -> Integer`
    pub splat: SymbolRef,
    /// `Widget#wrap[U](x: U) -> Array[U]`
    pub wrap: SymbolRef,
    /// `Widget#flag(on: T::Boolean) -> T.nilable(Integer)`
    pub flag: SymbolRef,
    /// `Widget#untyped_arg(x) -> Integer`
    pub untyped_arg: SymbolRef,
}

#[allow(unused)]
pub fn fixture() -> Fixture {
    let mut gs = GlobalState::new();

    let integer = SymbolRef::integer();
    let other = gs.names.intern("other");
    gs.enter_method(
        integer,
        "+",
        MethodInfo::new(vec![ArgInfo::new(other, Some(Type::integer()))], Some(Type::integer())),
    );
    gs.enter_method(integer, "to_s", MethodInfo::new(vec![], Some(Type::string())));
    gs.enter_method(
        SymbolRef::string(),
        "length",
        MethodInfo::new(vec![], Some(Type::integer())),
    );

    let array = SymbolRef::array();
    let elem = gs.names.intern("Elem");
    let u = gs.names.intern("U");
    gs.enter_method(
        array,
        "map",
        MethodInfo::new(
            vec![],
            Some(Type::applied(array, vec![Type::type_var(u)])),
        )
        .with_type_params(vec![u])
        .with_block(BlockSig {
            params: vec![Type::type_var(elem)],
            returns: Type::type_var(u),
            bind: None,
        }),
    );
    let nilable_elem = Type::lub(&gs, &Type::type_var(elem), &Type::nil());
    gs.enter_method(array, "first", MethodInfo::new(vec![], Some(nilable_elem)));

    let widget = gs.enter_class("Widget", SymbolRef::object());
    let config_class = gs.enter_class("Config", SymbolRef::object());
    let count = gs.names.intern("count");
    let label = gs.names.intern("label");
    let rest = gs.names.intern("rest");
    let x = gs.names.intern("x");
    let on = gs.names.intern("on");
    let verbose = gs.names.intern("verbose");

    let run = gs.enter_method(
        widget,
        "run",
        MethodInfo::new(
            vec![
                ArgInfo::new(count, Some(Type::integer())),
                ArgInfo::new(label, Some(Type::string())).optional(),
                ArgInfo::new(verbose, Some(Type::boolean())).keyword(),
            ],
            Some(Type::string()),
        ),
    );
    let splat = gs.enter_method(
        widget,
        "splat",
        MethodInfo::new(
            vec![ArgInfo::new(rest, Some(Type::integer())).repeated()],
            Some(Type::integer()),
        ),
    );
    let wrap = gs.enter_method(
        widget,
        "wrap",
        MethodInfo::new(
            vec![ArgInfo::new(x, Some(Type::type_var(u)))],
            Some(Type::applied(array, vec![Type::type_var(u)])),
        )
        .with_type_params(vec![u]),
    );
    let nilable_integer = Type::lub(&gs, &Type::integer(), &Type::nil());
    let flag = gs.enter_method(
        widget,
        "flag",
        MethodInfo::new(
            vec![ArgInfo::new(on, Some(Type::boolean()))],
            Some(nilable_integer),
        ),
    );
    let untyped_arg = gs.enter_method(
        widget,
        "untyped_arg",
        MethodInfo::new(vec![ArgInfo::new(x, None)], Some(Type::integer())),
    );
    gs.enter_method(
        widget,
        "secret",
        MethodInfo::new(vec![], Some(Type::integer())).private(),
    );
    gs.enter_method(
        widget,
        "build",
        MethodInfo::new(vec![], Some(Type::class(widget))).singleton(),
    );
    gs.enter_method(
        widget,
        "tally",
        MethodInfo::new(vec![], Some(Type::class(widget))).with_block(BlockSig {
            params: vec![Type::integer()],
            returns: Type::integer(),
            bind: None,
        }),
    );
    gs.enter_method(
        widget,
        "configure",
        MethodInfo::new(vec![], Some(Type::nil())).with_block(BlockSig {
            params: vec![],
            returns: Type::untyped(),
            bind: Some(Type::class(config_class)),
        }),
    );

    Fixture {
        gs,
        widget,
        config_class,
        run,
        splat,
        wrap,
        flag,
        untyped_arg,
    }
}

/// Binds `value` to a fresh variable named `name` in `block`.
#[allow(unused)]
pub fn literal(
    gs: &mut GlobalState,
    builder: &mut CfgBuilder,
    block: BlockId,
    name: &str,
    value: TypePtr,
) -> LocalRef {
    let var = builder.enter_local(gs.names.intern(name));
    builder.push(block, var, LocOffsets::none(), Literal { value });
    var
}

/// Binds argument `arg_id` of `method` to a variable named `name` in `block`.
#[allow(unused)]
pub fn load_arg(
    gs: &mut GlobalState,
    builder: &mut CfgBuilder,
    block: BlockId,
    name: &str,
    method: SymbolRef,
    arg_id: u16,
) -> LocalRef {
    let var = builder.enter_local(gs.names.intern(name));
    builder.push(block, var, LocOffsets::none(), LoadArg { arg_id, method });
    var
}

/// A call with positional arguments only. Argument `i` sits at `10 + 4 * i`.
#[allow(unused)]
pub fn call(recv: LocalRef, fun: NameRef, args: &[LocalRef], link: Option<LinkRef>) -> Send {
    let locs: Vec<LocOffsets> = (0..args.len() as u32)
        .map(|i| LocOffsets::new(10 + 4 * i, 12 + 4 * i))
        .collect();
    Send::new(
        recv,
        fun,
        LocOffsets::new(0, 4),
        args.len() as u16,
        args,
        &locs,
        false,
        link,
    )
}
