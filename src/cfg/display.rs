//! Textual renderings of graphs for diagnostics and tests.
//!
//! Each item has a short, human readable form (`show`) and a structural one (`show_raw`)
//! that prints every field, nested and indented by `tabs` levels. Neither mutates anything.

use std::fmt::{self, Write};

use itertools::Itertools;

use super::{
    BasicBlock, Binding, BlockExit, BlockExitKind, Cfg, Instruction, InstructionKind, LinkRef,
    LocalRef, TypeSlot, VariableUseSite,
};
use crate::global::{GlobalState, SymbolRef};

fn pad(tabs: usize) -> String {
    "  ".repeat(tabs)
}

fn show_local(gs: &GlobalState, cfg: &Cfg, local: LocalRef) -> String {
    let var = cfg.local(local);
    let name = gs.names.get(var.name);
    if var.unique == 0 {
        name.to_string()
    } else {
        format!("{name}${}", var.unique)
    }
}

fn show_slot(gs: &GlobalState, slot: &TypeSlot) -> String {
    match slot {
        TypeSlot::Unset => "<unset>".to_string(),
        TypeSlot::Bottom => "<bottom>".to_string(),
        TypeSlot::Set(ty) => ty.show(gs),
    }
}

fn show_link(link: LinkRef) -> String {
    format!("<link#{}>", link.to_idx())
}

fn show_arg_name(gs: &GlobalState, method: SymbolRef, arg_id: u16) -> String {
    gs.method_info(method)
        .and_then(|info| info.args.get(usize::from(arg_id)))
        .map(|arg| gs.names.get(arg.name).to_string())
        .unwrap_or_else(|| format!("#{arg_id}"))
}

impl VariableUseSite {
    pub fn show(&self, gs: &GlobalState, cfg: &Cfg) -> Result<String, fmt::Error> {
        let mut f = String::new();
        write!(f, "{}", show_local(gs, cfg, self.variable))?;
        match &self.ty {
            TypeSlot::Unset => {}
            slot => write!(f, ": {}", show_slot(gs, slot))?,
        }
        Ok(f)
    }

    pub fn show_raw(&self, gs: &GlobalState, cfg: &Cfg, tabs: usize) -> Result<String, fmt::Error> {
        let mut f = String::new();
        writeln!(f, "VariableUseSite {{")?;
        writeln!(f, "{}variable = {},", pad(tabs + 1), show_local(gs, cfg, self.variable))?;
        writeln!(f, "{}type = {},", pad(tabs + 1), show_slot(gs, &self.ty))?;
        write!(f, "{}}}", pad(tabs))?;
        Ok(f)
    }
}

impl Instruction {
    pub fn show(&self, gs: &GlobalState, cfg: &Cfg) -> Result<String, fmt::Error> {
        let mut f = String::new();
        match self.kind() {
            InstructionKind::Ident(i) => write!(f, "{}", show_local(gs, cfg, i.what))?,
            InstructionKind::Alias(i) => {
                write!(f, "alias {}", gs.show_symbol(i.what))?;
                if i.name.exists() {
                    write!(f, " ({})", gs.names.get(i.name))?;
                }
            }
            InstructionKind::SolveConstraint(i) => write!(
                f,
                "Solve<{}, {}>",
                show_link(i.link),
                show_local(gs, cfg, i.send)
            )?,
            InstructionKind::Send(i) => {
                let args = i
                    .args()
                    .iter()
                    .map(|arg| arg.show(gs, cfg))
                    .collect::<Result<Vec<_>, _>>()?;
                write!(
                    f,
                    "{}.{}({})",
                    i.recv.show(gs, cfg)?,
                    gs.names.get(i.fun),
                    args.join(", ")
                )?;
                if let Some(link) = i.link {
                    write!(f, " do {}", show_link(link))?;
                }
            }
            InstructionKind::Return(i) => write!(f, "return {}", i.what.show(gs, cfg)?)?,
            InstructionKind::BlockReturn(i) => write!(
                f,
                "blockreturn{} {}",
                show_link(i.link),
                i.what.show(gs, cfg)?
            )?,
            InstructionKind::LoadSelf(i) => write!(
                f,
                "loadSelf{}({})",
                show_link(i.link),
                show_local(gs, cfg, i.fallback)
            )?,
            InstructionKind::Literal(i) => write!(f, "{}", i.value.show(gs))?,
            InstructionKind::GetCurrentException(_) => write!(f, "<get-current-exception>")?,
            InstructionKind::LoadArg(i) => {
                write!(f, "load_arg({})", show_arg_name(gs, i.method, i.arg_id))?
            }
            InstructionKind::ArgPresent(i) => {
                write!(f, "arg_present({})", show_arg_name(gs, i.method, i.arg_id))?
            }
            InstructionKind::LoadYieldParams(i) => {
                write!(f, "load_yield_params{}", show_link(i.link))?
            }
            InstructionKind::Cast(i) => write!(
                f,
                "T.{}({}, {})",
                gs.names.get(i.cast),
                i.value.show(gs, cfg)?,
                i.ty.show(gs)
            )?,
            InstructionKind::TAbsurd(i) => write!(f, "T.absurd({})", i.what.show(gs, cfg)?)?,
        }
        Ok(f)
    }

    pub fn show_raw(&self, gs: &GlobalState, cfg: &Cfg, tabs: usize) -> Result<String, fmt::Error> {
        let mut f = String::new();
        let inner = pad(tabs + 1);
        writeln!(f, "{} {{", self.tag().name())?;
        if self.is_synthetic {
            writeln!(f, "{inner}synthetic = true,")?;
        }
        match self.kind() {
            InstructionKind::Ident(i) => {
                writeln!(f, "{inner}what = {},", show_local(gs, cfg, i.what))?;
            }
            InstructionKind::Alias(i) => {
                writeln!(f, "{inner}what = {},", gs.show_symbol(i.what))?;
                if i.name.exists() {
                    writeln!(f, "{inner}name = {},", gs.names.get(i.name))?;
                }
            }
            InstructionKind::SolveConstraint(i) => {
                writeln!(f, "{inner}link = {},", show_link(i.link))?;
                writeln!(f, "{inner}send = {},", show_local(gs, cfg, i.send))?;
            }
            InstructionKind::Send(i) => {
                writeln!(f, "{inner}recv = {},", i.recv.show_raw(gs, cfg, tabs + 1)?)?;
                writeln!(
                    f,
                    "{inner}receiver_loc = {}..{},",
                    i.receiver_loc.begin, i.receiver_loc.end
                )?;
                writeln!(f, "{inner}fun = {},", gs.names.get(i.fun))?;
                writeln!(f, "{inner}num_pos_args = {},", i.num_pos_args)?;
                writeln!(f, "{inner}is_private_ok = {},", i.is_private_ok)?;
                writeln!(f, "{inner}args = (")?;
                for (arg, loc) in i.args().iter().zip(i.arg_locs()) {
                    writeln!(
                        f,
                        "{}{} @ {}..{},",
                        pad(tabs + 2),
                        arg.show_raw(gs, cfg, tabs + 2)?,
                        loc.begin,
                        loc.end
                    )?;
                }
                writeln!(f, "{inner}),")?;
                if let Some(link) = i.link {
                    writeln!(f, "{inner}link = {},", show_link(link))?;
                }
            }
            InstructionKind::Return(i) => {
                writeln!(f, "{inner}what = {},", i.what.show_raw(gs, cfg, tabs + 1)?)?;
            }
            InstructionKind::BlockReturn(i) => {
                writeln!(f, "{inner}link = {},", show_link(i.link))?;
                writeln!(f, "{inner}what = {},", i.what.show_raw(gs, cfg, tabs + 1)?)?;
            }
            InstructionKind::LoadSelf(i) => {
                writeln!(f, "{inner}link = {},", show_link(i.link))?;
                writeln!(f, "{inner}fallback = {},", show_local(gs, cfg, i.fallback))?;
            }
            InstructionKind::Literal(i) => {
                writeln!(f, "{inner}value = {},", i.value.show(gs))?;
            }
            InstructionKind::GetCurrentException(_) => {}
            InstructionKind::LoadArg(i) => {
                writeln!(f, "{inner}method = {},", gs.show_symbol(i.method))?;
                writeln!(f, "{inner}arg_id = {},", i.arg_id)?;
                writeln!(f, "{inner}arg = {},", show_arg_name(gs, i.method, i.arg_id))?;
            }
            InstructionKind::ArgPresent(i) => {
                writeln!(f, "{inner}method = {},", gs.show_symbol(i.method))?;
                writeln!(f, "{inner}arg_id = {},", i.arg_id)?;
                writeln!(f, "{inner}arg = {},", show_arg_name(gs, i.method, i.arg_id))?;
            }
            InstructionKind::LoadYieldParams(i) => {
                writeln!(f, "{inner}link = {},", show_link(i.link))?;
            }
            InstructionKind::Cast(i) => {
                writeln!(f, "{inner}cast = T.{},", gs.names.get(i.cast))?;
                writeln!(f, "{inner}value = {},", i.value.show_raw(gs, cfg, tabs + 1)?)?;
                writeln!(f, "{inner}type = {},", i.ty.show(gs))?;
            }
            InstructionKind::TAbsurd(i) => {
                writeln!(f, "{inner}what = {},", i.what.show_raw(gs, cfg, tabs + 1)?)?;
            }
        }
        write!(f, "{}}}", pad(tabs))?;
        Ok(f)
    }
}

impl Binding {
    pub fn show(&self, gs: &GlobalState, cfg: &Cfg) -> Result<String, fmt::Error> {
        Ok(format!(
            "{} = {}",
            self.bind.show(gs, cfg)?,
            self.value.show(gs, cfg)?
        ))
    }

    pub fn show_raw(&self, gs: &GlobalState, cfg: &Cfg, tabs: usize) -> Result<String, fmt::Error> {
        let mut f = String::new();
        let inner = pad(tabs + 1);
        writeln!(f, "Binding {{")?;
        writeln!(f, "{inner}bind = {},", self.bind.show_raw(gs, cfg, tabs + 1)?)?;
        writeln!(f, "{inner}loc = {}..{},", self.loc.begin, self.loc.end)?;
        writeln!(f, "{inner}value = {},", self.value.show_raw(gs, cfg, tabs + 1)?)?;
        write!(f, "{}}}", pad(tabs))?;
        Ok(f)
    }
}

impl BlockExit {
    pub fn show(&self, gs: &GlobalState, cfg: &Cfg) -> Result<String, fmt::Error> {
        Ok(match &self.kind {
            BlockExitKind::Exit => "<exit>".to_string(),
            BlockExitKind::Goto { target } => format!("goto bb{}", target.to_idx()),
            BlockExitKind::Branch {
                cond,
                then_block,
                else_block,
            } => format!(
                "if {} then bb{} else bb{}",
                cond.show(gs, cfg)?,
                then_block.to_idx(),
                else_block.to_idx()
            ),
        })
    }
}

impl BasicBlock {
    pub fn show(&self, gs: &GlobalState, cfg: &Cfg) -> Result<String, fmt::Error> {
        let mut f = String::new();
        let args = self.args.iter().map(|arg| show_local(gs, cfg, *arg)).join(", ");
        writeln!(f, "bb{}({args}):", self.id.to_idx())?;
        for binding in &self.exprs {
            writeln!(f, "    {}", binding.show(gs, cfg)?)?;
        }
        writeln!(f, "    {}", self.exit.show(gs, cfg)?)?;
        Ok(f)
    }

    pub fn show_raw(&self, gs: &GlobalState, cfg: &Cfg, tabs: usize) -> Result<String, fmt::Error> {
        let mut f = String::new();
        let inner = pad(tabs + 1);
        writeln!(f, "BasicBlock {{")?;
        writeln!(f, "{inner}id = {},", self.id.to_idx())?;
        writeln!(
            f,
            "{inner}args = ({}),",
            self.args.iter().map(|arg| show_local(gs, cfg, *arg)).join(", ")
        )?;
        writeln!(f, "{inner}exprs = [")?;
        for binding in &self.exprs {
            writeln!(f, "{}{},", pad(tabs + 2), binding.show_raw(gs, cfg, tabs + 2)?)?;
        }
        writeln!(f, "{inner}],")?;
        writeln!(f, "{inner}exit = {},", self.exit.show(gs, cfg)?)?;
        write!(f, "{}}}", pad(tabs))?;
        Ok(f)
    }
}

impl Cfg {
    pub fn show(&self, gs: &GlobalState) -> Result<String, fmt::Error> {
        let mut f = String::new();
        writeln!(f, "method {} {{", gs.show_symbol(self.symbol))?;
        for block in &self.basic_blocks {
            writeln!(f)?;
            write!(f, "{}", block.show(gs, self)?)?;
        }
        writeln!(f, "}}")?;
        Ok(f)
    }

    pub fn show_raw(&self, gs: &GlobalState, tabs: usize) -> Result<String, fmt::Error> {
        let mut f = String::new();
        let inner = pad(tabs + 1);
        writeln!(f, "Cfg {{")?;
        writeln!(f, "{inner}symbol = {},", gs.show_symbol(self.symbol))?;
        writeln!(f, "{inner}blocks = [")?;
        for block in &self.basic_blocks {
            writeln!(f, "{}{},", pad(tabs + 2), block.show_raw(gs, self, tabs + 2)?)?;
        }
        writeln!(f, "{inner}],")?;
        write!(f, "{}}}", pad(tabs))?;
        Ok(f)
    }
}
