use crate::symbols::ScopeId;
use crate::tac::{Index, Label, Name, Operand, Place, TacInstruction, TacProgram};
use std::fmt::{Display, Formatter};

impl<'a> Display for TacProgram<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for instruction in &self.instructions {
            match instruction {
                TacInstruction::Label(_) => write!(f, "{instruction}")?,
                _ => write_indented(f, instruction, "    ")?,
            }
            write!(f, "\n")?;
        }

        Ok(())
    }
}

impl<'a> Display for TacInstruction<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TacInstruction::Label(label) => write!(f, "{label}:"),
            TacInstruction::Assign { dest, src } => write!(f, "{dest} = {src}"),
            TacInstruction::Arith {
                op,
                dest,
                left,
                right,
            } => write!(f, "{dest} = {left} {} {right}", op.symbol()),
            TacInstruction::Goto(target) => write!(f, "goto {target}"),
            TacInstruction::IfGoto {
                cmp,
                left,
                right,
                target,
            } => write!(f, "if {left} {} {right} goto {target}", cmp.symbol()),
            TacInstruction::Param(name) => write!(f, "param {name}"),
            TacInstruction::Call { procedure, args } => write!(f, "call {procedure}, {args}"),
            TacInstruction::Return => write!(f, "return"),
            TacInstruction::Halt => write!(f, "halt"),
            TacInstruction::Read(place) => write!(f, "read {place}"),
            TacInstruction::Write(value) => write!(f, "write {value}"),
        }
    }
}

impl<'a> Display for Label<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Block(id) => write!(f, "L{id}"),
            Label::Procedure(name) => write!(f, "{name}"),
            Label::Main => write!(f, "main"),
        }
    }
}

impl<'a> Display for Name<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            ScopeId::Main => write!(f, "{}", self.ident),
            ScopeId::Procedure(procedure) => write!(f, "{procedure}.{}", self.ident),
        }
    }
}

impl<'a> Display for Place<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Place::Var(name) => write!(f, "{name}"),
            Place::Indexed { array, index } => write!(f, "{array}[{index}]"),
        }
    }
}

impl<'a> Display for Operand<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Num(num) => write!(f, "{num}"),
            Operand::Place(place) => write!(f, "{place}"),
        }
    }
}

impl<'a> Display for Index<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Index::Num(num) => write!(f, "{num}"),
            Index::Var(name) => write!(f, "{}", name.ident),
        }
    }
}

/// Writes a value with every line
/// prefixed by the indent.
pub(crate) fn write_indented(
    f: &mut Formatter<'_>,
    value: &impl Display,
    indent: &str,
) -> std::fmt::Result {
    let text = value.to_string();

    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            write!(f, "\n")?;
        }
        write!(f, "{indent}{line}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::symbols::ScopeId;
    use crate::tac::{ArithOp, CmpOp, Index, Label, Name, Operand, Place, TacInstruction};

    #[test]
    fn formats_instructions() {
        let x = Name::new(ScopeId::Procedure("add"), "x");
        let t = Name::new(ScopeId::Main, "t");

        let arith = TacInstruction::Arith {
            op: ArithOp::Add,
            dest: Place::Var(Name::new(ScopeId::Main, "t1")),
            left: Operand::Place(Place::Var(x.clone())),
            right: Operand::Num(-3),
        };
        assert_eq!(arith.to_string(), "t1 = add.x + -3");

        let branch = TacInstruction::IfGoto {
            cmp: CmpOp::Le,
            left: Operand::Place(Place::Indexed {
                array: t,
                index: Index::Var(Name::new(ScopeId::Main, "i")),
            }),
            right: Operand::Num(0),
            target: Label::Block(2),
        };
        assert_eq!(branch.to_string(), "if t[i] <= 0 goto L2");

        let call = TacInstruction::Call {
            procedure: "add",
            args: 3,
        };
        assert_eq!(call.to_string(), "call add, 3");
        assert_eq!(TacInstruction::Param(x).to_string(), "param add.x");
        assert_eq!(TacInstruction::Label(Label::Main).to_string(), "main:");
    }
}
