use crate::parser::span::Span;

/// An entire program: every procedure
/// followed by the main block.
#[derive(Debug, Clone)]
pub struct Program<'a> {
    /// Procedures, in declaration order.
    /// A procedure can only call those
    /// declared before it.
    pub procedures: Vec<Procedure<'a>>,

    /// The main block.
    pub main: Main<'a>,
}

/// A procedure.
#[derive(Debug, Clone)]
pub struct Procedure<'a> {
    /// The procedure's name.
    pub name: &'a str,

    /// The arguments that the
    /// procedure takes in.
    /// Every argument is a reference
    /// to the caller's storage.
    pub args: Vec<ArgDecl<'a>>,

    /// Local variables.
    pub declarations: Vec<Declaration<'a>>,

    /// The procedure's body.
    pub commands: Vec<Command<'a>>,

    /// The code that created
    /// this item.
    pub span: Span<'a>,
}

/// A procedure argument.
#[derive(Debug, Clone)]
pub struct ArgDecl<'a> {
    /// The argument's name.
    pub name: &'a str,

    /// Was the argument marked
    /// with `T` (an array)?
    pub is_array: bool,

    /// The code that created
    /// this item.
    pub span: Span<'a>,
}

/// The program's main block.
#[derive(Debug, Clone)]
pub struct Main<'a> {
    /// Variables of the main block.
    pub declarations: Vec<Declaration<'a>>,

    /// The body of the program.
    pub commands: Vec<Command<'a>>,
}

/// A declared variable.
#[derive(Debug, Clone)]
pub enum Declaration<'a> {
    /// A single cell.
    Scalar {
        name: &'a str,
        span: Span<'a>,
    },

    /// An array with inclusive bounds.
    /// Bounds are kept as written and
    /// only parsed by the generator.
    Array {
        name: &'a str,
        from: NumberLiteral<'a>,
        to: NumberLiteral<'a>,
        span: Span<'a>,
    },
}

impl<'a> Declaration<'a> {
    pub fn span(&self) -> &Span<'a> {
        match self {
            Declaration::Scalar { span, .. } | Declaration::Array { span, .. } => span,
        }
    }
}

/// A command inside a body.
#[derive(Debug, Clone)]
pub enum Command<'a> {
    /// `identifier := expression;`
    Assign {
        target: Identifier<'a>,
        value: MathExpression<'a>,
        span: Span<'a>,
    },

    /// `IF condition THEN ... [ELSE ...] ENDIF`
    If {
        condition: Condition<'a>,
        then_commands: Vec<Command<'a>>,
        else_commands: Vec<Command<'a>>,
        span: Span<'a>,
    },

    /// `WHILE condition DO ... ENDWHILE`
    While {
        condition: Condition<'a>,
        commands: Vec<Command<'a>>,
        span: Span<'a>,
    },

    /// `REPEAT ... UNTIL condition;`
    Repeat {
        commands: Vec<Command<'a>>,
        condition: Condition<'a>,
        span: Span<'a>,
    },

    /// `FOR i FROM a TO b DO ... ENDFOR`
    /// or `FOR i FROM a DOWNTO b DO ... ENDFOR`.
    For {
        iterator: &'a str,
        from: Value<'a>,
        to: Value<'a>,
        downto: bool,
        commands: Vec<Command<'a>>,
        span: Span<'a>,
    },

    /// `name(arg, ...);`
    ProcCall {
        name: &'a str,
        args: Vec<CallArg<'a>>,
        span: Span<'a>,
    },

    /// `READ identifier;`
    Read {
        target: Identifier<'a>,
        span: Span<'a>,
    },

    /// `WRITE value;`
    Write { value: Value<'a>, span: Span<'a> },
}

impl<'a> Command<'a> {
    pub fn span(&self) -> &Span<'a> {
        match self {
            Command::Assign { span, .. }
            | Command::If { span, .. }
            | Command::While { span, .. }
            | Command::Repeat { span, .. }
            | Command::For { span, .. }
            | Command::ProcCall { span, .. }
            | Command::Read { span, .. }
            | Command::Write { span, .. } => span,
        }
    }
}

/// A name passed to a procedure call.
#[derive(Debug, Clone)]
pub struct CallArg<'a> {
    pub name: &'a str,
    pub span: Span<'a>,
}

/// The right-hand side of an
/// assignment: a value or a single
/// binary operation.
#[derive(Debug, Clone)]
pub struct MathExpression<'a> {
    pub left: Value<'a>,

    /// The operator (as written) and
    /// the right operand.
    pub right: Option<(Operator<'a>, Value<'a>)>,

    pub span: Span<'a>,
}

/// `left OP right`, used by branches
/// and loops.
#[derive(Debug, Clone)]
pub struct Condition<'a> {
    pub left: Value<'a>,
    pub operator: Operator<'a>,
    pub right: Value<'a>,
    pub span: Span<'a>,
}

/// An operator token.
/// The generator decides whether
/// it's valid where it appears.
#[derive(Debug, Clone)]
pub struct Operator<'a> {
    pub text: &'a str,
    pub span: Span<'a>,
}

/// A number or a variable access.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Number(NumberLiteral<'a>),
    Identifier(Identifier<'a>),
}

/// A number as written in the source.
#[derive(Debug, Clone)]
pub struct NumberLiteral<'a> {
    pub text: &'a str,
    pub span: Span<'a>,
}

/// A variable, optionally indexed.
#[derive(Debug, Clone)]
pub struct Identifier<'a> {
    pub name: &'a str,
    pub index: Option<Index<'a>>,
    pub span: Span<'a>,
}

/// The index of an array access.
#[derive(Debug, Clone)]
pub enum Index<'a> {
    Number(NumberLiteral<'a>),
    Variable(&'a str, Span<'a>),
}
