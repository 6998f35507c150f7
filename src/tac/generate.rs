use crate::ast::{
    self, CallArg, Command, Condition, Declaration, Identifier, MathExpression, NumberLiteral,
    Procedure, Program, Value,
};
use crate::parser::span::Span;
use crate::symbols::{ArrayBounds, ScopeId, SymbolKind, SymbolTable};
use crate::tac::error::{GenerateError, GenerateErrorKind};
use crate::tac::{
    ArithOp, CmpOp, Index, Label, Name, Operand, Place, TacInstruction, TacProgram,
};
use std::borrow::Cow;

/// The output of code generation.
#[derive(Debug, Clone)]
pub struct Generated<'a> {
    pub program: TacProgram<'a>,

    /// Storage for every name the
    /// program uses, temporaries included.
    pub symbols: SymbolTable<'a>,
}

/// Generates three-address code for a
/// whole program, returning every error
/// found if it isn't valid.
pub fn generate<'a>(program: &Program<'a>) -> Result<Generated<'a>, Vec<GenerateError<'a>>> {
    let mut generator = Generator::new();
    generator.generate_program(program);

    generator.finish()
}

/// Walks the AST, emitting instructions
/// and declaring symbols along the way.
/// Errors are collected rather than
/// returned so that one run can find all
/// of them.
pub struct Generator<'a> {
    symbols: SymbolTable<'a>,
    instructions: Vec<TacInstruction<'a>>,
    errors: Vec<GenerateError<'a>>,

    /// The last block label handed out.
    label_counter: u32,

    /// The last temporary handed out.
    temp_counter: u32,

    /// The scope being generated.
    scope: ScopeId<'a>,
}

impl<'a> Default for Generator<'a> {
    fn default() -> Self {
        Generator {
            symbols: SymbolTable::new(),
            instructions: Vec::new(),
            errors: Vec::new(),
            label_counter: 0,
            temp_counter: 0,
            scope: ScopeId::Main,
        }
    }
}

impl<'a> Generator<'a> {
    pub fn new() -> Generator<'a> {
        Self::default()
    }

    /// Emits the whole program:
    /// a jump over the procedures, each
    /// procedure, then the main block.
    pub fn generate_program(&mut self, program: &Program<'a>) {
        self.emit(TacInstruction::Goto(Label::Main));

        for procedure in &program.procedures {
            self.generate_procedure(procedure);
        }

        log::debug!("Generating main");

        self.scope = ScopeId::Main;
        self.emit(TacInstruction::Label(Label::Main));
        self.declare_all(&program.main.declarations);
        self.generate_commands(&program.main.commands);
        self.emit(TacInstruction::Halt);
    }

    pub fn finish(self) -> Result<Generated<'a>, Vec<GenerateError<'a>>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        log::debug!(
            "Generated {} instructions using {} cells",
            self.instructions.len(),
            self.symbols.next_address()
        );

        Ok(Generated {
            program: TacProgram {
                instructions: self.instructions,
            },
            symbols: self.symbols,
        })
    }

    fn generate_procedure(&mut self, procedure: &Procedure<'a>) {
        log::debug!("Generating procedure {}", procedure.name);

        let args = procedure
            .args
            .iter()
            .map(|arg| (Cow::Borrowed(arg.name), arg.is_array))
            .collect();

        // A second procedure with the same name would
        // share the first one's scope, so skip it.
        if let Err(err) = self.symbols.declare_procedure(procedure.name, args) {
            self.errors
                .push(GenerateError::new(err, procedure.span.clone()));
            return;
        }

        self.scope = ScopeId::Procedure(procedure.name);

        for arg in &procedure.args {
            let kind = SymbolKind::Argument {
                array: arg.is_array,
            };
            if let Err(err) = self.symbols.declare(self.scope, arg.name, kind) {
                self.errors.push(GenerateError::new(err, arg.span.clone()));
            }
        }

        self.emit(TacInstruction::Label(Label::Procedure(procedure.name)));
        self.declare_all(&procedure.declarations);
        self.generate_commands(&procedure.commands);
        self.emit(TacInstruction::Return);
    }

    fn declare_all(&mut self, declarations: &[Declaration<'a>]) {
        for declaration in declarations {
            let result = match declaration {
                Declaration::Scalar { name, .. } => {
                    self.symbols.declare(self.scope, *name, SymbolKind::Scalar)
                }
                Declaration::Array { name, from, to, .. } => {
                    ArrayBounds::parse(from.text, to.text).and_then(|bounds| {
                        self.symbols
                            .declare(self.scope, *name, SymbolKind::Array(bounds))
                    })
                }
            };

            if let Err(err) = result {
                self.errors
                    .push(GenerateError::new(err, declaration.span().clone()));
            }
        }
    }

    fn generate_commands(&mut self, commands: &[Command<'a>]) {
        for command in commands {
            self.generate_command(command);
        }
    }

    fn generate_command(&mut self, command: &Command<'a>) {
        let first_error = self.errors.len();

        self.generate_command_body(command);

        let errors = self.errors.split_off(first_error);
        self.errors
            .extend(errors.into_iter().map(|err| err.within(command.span())));
    }

    fn generate_command_body(&mut self, command: &Command<'a>) {
        match command {
            Command::Assign { target, value, .. } => {
                let value = self.expression(value);
                let dest = self.place(target);

                if let (Some(src), Some(dest)) = (self.check(value), self.check(dest)) {
                    self.emit(TacInstruction::Assign { dest, src });
                }
            }
            Command::If {
                condition,
                then_commands,
                else_commands,
                ..
            } => {
                let then_label = self.new_label();
                let else_label = (!else_commands.is_empty()).then(|| self.new_label());
                let end_label = self.new_label();

                self.branch(condition, then_label, else_label.unwrap_or(end_label));

                self.emit(TacInstruction::Label(then_label));
                self.generate_commands(then_commands);

                if let Some(else_label) = else_label {
                    self.emit(TacInstruction::Goto(end_label));
                    self.emit(TacInstruction::Label(else_label));
                    self.generate_commands(else_commands);
                }

                self.emit(TacInstruction::Label(end_label));
            }
            Command::While {
                condition,
                commands,
                ..
            } => {
                let start_label = self.new_label();
                let body_label = self.new_label();
                let end_label = self.new_label();

                self.emit(TacInstruction::Label(start_label));
                self.branch(condition, body_label, end_label);

                self.emit(TacInstruction::Label(body_label));
                self.generate_commands(commands);
                self.emit(TacInstruction::Goto(start_label));

                self.emit(TacInstruction::Label(end_label));
            }
            Command::Repeat {
                commands,
                condition,
                ..
            } => {
                let start_label = self.new_label();
                let end_label = self.new_label();

                self.emit(TacInstruction::Label(start_label));
                self.generate_commands(commands);

                // Loop back while the condition is false.
                let condition = self.condition(condition);
                if let Some((cmp, left, right)) = self.check(condition) {
                    self.emit(TacInstruction::IfGoto {
                        cmp: cmp.inverse(),
                        left,
                        right,
                        target: start_label,
                    });
                    self.emit(TacInstruction::Goto(end_label));
                }

                self.emit(TacInstruction::Label(end_label));
            }
            Command::For {
                iterator,
                from,
                to,
                downto,
                commands,
                span,
            } => self.generate_for(*iterator, from, to, *downto, commands, span),
            Command::ProcCall { name, args, span } => {
                let result = self.procedure_call(*name, args, span);
                self.check(result);
            }
            Command::Read { target, .. } => {
                let place = self.place(target);
                if let Some(place) = self.check(place) {
                    self.emit(TacInstruction::Read(place));
                }
            }
            Command::Write { value, .. } => {
                let value = self.operand(value);
                if let Some(value) = self.check(value) {
                    self.emit(TacInstruction::Write(value));
                }
            }
        }
    }

    fn generate_for(
        &mut self,
        iterator: &'a str,
        from: &Value<'a>,
        to: &Value<'a>,
        downto: bool,
        commands: &[Command<'a>],
        span: &Span<'a>,
    ) {
        let from = self.operand(from);
        let to = self.operand(to);
        let declared = self.declare_iterator(iterator, span);

        let test_label = self.new_label();
        let body_label = self.new_label();
        let end_label = self.new_label();

        let counter = Place::Var(Name::new(self.scope, iterator));
        let (cmp, step) = if downto {
            (CmpOp::Ge, ArithOp::Sub)
        } else {
            (CmpOp::Le, ArithOp::Add)
        };

        let from = self.check(from);
        let to = self.check(to);
        let declared = self.check(declared);

        if let (Some(from), Some(to), Some(())) = (from, to, declared) {
            self.emit(TacInstruction::Assign {
                dest: counter.clone(),
                src: from,
            });
            self.emit(TacInstruction::Label(test_label));
            self.emit(TacInstruction::IfGoto {
                cmp,
                left: Operand::Place(counter.clone()),
                right: to,
                target: body_label,
            });
            self.emit(TacInstruction::Goto(end_label));
        }

        self.emit(TacInstruction::Label(body_label));
        self.generate_commands(commands);

        let next = self.new_temp(span);
        if let Some(next) = self.check(next) {
            self.emit(TacInstruction::Arith {
                op: step,
                dest: next.clone(),
                left: Operand::Place(counter.clone()),
                right: Operand::Num(1),
            });
            self.emit(TacInstruction::Assign {
                dest: counter,
                src: Operand::Place(next),
            });
        }
        self.emit(TacInstruction::Goto(test_label));

        self.emit(TacInstruction::Label(end_label));
    }

    /// Declares a loop counter, unless a
    /// scalar with the same name already exists.
    fn declare_iterator(&mut self, iterator: &'a str, span: &Span<'a>) -> Result<(), GenerateError<'a>> {
        match self.symbols.lookup(self.scope, iterator) {
            Ok(symbol) if symbol.is_array() => Err(GenerateError::new(
                GenerateErrorKind::MissingIndex(iterator.to_string()),
                span.clone(),
            )),
            Ok(_) => Ok(()),
            Err(_) => {
                self.symbols
                    .declare(self.scope, iterator, SymbolKind::Iterator)
                    .map_err(|err| GenerateError::new(err, span.clone()))?;

                Ok(())
            }
        }
    }

    fn procedure_call(
        &mut self,
        name: &'a str,
        args: &[CallArg<'a>],
        span: &Span<'a>,
    ) -> Result<(), GenerateError<'a>> {
        let error = |kind: GenerateErrorKind| GenerateError::new(kind, span.clone());

        if self.scope == ScopeId::Procedure(name) {
            return Err(error(GenerateErrorKind::RecursiveCall(name.to_string())));
        }

        let procedure = self.symbols.procedure(name).map_err(|err| error(err.into()))?;

        if procedure.args.len() != args.len() {
            return Err(error(GenerateErrorKind::ArgumentCount {
                procedure: name.to_string(),
                expected: procedure.args.len(),
                found: args.len(),
            }));
        }

        let mut params = Vec::with_capacity(args.len());
        for (arg, (_, array)) in args.iter().zip(&procedure.args) {
            let symbol = self
                .symbols
                .lookup(self.scope, arg.name)
                .map_err(|err| GenerateError::new(err, arg.span.clone()))?;

            if symbol.is_array() != *array {
                return Err(GenerateError::new(
                    GenerateErrorKind::ArgumentKind {
                        procedure: name.to_string(),
                        name: arg.name.to_string(),
                        expected: if *array { "an array" } else { "a scalar" },
                    },
                    arg.span.clone(),
                ));
            }

            params.push(TacInstruction::Param(Name::new(self.scope, arg.name)));
        }

        self.instructions.extend(params);
        self.emit(TacInstruction::Call {
            procedure: name,
            args: args.len(),
        });

        Ok(())
    }

    /// Emits a conditional jump to `on_true`
    /// and a fallback jump to `on_false`.
    fn branch(&mut self, condition: &Condition<'a>, on_true: Label<'a>, on_false: Label<'a>) {
        let condition = self.condition(condition);

        if let Some((cmp, left, right)) = self.check(condition) {
            self.emit(TacInstruction::IfGoto {
                cmp,
                left,
                right,
                target: on_true,
            });
            self.emit(TacInstruction::Goto(on_false));
        }
    }

    fn condition(
        &mut self,
        condition: &Condition<'a>,
    ) -> Result<(CmpOp, Operand<'a>, Operand<'a>), GenerateError<'a>> {
        let within = |err: GenerateError<'a>| err.within(&condition.span);

        let cmp = CmpOp::from_symbol(condition.operator.text).ok_or_else(|| {
            within(GenerateError::new(
                GenerateErrorKind::UnknownOperator(condition.operator.text.to_string()),
                condition.operator.span.clone(),
            ))
        })?;

        let left = self.operand(&condition.left).map_err(within)?;
        let right = self.operand(&condition.right).map_err(within)?;

        Ok((cmp, left, right))
    }

    /// Evaluates the right-hand side of an
    /// assignment. A bare value needs no code,
    /// an operation goes into a new temporary.
    fn expression(&mut self, expr: &MathExpression<'a>) -> Result<Operand<'a>, GenerateError<'a>> {
        let left = self.operand(&expr.left)?;

        let Some((operator, right)) = &expr.right else {
            return Ok(left);
        };

        let op = ArithOp::from_symbol(operator.text).ok_or_else(|| {
            GenerateError::new(
                GenerateErrorKind::UnknownOperator(operator.text.to_string()),
                operator.span.clone(),
            )
        })?;
        let right = self.operand(right)?;

        let dest = self.new_temp(&expr.span)?;
        self.emit(TacInstruction::Arith {
            op,
            dest: dest.clone(),
            left,
            right,
        });

        Ok(Operand::Place(dest))
    }

    fn operand(&mut self, value: &Value<'a>) -> Result<Operand<'a>, GenerateError<'a>> {
        match value {
            Value::Number(num) => Ok(Operand::Num(number(num)?)),
            Value::Identifier(ident) => Ok(Operand::Place(self.place(ident)?)),
        }
    }

    /// Resolves a variable access, checking
    /// that arrays are always indexed and
    /// scalars never are.
    fn place(&mut self, ident: &Identifier<'a>) -> Result<Place<'a>, GenerateError<'a>> {
        let error = |kind: GenerateErrorKind| GenerateError::new(kind, ident.span.clone());

        let is_array = self
            .symbols
            .lookup(self.scope, ident.name)
            .map_err(|err| error(err.into()))?
            .is_array();
        let name = Name::new(self.scope, ident.name);

        match (&ident.index, is_array) {
            (None, false) => Ok(Place::Var(name)),
            (None, true) => Err(error(GenerateErrorKind::MissingIndex(
                ident.name.to_string(),
            ))),
            (Some(_), false) => Err(error(GenerateErrorKind::NotAnArray(
                ident.name.to_string(),
            ))),
            (Some(ast::Index::Number(num)), true) => Ok(Place::Indexed {
                array: name,
                index: Index::Num(number(num)?),
            }),
            (Some(ast::Index::Variable(index, span)), true) => {
                let index_is_array = self
                    .symbols
                    .lookup(self.scope, index)
                    .map_err(|err| GenerateError::new(err, span.clone()))?
                    .is_array();

                if index_is_array {
                    return Err(GenerateError::new(
                        GenerateErrorKind::MissingIndex(index.to_string()),
                        span.clone(),
                    ));
                }

                Ok(Place::Indexed {
                    array: name,
                    index: Index::Var(Name::new(self.scope, *index)),
                })
            }
        }
    }

    fn new_label(&mut self) -> Label<'a> {
        self.label_counter += 1;
        Label::Block(self.label_counter)
    }

    /// Declares a fresh temporary in
    /// the current scope.
    fn new_temp(&mut self, span: &Span<'a>) -> Result<Place<'a>, GenerateError<'a>> {
        self.temp_counter += 1;
        let name = format!("t{}", self.temp_counter);

        self.symbols
            .declare(self.scope, name.clone(), SymbolKind::Temporary)
            .map_err(|err| GenerateError::new(err, span.clone()))?;

        Ok(Place::Var(Name::new(self.scope, name)))
    }

    fn emit(&mut self, instruction: TacInstruction<'a>) {
        log::trace!("Emitting {instruction}");
        self.instructions.push(instruction);
    }

    /// Records an error, if there is one.
    fn check<T>(&mut self, result: Result<T, GenerateError<'a>>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }
}

fn number<'a>(num: &NumberLiteral<'a>) -> Result<i64, GenerateError<'a>> {
    num.text.parse().map_err(|_| {
        GenerateError::new(
            GenerateErrorKind::InvalidNumber(num.text.to_string()),
            num.span.clone(),
        )
    })
}
