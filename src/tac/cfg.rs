use crate::tac::display::write_indented;
use crate::tac::{Label, TacInstruction, TacProgram};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// An index into a graph's blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A straight run of instructions.
/// Control only enters at the first one
/// and only leaves at the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock<'a> {
    /// The labels the block starts with.
    /// Labels that follow each other
    /// all lead into the same block.
    pub labels: Vec<Label<'a>>,

    pub instructions: Vec<TacInstruction<'a>>,

    pub predecessors: Vec<BlockId>,

    /// At most two: the jump target
    /// and the fallthrough.
    pub successors: Vec<BlockId>,
}

/// Basic blocks linked by control flow.
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph<'a> {
    pub blocks: Vec<BasicBlock<'a>>,

    /// Label -> the block it leads into.
    labels: HashMap<Label<'a>, BlockId>,
}

impl<'a> ControlFlowGraph<'a> {
    /// Partitions a stream of instructions and
    /// links the blocks together.
    ///
    /// A block starts at the first instruction,
    /// at a run of labels, and right after every
    /// jump, return, or halt.
    ///
    /// A goto links to its target, a
    /// conditional jump to its target and the
    /// next block, return and halt to nothing,
    /// and anything else to the next block.
    /// Targets outside of the stream are
    /// left unlinked.
    pub fn build(instructions: &[TacInstruction<'a>]) -> ControlFlowGraph<'a> {
        let mut graph = ControlFlowGraph {
            blocks: partition(instructions),
            labels: HashMap::new(),
        };

        for (index, block) in graph.blocks.iter().enumerate() {
            for label in &block.labels {
                graph.labels.insert(*label, BlockId(index));
            }
        }

        graph.link();

        log::debug!(
            "Built a graph of {} blocks from {} instructions",
            graph.blocks.len(),
            instructions.len()
        );

        graph
    }

    fn link(&mut self) {
        let count = self.blocks.len();

        for index in 0..count {
            let next = (index + 1 < count).then_some(BlockId(index + 1));
            let target = |label: &Label<'a>| {
                let block = self.block_of(label);
                if block.is_none() {
                    log::trace!("Jump to {label} leaves this graph");
                }
                block
            };

            let successors: Vec<BlockId> = match self.blocks[index].instructions.last() {
                Some(TacInstruction::Goto(label)) => target(label).into_iter().collect(),
                Some(TacInstruction::IfGoto { target: label, .. }) => {
                    let mut successors: Vec<_> = target(label).into_iter().collect();
                    if let Some(next) = next {
                        if !successors.contains(&next) {
                            successors.push(next);
                        }
                    }
                    successors
                }
                Some(TacInstruction::Return) | Some(TacInstruction::Halt) => Vec::new(),
                _ => next.into_iter().collect(),
            };

            for successor in &successors {
                self.blocks[successor.0]
                    .predecessors
                    .push(BlockId(index));
            }
            self.blocks[index].successors = successors;
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock<'a> {
        &self.blocks[id.0]
    }

    /// The block a label leads into.
    pub fn block_of(&self, label: &Label<'a>) -> Option<BlockId> {
        self.labels.get(label).copied()
    }
}

fn partition<'a>(instructions: &[TacInstruction<'a>]) -> Vec<BasicBlock<'a>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    let mut finish = |current: &mut Vec<TacInstruction<'a>>| {
        if current.is_empty() {
            return;
        }

        let labels = current
            .iter()
            .map_while(|instruction| match instruction {
                TacInstruction::Label(label) => Some(*label),
                _ => None,
            })
            .collect();

        blocks.push(BasicBlock {
            labels,
            instructions: std::mem::take(current),
            predecessors: Vec::new(),
            successors: Vec::new(),
        });
    };

    for instruction in instructions {
        // Labels only ever open a block, so the
        // block has code iff its last instruction does.
        let has_code = current
            .last()
            .is_some_and(|last| !matches!(last, TacInstruction::Label(_)));
        if matches!(instruction, TacInstruction::Label(_)) && has_code {
            finish(&mut current);
        }

        current.push(instruction.clone());

        if instruction.ends_block() {
            finish(&mut current);
        }
    }
    finish(&mut current);

    blocks
}

/// A program split into one stream
/// per procedure and one for everything
/// else.
#[derive(Debug, Clone, Default)]
pub struct ProcedureStreams<'a> {
    /// Procedure name -> its instructions,
    /// from the entry label through the
    /// first return.
    pub procedures: Vec<(&'a str, Vec<TacInstruction<'a>>)>,

    /// The jump to main, main's label,
    /// and main itself.
    pub main: Vec<TacInstruction<'a>>,
}

/// Splits a whole-program stream at
/// procedure entry labels.
pub fn split_procedures<'a>(instructions: &[TacInstruction<'a>]) -> ProcedureStreams<'a> {
    let mut streams = ProcedureStreams::default();
    let mut iter = instructions.iter();

    while let Some(instruction) = iter.next() {
        let TacInstruction::Label(Label::Procedure(name)) = instruction else {
            streams.main.push(instruction.clone());
            continue;
        };

        let mut body = vec![instruction.clone()];
        for instruction in iter.by_ref() {
            body.push(instruction.clone());
            if *instruction == TacInstruction::Return {
                break;
            }
        }

        streams.procedures.push((*name, body));
    }

    streams
}

/// A graph for every procedure and
/// one for main.
#[derive(Debug, Clone)]
pub struct ProgramGraph<'a> {
    pub procedures: Vec<(&'a str, ControlFlowGraph<'a>)>,
    pub main: ControlFlowGraph<'a>,
}

impl<'a> ProgramGraph<'a> {
    pub fn build(program: &TacProgram<'a>) -> ProgramGraph<'a> {
        let streams = split_procedures(&program.instructions);

        ProgramGraph {
            procedures: streams
                .procedures
                .iter()
                .map(|(name, body)| (*name, ControlFlowGraph::build(body)))
                .collect(),
            main: ControlFlowGraph::build(&streams.main),
        }
    }
}

impl<'a> Display for ProgramGraph<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, graph) in &self.procedures {
            write!(f, "procedure {name}:\n{graph}\n")?;
        }

        write!(f, "main:\n{}", self.main)
    }
}

impl<'a> Display for ControlFlowGraph<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for id in (0..self.blocks.len()).map(BlockId) {
            let block = self.block(id);

            write!(f, "{id}")?;
            if !block.labels.is_empty() {
                write!(f, " (")?;
                for (i, label) in block.labels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label}")?;
                }
                write!(f, ")")?;
            }

            write!(f, " <- [")?;
            write_ids(f, &block.predecessors)?;
            write!(f, "] -> [")?;
            write_ids(f, &block.successors)?;
            write!(f, "]\n")?;

            for instruction in &block.instructions {
                write_indented(f, instruction, "    ")?;
                write!(f, "\n")?;
            }
        }

        Ok(())
    }
}

fn write_ids(f: &mut Formatter<'_>, ids: &[BlockId]) -> std::fmt::Result {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{id}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::tac::generate::generate;
    use crate::tac::{CmpOp, Operand};
    use std::path::Path;

    fn program() -> Vec<TacInstruction<'static>> {
        vec![
            TacInstruction::Goto(Label::Main),
            TacInstruction::Label(Label::Procedure("p")),
            TacInstruction::Write(Operand::Num(1)),
            TacInstruction::Return,
            TacInstruction::Label(Label::Main),
            TacInstruction::Label(Label::Block(1)),
            TacInstruction::IfGoto {
                cmp: CmpOp::Lt,
                left: Operand::Num(0),
                right: Operand::Num(1),
                target: Label::Block(2),
            },
            TacInstruction::Goto(Label::Block(3)),
            TacInstruction::Label(Label::Block(2)),
            TacInstruction::Goto(Label::Block(1)),
            TacInstruction::Label(Label::Block(3)),
            TacInstruction::Halt,
        ]
    }

    fn ids(ids: &[usize]) -> Vec<BlockId> {
        ids.iter().copied().map(BlockId).collect()
    }

    #[test]
    fn starts_blocks_at_labels_and_after_jumps() {
        let graph = ControlFlowGraph::build(&program());

        let sizes: Vec<_> = graph.blocks.iter().map(|b| b.instructions.len()).collect();
        assert_eq!(sizes, vec![1, 3, 3, 1, 2, 2]);

        assert_eq!(graph.block(BlockId(1)).labels, vec![Label::Procedure("p")]);
        assert!(graph.block(BlockId(0)).labels.is_empty());
        assert_eq!(graph.block_of(&Label::Block(3)), Some(BlockId(5)));
    }

    #[test]
    fn joins_consecutive_labels() {
        let graph = ControlFlowGraph::build(&program());

        assert_eq!(
            graph.block(BlockId(2)).labels,
            vec![Label::Main, Label::Block(1)]
        );
        assert_eq!(graph.block_of(&Label::Main), Some(BlockId(2)));
        assert_eq!(graph.block_of(&Label::Block(1)), Some(BlockId(2)));
    }

    #[test]
    fn every_block_holds_code() {
        let program = parse_source(
            Path::new("test.imp"),
            "PROGRAM IS i BEGIN
                WHILE i < 3 DO
                    IF i = 1 THEN WRITE i; ENDIF
                    REPEAT i := i + 1; UNTIL i > 0;
                ENDWHILE
            END",
        )
        .unwrap();
        let generated = generate(&program).unwrap();
        let graph = ProgramGraph::build(&generated.program);

        for block in &graph.main.blocks {
            assert!(
                block
                    .instructions
                    .iter()
                    .any(|instruction| !matches!(instruction, TacInstruction::Label(_))),
                "{:?}",
                block.labels
            );
        }
        assert_eq!(
            graph.main.block_of(&Label::Main),
            graph.main.block_of(&Label::Block(1))
        );
    }

    #[test]
    fn links_jumps_and_fallthrough() {
        let graph = ControlFlowGraph::build(&program());

        // goto main
        assert_eq!(graph.block(BlockId(0)).successors, ids(&[2]));
        // return
        assert!(graph.block(BlockId(1)).successors.is_empty());
        // main, L1: if .. goto L2, else fall through to goto L3
        assert_eq!(graph.block(BlockId(2)).successors, ids(&[4, 3]));
        assert_eq!(graph.block(BlockId(3)).successors, ids(&[5]));
        assert_eq!(graph.block(BlockId(4)).successors, ids(&[2]));
        // halt
        assert!(graph.block(BlockId(5)).successors.is_empty());

        assert_eq!(graph.block(BlockId(2)).predecessors, ids(&[0, 4]));
        assert!(graph.block(BlockId(1)).predecessors.is_empty());
    }

    #[test]
    fn deduplicates_conditional_edges() {
        let instructions = vec![
            TacInstruction::IfGoto {
                cmp: CmpOp::Eq,
                left: Operand::Num(0),
                right: Operand::Num(0),
                target: Label::Block(1),
            },
            TacInstruction::Label(Label::Block(1)),
            TacInstruction::Halt,
        ];
        let graph = ControlFlowGraph::build(&instructions);

        assert_eq!(graph.block(BlockId(0)).successors, ids(&[1]));
        assert_eq!(graph.block(BlockId(1)).predecessors, ids(&[0]));
    }

    #[test]
    fn splits_procedures_from_main() {
        let streams = split_procedures(&program());

        assert_eq!(streams.procedures.len(), 1);
        let (name, body) = &streams.procedures[0];
        assert_eq!(*name, "p");
        assert_eq!(body.len(), 3);
        assert_eq!(body.last(), Some(&TacInstruction::Return));

        assert_eq!(streams.main.len(), 9);
        assert_eq!(streams.main[0], TacInstruction::Goto(Label::Main));
        assert_eq!(streams.main[1], TacInstruction::Label(Label::Main));
    }

    #[test]
    fn builds_a_graph_per_procedure() {
        let graph = ProgramGraph::build(&TacProgram {
            instructions: program(),
        });

        assert_eq!(graph.procedures[0].1.blocks.len(), 1);
        assert_eq!(graph.main.blocks.len(), 5);
        // goto main links to main's block within the main graph
        assert_eq!(graph.main.block(BlockId(0)).successors, ids(&[1]));

        let text = graph.to_string();
        assert!(text.starts_with("procedure p:\nB0 (p) <- [] -> []\n    p:\n"));
        assert!(text.contains("B1 (main, L1) <- [B0, B3] -> [B3, B2]\n"));
    }
}
