use crate::block::{Block, BlockId, Field, Input, LiteralKind};
use crate::condition::parse_condition;
use crate::error::CompileError;
use crate::graph::ScriptGraph;
use crate::ids::IdSource;
use crate::names::KnownNames;
use crate::opcodes::{self, Match, SlotKind};
use crate::resolve::resolve;
use tracing::trace;

/// Mutable state shared by the line dispatcher, the resolver and the
/// condition parser while one translation unit is compiled.
pub struct BuildContext<'a> {
    pub names: &'a KnownNames,
    ids: &'a mut dyn IdSource,
    pub graph: ScriptGraph,
    line: usize,
    depth: usize,
    max_nesting: usize,
}

impl<'a> BuildContext<'a> {
    pub fn new(names: &'a KnownNames, ids: &'a mut dyn IdSource, max_nesting: usize) -> Self {
        Self {
            names,
            ids,
            graph: ScriptGraph::new(),
            line: 0,
            depth: 0,
            max_nesting,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub fn fresh_id(&mut self) -> BlockId {
        self.ids.next_id()
    }

    /// Runs `f` one recursion level deeper, failing once the configured
    /// nesting limit is exceeded.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth >= self.max_nesting {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Recursion levels left before the nesting limit.
    pub fn remaining_depth(&self) -> usize {
        self.max_nesting.saturating_sub(self.depth)
    }

    pub fn too_deep(&self) -> CompileError {
        CompileError::NestingTooDeep {
            line: self.line,
            limit: self.max_nesting,
        }
    }

    /// Mints a shadow literal owned by `owner`.
    pub fn literal(&mut self, kind: LiteralKind, value: &str, owner: &BlockId) -> Input {
        let id = self.fresh_id();
        trace!(block = %id, opcode = kind.opcode(), value, "literal");
        let block = self.graph.insert(Block::shadow(id, kind, value, owner));
        Input::Literal { kind, block }
    }

    /// Builds the node described by a registry match and fills every slot.
    /// The node is inserted before its slots so nested nodes are created
    /// after their owner.
    pub fn instantiate(
        &mut self,
        m: &Match<'_>,
        parent: Option<&BlockId>,
    ) -> Result<BlockId, CompileError> {
        let spec = m.spec;
        let id = self.fresh_id();
        let mut block = Block::new(id.clone(), spec.opcode, spec.shape);
        block.parent = parent.cloned();
        self.graph.insert(block);
        trace!(block = %id, opcode = spec.opcode, "instantiate");

        for slot in spec.slots {
            let raw = m.arg(slot.name).unwrap_or_default();
            match slot.kind {
                SlotKind::Value(hint) => {
                    let input = resolve(self, raw, hint, &id)?;
                    self.graph.set_input(&id, slot.name, input)?;
                }
                SlotKind::Condition => {
                    let block = parse_condition(self, raw, &id)?;
                    self.graph.set_input(&id, slot.name, Input::Condition { block })?;
                }
                SlotKind::Field(choices) => {
                    let text = opcodes::dropdown_text(raw);
                    let value = opcodes::choose(choices, text).unwrap_or(text);
                    self.set_field(&id, Field::new(slot.name, value))?;
                }
                SlotKind::VariableField => {
                    let text = opcodes::dropdown_text(raw);
                    let var_id = self.names.lookup_variable(text).map(|known| known.id.clone());
                    self.set_field(&id, Field::new(slot.name, text).with_id(var_id))?;
                }
            }
        }
        Ok(id)
    }

    fn set_field(&mut self, owner: &BlockId, field: Field) -> Result<(), CompileError> {
        let block = self.graph.get_mut(owner).ok_or_else(|| {
            CompileError::InconsistentGraph(format!("field owner '{}' does not exist", owner))
        })?;
        block.fields.insert(field.name.clone(), field);
        Ok(())
    }
}
