use crate::block::{Block, BlockId, Input, Script, Shape};
use crate::error::CompileError;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Node arena for the script currently being compiled. Insertion order is
/// creation order, which decides the order of the top-level sequence.
#[derive(Debug, Default)]
pub struct ScriptGraph {
    blocks: IndexMap<BlockId, Block>,
}

impl ScriptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block) -> BlockId {
        let id = block.id.clone();
        self.blocks.insert(id.clone(), block);
        id
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn set_input(
        &mut self,
        owner: &BlockId,
        slot: &str,
        input: Input,
    ) -> Result<(), CompileError> {
        let block = self
            .blocks
            .get_mut(owner)
            .ok_or_else(|| missing(owner, "input owner"))?;
        block.inputs.insert(slot.to_string(), input);
        Ok(())
    }

    /// Chains `ids` through `next`, hangs the head under `parent` and
    /// returns the head.
    pub fn link_sequence(
        &mut self,
        ids: &[BlockId],
        parent: &BlockId,
    ) -> Result<Option<BlockId>, CompileError> {
        let mut previous = parent.clone();
        for (index, id) in ids.iter().enumerate() {
            let block = self
                .blocks
                .get_mut(id)
                .ok_or_else(|| missing(id, "sequence member"))?;
            block.parent = Some(previous.clone());
            if let Some(next) = ids.get(index + 1) {
                block.next = Some(next.clone());
            }
            previous = id.clone();
        }
        Ok(ids.first().cloned())
    }

    /// Ids held by some input slot.
    pub fn consumed_ids(&self) -> HashSet<BlockId> {
        self.blocks
            .values()
            .flat_map(|block| block.inputs.values().filter_map(Input::block).cloned())
            .collect()
    }

    /// Free nodes in creation order: not shadows, not the trigger, no parent
    /// yet and not consumed by any slot.
    pub fn free_nodes(&self) -> Vec<BlockId> {
        let consumed = self.consumed_ids();
        self.blocks
            .values()
            .filter(|b| {
                !b.shadow && !b.top_level && b.parent.is_none() && !consumed.contains(&b.id)
            })
            .map(|b| b.id.clone())
            .collect()
    }

    /// Attaches the free nodes under the trigger and hands the arena over as
    /// a finished, verified script.
    pub fn finish(mut self, hat: &BlockId) -> Result<Script, CompileError> {
        let free = self.free_nodes();
        let head = self.link_sequence(&free, hat)?;
        self.get_mut(hat).ok_or_else(|| missing(hat, "trigger"))?.next = head;
        let script = Script {
            top_block_id: hat.clone(),
            blocks: self.blocks,
        };
        validate(&script)?;
        Ok(script)
    }
}

/// Checks that every node is reached from the trigger exactly once and that
/// each node's `parent` names the node that reaches it.
pub fn validate(script: &Script) -> Result<(), CompileError> {
    let top = script
        .top_block()
        .ok_or_else(|| missing(&script.top_block_id, "trigger"))?;
    if top.shape != Shape::Hat || !top.top_level || top.parent.is_some() {
        return Err(CompileError::InconsistentGraph(format!(
            "top block '{}' is not a free trigger",
            top.id
        )));
    }

    let mut owner_of: HashMap<&BlockId, &BlockId> = HashMap::new();
    let mut pending = vec![top];
    while let Some(block) = pending.pop() {
        let children = block
            .next
            .iter()
            .chain(block.inputs.values().filter_map(Input::block));
        for child_id in children {
            if owner_of.insert(child_id, &block.id).is_some() {
                return Err(CompileError::InconsistentGraph(format!(
                    "block '{}' is reachable from more than one parent",
                    child_id
                )));
            }
            let child = script
                .block(child_id)
                .ok_or_else(|| missing(child_id, "referenced block"))?;
            if child.parent.as_ref() != Some(&block.id) {
                return Err(CompileError::InconsistentGraph(format!(
                    "block '{}' is held by '{}' but names {:?} as parent",
                    child_id, block.id, child.parent
                )));
            }
            if child.shadow && child.next.is_some() {
                return Err(CompileError::InconsistentGraph(format!(
                    "shadow block '{}' has a next block",
                    child_id
                )));
            }
            pending.push(child);
        }
    }

    if let Some(orphan) = script
        .blocks
        .keys()
        .find(|id| **id != script.top_block_id && !owner_of.contains_key(id))
    {
        return Err(CompileError::InconsistentGraph(format!(
            "block '{}' is not reachable from the trigger",
            orphan
        )));
    }
    Ok(())
}

fn missing(id: &BlockId, role: &str) -> CompileError {
    CompileError::InconsistentGraph(format!("{} '{}' does not exist", role, id))
}
