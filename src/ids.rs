use crate::block::BlockId;

/// Supplies fresh block ids to the compiler.
///
/// Ids only have to be unique within one compilation; the compiler never
/// inspects their contents.
pub trait IdSource {
    fn next_id(&mut self) -> BlockId;
}

/// `block_1`, `block_2`, ... Deterministic, so repeated compilations of the
/// same text produce byte-identical graphs.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    counter: usize,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("block")
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> BlockId {
        self.counter += 1;
        BlockId::new(format!("{}_{}", self.prefix, self.counter))
    }
}

/// Random v4 UUIDs, for graphs merged into a project that already holds
/// blocks from other sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&mut self) -> BlockId {
        BlockId::new(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequential_ids_count_up_from_one() {
        let mut ids = SequentialIds::new("n");
        assert_eq!(ids.next_id().as_str(), "n_1");
        assert_eq!(ids.next_id().as_str(), "n_2");
    }

    #[test]
    fn uuid_ids_do_not_repeat() {
        let mut ids = UuidIds;
        let seen = (0..64).map(|_| ids.next_id()).collect::<HashSet<_>>();
        assert_eq!(seen.len(), 64);
    }
}
