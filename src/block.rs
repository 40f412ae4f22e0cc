use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Command,
    Reporter,
    Boolean,
    Hat,
    Container,
}

impl Shape {
    /// Shapes that occupy a position in a stack of blocks.
    pub fn is_stackable(self) -> bool {
        matches!(self, Shape::Command | Shape::Container)
    }

    pub fn is_value(self) -> bool {
        matches!(self, Shape::Reporter | Shape::Boolean)
    }
}

/// Dropdown menus that the editor models as a separate shadow block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    Key,
    Broadcast,
    Sound,
    TouchingObject,
    CloneOption,
    Costume,
    Backdrop,
    GoTo,
    GlideTo,
    PointTowards,
    DistanceTo,
    OfObject,
}

impl MenuKind {
    pub fn opcode(self) -> &'static str {
        match self {
            MenuKind::Key => "sensing_keyoptions",
            MenuKind::Broadcast => "event_broadcast_menu",
            MenuKind::Sound => "sound_sounds_menu",
            MenuKind::TouchingObject => "sensing_touchingobjectmenu",
            MenuKind::CloneOption => "control_create_clone_of_menu",
            MenuKind::Costume => "looks_costume",
            MenuKind::Backdrop => "looks_backdrops",
            MenuKind::GoTo => "motion_goto_menu",
            MenuKind::GlideTo => "motion_glideto_menu",
            MenuKind::PointTowards => "motion_pointtowards_menu",
            MenuKind::DistanceTo => "sensing_distancetomenu",
            MenuKind::OfObject => "sensing_of_object_menu",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            MenuKind::Key => "KEY_OPTION",
            MenuKind::Broadcast => "BROADCAST_OPTION",
            MenuKind::Sound => "SOUND_MENU",
            MenuKind::TouchingObject => "TOUCHINGOBJECTMENU",
            MenuKind::CloneOption => "CLONE_OPTION",
            MenuKind::Costume => "COSTUME",
            MenuKind::Backdrop => "BACKDROP",
            MenuKind::GoTo | MenuKind::GlideTo => "TO",
            MenuKind::PointTowards => "TOWARDS",
            MenuKind::DistanceTo => "DISTANCETOMENU",
            MenuKind::OfObject => "OBJECT",
        }
    }
}

/// How a shadow literal node encodes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Number,
    PositiveNumber,
    WholeNumber,
    Angle,
    Text,
    Color,
    Menu(MenuKind),
}

impl LiteralKind {
    pub fn opcode(self) -> &'static str {
        match self {
            LiteralKind::Number => "math_number",
            LiteralKind::PositiveNumber => "math_positive_number",
            LiteralKind::WholeNumber => "math_whole_number",
            LiteralKind::Angle => "math_angle",
            LiteralKind::Text => "text",
            LiteralKind::Color => "colour_picker",
            LiteralKind::Menu(menu) => menu.opcode(),
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            LiteralKind::Number
            | LiteralKind::PositiveNumber
            | LiteralKind::WholeNumber
            | LiteralKind::Angle => "NUM",
            LiteralKind::Text => "TEXT",
            LiteralKind::Color => "COLOUR",
            LiteralKind::Menu(menu) => menu.field(),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            LiteralKind::Number
                | LiteralKind::PositiveNumber
                | LiteralKind::WholeNumber
                | LiteralKind::Angle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    GlobalVariable,
    LocalVariable,
    BuiltIn,
    Sprite,
}

impl NameKind {
    pub fn is_variable(self) -> bool {
        matches!(self, NameKind::GlobalVariable | NameKind::LocalVariable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    Literal { kind: LiteralKind, block: BlockId },
    Reporter { block: BlockId },
    Condition { block: BlockId },
    Substack { block: BlockId },
    Reference { name: String, id: String, kind: NameKind },
}

impl Input {
    /// The node this input consumes, if it points into the arena.
    pub fn block(&self) -> Option<&BlockId> {
        match self {
            Input::Literal { block, .. }
            | Input::Reporter { block }
            | Input::Condition { block }
            | Input::Substack { block } => Some(block),
            Input::Reference { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
}

impl Field {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            value: value.into(),
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub opcode: String,
    pub shape: Shape,
    pub inputs: IndexMap<String, Input>,
    pub fields: IndexMap<String, Field>,
    pub parent: Option<BlockId>,
    pub next: Option<BlockId>,
    pub top_level: bool,
    pub shadow: bool,
}

impl Block {
    pub fn new(id: BlockId, opcode: &str, shape: Shape) -> Self {
        Self {
            id,
            opcode: opcode.to_string(),
            shape,
            inputs: IndexMap::new(),
            fields: IndexMap::new(),
            parent: None,
            next: None,
            top_level: shape == Shape::Hat,
            shadow: false,
        }
    }

    /// A literal-holding node owned by exactly one input slot of `owner`.
    pub fn shadow(id: BlockId, kind: LiteralKind, value: &str, owner: &BlockId) -> Self {
        let mut block = Self::new(id, kind.opcode(), Shape::Reporter);
        block.shadow = true;
        block.parent = Some(owner.clone());
        block
            .fields
            .insert(kind.field().to_string(), Field::new(kind.field(), value));
        block
    }

    /// Value held by a shadow literal node.
    pub fn literal_value(&self) -> Option<&str> {
        if !self.shadow {
            return None;
        }
        self.fields.values().next().map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub top_block_id: BlockId,
    pub blocks: IndexMap<BlockId, Block>,
}

impl Script {
    pub fn top_block(&self) -> Option<&Block> {
        self.blocks.get(&self.top_block_id)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Walks a `next` chain starting at `first`.
    pub fn sequence_from<'s>(&'s self, first: Option<&BlockId>) -> Vec<&'s Block> {
        let mut out = Vec::new();
        let mut cursor = first.and_then(|id| self.blocks.get(id));
        while let Some(block) = cursor {
            out.push(block);
            cursor = block.next.as_ref().and_then(|id| self.blocks.get(id));
        }
        out
    }

    /// The top-level stack hanging off the trigger node.
    pub fn body(&self) -> Vec<&Block> {
        self.sequence_from(self.top_block().and_then(|hat| hat.next.as_ref()))
    }

    /// Blocks inside a container's body slot (`SUBSTACK` or `SUBSTACK2`).
    pub fn substack(&self, container: &Block, slot: &str) -> Vec<&Block> {
        match container.inputs.get(slot) {
            Some(Input::Substack { block }) => self.sequence_from(Some(block)),
            _ => Vec::new(),
        }
    }

    /// The node behind a literal, reporter or condition input.
    pub fn input_block(&self, owner: &Block, slot: &str) -> Option<&Block> {
        owner
            .inputs
            .get(slot)
            .and_then(Input::block)
            .and_then(|id| self.blocks.get(id))
    }
}
