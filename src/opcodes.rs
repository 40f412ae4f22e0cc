//! Static table of every block the pseudocode can name.
//!
//! Each entry carries its canonical pseudocode (plus aliases). Placeholders in
//! that text, `(NAME)`, `[NAME]`, `(NAME v)`, `[NAME v]` and `<NAME>`, refer to
//! the entry's slots; the text is compiled once into an anchored,
//! case-insensitive regex whose capture for each slot depends on the slot's
//! kind rather than on the bracket style written in the table. Entries are
//! tried in table order and the first match wins.

use crate::block::{MenuKind, Shape};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Motion,
    Looks,
    Sound,
    Event,
    Control,
    Sensing,
    Operators,
    Variables,
}

/// Literal encoding expected by a value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Generic,
    Number,
    PositiveNumber,
    WholeNumber,
    Angle,
    Text,
    Color,
    Menu(MenuKind),
}

/// `(surface text, stored value)` for a fixed dropdown choice.
pub type Choice = (&'static str, &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Value(Hint),
    Condition,
    /// In-place dropdown. An empty choice list accepts any bracketed text.
    Field(&'static [Choice]),
    /// Dropdown naming a variable; bound to the known-name table.
    VariableField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeSpec {
    pub opcode: &'static str,
    pub category: Category,
    pub shape: Shape,
    pub syntax: &'static str,
    pub aliases: &'static [&'static str],
    pub slots: &'static [Slot],
}

impl OpcodeSpec {
    pub fn slot(&self, name: &str) -> Option<&'static Slot> {
        self.slots.iter().find(|s| s.name == name)
    }
}

/// A registry entry matched against a piece of text, with the raw text
/// captured for each slot (brackets included for value slots).
#[derive(Debug, Clone)]
pub struct Match<'t> {
    pub spec: &'static OpcodeSpec,
    pub args: Vec<(&'static str, &'t str)>,
}

impl<'t> Match<'t> {
    pub fn arg(&self, slot: &str) -> Option<&'t str> {
        self.args.iter().find(|(name, _)| *name == slot).map(|(_, raw)| *raw)
    }
}

const fn op(
    opcode: &'static str,
    category: Category,
    shape: Shape,
    syntax: &'static str,
    slots: &'static [Slot],
) -> OpcodeSpec {
    OpcodeSpec {
        opcode,
        category,
        shape,
        syntax,
        aliases: &[],
        slots,
    }
}

const fn aka(spec: OpcodeSpec, aliases: &'static [&'static str]) -> OpcodeSpec {
    OpcodeSpec { aliases, ..spec }
}

const fn value(name: &'static str, hint: Hint) -> Slot {
    Slot {
        name,
        kind: SlotKind::Value(hint),
    }
}

const fn menu(name: &'static str, kind: MenuKind) -> Slot {
    value(name, Hint::Menu(kind))
}

const fn condition(name: &'static str) -> Slot {
    Slot {
        name,
        kind: SlotKind::Condition,
    }
}

const fn field(name: &'static str, choices: &'static [Choice]) -> Slot {
    Slot {
        name,
        kind: SlotKind::Field(choices),
    }
}

const fn variable(name: &'static str) -> Slot {
    Slot {
        name,
        kind: SlotKind::VariableField,
    }
}

use Category::*;
use Hint::{Angle, Color, Generic, Number, PositiveNumber, Text, WholeNumber};
use Shape::{Boolean, Command, Container, Hat, Reporter};

const LOOKS_EFFECTS: &[Choice] = &[
    ("color", "COLOR"),
    ("fisheye", "FISHEYE"),
    ("whirl", "WHIRL"),
    ("pixelate", "PIXELATE"),
    ("mosaic", "MOSAIC"),
    ("brightness", "BRIGHTNESS"),
    ("ghost", "GHOST"),
];
const SOUND_EFFECTS: &[Choice] = &[("pitch", "PITCH"), ("pan left/right", "PAN")];
const ROTATION_STYLES: &[Choice] = &[
    ("left-right", "left-right"),
    ("don't rotate", "don't rotate"),
    ("all around", "all around"),
];
const STOP_OPTIONS: &[Choice] = &[
    ("all", "all"),
    ("this script", "this script"),
    ("other scripts in sprite", "other scripts in sprite"),
];
const MATH_FUNCTIONS: &[Choice] = &[
    ("abs", "abs"),
    ("floor", "floor"),
    ("ceiling", "ceiling"),
    ("sqrt", "sqrt"),
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("asin", "asin"),
    ("acos", "acos"),
    ("atan", "atan"),
    ("ln", "ln"),
    ("log", "log"),
    ("e ^", "e ^"),
    ("e^", "e ^"),
    ("10 ^", "10 ^"),
    ("10^", "10 ^"),
];
const CURRENT_MENU: &[Choice] = &[
    ("year", "YEAR"),
    ("month", "MONTH"),
    ("date", "DATE"),
    ("day of week", "DAYOFWEEK"),
    ("hour", "HOUR"),
    ("minute", "MINUTE"),
    ("second", "SECOND"),
];
const ANY: &[Choice] = &[];

static OPCODES: &[OpcodeSpec] = &[
    // motion
    op("motion_movesteps", Motion, Command, "move (STEPS) steps", &[value("STEPS", Number)]),
    aka(
        op(
            "motion_turnright",
            Motion,
            Command,
            "turn right (DEGREES) degrees",
            &[value("DEGREES", Number)],
        ),
        &["turn cw (DEGREES) degrees"],
    ),
    aka(
        op(
            "motion_turnleft",
            Motion,
            Command,
            "turn left (DEGREES) degrees",
            &[value("DEGREES", Number)],
        ),
        &["turn ccw (DEGREES) degrees"],
    ),
    op(
        "motion_gotoxy",
        Motion,
        Command,
        "go to x: (X) y: (Y)",
        &[value("X", Number), value("Y", Number)],
    ),
    op("motion_goto", Motion, Command, "go to [TO v]", &[menu("TO", MenuKind::GoTo)]),
    op(
        "motion_glidesecstoxy",
        Motion,
        Command,
        "glide (SECS) secs to x: (X) y: (Y)",
        &[value("SECS", Number), value("X", Number), value("Y", Number)],
    ),
    op(
        "motion_glideto",
        Motion,
        Command,
        "glide (SECS) secs to [TO v]",
        &[value("SECS", Number), menu("TO", MenuKind::GlideTo)],
    ),
    op(
        "motion_pointindirection",
        Motion,
        Command,
        "point in direction (DIRECTION)",
        &[value("DIRECTION", Angle)],
    ),
    op(
        "motion_pointtowards",
        Motion,
        Command,
        "point towards [TOWARDS v]",
        &[menu("TOWARDS", MenuKind::PointTowards)],
    ),
    op("motion_changexby", Motion, Command, "change x by (DX)", &[value("DX", Number)]),
    op("motion_setx", Motion, Command, "set x to (X)", &[value("X", Number)]),
    op("motion_changeyby", Motion, Command, "change y by (DY)", &[value("DY", Number)]),
    op("motion_sety", Motion, Command, "set y to (Y)", &[value("Y", Number)]),
    op("motion_ifonedgebounce", Motion, Command, "if on edge, bounce", &[]),
    aka(
        op(
            "motion_setrotationstyle",
            Motion,
            Command,
            "set rotation style [STYLE v]",
            &[field("STYLE", ROTATION_STYLES)],
        ),
        &["set rotation style to [STYLE v]"],
    ),
    op("motion_xposition", Motion, Reporter, "x position", &[]),
    op("motion_yposition", Motion, Reporter, "y position", &[]),
    op("motion_direction", Motion, Reporter, "direction", &[]),
    // looks
    op(
        "looks_sayforsecs",
        Looks,
        Command,
        "say (MESSAGE) for (SECS) seconds",
        &[value("MESSAGE", Text), value("SECS", Number)],
    ),
    op("looks_say", Looks, Command, "say (MESSAGE)", &[value("MESSAGE", Text)]),
    op(
        "looks_thinkforsecs",
        Looks,
        Command,
        "think (MESSAGE) for (SECS) seconds",
        &[value("MESSAGE", Text), value("SECS", Number)],
    ),
    op("looks_think", Looks, Command, "think (MESSAGE)", &[value("MESSAGE", Text)]),
    op(
        "looks_switchcostumeto",
        Looks,
        Command,
        "switch costume to [COSTUME v]",
        &[menu("COSTUME", MenuKind::Costume)],
    ),
    op("looks_nextcostume", Looks, Command, "next costume", &[]),
    op(
        "looks_switchbackdropto",
        Looks,
        Command,
        "switch backdrop to [BACKDROP v]",
        &[menu("BACKDROP", MenuKind::Backdrop)],
    ),
    op("looks_nextbackdrop", Looks, Command, "next backdrop", &[]),
    op("looks_changesizeby", Looks, Command, "change size by (CHANGE)", &[value("CHANGE", Number)]),
    op("looks_setsizeto", Looks, Command, "set size to (SIZE)%", &[value("SIZE", Number)]),
    op(
        "looks_changeeffectby",
        Looks,
        Command,
        "change [EFFECT v] effect by (CHANGE)",
        &[field("EFFECT", LOOKS_EFFECTS), value("CHANGE", Number)],
    ),
    op(
        "looks_seteffectto",
        Looks,
        Command,
        "set [EFFECT v] effect to (VALUE)",
        &[field("EFFECT", LOOKS_EFFECTS), value("VALUE", Number)],
    ),
    op("looks_cleargraphiceffects", Looks, Command, "clear graphic effects", &[]),
    op("looks_show", Looks, Command, "show", &[]),
    op("looks_hide", Looks, Command, "hide", &[]),
    op(
        "looks_gotofrontback",
        Looks,
        Command,
        "go to [FRONT_BACK v] layer",
        &[field("FRONT_BACK", &[("front", "front"), ("back", "back")])],
    ),
    op(
        "looks_goforwardbackward",
        Looks,
        Command,
        "go [FORWARD_BACKWARD v] (NUM) layers",
        &[
            field("FORWARD_BACKWARD", &[("forward", "forward"), ("backward", "backward")]),
            value("NUM", WholeNumber),
        ],
    ),
    op(
        "looks_costumenumbername",
        Looks,
        Reporter,
        "costume [NUMBER_NAME v]",
        &[field("NUMBER_NAME", &[("number", "number"), ("name", "name")])],
    ),
    op(
        "looks_backdropnumbername",
        Looks,
        Reporter,
        "backdrop [NUMBER_NAME v]",
        &[field("NUMBER_NAME", &[("number", "number"), ("name", "name")])],
    ),
    op("looks_size", Looks, Reporter, "size", &[]),
    // sound
    op(
        "sound_playuntildone",
        Sound,
        Command,
        "play sound [SOUND_MENU v] until done",
        &[menu("SOUND_MENU", MenuKind::Sound)],
    ),
    aka(
        op(
            "sound_play",
            Sound,
            Command,
            "play sound [SOUND_MENU v]",
            &[menu("SOUND_MENU", MenuKind::Sound)],
        ),
        &["start sound [SOUND_MENU v]"],
    ),
    op("sound_stopallsounds", Sound, Command, "stop all sounds", &[]),
    op(
        "sound_changeeffectby",
        Sound,
        Command,
        "change [EFFECT v] effect by (VALUE)",
        &[field("EFFECT", SOUND_EFFECTS), value("VALUE", Number)],
    ),
    op(
        "sound_seteffectto",
        Sound,
        Command,
        "set [EFFECT v] effect to (VALUE)",
        &[field("EFFECT", SOUND_EFFECTS), value("VALUE", Number)],
    ),
    op("sound_cleareffects", Sound, Command, "clear sound effects", &[]),
    op(
        "sound_changevolumeby",
        Sound,
        Command,
        "change volume by (VOLUME)",
        &[value("VOLUME", Number)],
    ),
    op("sound_setvolumeto", Sound, Command, "set volume to (VOLUME)%", &[value("VOLUME", Number)]),
    op("sound_volume", Sound, Reporter, "volume", &[]),
    // events
    aka(
        op("event_whenflagclicked", Event, Hat, "when green flag clicked", &[]),
        &["when flag clicked", "when @greenFlag clicked"],
    ),
    op("event_whenthisspriteclicked", Event, Hat, "when this sprite clicked", &[]),
    op(
        "event_whenbackdropswitchesto",
        Event,
        Hat,
        "when backdrop switches to [BACKDROP v]",
        &[field("BACKDROP", ANY)],
    ),
    op(
        "event_whenbroadcastreceived",
        Event,
        Hat,
        "when I receive [BROADCAST_OPTION v]",
        &[field("BROADCAST_OPTION", ANY)],
    ),
    aka(
        op(
            "event_whenkeypressed",
            Event,
            Hat,
            "when [KEY_OPTION v] key pressed",
            &[field("KEY_OPTION", ANY)],
        ),
        &["when key [KEY_OPTION v] pressed"],
    ),
    op(
        "event_whengreaterthan",
        Event,
        Hat,
        "when [WHENGREATERTHANMENU v] > (VALUE)",
        &[
            field("WHENGREATERTHANMENU", &[("loudness", "LOUDNESS"), ("timer", "TIMER")]),
            value("VALUE", Number),
        ],
    ),
    op(
        "event_broadcastandwait",
        Event,
        Command,
        "broadcast [BROADCAST_INPUT v] and wait",
        &[menu("BROADCAST_INPUT", MenuKind::Broadcast)],
    ),
    op(
        "event_broadcast",
        Event,
        Command,
        "broadcast [BROADCAST_INPUT v]",
        &[menu("BROADCAST_INPUT", MenuKind::Broadcast)],
    ),
    // control
    aka(
        op(
            "control_wait",
            Control,
            Command,
            "wait (DURATION) seconds",
            &[value("DURATION", PositiveNumber)],
        ),
        &["wait (DURATION) secs"],
    ),
    op("control_wait_until", Control, Command, "wait until <CONDITION>", &[condition("CONDITION")]),
    op(
        "control_repeat_until",
        Control,
        Container,
        "repeat until <CONDITION>",
        &[condition("CONDITION")],
    ),
    op("control_repeat", Control, Container, "repeat (TIMES)", &[value("TIMES", WholeNumber)]),
    op("control_forever", Control, Container, "forever", &[]),
    op("control_if", Control, Container, "if <CONDITION> then", &[condition("CONDITION")]),
    // Produced by rewriting an open `if` on `else`; never matched as a line.
    op("control_if_else", Control, Container, "else", &[condition("CONDITION")]),
    op(
        "control_stop",
        Control,
        Command,
        "stop [STOP_OPTION v]",
        &[field("STOP_OPTION", STOP_OPTIONS)],
    ),
    op("control_start_as_clone", Control, Hat, "when I start as a clone", &[]),
    op(
        "control_create_clone_of",
        Control,
        Command,
        "create clone of [CLONE_OPTION v]",
        &[menu("CLONE_OPTION", MenuKind::CloneOption)],
    ),
    op("control_delete_this_clone", Control, Command, "delete this clone", &[]),
    // sensing
    op(
        "sensing_keypressed",
        Sensing,
        Boolean,
        "key [KEY_OPTION v] pressed",
        &[menu("KEY_OPTION", MenuKind::Key)],
    ),
    op(
        "sensing_touchingcolor",
        Sensing,
        Boolean,
        "touching color (COLOR)",
        &[value("COLOR", Color)],
    ),
    op(
        "sensing_touchingobject",
        Sensing,
        Boolean,
        "touching [TOUCHINGOBJECTMENU v]",
        &[menu("TOUCHINGOBJECTMENU", MenuKind::TouchingObject)],
    ),
    op(
        "sensing_coloristouchingcolor",
        Sensing,
        Boolean,
        "color (COLOR) is touching color (COLOR2)",
        &[value("COLOR", Color), value("COLOR2", Color)],
    ),
    op("sensing_mousedown", Sensing, Boolean, "mouse down", &[]),
    op(
        "sensing_askandwait",
        Sensing,
        Command,
        "ask (QUESTION) and wait",
        &[value("QUESTION", Text)],
    ),
    aka(
        op(
            "sensing_setdragmode",
            Sensing,
            Command,
            "set drag mode [DRAG_MODE v]",
            &[field(
                "DRAG_MODE",
                &[("draggable", "draggable"), ("not draggable", "not draggable")],
            )],
        ),
        &["set drag mode to [DRAG_MODE v]"],
    ),
    op("sensing_resettimer", Sensing, Command, "reset timer", &[]),
    op(
        "sensing_distanceto",
        Sensing,
        Reporter,
        "distance to [DISTANCETOMENU v]",
        &[menu("DISTANCETOMENU", MenuKind::DistanceTo)],
    ),
    op("sensing_answer", Sensing, Reporter, "answer", &[]),
    aka(op("sensing_mousex", Sensing, Reporter, "mouse x", &[]), &["mouse x position"]),
    aka(op("sensing_mousey", Sensing, Reporter, "mouse y", &[]), &["mouse y position"]),
    op("sensing_loudness", Sensing, Reporter, "loudness", &[]),
    op("sensing_timer", Sensing, Reporter, "timer", &[]),
    op("sensing_username", Sensing, Reporter, "username", &[]),
    op("sensing_dayssince2000", Sensing, Reporter, "days since 2000", &[]),
    op(
        "sensing_current",
        Sensing,
        Reporter,
        "current [CURRENTMENU v]",
        &[field("CURRENTMENU", CURRENT_MENU)],
    ),
    // operators
    op(
        "operator_add",
        Operators,
        Reporter,
        "(NUM1) + (NUM2)",
        &[value("NUM1", Number), value("NUM2", Number)],
    ),
    op(
        "operator_subtract",
        Operators,
        Reporter,
        "(NUM1) - (NUM2)",
        &[value("NUM1", Number), value("NUM2", Number)],
    ),
    op(
        "operator_multiply",
        Operators,
        Reporter,
        "(NUM1) * (NUM2)",
        &[value("NUM1", Number), value("NUM2", Number)],
    ),
    op(
        "operator_divide",
        Operators,
        Reporter,
        "(NUM1) / (NUM2)",
        &[value("NUM1", Number), value("NUM2", Number)],
    ),
    op(
        "operator_mod",
        Operators,
        Reporter,
        "(NUM1) mod (NUM2)",
        &[value("NUM1", Number), value("NUM2", Number)],
    ),
    op(
        "operator_random",
        Operators,
        Reporter,
        "pick random (FROM) to (TO)",
        &[value("FROM", Number), value("TO", Number)],
    ),
    op("operator_round", Operators, Reporter, "round (NUM)", &[value("NUM", Number)]),
    op(
        "operator_mathop",
        Operators,
        Reporter,
        "[OPERATOR v] of (NUM)",
        &[field("OPERATOR", MATH_FUNCTIONS), value("NUM", Number)],
    ),
    op(
        "operator_join",
        Operators,
        Reporter,
        "join (STRING1) (STRING2)",
        &[value("STRING1", Text), value("STRING2", Text)],
    ),
    op(
        "operator_letter_of",
        Operators,
        Reporter,
        "letter (LETTER) of (STRING)",
        &[value("LETTER", WholeNumber), value("STRING", Text)],
    ),
    op("operator_length", Operators, Reporter, "length of (STRING)", &[value("STRING", Text)]),
    op(
        "operator_contains",
        Operators,
        Boolean,
        "(STRING1) contains (STRING2)",
        &[value("STRING1", Text), value("STRING2", Text)],
    ),
    op(
        "operator_equals",
        Operators,
        Boolean,
        "(OPERAND1) = (OPERAND2)",
        &[value("OPERAND1", Generic), value("OPERAND2", Generic)],
    ),
    op(
        "operator_gt",
        Operators,
        Boolean,
        "(OPERAND1) > (OPERAND2)",
        &[value("OPERAND1", Generic), value("OPERAND2", Generic)],
    ),
    op(
        "operator_lt",
        Operators,
        Boolean,
        "(OPERAND1) < (OPERAND2)",
        &[value("OPERAND1", Generic), value("OPERAND2", Generic)],
    ),
    op(
        "operator_and",
        Operators,
        Boolean,
        "<OPERAND1> and <OPERAND2>",
        &[condition("OPERAND1"), condition("OPERAND2")],
    ),
    op(
        "operator_or",
        Operators,
        Boolean,
        "<OPERAND1> or <OPERAND2>",
        &[condition("OPERAND1"), condition("OPERAND2")],
    ),
    op("operator_not", Operators, Boolean, "not <OPERAND>", &[condition("OPERAND")]),
    op(
        "sensing_of",
        Sensing,
        Reporter,
        "[PROPERTY v] of [OBJECT v]",
        &[field("PROPERTY", ANY), menu("OBJECT", MenuKind::OfObject)],
    ),
    // variables
    op(
        "data_setvariableto",
        Variables,
        Command,
        "set [VARIABLE v] to (VALUE)",
        &[variable("VARIABLE"), value("VALUE", Text)],
    ),
    op(
        "data_changevariableby",
        Variables,
        Command,
        "change [VARIABLE v] by (VALUE)",
        &[variable("VARIABLE"), value("VALUE", Number)],
    ),
    op(
        "data_showvariable",
        Variables,
        Command,
        "show variable [VARIABLE v]",
        &[variable("VARIABLE")],
    ),
    op(
        "data_hidevariable",
        Variables,
        Command,
        "hide variable [VARIABLE v]",
        &[variable("VARIABLE")],
    ),
];

const VALUE_CAPTURE: &str = r"(\(.*?\)|\[.*?\]|[^\s()\[\]<>]+)";
const DROPDOWN_CAPTURE: &str = r"(\[[^\[\]]*?\]|\([^()]*?\))";
const CONDITION_CAPTURE: &str = r"(<.*?>|.+?)";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\(\[<]([A-Z][A-Z0-9_]*)(?: v)?[\)\]>]").expect("placeholder pattern is valid")
});

#[derive(Debug)]
struct Pattern {
    regex: Regex,
    slots: Vec<&'static str>,
}

#[derive(Debug)]
struct CompiledSpec {
    spec: &'static OpcodeSpec,
    patterns: Vec<Pattern>,
}

static COMPILED: Lazy<Vec<CompiledSpec>> = Lazy::new(|| {
    OPCODES
        .iter()
        .map(|spec| CompiledSpec {
            spec,
            patterns: std::iter::once(spec.syntax)
                .chain(spec.aliases.iter().copied())
                .filter_map(|template| compile_template(spec, template))
                .collect(),
        })
        .collect()
});

pub fn all() -> &'static [OpcodeSpec] {
    OPCODES
}

pub fn get(opcode: &str) -> Option<&'static OpcodeSpec> {
    OPCODES.iter().find(|spec| spec.opcode == opcode)
}

/// Stack blocks: plain commands and container openers.
pub fn lookup_line(text: &str) -> Option<Match<'_>> {
    lookup_where(text, |shape| shape.is_stackable())
}

pub fn lookup_trigger(text: &str) -> Option<Match<'_>> {
    lookup_where(text, |shape| shape == Shape::Hat)
}

/// Reporters and boolean predicates usable inside a slot.
pub fn lookup_value(text: &str) -> Option<Match<'_>> {
    lookup_where(text, Shape::is_value)
}

pub fn lookup_boolean(text: &str) -> Option<Match<'_>> {
    lookup_where(text, |shape| shape == Shape::Boolean)
}

fn lookup_where(text: &str, accept: impl Fn(Shape) -> bool) -> Option<Match<'_>> {
    for compiled in COMPILED.iter().filter(|c| accept(c.spec.shape)) {
        for pattern in &compiled.patterns {
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            let mut args = Vec::with_capacity(pattern.slots.len());
            for (index, slot) in pattern.slots.iter().enumerate() {
                let raw = caps.get(index + 1)?.as_str();
                args.push((*slot, raw));
            }
            return Some(Match {
                spec: compiled.spec,
                args,
            });
        }
    }
    None
}

/// Patterns whose placeholders do not cover every slot exactly once are
/// documentation only and never match.
fn compile_template(spec: &'static OpcodeSpec, template: &str) -> Option<Pattern> {
    let mut source = String::from("(?i)^");
    let mut slots = Vec::new();
    let mut last = 0usize;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0)?;
        let slot = spec.slot(caps.get(1)?.as_str())?;
        if slots.contains(&slot.name) {
            return None;
        }
        push_literal(&mut source, &template[last..whole.start()]);
        source.push_str(&slot_capture(slot));
        slots.push(slot.name);
        last = whole.end();
    }
    push_literal(&mut source, &template[last..]);
    if spec.shape == Shape::Boolean {
        source.push_str(r"\??");
    }
    source.push('$');
    if slots.len() != spec.slots.len() {
        return None;
    }
    Some(Pattern {
        regex: Regex::new(&source).ok()?,
        slots,
    })
}

fn push_literal(out: &mut String, text: &str) {
    let edge = |ws: bool| if ws { r"\s+" } else { r"\s*" };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        out.push_str(edge(!text.is_empty()));
        return;
    }
    out.push_str(edge(text.starts_with(char::is_whitespace)));
    let words = trimmed
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>();
    out.push_str(&words.join(r"\s+"));
    out.push_str(edge(text.ends_with(char::is_whitespace)));
}

fn slot_capture(slot: &Slot) -> String {
    match slot.kind {
        SlotKind::Condition => CONDITION_CAPTURE.to_string(),
        SlotKind::Value(Hint::Menu(_)) | SlotKind::VariableField => DROPDOWN_CAPTURE.to_string(),
        SlotKind::Field(choices) if choices.is_empty() => DROPDOWN_CAPTURE.to_string(),
        SlotKind::Field(choices) => {
            let mut surfaces = choices
                .iter()
                .map(|(surface, _)| {
                    surface
                        .split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .collect::<Vec<_>>();
            surfaces.sort_by_key(|s| std::cmp::Reverse(s.len()));
            let alt = surfaces.join("|");
            format!(
                r"(\[\s*(?:{alt})(?:\s+v)?\s*\]|\(\s*(?:{alt})(?:\s+v)?\s*\)|(?:{alt}))"
            )
        }
        SlotKind::Value(_) => VALUE_CAPTURE.to_string(),
    }
}

/// Text inside a dropdown capture: `[Cat v]`, `(Cat v)`, `[Cat]` or `Cat`.
pub fn dropdown_text(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(inner) = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|t| t.strip_suffix(')')))
    {
        text = inner.trim();
    }
    strip_menu_marker(text)
}

/// Drops the trailing ` v` that marks a dropdown in pseudocode.
pub fn strip_menu_marker(text: &str) -> &str {
    let text = text.trim();
    match text.rsplit_once(char::is_whitespace) {
        Some((head, "v")) | Some((head, "V")) if !head.trim().is_empty() => head.trim_end(),
        _ => text,
    }
}

/// Stored value for a fixed-choice field, matched case-insensitively.
pub fn choose(choices: &[Choice], surface: &str) -> Option<&'static str> {
    let wanted = surface.split_whitespace().collect::<Vec<_>>().join(" ");
    choices
        .iter()
        .find(|(choice, _)| choice.eq_ignore_ascii_case(&wanted))
        .map(|(_, stored)| *stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_matchable_entry_compiles() {
        for compiled in COMPILED.iter() {
            if compiled.spec.opcode == "control_if_else" {
                assert!(compiled.patterns.is_empty());
                continue;
            }
            assert_eq!(
                compiled.patterns.len(),
                1 + compiled.spec.aliases.len(),
                "pattern for '{}' did not compile",
                compiled.spec.opcode
            );
        }
    }

    #[test]
    fn opcodes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for spec in all() {
            assert!(seen.insert(spec.opcode), "duplicate opcode '{}'", spec.opcode);
        }
    }

    #[test]
    fn line_lookup_captures_slots_with_brackets() {
        let m = lookup_line("move (10) steps").expect("match");
        assert_eq!(m.spec.opcode, "motion_movesteps");
        assert_eq!(m.arg("STEPS"), Some("(10)"));

        let m = lookup_line("say [hi] for (2) seconds").expect("match");
        assert_eq!(m.spec.opcode, "looks_sayforsecs");
        assert_eq!(m.arg("MESSAGE"), Some("[hi]"));
        assert_eq!(m.arg("SECS"), Some("(2)"));
    }

    #[test]
    fn specific_forms_win_over_general_ones() {
        assert_eq!(lookup_line("say [hi]").map(|m| m.spec.opcode), Some("looks_say"));
        assert_eq!(
            lookup_line("broadcast [go v] and wait").map(|m| m.spec.opcode),
            Some("event_broadcastandwait")
        );
        assert_eq!(
            lookup_line("play sound (Meow v) until done").map(|m| m.spec.opcode),
            Some("sound_playuntildone")
        );
        assert_eq!(
            lookup_line("go to [front v] layer").map(|m| m.spec.opcode),
            Some("looks_gotofrontback")
        );
        assert_eq!(
            lookup_line("go to (random position v)").map(|m| m.spec.opcode),
            Some("motion_goto")
        );
        assert_eq!(
            lookup_line("stop all sounds").map(|m| m.spec.opcode),
            Some("sound_stopallsounds")
        );
        assert_eq!(
            lookup_line("stop (this script v)").map(|m| m.spec.opcode),
            Some("control_stop")
        );
        assert_eq!(lookup_line("stop all").map(|m| m.spec.opcode), Some("control_stop"));
    }

    #[test]
    fn effect_menus_split_between_looks_and_sound() {
        assert_eq!(
            lookup_line("change [ghost v] effect by (10)").map(|m| m.spec.opcode),
            Some("looks_changeeffectby")
        );
        assert_eq!(
            lookup_line("change [pitch v] effect by (10)").map(|m| m.spec.opcode),
            Some("sound_changeeffectby")
        );
        assert_eq!(
            lookup_line("change [score v] by (1)").map(|m| m.spec.opcode),
            Some("data_changevariableby")
        );
    }

    #[test]
    fn containers_and_hats_are_separate_vocabularies() {
        assert_eq!(
            lookup_line("repeat until <mouse down?>").map(|m| m.spec.opcode),
            Some("control_repeat_until")
        );
        assert_eq!(lookup_line("repeat (10)").map(|m| m.spec.opcode), Some("control_repeat"));
        assert!(lookup_line("when green flag clicked").is_none());
        assert!(lookup_line("else").is_none());
        assert!(lookup_line("x position").is_none());
        assert_eq!(
            lookup_trigger("when [space v] key pressed").map(|m| m.spec.opcode),
            Some("event_whenkeypressed")
        );
        assert_eq!(
            lookup_trigger("when key (space v) pressed").map(|m| m.spec.opcode),
            Some("event_whenkeypressed")
        );
        assert_eq!(
            lookup_trigger("when [timer v] > (10)").map(|m| m.spec.opcode),
            Some("event_whengreaterthan")
        );
    }

    #[test]
    fn boolean_forms_accept_optional_question_mark() {
        assert_eq!(lookup_boolean("mouse down?").map(|m| m.spec.opcode), Some("sensing_mousedown"));
        assert_eq!(lookup_boolean("mouse down").map(|m| m.spec.opcode), Some("sensing_mousedown"));
        let m = lookup_boolean("key (space v) pressed?").expect("match");
        assert_eq!(m.spec.opcode, "sensing_keypressed");
        assert_eq!(dropdown_text(m.arg("KEY_OPTION").unwrap_or_default()), "space");
        assert_eq!(
            lookup_boolean("touching color (#ff0000)?").map(|m| m.spec.opcode),
            Some("sensing_touchingcolor")
        );
    }

    #[test]
    fn dropdown_text_strips_brackets_and_marker() {
        assert_eq!(dropdown_text("[Cat v]"), "Cat");
        assert_eq!(dropdown_text("(random position v)"), "random position");
        assert_eq!(dropdown_text("[go]"), "go");
        assert_eq!(dropdown_text("all"), "all");
        assert_eq!(strip_menu_marker("v"), "v");
    }

    #[test]
    fn choices_map_surface_text_to_stored_values() {
        assert_eq!(choose(SOUND_EFFECTS, "pan  left/right"), Some("PAN"));
        assert_eq!(choose(LOOKS_EFFECTS, "Ghost"), Some("GHOST"));
        assert_eq!(choose(LOOKS_EFFECTS, "pitch"), None);
    }
}
