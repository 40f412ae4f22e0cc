//! Turns the raw text of a value slot into an input descriptor.

use crate::block::{BlockId, Input, LiteralKind, Shape};
use crate::build::BuildContext;
use crate::condition::parse_condition;
use crate::error::CompileError;
use crate::opcodes::{self, Hint, Match};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Square,
    Round,
    Angle,
    Bare,
}

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("number pattern is valid")
});

/// Function-call spellings the registry's canonical syntax does not cover.
static FUNCTION_FORMS: Lazy<Vec<(Regex, &'static str, [&'static str; 2])>> = Lazy::new(|| {
    [
        (r"(?i)^pick\s+random\s*(.+?)\s+to\s+(.+)$", "operator_random", ["FROM", "TO"]),
        (r"(?i)^letter\s+(.+?)\s+of\s+(.+)$", "operator_letter_of", ["LETTER", "STRING"]),
        (
            concat!(
                r"(?i)^(abs|floor|ceiling|sqrt|sin|cos|tan|asin|acos|atan|ln|log|e\s*\^|10\s*\^)",
                r"\s+of\s*(.+)$"
            ),
            "operator_mathop",
            ["OPERATOR", "NUM"],
        ),
    ]
    .into_iter()
    .map(|(pattern, opcode, slots)| {
        (Regex::new(pattern).expect("function form pattern is valid"), opcode, slots)
    })
    .collect()
});

static SINGLE_ARGUMENT_FORMS: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)^length\s+of\s*(.+)$", "operator_length", "STRING"),
        (r"(?i)^round(\s*\(.*\)|\s+.+)$", "operator_round", "NUM"),
    ]
    .into_iter()
    .map(|(pattern, opcode, slot)| {
        (Regex::new(pattern).expect("function form pattern is valid"), opcode, slot)
    })
    .collect()
});

static JOIN_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^join\s*(\(.*\))$").expect("join pattern is valid"));

/// Binary operators grouped from lowest to highest precedence.
const ARITHMETIC: &[&[(&str, &str)]] = &[
    &[(" + ", "operator_add"), (" - ", "operator_subtract")],
    &[(" * ", "operator_multiply"), (" / ", "operator_divide"), (" mod ", "operator_mod")],
];

const MENU_VALUES: &[(&str, &str)] = &[
    ("random position", "_random_"),
    ("mouse-pointer", "_mouse_"),
    ("mouse pointer", "_mouse_"),
    ("myself", "_myself_"),
    ("edge", "_edge_"),
    ("stage", "_stage_"),
];

/// Resolves `token` for a slot of `owner` expecting a value of `hint`.
pub fn resolve(
    cx: &mut BuildContext<'_>,
    token: &str,
    hint: Hint,
    owner: &BlockId,
) -> Result<Input, CompileError> {
    cx.nested(|cx| resolve_token(cx, token, hint, owner))
}

fn resolve_token(
    cx: &mut BuildContext<'_>,
    token: &str,
    hint: Hint,
    owner: &BlockId,
) -> Result<Input, CompileError> {
    let (wrapper, inner, layers) = strip_redundant(token, cx.remaining_depth() + 1);
    if layers.saturating_sub(1) > cx.remaining_depth() {
        return Err(cx.too_deep());
    }
    if wrapper == Wrapper::Angle {
        let block = parse_condition(cx, token, owner)?;
        return Ok(Input::Condition { block });
    }

    let name = match hint {
        Hint::Menu(_) | Hint::Color => {
            cx.names.lookup_variable(opcodes::strip_menu_marker(inner))
        }
        _ => cx.names.lookup(inner),
    };
    if let Some(known) = name {
        trace!(name = %known.name, id = %known.id, "known name");
        return Ok(Input::Reference {
            name: known.name.clone(),
            id: known.id.clone(),
            kind: known.kind,
        });
    }

    match hint {
        Hint::Menu(menu) => {
            let value = normalize_menu_value(opcodes::strip_menu_marker(inner));
            return Ok(cx.literal(LiteralKind::Menu(menu), value, owner));
        }
        Hint::Color => return Ok(cx.literal(LiteralKind::Color, inner, owner)),
        _ => {}
    }

    if wrapper == Wrapper::Square {
        return Ok(cx.literal(literal_kind(hint, LiteralKind::Text), inner, owner));
    }

    if is_number(inner) {
        return Ok(cx.literal(literal_kind(hint, LiteralKind::Number), inner, owner));
    }

    if let Some(input) = expression(cx, inner, hint, owner)? {
        return Ok(input);
    }

    let kind = literal_kind(hint, LiteralKind::Text);
    let value = if kind.is_numeric() {
        opcodes::strip_menu_marker(inner)
    } else {
        inner
    };
    Ok(cx.literal(kind, value, owner))
}

/// Arithmetic, function-style reporters, then every registry reporter and
/// predicate. `None` when the text is not an expression. In text slots
/// arithmetic needs bracketed operands, so prose such as `What is 2 + 2?`
/// stays a literal.
fn expression(
    cx: &mut BuildContext<'_>,
    text: &str,
    hint: Hint,
    owner: &BlockId,
) -> Result<Option<Input>, CompileError> {
    if text.is_empty() {
        return Ok(None);
    }

    for operators in ARITHMETIC {
        let split = operators
            .iter()
            .filter_map(|(operator, opcode)| {
                find_top_level(text, operator, true).map(|at| (at, *operator, *opcode))
            })
            .max_by_key(|(at, _, _)| *at);
        if let Some((at, operator, opcode)) = split {
            let (left, right) = (text[..at].trim(), text[at + operator.len()..].trim());
            if left.is_empty() || right.is_empty() {
                continue;
            }
            if hint == Hint::Text && !(is_wrapped(left) && is_wrapped(right)) {
                break;
            }
            let block = binary(cx, opcode, ("NUM1", left), ("NUM2", right), owner)?;
            return Ok(Some(Input::Reporter { block }));
        }
    }

    if let Some(caps) = JOIN_CALL.captures(text) {
        let call = caps.get(1).map_or("", |m| m.as_str());
        let (_, args, _) = strip_redundant(call, cx.remaining_depth());
        if let Some(at) = find_top_level(args, ",", false) {
            let (left, right) = (args[..at].trim(), args[at + 1..].trim());
            let block = binary(
                cx,
                "operator_join",
                ("STRING1", left),
                ("STRING2", right),
                owner,
            )?;
            return Ok(Some(Input::Reporter { block }));
        }
    }

    for (regex, opcode, slots) in FUNCTION_FORMS.iter() {
        if let Some(caps) = regex.captures(text) {
            let first = caps.get(1).map_or("", |m| m.as_str());
            let second = caps.get(2).map_or("", |m| m.as_str());
            let block = binary(cx, opcode, (slots[0], first), (slots[1], second), owner)?;
            return Ok(Some(Input::Reporter { block }));
        }
    }

    for (regex, opcode, slot) in SINGLE_ARGUMENT_FORMS.iter() {
        if let Some(caps) = regex.captures(text) {
            let Some(spec) = opcodes::get(opcode) else {
                continue;
            };
            let arg = caps.get(1).map_or("", |m| m.as_str());
            let m = Match {
                spec,
                args: vec![(*slot, arg)],
            };
            let block = cx.instantiate(&m, Some(owner))?;
            return Ok(Some(Input::Reporter { block }));
        }
    }

    if let Some(m) = opcodes::lookup_value(text) {
        let block = cx.instantiate(&m, Some(owner))?;
        let shape = cx.graph.get(&block).map(|b| b.shape);
        return Ok(Some(match shape {
            Some(Shape::Boolean) => Input::Condition { block },
            _ => Input::Reporter { block },
        }));
    }

    Ok(None)
}

fn binary(
    cx: &mut BuildContext<'_>,
    opcode: &str,
    first: (&'static str, &str),
    second: (&'static str, &str),
    owner: &BlockId,
) -> Result<BlockId, CompileError> {
    let spec = opcodes::get(opcode).ok_or_else(|| {
        CompileError::InconsistentGraph(format!("opcode '{}' is not registered", opcode))
    })?;
    let m = Match {
        spec,
        args: vec![first, second],
    };
    cx.instantiate(&m, Some(owner))
}

fn literal_kind(hint: Hint, generic: LiteralKind) -> LiteralKind {
    match hint {
        Hint::Generic => generic,
        Hint::Number => LiteralKind::Number,
        Hint::PositiveNumber => LiteralKind::PositiveNumber,
        Hint::WholeNumber => LiteralKind::WholeNumber,
        Hint::Angle => LiteralKind::Angle,
        Hint::Text => LiteralKind::Text,
        Hint::Color => LiteralKind::Color,
        Hint::Menu(menu) => LiteralKind::Menu(menu),
    }
}

pub fn is_number(text: &str) -> bool {
    NUMBER.is_match(text)
}

/// Maps editor-facing menu labels onto the values the runtime stores.
pub fn normalize_menu_value(value: &str) -> &str {
    MENU_VALUES
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(value))
        .map_or(value, |(_, stored)| stored)
}

/// `(byte offset, bracket depth before that char)` for every char of `text`.
///
/// `(` and `[` always open, `)` and `]` always close. `<` opens only when
/// followed by a non-space and `>` closes only when preceded by one, so
/// spaced comparison operators stay at the surrounding depth. Inside a
/// `[...]` literal angle brackets are plain text.
pub fn depths(text: &str) -> Vec<(usize, usize)> {
    let chars = text.char_indices().collect::<Vec<_>>();
    let mut depth = 0usize;
    let mut square = 0usize;
    let mut out = Vec::with_capacity(chars.len());
    for (index, &(offset, ch)) in chars.iter().enumerate() {
        out.push((offset, depth));
        let before = index.checked_sub(1).map(|i| chars[i].1);
        let after = chars.get(index + 1).map(|&(_, c)| c);
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '[' => {
                depth += 1;
                square += 1;
            }
            ']' => {
                depth = depth.saturating_sub(1);
                square = square.saturating_sub(1);
            }
            _ if square > 0 => {}
            '<' if after.is_some_and(|c| !c.is_whitespace()) => depth += 1,
            '>' if before.is_some_and(|c| !c.is_whitespace()) => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }
    }
    out
}

/// Byte offset of `needle` outside every bracket group, matched without
/// regard to ASCII case. The first occurrence, or the last with `rightmost`.
pub fn find_top_level(text: &str, needle: &str, rightmost: bool) -> Option<usize> {
    let mut found = None;
    for (offset, depth) in depths(text) {
        if depth != 0 {
            continue;
        }
        let hit = text
            .get(offset..offset + needle.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(needle));
        if hit {
            if !rightmost {
                return Some(offset);
            }
            found = Some(offset);
        }
    }
    found
}

/// Splits off one enclosing bracket pair.
pub fn strip_wrapper(token: &str) -> (Wrapper, &str) {
    let token = token.trim();
    let wrapper = match (token.chars().next(), token.chars().last()) {
        _ if token.len() < 2 || !encloses(token) => return (Wrapper::Bare, token),
        (Some('('), Some(')')) => Wrapper::Round,
        (Some('['), Some(']')) => Wrapper::Square,
        (Some('<'), Some('>')) => Wrapper::Angle,
        _ => return (Wrapper::Bare, token),
    };
    (wrapper, token[1..token.len() - 1].trim())
}

/// Like [`strip_wrapper`], but redundant round brackets inside a round
/// pair, as in `((x))`, come off too. Stops once more than `limit` pairs
/// are removed and returns how many were.
pub fn strip_redundant(token: &str, limit: usize) -> (Wrapper, &str, usize) {
    let (wrapper, mut inner) = strip_wrapper(token);
    let mut layers = usize::from(wrapper != Wrapper::Bare);
    if wrapper == Wrapper::Round {
        while layers <= limit {
            match strip_wrapper(inner) {
                (Wrapper::Round, rest) => {
                    inner = rest;
                    layers += 1;
                }
                _ => break,
            }
        }
    }
    (wrapper, inner, layers)
}

fn is_wrapped(token: &str) -> bool {
    strip_wrapper(token).0 != Wrapper::Bare
}

/// True when the first char's group closes exactly at the last char.
fn encloses(token: &str) -> bool {
    let levels = depths(token);
    levels.len() >= 2 && levels.iter().skip(1).all(|(_, depth)| *depth > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, MenuKind, NameKind};
    use crate::ids::SequentialIds;
    use crate::names::{KnownNames, NameEntry};

    fn with_context<T>(
        names: &KnownNames,
        f: impl FnOnce(&mut BuildContext<'_>, &BlockId) -> T,
    ) -> T {
        let mut ids = SequentialIds::new("t");
        let mut cx = BuildContext::new(names, &mut ids, 64);
        let owner = cx.fresh_id();
        cx.graph.insert(Block::new(owner.clone(), "looks_say", Shape::Command));
        f(&mut cx, &owner)
    }

    fn opcode_of(cx: &BuildContext<'_>, input: &Input) -> String {
        input
            .block()
            .and_then(|id| cx.graph.get(id))
            .map(|b| b.opcode.clone())
            .unwrap_or_default()
    }

    #[test]
    fn wrappers_are_recognized() {
        assert_eq!(strip_wrapper("(10)"), (Wrapper::Round, "10"));
        assert_eq!(strip_wrapper("((x))"), (Wrapper::Round, "(x)"));
        assert_eq!(strip_wrapper("[hi there]"), (Wrapper::Square, "hi there"));
        assert_eq!(strip_wrapper("<mouse down?>"), (Wrapper::Angle, "mouse down?"));
        assert_eq!(strip_wrapper("<(x) > (5)>"), (Wrapper::Angle, "(x) > (5)"));
        assert_eq!(strip_wrapper("(a) + (b)"), (Wrapper::Bare, "(a) + (b)"));
        assert_eq!(strip_wrapper("<a> and <b>"), (Wrapper::Bare, "<a> and <b>"));
    }

    #[test]
    fn angle_brackets_inside_square_literals_are_text() {
        assert_eq!(strip_wrapper("[a>b]"), (Wrapper::Square, "a>b"));
        assert_eq!(strip_wrapper("[x->y]"), (Wrapper::Square, "x->y"));
        assert_eq!(strip_wrapper("[<tag]"), (Wrapper::Square, "<tag"));
        assert_eq!(find_top_level("[a <b] = [c]", " = ", false), Some(6));
    }

    #[test]
    fn redundant_round_brackets_are_peeled_up_to_a_limit() {
        assert_eq!(strip_redundant("((x))", 64), (Wrapper::Round, "x", 2));
        assert_eq!(strip_redundant("( ( 7 ) )", 64), (Wrapper::Round, "7", 2));
        assert_eq!(strip_redundant("[(x)]", 64), (Wrapper::Square, "(x)", 1));
        let deep = format!("{}x{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(strip_redundant(&deep, 3).2, 4);
    }

    #[test]
    fn top_level_search_skips_nested_groups() {
        assert_eq!(find_top_level("(a + b) + c", " + ", false), Some(7));
        assert_eq!(find_top_level("<a or b> and <c>", " or ", false), None);
        assert_eq!(find_top_level("x > 5", " > ", false), Some(1));
        assert_eq!(find_top_level("1 - 2 - 3", " - ", true), Some(5));
    }

    #[test]
    fn known_names_become_references() {
        let names = KnownNames::new(&[NameEntry::new("Score", "var-1")], &[], &[]);
        with_context(&names, |cx, owner| {
            let input = resolve(cx, "(Score)", Hint::Generic, owner).expect("resolved");
            assert_eq!(
                input,
                Input::Reference {
                    name: "Score".into(),
                    id: "var-1".into(),
                    kind: NameKind::GlobalVariable
                }
            );
            assert_eq!(cx.graph.len(), 1);
        });
    }

    #[test]
    fn literals_follow_the_hint() {
        let names = KnownNames::default();
        with_context(&names, |cx, owner| {
            let whole = resolve(cx, "(3)", Hint::WholeNumber, owner).expect("resolved");
            assert!(matches!(whole, Input::Literal { kind: LiteralKind::WholeNumber, .. }));
            let text = resolve(cx, "[10]", Hint::Generic, owner).expect("resolved");
            assert!(matches!(text, Input::Literal { kind: LiteralKind::Text, .. }));
            let number = resolve(cx, "(10)", Hint::Generic, owner).expect("resolved");
            assert!(matches!(number, Input::Literal { kind: LiteralKind::Number, .. }));
            let fallback = resolve(cx, "(hello world)", Hint::Generic, owner).expect("resolved");
            assert!(matches!(fallback, Input::Literal { kind: LiteralKind::Text, .. }));
        });
    }

    #[test]
    fn menu_values_are_normalized() {
        let names = KnownNames::new(&[], &[], &[NameEntry::new("Cat", "sprite-cat")]);
        with_context(&names, |cx, owner| {
            let goto = resolve(cx, "(random position v)", Hint::Menu(MenuKind::GoTo), owner)
                .expect("resolved");
            let shadow = goto.block().and_then(|id| cx.graph.get(id)).expect("shadow");
            assert_eq!(shadow.opcode, "motion_goto_menu");
            assert_eq!(shadow.literal_value(), Some("_random_"));

            let touching = resolve(cx, "(Cat v)", Hint::Menu(MenuKind::TouchingObject), owner)
                .expect("resolved");
            let shadow = touching.block().and_then(|id| cx.graph.get(id)).expect("shadow");
            assert_eq!(shadow.literal_value(), Some("Cat"));
        });
    }

    #[test]
    fn arithmetic_splits_at_lowest_precedence() {
        let names = KnownNames::default();
        with_context(&names, |cx, owner| {
            let input = resolve(cx, "((2) * (3) + (4))", Hint::Number, owner).expect("resolved");
            assert_eq!(opcode_of(cx, &input), "operator_add");
            let add = input.block().and_then(|id| cx.graph.get(id)).expect("add node");
            let left = add.inputs.get("NUM1").expect("left operand");
            assert_eq!(opcode_of(cx, left), "operator_multiply");
        });
    }

    #[test]
    fn function_forms_and_registry_reporters() {
        let names = KnownNames::default();
        with_context(&names, |cx, owner| {
            let cases = [
                ("(join(hello, world))", "operator_join"),
                ("(pick random (1) to (10))", "operator_random"),
                ("(length of [abc])", "operator_length"),
                ("(letter (1) of [abc])", "operator_letter_of"),
                ("(round(2.5))", "operator_round"),
                ("(sqrt of (9))", "operator_mathop"),
                ("(timer)", "sensing_timer"),
                ("(answer)", "sensing_answer"),
            ];
            for (token, opcode) in cases {
                let input = resolve(cx, token, Hint::Text, owner).expect("resolved");
                assert_eq!(opcode_of(cx, &input), opcode, "for {}", token);
            }
        });
    }

    #[test]
    fn text_slots_keep_prose_with_operators() {
        let names = KnownNames::default();
        with_context(&names, |cx, owner| {
            for token in ["(What is 2 + 2?)", "(Hello - world)"] {
                let input = resolve(cx, token, Hint::Text, owner).expect("resolved");
                assert!(matches!(input, Input::Literal { kind: LiteralKind::Text, .. }));
                let shadow = input.block().and_then(|id| cx.graph.get(id)).expect("shadow");
                assert_eq!(Some(&token[1..token.len() - 1]), shadow.literal_value());
            }
            let sum = resolve(cx, "((1) + (2))", Hint::Text, owner).expect("resolved");
            assert_eq!(opcode_of(cx, &sum), "operator_add");
        });
    }

    #[test]
    fn angle_tokens_become_conditions() {
        let names = KnownNames::default();
        with_context(&names, |cx, owner| {
            let input = resolve(cx, "<mouse down?>", Hint::Text, owner).expect("resolved");
            assert!(matches!(input, Input::Condition { .. }));
            assert_eq!(opcode_of(cx, &input), "sensing_mousedown");
        });
    }
}
