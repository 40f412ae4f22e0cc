use crate::block::{Block, BlockId, Input, Shape};
use crate::build::BuildContext;
use crate::error::CompileError;
use crate::opcodes::{self, Hint};
use crate::resolve::{find_top_level, resolve, strip_wrapper, Wrapper};
use tracing::trace;

/// Top-level splitting keywords, tried in this order. `true` marks the
/// logical operators whose operands are themselves conditions.
const OPERATORS: &[(&str, &str, bool)] = &[
    (" or ", "operator_or", true),
    (" and ", "operator_and", true),
    (" = ", "operator_equals", false),
    (" > ", "operator_gt", false),
    (" < ", "operator_lt", false),
];

/// Parses boolean text into a predicate subtree owned by `owner` and
/// returns the subtree's root.
pub fn parse_condition(
    cx: &mut BuildContext<'_>,
    text: &str,
    owner: &BlockId,
) -> Result<BlockId, CompileError> {
    cx.nested(|cx| parse(cx, text, owner))
}

fn parse(cx: &mut BuildContext<'_>, text: &str, owner: &BlockId) -> Result<BlockId, CompileError> {
    let mut body = text.trim();
    let mut layers = 0usize;
    while let (Wrapper::Angle, inner) = strip_wrapper(body) {
        layers += 1;
        if layers > cx.remaining_depth() + 1 {
            return Err(cx.too_deep());
        }
        body = inner;
    }
    let malformed = |cx: &BuildContext<'_>| CompileError::MalformedCondition {
        line: cx.line(),
        text: text.trim().to_string(),
    };
    if body.is_empty() {
        return Err(malformed(cx));
    }

    for (keyword, opcode, logical) in OPERATORS {
        let Some(at) = find_top_level(body, keyword, false) else {
            continue;
        };
        let (left, right) = (body[..at].trim(), body[at + keyword.len()..].trim());
        if left.is_empty() || right.is_empty() {
            return Err(malformed(cx));
        }
        trace!(opcode, left, right, "condition operator");
        let id = cx.fresh_id();
        let mut block = Block::new(id.clone(), opcode, Shape::Boolean);
        block.parent = Some(owner.clone());
        cx.graph.insert(block);
        for (slot, operand) in [("OPERAND1", left), ("OPERAND2", right)] {
            let input = if *logical {
                Input::Condition {
                    block: parse_condition(cx, operand, &id)?,
                }
            } else {
                resolve(cx, operand, Hint::Generic, &id)?
            };
            cx.graph.set_input(&id, slot, input)?;
        }
        return Ok(id);
    }

    if let Some(operand) = strip_keyword(body, "not") {
        let id = cx.fresh_id();
        let mut block = Block::new(id.clone(), "operator_not", Shape::Boolean);
        block.parent = Some(owner.clone());
        cx.graph.insert(block);
        let inner = parse_condition(cx, operand, &id)?;
        cx.graph.set_input(&id, "OPERAND", Input::Condition { block: inner })?;
        return Ok(id);
    }

    match opcodes::lookup_boolean(body) {
        Some(m) => cx.instantiate(&m, Some(owner)),
        None => Err(malformed(cx)),
    }
}

/// `not <x>`, `not (x)` and `not x`; `nothing` is not a negation.
fn strip_keyword<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &text[keyword.len()..];
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '<' || c == '(' => Some(rest.trim()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::LiteralKind;
    use crate::ids::SequentialIds;
    use crate::names::{KnownNames, NameEntry};

    fn parse_with(
        names: &KnownNames,
        text: &str,
    ) -> (Result<BlockId, CompileError>, crate::graph::ScriptGraph) {
        let mut ids = SequentialIds::new("c");
        let mut cx = BuildContext::new(names, &mut ids, 64);
        cx.set_line(3);
        let owner = cx.fresh_id();
        cx.graph.insert(Block::new(owner.clone(), "control_if", Shape::Container));
        let result = parse_condition(&mut cx, text, &owner);
        (result, std::mem::take(&mut cx.graph))
    }

    #[test]
    fn comparison_over_name_and_number() {
        let names = KnownNames::new(&[NameEntry::new("x", "var-x")], &[], &[]);
        let (result, graph) = parse_with(&names, "<x > 5>");
        let root = graph.get(&result.expect("parsed")).expect("root node");
        assert_eq!(root.opcode, "operator_gt");
        assert!(matches!(
            root.inputs.get("OPERAND1"),
            Some(Input::Reference { id, .. }) if id == "var-x"
        ));
        let right = root.inputs.get("OPERAND2").and_then(Input::block).expect("literal");
        let shadow = graph.get(right).expect("shadow node");
        assert_eq!(shadow.opcode, LiteralKind::Number.opcode());
        assert_eq!(shadow.literal_value(), Some("5"));
    }

    #[test]
    fn or_binds_looser_than_and() {
        let (result, graph) = parse_with(
            &KnownNames::default(),
            "<mouse down?> and <(1) = (1)> or <key (space v) pressed?>",
        );
        let root = graph.get(&result.expect("parsed")).expect("root node");
        assert_eq!(root.opcode, "operator_or");
        let left = root.inputs.get("OPERAND1").and_then(Input::block).expect("left");
        assert_eq!(graph.get(left).map(|b| b.opcode.as_str()), Some("operator_and"));
    }

    #[test]
    fn negation_and_predicates() {
        let (result, graph) = parse_with(&KnownNames::default(), "<not <touching (edge v)?>>");
        let root = graph.get(&result.expect("parsed")).expect("root node");
        assert_eq!(root.opcode, "operator_not");
        let inner = root.inputs.get("OPERAND").and_then(Input::block).expect("operand");
        let touching = graph.get(inner).expect("predicate");
        assert_eq!(touching.opcode, "sensing_touchingobject");
        let menu = touching.inputs.get("TOUCHINGOBJECTMENU").and_then(Input::block).expect("menu");
        assert_eq!(graph.get(menu).and_then(Block::literal_value), Some("_edge_"));
    }

    #[test]
    fn unknown_and_empty_conditions_are_malformed() {
        for text in ["", "<>", "<banana>", "< and <mouse down>>"] {
            let (result, _) = parse_with(&KnownNames::default(), text);
            assert!(
                matches!(result, Err(CompileError::MalformedCondition { line: 3, .. })),
                "expected malformed condition for {:?}, got {:?}",
                text,
                result
            );
        }
    }

    #[test]
    fn not_requires_a_word_boundary() {
        assert_eq!(strip_keyword("not <x>", "not"), Some("<x>"));
        assert_eq!(strip_keyword("nothing", "not"), None);
    }
}
