//! Renders compiled scripts as the `blocks` object of a Scratch 3 target.

use crate::block::{Block, Input, LiteralKind, NameKind, Script};
use crate::names::builtin_reporter;
use crate::opcodes::{self, Hint, SlotKind};
use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const SCRIPT_X: i32 = 320;
const SCRIPT_GAP: i32 = 80;
const BLOCK_HEIGHT: i32 = 40;

/// Every script's blocks in one map, hats stacked down the left edge.
pub fn scripts_to_blocks(scripts: &[Script]) -> Result<Map<String, Value>> {
    let mut blocks = Map::new();
    let mut start_y = 0;
    for script in scripts {
        start_y = emit_script(&mut blocks, script, start_y)?;
    }
    Ok(blocks)
}

pub fn scripts_to_blocks_json(scripts: &[Script]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Value::Object(scripts_to_blocks(scripts)?))?)
}

fn emit_script(blocks: &mut Map<String, Value>, script: &Script, start_y: i32) -> Result<i32> {
    let inlined = script
        .blocks
        .values()
        .flat_map(|block| block.inputs.values())
        .filter_map(|input| match input {
            Input::Literal { kind, block } if !matches!(kind, LiteralKind::Menu(_)) => Some(block),
            _ => None,
        })
        .collect::<HashSet<_>>();

    for block in script.blocks.values() {
        if inlined.contains(&block.id) {
            continue;
        }
        emit_block(blocks, script, block)?;
    }

    let hat_id = script.top_block_id.as_str();
    let hat = blocks
        .get_mut(hat_id)
        .ok_or_else(|| anyhow!("Missing block '{}'.", hat_id))?;
    set_value_key(hat, "x", json!(SCRIPT_X))?;
    set_value_key(hat, "y", json!(start_y))?;

    let height = script
        .blocks
        .values()
        .filter(|b| !b.shadow && b.shape.is_stackable())
        .count() as i32;
    Ok(start_y + SCRIPT_GAP + BLOCK_HEIGHT * (height + 1))
}

fn emit_block(blocks: &mut Map<String, Value>, script: &Script, block: &Block) -> Result<()> {
    let id = block.id.as_str();
    let fields = block
        .fields
        .values()
        .map(|field| (field.name.clone(), json!([field.value, field.id])))
        .collect::<Map<String, Value>>();
    blocks.insert(
        id.to_string(),
        json!({
            "opcode": block.opcode,
            "next": block.next.as_ref().map(|next| next.as_str()),
            "parent": block.parent.as_ref().map(|parent| parent.as_str()),
            "inputs": {},
            "fields": fields,
            "shadow": block.shadow,
            "topLevel": block.top_level
        }),
    );
    if block.opcode == "control_stop" {
        let stop = blocks
            .get_mut(id)
            .ok_or_else(|| anyhow!("Missing block '{}'.", id))?;
        set_value_key(
            stop,
            "mutation",
            json!({"tagName": "mutation", "children": [], "hasnext": "false"}),
        )?;
    }

    for (slot, input) in &block.inputs {
        let value = input_value(blocks, script, block, slot, input)?;
        set_block_input(blocks, id, slot, value)?;
    }
    Ok(())
}

fn input_value(
    blocks: &mut Map<String, Value>,
    script: &Script,
    owner: &Block,
    slot: &str,
    input: &Input,
) -> Result<Value> {
    match input {
        Input::Literal { kind, block } => {
            if matches!(kind, LiteralKind::Menu(_)) {
                return Ok(json!([1, block.as_str()]));
            }
            let shadow = script
                .block(block)
                .ok_or_else(|| anyhow!("Missing literal block '{}'.", block))?;
            let value = shadow.literal_value().unwrap_or_default();
            Ok(json!([1, [primitive_code(*kind), value]]))
        }
        Input::Reporter { block } => Ok(covering(owner, slot, block.as_str())),
        Input::Condition { block } | Input::Substack { block } => Ok(json!([2, block.as_str()])),
        Input::Reference { name, id, kind } => {
            let reporter_id = format!("{}_{}", owner.id, slot.to_lowercase());
            let (opcode, fields) = match kind {
                NameKind::GlobalVariable | NameKind::LocalVariable => {
                    ("data_variable", json!({"VARIABLE": [name, id]}))
                }
                NameKind::BuiltIn => {
                    let (opcode, field) = builtin_reporter(name)
                        .ok_or_else(|| anyhow!("Unknown built-in reporter '{}'.", name))?;
                    let fields = match field {
                        Some((field, value)) => json!({ field: [value, Value::Null] }),
                        None => json!({}),
                    };
                    (opcode, fields)
                }
                NameKind::Sprite => return Ok(json!([1, [10, name]])),
            };
            blocks.insert(
                reporter_id.clone(),
                json!({
                    "opcode": opcode,
                    "next": Value::Null,
                    "parent": owner.id.as_str(),
                    "inputs": {},
                    "fields": fields,
                    "shadow": false,
                    "topLevel": false
                }),
            );
            Ok(covering(owner, slot, &reporter_id))
        }
    }
}

/// A reporter over a typed slot keeps an empty primitive underneath, so the
/// slot still holds a value once the reporter is dragged out.
fn covering(owner: &Block, slot: &str, reporter: &str) -> Value {
    match obscured_primitive(&owner.opcode, slot) {
        Some(code) => json!([3, reporter, [code, ""]]),
        None => json!([2, reporter]),
    }
}

fn obscured_primitive(opcode: &str, slot: &str) -> Option<u8> {
    let SlotKind::Value(hint) = opcodes::get(opcode)?.slot(slot)?.kind else {
        return None;
    };
    match hint {
        Hint::Number => Some(4),
        Hint::PositiveNumber => Some(5),
        Hint::WholeNumber => Some(6),
        Hint::Angle => Some(8),
        Hint::Text | Hint::Generic => Some(10),
        Hint::Color | Hint::Menu(_) => None,
    }
}

fn primitive_code(kind: LiteralKind) -> u8 {
    match kind {
        LiteralKind::Number => 4,
        LiteralKind::PositiveNumber => 5,
        LiteralKind::WholeNumber => 6,
        LiteralKind::Angle => 8,
        LiteralKind::Color => 9,
        LiteralKind::Text | LiteralKind::Menu(_) => 10,
    }
}

fn set_block_input(
    blocks: &mut Map<String, Value>,
    block_id: &str,
    key: &str,
    value: Value,
) -> Result<()> {
    let block = blocks
        .get_mut(block_id)
        .ok_or_else(|| anyhow!("Missing block '{}'.", block_id))?;
    let obj = block
        .as_object_mut()
        .ok_or_else(|| anyhow!("Block '{}' is not an object.", block_id))?;
    let inputs = obj
        .entry("inputs")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("Block '{}' has invalid inputs shape.", block_id))?;
    inputs.insert(key.to_string(), value);
    Ok(())
}

fn set_value_key(value: &mut Value, key: &str, entry: Value) -> Result<()> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("Expected object while setting key '{}'.", key))?;
    obj.insert(key.to_string(), entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::names::{KnownNames, NameEntry};

    fn blocks_for(source: &str, names: &KnownNames) -> Map<String, Value> {
        let scripts = compile(source, names).expect("compiles");
        scripts_to_blocks(&scripts).expect("exports")
    }

    fn find<'m>(blocks: &'m Map<String, Value>, opcode: &str) -> &'m Value {
        blocks
            .values()
            .find(|b| b["opcode"] == opcode)
            .unwrap_or_else(|| panic!("no '{}' block", opcode))
    }

    #[test]
    fn literals_are_inlined_as_primitives() {
        let blocks = blocks_for(
            "when green flag clicked\nmove (10) steps\nsay [hi]\npoint in direction (90)",
            &KnownNames::default(),
        );
        assert_eq!(blocks.len(), 4);
        assert_eq!(find(&blocks, "motion_movesteps")["inputs"]["STEPS"], json!([1, [4, "10"]]));
        assert_eq!(find(&blocks, "looks_say")["inputs"]["MESSAGE"], json!([1, [10, "hi"]]));
        assert_eq!(
            find(&blocks, "motion_pointindirection")["inputs"]["DIRECTION"],
            json!([1, [8, "90"]])
        );
        let hat = find(&blocks, "event_whenflagclicked");
        assert_eq!(hat["topLevel"], json!(true));
        assert_eq!(hat["x"], json!(SCRIPT_X));
    }

    #[test]
    fn menus_stay_as_shadow_blocks() {
        let blocks = blocks_for(
            "when green flag clicked\ngo to (mouse-pointer v)",
            &KnownNames::default(),
        );
        let goto = find(&blocks, "motion_goto");
        let menu_id = goto["inputs"]["TO"][1].as_str().expect("menu id");
        assert_eq!(blocks[menu_id]["opcode"], json!("motion_goto_menu"));
        assert_eq!(blocks[menu_id]["shadow"], json!(true));
        assert_eq!(blocks[menu_id]["fields"]["TO"], json!(["_mouse_", null]));
    }

    #[test]
    fn references_become_reporters() {
        let names = KnownNames::new(&[NameEntry::new("Score", "var-score")], &[], &[]);
        let blocks = blocks_for(
            "when green flag clicked\nsay (Score)\nsay (x position)",
            &names,
        );
        let variable = find(&blocks, "data_variable");
        assert_eq!(variable["fields"]["VARIABLE"], json!(["Score", "var-score"]));
        let reporter = find(&blocks, "motion_xposition");
        assert_eq!(reporter["shadow"], json!(false));
    }

    #[test]
    fn reporters_cover_an_empty_primitive() {
        let names = KnownNames::new(&[NameEntry::new("Score", "var-score")], &[], &[]);
        let source = "\
when green flag clicked
move (Score) steps
say (answer)
if <(Score) > (5)> then
end";
        let blocks = blocks_for(source, &names);
        let steps = &find(&blocks, "motion_movesteps")["inputs"]["STEPS"];
        assert_eq!(steps[0], json!(3));
        assert_eq!(blocks[steps[1].as_str().expect("id")]["opcode"], json!("data_variable"));
        assert_eq!(steps[2], json!([4, ""]));

        let message = &find(&blocks, "looks_say")["inputs"]["MESSAGE"];
        assert_eq!(blocks[message[1].as_str().expect("id")]["opcode"], json!("sensing_answer"));
        assert_eq!(message[2], json!([10, ""]));

        let condition = &find(&blocks, "control_if")["inputs"]["CONDITION"];
        assert_eq!(condition[0], json!(2));
    }

    #[test]
    fn stop_carries_mutation() {
        let blocks = blocks_for("when green flag clicked\nstop [all v]", &KnownNames::default());
        let stop = find(&blocks, "control_stop");
        assert_eq!(stop["fields"]["STOP_OPTION"], json!(["all", null]));
        assert_eq!(stop["mutation"]["hasnext"], json!("false"));
    }
}
