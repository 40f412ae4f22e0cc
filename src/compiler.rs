use crate::block::{BlockId, Input, Script, Shape};
use crate::build::BuildContext;
use crate::error::{CompileError, Unbalanced};
use crate::ids::{IdSource, SequentialIds};
use crate::names::KnownNames;
use crate::opcodes;
use tracing::{debug, warn};

pub const DEFAULT_MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Deepest expression/condition recursion accepted inside one line.
    pub max_nesting: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Compiles `source` with sequential `block_N` ids and default options.
pub fn compile(source: &str, names: &KnownNames) -> Result<Vec<Script>, CompileError> {
    compile_with(source, names, &mut SequentialIds::default(), &CompileOptions::default())
}

pub fn compile_with(
    source: &str,
    names: &KnownNames,
    ids: &mut dyn IdSource,
    options: &CompileOptions,
) -> Result<Vec<Script>, CompileError> {
    let result = Compiler::new(names, ids, options).run(source);
    if let Err(err) = &result {
        warn!(error = %err, "compilation failed");
    }
    result
}

/// One open container awaiting its `end`.
#[derive(Debug)]
struct Frame {
    id: BlockId,
    slot: &'static str,
    children: Vec<BlockId>,
    opened_at: usize,
}

#[derive(Debug)]
struct OpenScript {
    hat: BlockId,
    frames: Vec<Frame>,
}

enum LineKind<'t> {
    Trigger(&'t str),
    Else,
    End,
    Statement(&'t str),
}

fn classify(text: &str) -> LineKind<'_> {
    let first_word = text.split_whitespace().next().unwrap_or_default();
    if first_word.eq_ignore_ascii_case("when") {
        LineKind::Trigger(text)
    } else if text.eq_ignore_ascii_case("else") {
        LineKind::Else
    } else if text.eq_ignore_ascii_case("end") {
        LineKind::End
    } else {
        LineKind::Statement(text)
    }
}

struct Compiler<'a> {
    cx: BuildContext<'a>,
    scripts: Vec<Script>,
    current: Option<OpenScript>,
}

impl<'a> Compiler<'a> {
    fn new(names: &'a KnownNames, ids: &'a mut dyn IdSource, options: &CompileOptions) -> Self {
        Self {
            cx: BuildContext::new(names, ids, options.max_nesting),
            scripts: Vec::new(),
            current: None,
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<Script>, CompileError> {
        for (index, raw) in source.lines().enumerate() {
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }
            self.cx.set_line(index + 1);
            match classify(text) {
                LineKind::Trigger(text) => self.open_script(text)?,
                LineKind::Else => self.switch_to_else()?,
                LineKind::End => self.close_container()?,
                LineKind::Statement(text) => self.statement(text)?,
            }
        }
        self.finish_script()?;
        debug!(scripts = self.scripts.len(), "compiled");
        Ok(self.scripts)
    }

    fn open_script(&mut self, text: &str) -> Result<(), CompileError> {
        self.finish_script()?;
        let line = self.cx.line();
        let m = opcodes::lookup_trigger(text).ok_or_else(|| CompileError::UnrecognizedTrigger {
            line,
            text: text.to_string(),
        })?;
        let hat = self.cx.instantiate(&m, None)?;
        debug!(line, opcode = m.spec.opcode, block = %hat, "trigger");
        self.current = Some(OpenScript {
            hat,
            frames: Vec::new(),
        });
        Ok(())
    }

    fn statement(&mut self, text: &str) -> Result<(), CompileError> {
        let line = self.cx.line();
        let script = self
            .current
            .as_mut()
            .ok_or_else(|| CompileError::StatementOutsideScript {
                line,
                text: text.to_string(),
            })?;
        let m = opcodes::lookup_line(text).ok_or_else(|| CompileError::UnrecognizedLine {
            line,
            text: text.to_string(),
        })?;
        let id = self.cx.instantiate(&m, None)?;
        debug!(line, opcode = m.spec.opcode, block = %id, depth = script.frames.len(), "statement");

        if let Some(frame) = script.frames.last_mut() {
            frame.children.push(id.clone());
        }
        if m.spec.shape == Shape::Container {
            script.frames.push(Frame {
                id,
                slot: "SUBSTACK",
                children: Vec::new(),
                opened_at: line,
            });
        }
        Ok(())
    }

    /// Closes the first branch of the innermost `if` and turns it into an
    /// if/else in place. The id is kept, so the enclosing frame's child list
    /// and the existing condition stay valid.
    fn switch_to_else(&mut self) -> Result<(), CompileError> {
        let line = self.cx.line();
        let unbalanced = CompileError::UnbalancedContainer {
            line,
            reason: Unbalanced::ElseWithoutIf,
        };
        let Some(script) = self.current.as_mut() else {
            return Err(unbalanced);
        };
        let is_open_if = script
            .frames
            .last()
            .and_then(|frame| self.cx.graph.get(&frame.id))
            .is_some_and(|block| block.opcode == "control_if");
        if !is_open_if {
            return Err(unbalanced);
        }
        let Some(frame) = script.frames.pop() else {
            return Err(unbalanced);
        };
        close_frame(&mut self.cx, &frame)?;
        if let Some(block) = self.cx.graph.get_mut(&frame.id) {
            block.opcode = "control_if_else".to_string();
        }
        debug!(line, block = %frame.id, "else");
        script.frames.push(Frame {
            id: frame.id,
            slot: "SUBSTACK2",
            children: Vec::new(),
            opened_at: frame.opened_at,
        });
        Ok(())
    }

    fn close_container(&mut self) -> Result<(), CompileError> {
        let line = self.cx.line();
        let frame = self
            .current
            .as_mut()
            .and_then(|script| script.frames.pop())
            .ok_or(CompileError::UnbalancedContainer {
                line,
                reason: Unbalanced::CloserWithoutOpener,
            })?;
        debug!(line, block = %frame.id, children = frame.children.len(), "end");
        close_frame(&mut self.cx, &frame)
    }

    fn finish_script(&mut self) -> Result<(), CompileError> {
        let Some(script) = self.current.take() else {
            return Ok(());
        };
        if let Some(frame) = script.frames.last() {
            let opcode = self
                .cx
                .graph
                .get(&frame.id)
                .map(|block| block.opcode.clone())
                .unwrap_or_default();
            return Err(CompileError::UnbalancedContainer {
                line: frame.opened_at,
                reason: Unbalanced::Unclosed {
                    opened_at: frame.opened_at,
                    opcode,
                },
            });
        }
        let graph = std::mem::take(&mut self.cx.graph);
        let finished = graph.finish(&script.hat)?;
        debug!(top = %finished.top_block_id, blocks = finished.blocks.len(), "script finished");
        self.scripts.push(finished);
        Ok(())
    }
}

/// Links a frame's children and hangs them in the container's body slot.
fn close_frame(cx: &mut BuildContext<'_>, frame: &Frame) -> Result<(), CompileError> {
    if let Some(head) = cx.graph.link_sequence(&frame.children, &frame.id)? {
        cx.graph
            .set_input(&frame.id, frame.slot, Input::Substack { block: head })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_structural_lines() {
        assert!(matches!(classify("when green flag clicked"), LineKind::Trigger(_)));
        assert!(matches!(classify("When I receive [go v]"), LineKind::Trigger(_)));
        assert!(matches!(classify("END"), LineKind::End));
        assert!(matches!(classify("else"), LineKind::Else));
        assert!(matches!(classify("whenever"), LineKind::Statement(_)));
    }

    #[test]
    fn blank_lines_do_not_shift_line_numbers() {
        let err = compile("when green flag clicked\n\n   \nfly away", &KnownNames::default())
            .expect_err("unknown statement");
        assert_eq!(
            err,
            CompileError::UnrecognizedLine {
                line: 4,
                text: "fly away".to_string()
            }
        );
    }

    #[test]
    fn statements_need_a_trigger() {
        let err = compile("move (10) steps", &KnownNames::default()).expect_err("no trigger");
        assert!(matches!(err, CompileError::StatementOutsideScript { line: 1, .. }));
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        let err = compile("when it rains", &KnownNames::default()).expect_err("bad trigger");
        assert!(matches!(err, CompileError::UnrecognizedTrigger { line: 1, .. }));
    }

    #[test]
    fn nesting_limit_comes_from_options() {
        let source = "when green flag clicked\nmove ((((1) + (1)) + (1)) + (1)) steps";
        let options = CompileOptions { max_nesting: 2 };
        let err = compile_with(
            source,
            &KnownNames::default(),
            &mut SequentialIds::default(),
            &options,
        )
        .expect_err("too deep");
        assert_eq!(err, CompileError::NestingTooDeep { line: 2, limit: 2 });
    }
}
