use std::rc::Rc;

use gal_core::{tolerant_equal, EnumType, GalError, GalValue, JumpKind, Statement};
use gal_parser::Paragraph;

use crate::collab::{Choice, TimerAction};
use crate::eval_host::run_eval;
use crate::interpolate::interpolate;
use crate::manager::{Manager, PlayingMedia};

/// Statement dispatch. Every processor returns `Ok(true)` to stop and wait
/// for the host, `Ok(false)` to continue with the next statement; fatal
/// script errors propagate as `Err`.
impl Manager {
    pub(crate) fn process_current(&mut self) -> Result<bool, GalError> {
        if self.pos >= self.paragraph.len() as i64 {
            return Ok(true);
        }
        let Some(statement) = self.current_statement().cloned() else {
            return Ok(false);
        };
        self.output.clear_armed();
        self.set_enums()?;
        match statement {
            Statement::Speech { character, text } => self.process_speech(&character, &text),
            Statement::Note { text } => {
                self.unsupported_for_imported("note")?;
                let text = self.interp(&text);
                self.output.note(&text);
                Ok(true)
            }
            Statement::Character { name } => {
                self.character = self.interp(&name);
                Ok(false)
            }
            Statement::Jump { kind, target } => self.process_jump(kind, &target),
            Statement::Select => self.process_select(),
            Statement::Case(case) => self.process_case(&case.text),
            Statement::Break => self.process_break(),
            Statement::Var { name, expr } => {
                self.process_var(&name, &expr);
                Ok(false)
            }
            Statement::Input {
                value_var,
                error_var,
                kind,
            } => {
                self.unsupported_for_imported("input")?;
                self.pending_input = Some((value_var, error_var, kind));
                self.output.request_input();
                Ok(true)
            }
            Statement::Image {
                image_type,
                image_file,
            } => {
                self.unsupported_for_imported("image")?;
                let image_type = self.interp(&image_type);
                let image_file = self.interp(&image_file);
                self.resources.set_image(&image_type, &image_file);
                Ok(false)
            }
            Statement::Media(media) => {
                self.unsupported_for_imported("media")?;
                let source = self.interp(&media.source);
                self.output.play_media(&source, &media);
                self.media = Some(PlayingMedia {
                    block: media.block,
                    resisting: media.resisting,
                    ended: false,
                });
                // A blocking element plays alone; anything else keeps the
                // script moving underneath it.
                Ok(media.block)
            }
            Statement::Transform(transform) => {
                self.unsupported_for_imported("transform")?;
                let mut interpolated = transform.clone();
                interpolated.image_type = self.interp(&transform.image_type);
                interpolated.translate_x = self.interp(&transform.translate_x);
                interpolated.translate_y = self.interp(&transform.translate_y);
                interpolated.scale_x = self.interp(&transform.scale_x);
                interpolated.scale_y = self.interp(&transform.scale_y);
                interpolated.skew_x = self.interp(&transform.skew_x);
                interpolated.skew_y = self.interp(&transform.skew_y);
                interpolated.rotate = self.interp(&transform.rotate);
                self.resources
                    .transform_image(&interpolated.image_type.clone(), &interpolated.encode());
                Ok(false)
            }
            Statement::Delay { seconds } => {
                self.unsupported_for_imported("delay")?;
                let seconds = self.env.evaluate(&seconds)?.to_num()?;
                // Lifespan 2: the timer must survive the statement the
                // engine pauses on right after the delay.
                self.output.arm_timeout(seconds, TimerAction::Advance, 2);
                Ok(false)
            }
            Statement::Pause => Ok(true),
            Statement::Eval { expr } => {
                let expr = self.interp(&expr);
                if let Err(error) = run_eval(&expr, &mut self.custom_data) {
                    self.warnings.push(error.message);
                }
                Ok(false)
            }
            Statement::Func { .. } => {
                let pos = self.paragraph.find_return_pos_after(self.pos as usize)?;
                self.pos = pos as i64;
                Ok(false)
            }
            Statement::Return { expr } => self.process_return(&expr),
            Statement::Call {
                name,
                args,
                return_var: _,
            } => self.process_call(&name, &args),
            Statement::Import { file, names } => self.process_import(&file, &names),
            Statement::Empty
            | Statement::Part { .. }
            | Statement::Anchor { .. }
            | Statement::Switch { .. }
            | Statement::Enum { .. }
            | Statement::Text { .. }
            | Statement::Code { .. }
            | Statement::End => Ok(false),
        }
    }

    fn interp(&mut self, text: &str) -> String {
        interpolate(text, &mut self.env, &mut self.warnings)
    }

    fn unsupported_for_imported(&self, kind: &str) -> Result<(), GalError> {
        if self.is_main {
            return Ok(());
        }
        Err(GalError::new(
            "IMPORT_UNSUPPORTED",
            format!(
                "Operation not supported in imported files: at line {}, statement is '{}'",
                self.pos, kind
            ),
        ))
    }

    /// Defines every enum declared at or before the current line. Types
    /// already present (builtin bool, imported ones) are left alone.
    fn set_enums(&mut self) -> Result<(), GalError> {
        let Ok(pos) = usize::try_from(self.pos) else {
            return Ok(());
        };
        let scanned = self
            .paragraph
            .scan_enums_at(pos)
            .into_iter()
            .map(|(name, values)| {
                EnumType::new(
                    name.trim(),
                    values.iter().map(|value| value.trim().to_string()).collect(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        for enum_type in scanned {
            self.env.def_enum_type_if_unexist(enum_type);
        }
        Ok(())
    }

    fn process_speech(&mut self, character: &str, text: &str) -> Result<bool, GalError> {
        self.unsupported_for_imported("speech")?;
        if character.trim().is_empty() && text.trim().is_empty() {
            return Ok(false);
        }
        let mut speaker = self.interp(character).trim().to_string();
        if speaker.is_empty() {
            speaker = self.character.clone();
        }
        let text = self.interp(text).trim().to_string();
        self.output.speech(&speaker, &text);
        Ok(true)
    }

    fn process_jump(&mut self, kind: JumpKind, target: &str) -> Result<bool, GalError> {
        let target = self.interp(target);
        match kind {
            JumpKind::File => {
                self.unsupported_for_imported("jump")?;
                self.jump_file(&target)?;
            }
            JumpKind::Link => {
                self.unsupported_for_imported("jump")?;
                self.output.open_link(&target);
            }
            JumpKind::Anchor => {
                let anchor_pos = self.paragraph.find_anchor_pos(&target).ok_or_else(|| {
                    GalError::new("JUMP_ANCHOR", format!("Anchor not found: {}", target))
                })?;
                // `-1` so the advancing loop lands exactly on the anchor.
                self.pos = anchor_pos as i64 - 1;
            }
        }
        Ok(false)
    }

    /// A malformed show/enable expression hides nothing: the choice stays
    /// visible and selectable, with a warning.
    fn eval_flag(&mut self, expr: &str) -> bool {
        match self.env.evaluate(expr).and_then(|value| value.to_bool()) {
            Ok(value) => value,
            Err(error) => {
                self.warnings.push(error.message);
                true
            }
        }
    }

    fn process_select(&mut self) -> Result<bool, GalError> {
        self.unsupported_for_imported("select")?;
        let pos = self.pos as usize;
        let block = self.paragraph.find_start_control_block(pos).ok_or_else(|| {
            GalError::new(
                "SELECT_BLOCK",
                format!("[Select] at line {} opens no control block", pos),
            )
        })?;
        let cases_pos_list = block.cases_pos_list.clone();
        let mut choices = Vec::new();
        for case_pos in cases_pos_list {
            let Some(Statement::Case(case)) = self.paragraph.statement_at(case_pos).cloned()
            else {
                continue;
            };
            let show = self.eval_flag(&case.show);
            let enabled = self.eval_flag(&case.enable);
            let text = self.interp(&case.text);
            if show {
                choices.push(Choice {
                    case_pos,
                    text,
                    enabled,
                });
            }
            if let Some(timeout) = &case.timeout {
                let seconds = self.env.evaluate(timeout)?.to_num()?;
                self.output
                    .arm_timeout(seconds, TimerAction::Choose(case_pos), 1);
            }
            if let Some(key) = &case.key {
                let key = self.interp(key);
                self.output.arm_key(&key, TimerAction::Choose(case_pos));
            }
        }
        self.output.choices(&choices);
        Ok(true)
    }

    /// Under a `[Switch]`, an unequal case skips straight to the block's next
    /// case; evaluation failures warn and fall through into the body.
    fn process_case(&mut self, case_text: &str) -> Result<bool, GalError> {
        let pos = self.pos as usize;
        if !self.paragraph.is_switch_case(pos) {
            return Ok(false);
        }
        let Some(block) = self.paragraph.find_case_control_block(pos).cloned() else {
            return Ok(false);
        };
        let Some(Statement::Switch { expr }) =
            self.paragraph.statement_at(block.start_pos).cloned()
        else {
            return Ok(false);
        };
        match self.env.evaluate(&expr) {
            Ok(value) => match self.env.evaluate(case_text) {
                Ok(case_value) => {
                    let equal = tolerant_equal(&value, &case_value).unwrap_or_else(|| {
                        self.warnings.push(format!(
                            "Trying to compare {} and {}",
                            value.type_name(),
                            case_value.type_name()
                        ));
                        false
                    });
                    if !equal {
                        self.pos = block.next(pos) as i64 - 1;
                    }
                }
                Err(error) => self.warnings.push(error.message),
            },
            Err(error) => self.warnings.push(error.message),
        }
        Ok(false)
    }

    fn process_break(&mut self) -> Result<bool, GalError> {
        let pos = self.pos as usize;
        let block = self
            .paragraph
            .case_pos_at(pos)
            .and_then(|case_pos| self.paragraph.find_case_control_block(case_pos))
            .ok_or_else(|| {
                GalError::new(
                    "BREAK_OUTSIDE",
                    format!("[Break] at line {} is not in control block", pos),
                )
            })?;
        self.pos = block.end_pos as i64;
        Ok(false)
    }

    /// Assignment never kills the script: evaluation and naming errors
    /// become warnings and leave the variable untouched.
    fn process_var(&mut self, name: &str, expr: &str) {
        self.env.take_warn();
        match self.env.evaluate(expr) {
            Ok(value) => {
                if let Err(error) = self.env.set_var(name, value) {
                    self.warnings.push(error.message);
                }
            }
            Err(error) => self.warnings.push(error.message),
        }
        if let Some(warn) = self.env.take_warn() {
            self.warnings.push(warn);
        }
    }

    fn process_call(&mut self, name: &str, args: &[String]) -> Result<bool, GalError> {
        let func_pos = self
            .paragraph
            .find_func_pos(name)
            .ok_or_else(|| GalError::new("CALL_UNKNOWN", format!("No such func: {}", name)))?;
        let Some(Statement::Func { params, .. }) = self.paragraph.statement_at(func_pos).cloned()
        else {
            return Err(GalError::new(
                "CALL_UNKNOWN",
                format!("No such func: {}", name),
            ));
        };
        if params.len() != args.len() {
            return Err(GalError::new(
                "CALL_ARGS",
                format!("Args doesn't match func {} at line {}", name, self.pos),
            ));
        }
        let values = args
            .iter()
            .map(|expr| self.env.evaluate(expr))
            .collect::<Result<Vec<_>, _>>()?;
        self.call_stack.push(self.current_frame());
        for (param, value) in params.iter().zip(values) {
            self.env.set_var(param, value)?;
        }
        self.pos = func_pos as i64;
        Ok(false)
    }

    fn process_return(&mut self, expr: &str) -> Result<bool, GalError> {
        let value = if expr.trim().is_empty() {
            GalValue::Num(0.0)
        } else {
            self.env.evaluate(expr)?
        };
        let frame = self
            .call_stack
            .pop()
            .ok_or_else(|| GalError::new("CALL_STACK_EMPTY", "Call stack is empty"))?;
        self.pos = frame.pos;
        self.env = frame.vars;
        let return_var = match self.paragraph.statement_at(frame.pos as usize) {
            Some(Statement::Call { return_var, .. }) => return_var.clone(),
            _ => None,
        };
        if let Some(name) = return_var {
            self.env.set_var(&name, value)?;
        }
        Ok(false)
    }

    /// Runs the file to completion in a side-effect-free sub-engine, then
    /// pulls the named vars and enums that the caller has not defined yet.
    fn process_import(&mut self, file: &str, names: &[String]) -> Result<bool, GalError> {
        let resolved = self.files.resolve(file)?;
        let content = self.files.read(&resolved).map_err(|error| {
            GalError::new(
                "FILE_OPEN",
                format!("Cannot open file {}: {}", resolved, error.message),
            )
        })?;
        let mut sub = Manager::imported(Rc::clone(&self.files));
        sub.paragraph = Paragraph::parse(&content)?;
        sub.pos = -1;
        let len = sub.paragraph.len() as i64;
        let mut steps = 0;
        while sub.pos < len {
            steps += 1;
            if steps > crate::manager::MAX_STEPS_PER_ADVANCE {
                return Err(sub.runaway_error());
            }
            sub.pos += 1;
            sub.process_current()?;
        }
        self.warnings.append(&mut sub.warnings);
        for name in names {
            if self.env.is_defined_symbol(name) {
                continue;
            }
            if let Some(value) = sub.env.vars.get(name) {
                let value = value.clone();
                self.env.set_var(name, value)?;
            } else if let Some(enum_type) = sub.env.enum_type(name) {
                let enum_type = enum_type.clone();
                self.env.def_enum_type(enum_type)?;
            } else {
                return Err(GalError::new(
                    "IMPORT_SYMBOL",
                    format!("No such symbol in '{}': '{}'", file, name),
                ));
            }
        }
        Ok(false)
    }
}
