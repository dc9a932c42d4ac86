use std::rc::Rc;

use gal_core::{EnumType, GalError, GalValue, InputKind, Statement};
use gal_parser::Paragraph;
use gal_vars::{Builtins, VarsFrame};

use crate::collab::{FileAccess, NullOutput, Output, TimerAction};
use crate::frame::{CustomData, Frame};
use crate::resources::Resources;

/// Statements processed in one advance before the engine assumes a jump
/// loop that never produces output.
pub(crate) const MAX_STEPS_PER_ADVANCE: usize = 100_000;

/// The `[Media]` element currently playing on the host.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlayingMedia {
    pub(crate) block: bool,
    pub(crate) resisting: bool,
    pub(crate) ended: bool,
}

/// The execution engine: a state machine over one [`Paragraph`].
///
/// `pos` is the current statement index, `-1` before the first statement.
/// Advancing pushes a [`Frame`] for back-navigation, then processes
/// statements until one stops and waits for external input.
pub struct Manager {
    pub(crate) paragraph: Paragraph,
    pub(crate) pos: i64,
    pub(crate) env: VarsFrame,
    pub(crate) call_stack: Vec<Frame>,
    pub(crate) history: Vec<Frame>,
    pub(crate) resources: Resources,
    pub(crate) custom_data: CustomData,
    pub(crate) output: Box<dyn Output>,
    pub(crate) files: Rc<dyn FileAccess>,
    pub(crate) warnings: Vec<String>,
    pub(crate) character: String,
    pub(crate) pending_input: Option<(String, String, InputKind)>,
    pub(crate) media: Option<PlayingMedia>,
    pub(crate) is_main: bool,
}

impl Manager {
    pub fn new(output: Box<dyn Output>, files: Rc<dyn FileAccess>) -> Self {
        Self {
            paragraph: Paragraph::default(),
            pos: -1,
            env: VarsFrame::new(Builtins::standard()),
            call_stack: Vec::new(),
            history: Vec::new(),
            resources: Resources::new(),
            custom_data: CustomData::default(),
            output,
            files,
            warnings: Vec::new(),
            character: String::new(),
            pending_input: None,
            media: None,
            is_main: true,
        }
    }

    /// A sub-engine for `[Import]`: same file access, no visible output.
    pub(crate) fn imported(files: Rc<dyn FileAccess>) -> Self {
        let mut manager = Self::new(Box::new(NullOutput), files);
        manager.is_main = false;
        manager
    }

    pub fn pos(&self) -> i64 {
        self.pos
    }

    pub fn env(&self) -> &VarsFrame {
        &self.env
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn call_stack_len(&self) -> usize {
        self.call_stack.len()
    }

    pub fn current_statement(&self) -> Option<&Statement> {
        usize::try_from(self.pos)
            .ok()
            .and_then(|pos| self.paragraph.statement_at(pos))
    }

    /// The `[Part]` label covering the current line.
    pub fn part(&self) -> Option<&str> {
        usize::try_from(self.pos)
            .ok()
            .and_then(|pos| self.paragraph.part_at(pos))
    }

    /// Warnings recorded since the last call, oldest first.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Blocked engines ignore `next`: a pending `[Select]` or `[Input]` must
    /// be answered through `choose`/`submit_input` first, and a blocking
    /// `[Media]` must finish playing.
    pub fn is_blocked(&self) -> bool {
        self.pending_input.is_some()
            || matches!(self.current_statement(), Some(Statement::Select))
            || self
                .media
                .is_some_and(|media| media.block && !media.ended)
    }

    /// Past the last statement with nothing pending.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.paragraph.len() as i64
    }

    pub fn current_frame(&self) -> Frame {
        Frame {
            pos: self.pos,
            vars: self.env.copy(),
            resources: self.resources.encode(),
            custom_data: self.custom_data.clone(),
        }
    }

    /// Replaces the paragraph with `text` and runs to the first stop.
    pub fn load_text(&mut self, text: &str) -> Result<(), GalError> {
        self.paragraph = Paragraph::parse(text)?;
        self.pos = -1;
        self.resources.clear();
        self.clear_media();
        self.advance()
    }

    /// Loads a script through the file collaborator and runs to the first
    /// stop.
    pub fn load_file(&mut self, path: &str) -> Result<(), GalError> {
        self.jump_file(path)?;
        self.advance()
    }

    pub(crate) fn jump_file(&mut self, path: &str) -> Result<(), GalError> {
        let resolved = self.files.resolve(path)?;
        let content = self.files.read(&resolved).map_err(|error| {
            GalError::new(
                "FILE_OPEN",
                format!("Cannot open file {}: {}", resolved, error.message),
            )
        })?;
        self.paragraph = Paragraph::parse(&content)?;
        self.pos = -1;
        self.resources.clear();
        self.resources.set_file(resolved);
        self.clear_media();
        Ok(())
    }

    fn clear_media(&mut self) {
        if self.media.take().is_some() {
            self.output.clear_media();
        }
    }

    /// Media that is not `resisting` stops as soon as the player advances.
    fn clear_media_weak(&mut self) {
        if self.media.is_some_and(|media| !media.resisting) {
            self.clear_media();
        }
    }

    /// The host reports that the playing media finished on its own.
    pub fn notify_media_ended(&mut self) {
        if let Some(media) = &mut self.media {
            media.ended = true;
        }
    }

    /// Advances until a statement stops (speech shown, choices presented,
    /// input requested, pause) or the paragraph is exhausted.
    pub fn next(&mut self) -> Result<(), GalError> {
        if self.is_blocked() || self.pos >= self.paragraph.len() as i64 {
            return Ok(());
        }
        self.history.push(self.current_frame());
        self.clear_media_weak();
        self.advance()
    }

    fn advance(&mut self) -> Result<(), GalError> {
        for _ in 0..MAX_STEPS_PER_ADVANCE {
            self.pos += 1;
            if self.process_current()? {
                return Ok(());
            }
        }
        Err(self.runaway_error())
    }

    /// Processes the current statement first, then behaves like `advance`.
    fn run_from_current(&mut self) -> Result<(), GalError> {
        for _ in 0..MAX_STEPS_PER_ADVANCE {
            if self.process_current()? {
                return Ok(());
            }
            self.pos += 1;
        }
        Err(self.runaway_error())
    }

    pub(crate) fn runaway_error(&self) -> GalError {
        GalError::new(
            "ENGINE_LOOP",
            format!(
                "No output after {} statements; the script is likely stuck in a jump loop near line {}",
                MAX_STEPS_PER_ADVANCE, self.pos
            ),
        )
    }

    fn jump_frame(&mut self, frame: Frame, memorize: bool) -> Result<(), GalError> {
        if memorize {
            self.history.push(self.current_frame());
        }
        self.pos = frame.pos;
        self.env = frame.vars;
        self.resources = Resources::decode(&frame.resources)?;
        self.custom_data = frame.custom_data;
        self.run_from_current()
    }

    /// Raw line jump; the target statement is processed immediately.
    pub fn jump_to_pos(&mut self, pos: i64) -> Result<(), GalError> {
        self.history.push(self.current_frame());
        self.pos = pos;
        self.run_from_current()
    }

    /// Restores the full engine state from a frame, then runs from there.
    pub fn jump_to_frame(&mut self, frame: Frame) -> Result<(), GalError> {
        self.jump_frame(frame, true)
    }

    /// Steps back to the most recent frame on the history stack.
    pub fn previous(&mut self) -> Result<(), GalError> {
        match self.history.pop() {
            Some(frame) => self.jump_frame(frame, false),
            None => Ok(()),
        }
    }

    /// Commits the choice of the `[Case]` at `case_pos`: jumps into its body
    /// with the pre-choice state otherwise intact.
    pub fn choose(&mut self, case_pos: usize) -> Result<(), GalError> {
        self.pending_input = None;
        let frame = self.current_frame().with_pos(case_pos as i64);
        self.jump_frame(frame, true)
    }

    /// Commits the text submitted for a pending `[Input]`. Evaluation
    /// failures set the error variable instead of propagating.
    pub fn submit_input(&mut self, expr: &str) -> Result<(), GalError> {
        let Some((value_var, error_var, kind)) = self.pending_input.take() else {
            return Ok(());
        };
        let evaluated = match kind {
            InputKind::Expr => self.env.evaluate(expr),
            InputKind::Text => Ok(GalValue::Str(expr.to_string())),
        };
        let committed = evaluated.and_then(|value| self.env.set_var(&value_var, value));
        match committed {
            Ok(()) => self.env.set_var(&error_var, EnumType::of_bool(false))?,
            Err(error) => {
                self.warnings.push(error.message);
                self.env.set_var(&error_var, EnumType::of_bool(true))?;
            }
        }
        self.next()
    }

    /// Entry point for the host's timers and key bindings.
    pub fn trigger(&mut self, action: TimerAction) -> Result<(), GalError> {
        match action {
            TimerAction::Advance => self.next(),
            TimerAction::Choose(case_pos) => self.choose(case_pos),
        }
    }
}
