use gal_core::{GalError, MediaStatement};

/// What a fired timer or key binding should do to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Advance to the next statement (`[Delay]`).
    Advance,
    /// Choose the case at this position (`[Case] ...: timeout=...`).
    Choose(usize),
}

/// One selectable entry of a `[Select]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub case_pos: usize,
    pub text: String,
    pub enabled: bool,
}

/// Script file storage. Synchronous by design: the engine suspends inside at
/// most one statement, so a blocking read at the interpreter boundary is
/// enough.
pub trait FileAccess {
    fn read(&self, path: &str) -> Result<String, GalError>;
    fn write(&self, path: &str, text: &str) -> Result<(), GalError>;
    fn list(&self, dir: &str) -> Result<Vec<String>, GalError>;
    /// Turns a script-relative path into one `read` accepts.
    fn resolve(&self, relative: &str) -> Result<String, GalError>;
}

/// The UI sink. The engine owns its output exclusively during a step; armed
/// timers and keys are cleared before every statement so a stale timer can
/// never fire against a later one.
pub trait Output {
    fn speech(&mut self, character: &str, text: &str);
    fn note(&mut self, text: &str);
    fn choices(&mut self, choices: &[Choice]);
    fn request_input(&mut self);
    fn open_link(&mut self, url: &str);
    /// Starts playing `source`. The engine tracks the element's lifetime and
    /// calls `clear_media` when it should stop; the host reports a natural
    /// end through `Manager::notify_media_ended`.
    fn play_media(&mut self, source: &str, media: &MediaStatement);
    fn clear_media(&mut self);
    /// Schedules `action` after `seconds`. `lifespan` is how many
    /// `clear_armed` calls the timer survives: choice timeouts die with the
    /// statement that armed them (1), a `[Delay]` timer must outlive the
    /// statement it pauses on (2).
    fn arm_timeout(&mut self, seconds: f64, action: TimerAction, lifespan: u32);
    fn arm_key(&mut self, key: &str, action: TimerAction);
    fn clear_armed(&mut self);
}

/// Discards everything. Imported files run against this so their execution
/// cannot have visible side effects.
#[derive(Debug, Default)]
pub struct NullOutput;

impl Output for NullOutput {
    fn speech(&mut self, _character: &str, _text: &str) {}
    fn note(&mut self, _text: &str) {}
    fn choices(&mut self, _choices: &[Choice]) {}
    fn request_input(&mut self) {}
    fn open_link(&mut self, _url: &str) {}
    fn play_media(&mut self, _source: &str, _media: &MediaStatement) {}
    fn clear_media(&mut self) {}
    fn arm_timeout(&mut self, _seconds: f64, _action: TimerAction, _lifespan: u32) {}
    fn arm_key(&mut self, _key: &str, _action: TimerAction) {}
    fn clear_armed(&mut self) {}
}
