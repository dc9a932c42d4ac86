use std::cell::RefCell;
use std::rc::Rc;

use gal_core::MediaStatement;
use gal_runtime::{Choice, Output, TimerAction};

/// What the engine last put in front of the player. The main loop reads
/// this to decide which prompt to show.
#[derive(Debug, Default)]
pub struct Screen {
    pub choices: Vec<Choice>,
    pub awaiting_input: bool,
}

/// Prints the script to stdout. Timers and key bindings have no terminal
/// equivalent, so armed actions are announced rather than scheduled.
pub struct TerminalOutput {
    screen: Rc<RefCell<Screen>>,
}

impl TerminalOutput {
    pub fn new(screen: Rc<RefCell<Screen>>) -> Self {
        Self { screen }
    }
}

impl Output for TerminalOutput {
    fn speech(&mut self, character: &str, text: &str) {
        if character.is_empty() {
            println!("{}", text);
        } else {
            println!("{}: {}", character, text);
        }
    }

    fn note(&mut self, text: &str) {
        println!("({})", text);
    }

    fn choices(&mut self, choices: &[Choice]) {
        for (index, choice) in choices.iter().enumerate() {
            if choice.enabled {
                println!("  {}) {}", index + 1, choice.text);
            } else {
                println!("  {}) {} [locked]", index + 1, choice.text);
            }
        }
        self.screen.borrow_mut().choices = choices.to_vec();
    }

    fn request_input(&mut self) {
        self.screen.borrow_mut().awaiting_input = true;
    }

    fn open_link(&mut self, url: &str) {
        println!("-> {}", url);
    }

    fn play_media(&mut self, source: &str, _media: &MediaStatement) {
        println!("(media: {})", source);
    }

    fn clear_media(&mut self) {}

    fn arm_timeout(&mut self, seconds: f64, _action: TimerAction, _lifespan: u32) {
        println!("(continues after {}s)", seconds);
    }

    fn arm_key(&mut self, key: &str, _action: TimerAction) {
        println!("(key: {})", key);
    }

    fn clear_armed(&mut self) {
        let mut screen = self.screen.borrow_mut();
        screen.choices.clear();
        screen.awaiting_input = false;
    }
}
