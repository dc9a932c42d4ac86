use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpKind {
    /// `[Jump] name` — a named `[Anchor]` in the current file.
    Anchor,
    /// `[Jump] >file` — load another script file.
    File,
    /// `[Jump] %url` — open an external link.
    Link,
}

/// How the text submitted for an `[Input]` becomes a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// The submission is evaluated as an expression.
    #[default]
    Expr,
    /// The submission is stored verbatim as a string.
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStatement {
    pub text: String,
    /// Whether the player can see this choice; an expression, default `true`.
    pub show: String,
    /// Whether the player can select this choice; an expression, default `true`.
    pub enable: String,
    /// This case can be chosen with a key.
    pub key: Option<String>,
    /// After how many seconds the choice is chosen automatically.
    pub timeout: Option<String>,
}

impl CaseStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show: "true".to_string(),
            enable: "true".to_string(),
            key: None,
            timeout: None,
        }
    }
}

/// Which screen layer a playing `[Media]` element covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaPos {
    Foreground,
    #[default]
    Background,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStatement {
    pub source: String,
    /// Playback volume in `0..=1`.
    pub volume: f64,
    pub pos: MediaPos,
    /// Advancing is refused until playback has ended.
    pub block: bool,
    /// Survives the advance that would otherwise stop it.
    pub resisting: bool,
}

impl MediaStatement {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            volume: 1.0,
            pos: MediaPos::default(),
            block: false,
            resisting: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStatement {
    pub image_type: String,
    pub translate_x: String,
    pub translate_y: String,
    pub scale_x: String,
    pub scale_y: String,
    pub skew_x: String,
    pub skew_y: String,
    pub rotate: String,
}

impl TransformStatement {
    pub fn new(image_type: impl Into<String>) -> Self {
        Self {
            image_type: image_type.into(),
            translate_x: "0px".to_string(),
            translate_y: "0px".to_string(),
            scale_x: "1".to_string(),
            scale_y: "1".to_string(),
            skew_x: "0".to_string(),
            skew_y: "0".to_string(),
            rotate: "0".to_string(),
        }
    }

    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("translateX", &self.translate_x),
            ("translateY", &self.translate_y),
            ("scaleX", &self.scale_x),
            ("scaleY", &self.scale_y),
            ("skewX", &self.skew_x),
            ("skewY", &self.skew_y),
            ("rotate", &self.rotate),
        ]
    }

    /// CSS-style transform string, e.g. `translateX(0px) ... rotate(30)`.
    pub fn encode(&self) -> String {
        self.fields()
            .iter()
            .map(|(name, value)| format!("{}({})", name, value.replace(' ', "")))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One parsed script line. Statements are immutable once parsed and are
/// addressed by their 0-based line index within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Comment or blank-tag line; processed as a silent continue.
    Empty,
    Character {
        name: String,
    },
    Speech {
        character: String,
        text: String,
    },
    Part {
        label: String,
    },
    Note {
        text: String,
    },
    Jump {
        kind: JumpKind,
        target: String,
    },
    Anchor {
        name: String,
    },
    Select,
    Switch {
        expr: String,
    },
    Case(CaseStatement),
    Break,
    End,
    Var {
        name: String,
        expr: String,
    },
    Enum {
        name: String,
        values: Vec<String>,
    },
    Input {
        value_var: String,
        error_var: String,
        kind: InputKind,
    },
    Image {
        image_type: String,
        image_file: String,
    },
    Media(MediaStatement),
    Transform(TransformStatement),
    Delay {
        seconds: String,
    },
    Pause,
    Eval {
        expr: String,
    },
    Func {
        name: String,
        params: Vec<String>,
    },
    Return {
        expr: String,
    },
    Call {
        name: String,
        args: Vec<String>,
        return_var: Option<String>,
    },
    Import {
        file: String,
        names: Vec<String>,
    },
    /// Free-form notes for the author; never rendered.
    Text {
        text: String,
    },
    /// An embedded snippet in another language; carried but never run.
    Code {
        language: String,
        code: String,
    },
}

impl Statement {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Character { .. } => "character",
            Self::Speech { .. } => "speech",
            Self::Part { .. } => "part",
            Self::Note { .. } => "note",
            Self::Jump { .. } => "jump",
            Self::Anchor { .. } => "anchor",
            Self::Select => "select",
            Self::Switch { .. } => "switch",
            Self::Case(_) => "case",
            Self::Break => "break",
            Self::End => "end",
            Self::Var { .. } => "var",
            Self::Enum { .. } => "enum",
            Self::Input { .. } => "input",
            Self::Image { .. } => "image",
            Self::Media(_) => "media",
            Self::Transform(_) => "transform",
            Self::Delay { .. } => "delay",
            Self::Pause => "pause",
            Self::Eval { .. } => "eval",
            Self::Func { .. } => "func",
            Self::Return { .. } => "return",
            Self::Call { .. } => "call",
            Self::Import { .. } => "import",
            Self::Text { .. } => "text",
            Self::Code { .. } => "code",
        }
    }

    /// Select and Switch both open a control block.
    pub fn opens_control_block(&self) -> bool {
        matches!(self, Self::Select | Self::Switch { .. })
    }
}

#[cfg(test)]
mod statement_tests {
    use super::*;

    #[test]
    fn transform_encodes_in_declaration_order() {
        let mut transform = TransformStatement::new("background");
        transform.rotate = "30".to_string();
        assert_eq!(
            transform.encode(),
            "translateX(0px) translateY(0px) scaleX(1) scaleY(1) skewX(0) skewY(0) rotate(30)"
        );
    }

    #[test]
    fn case_defaults_show_and_enable_to_true() {
        let case = CaseStatement::new("Yes");
        assert_eq!(case.show, "true");
        assert_eq!(case.enable, "true");
        assert!(case.key.is_none());
        assert!(case.timeout.is_none());
    }
}
