use std::rc::Rc;

use gal_core::GalError;
use gal_vars::{Builtins, VarsFrame};

/// Free-form JSON state owned by `[Eval]` scripts. Round-trips through the
/// fourth Frame line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData(pub serde_json::Map<String, serde_json::Value>);

impl CustomData {
    pub fn encode(&self) -> String {
        serde_json::Value::Object(self.0.clone()).to_string()
    }

    pub fn decode(text: &str) -> Result<Self, GalError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|error| {
            GalError::new(
                "CUSTOM_DATA_DECODE",
                format!("Malformed custom data: {}", error),
            )
        })?;
        let serde_json::Value::Object(map) = value else {
            return Err(GalError::new(
                "CUSTOM_DATA_DECODE",
                "Custom data must be a JSON object.",
            ));
        };
        Ok(Self(map))
    }
}

/// A serializable snapshot of the engine: position, environment, resource
/// state, and custom data. Four text lines, each with its own round-trip.
pub struct Frame {
    pub pos: i64,
    pub vars: VarsFrame,
    pub resources: String,
    pub custom_data: CustomData,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("pos", &self.pos).finish_non_exhaustive()
    }
}

impl Frame {
    pub fn with_pos(mut self, pos: i64) -> Self {
        self.pos = pos;
        self
    }

    pub fn encode(&self) -> String {
        [
            self.pos.to_string(),
            self.vars.encode(),
            self.resources.clone(),
            self.custom_data.encode(),
        ]
        .join("\n")
    }

    pub fn decode(text: &str, builtins: Rc<Builtins>) -> Result<Self, GalError> {
        let mut lines = text.splitn(4, '\n');
        let (Some(pos), Some(vars), Some(resources), Some(custom_data)) =
            (lines.next(), lines.next(), lines.next(), lines.next())
        else {
            return Err(GalError::new(
                "FRAME_DECODE",
                "A frame encoding must have four lines.",
            ));
        };
        Ok(Self {
            pos: pos.trim().parse::<i64>().map_err(|_| {
                GalError::new("FRAME_DECODE", format!("Malformed frame position: {}", pos))
            })?,
            vars: VarsFrame::decode(vars, builtins)?,
            resources: resources.to_string(),
            custom_data: CustomData::decode(custom_data)?,
        })
    }
}
