use gal_core::GalError;
use gal_parser::split_with;

/// One named image slot: a screen position with its file and transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSlot {
    pub pos: String,
    pub left: String,
    pub bottom: String,
    pub image: String,
    pub transform: String,
}

/// The presentation state carried by a Frame: current script file plus the
/// image slots. The engine records it; rendering is the host's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    filename: Option<String>,
    slots: Vec<ImageSlot>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn set_file(&mut self, path: impl Into<String>) {
        self.filename = Some(path.into());
    }

    pub fn slots(&self) -> &[ImageSlot] {
        &self.slots
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.image.clear();
        }
    }

    fn slot_mut(&mut self, pos: &str) -> &mut ImageSlot {
        if let Some(index) = self.slots.iter().position(|slot| slot.pos == pos) {
            return &mut self.slots[index];
        }
        self.slots.push(ImageSlot {
            pos: pos.to_string(),
            ..ImageSlot::default()
        });
        self.slots.last_mut().expect("slot was just pushed")
    }

    pub fn def_image_pos(&mut self, pos: &str, left: &str, bottom: &str) {
        let slot = self.slot_mut(pos);
        if !left.is_empty() {
            slot.left = left.to_string();
        }
        if !bottom.is_empty() {
            slot.bottom = bottom.to_string();
        }
    }

    /// `[Image] pos: file`. A file starting with `@` defines the slot
    /// position (`@left,bottom`) instead of an image; `clear` empties the
    /// slot.
    pub fn set_image(&mut self, pos: &str, file: &str) {
        let file = file.trim();
        if let Some(placement) = file.strip_prefix('@') {
            let placement = placement.trim();
            if placement.contains(',') {
                let (left, bottom) = split_with(placement, ',');
                self.def_image_pos(pos, &left, &bottom);
            } else {
                self.def_image_pos(pos, placement, "0");
            }
            return;
        }
        let slot = self.slot_mut(pos);
        slot.image = if file == "clear" {
            String::new()
        } else {
            file.to_string()
        };
    }

    pub fn transform_image(&mut self, pos: &str, transform: &str) {
        self.slot_mut(pos).transform = transform.to_string();
    }

    /// `filename;pos|left|bottom|image|transform;...` — the opaque third
    /// Frame line.
    pub fn encode(&self) -> String {
        let mut parts = vec![self.filename.clone().unwrap_or_default()];
        for slot in &self.slots {
            parts.push(
                [
                    slot.pos.as_str(),
                    slot.left.as_str(),
                    slot.bottom.as_str(),
                    slot.image.as_str(),
                    slot.transform.as_str(),
                ]
                .join("|"),
            );
        }
        parts.join(";")
    }

    pub fn decode(text: &str) -> Result<Self, GalError> {
        let mut resources = Self::new();
        let mut parts = text.split(';');
        if let Some(filename) = parts.next() {
            if !filename.is_empty() {
                resources.set_file(filename);
            }
        }
        for part in parts {
            let fields = part.split('|').collect::<Vec<_>>();
            if fields.len() != 5 {
                return Err(GalError::new(
                    "RESOURCE_DECODE",
                    format!("Malformed image slot encoding: {}", part),
                ));
            }
            resources.slots.push(ImageSlot {
                pos: fields[0].to_string(),
                left: fields[1].to_string(),
                bottom: fields[2].to_string(),
                image: fields[3].to_string(),
                transform: fields[4].to_string(),
            });
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod resources_tests {
    use super::*;

    #[test]
    fn at_prefixed_files_define_slot_positions() {
        let mut resources = Resources::new();
        resources.set_image("left", "@10%,20%");
        resources.set_image("left", "hero.png");
        let slot = &resources.slots()[0];
        assert_eq!(slot.left, "10%");
        assert_eq!(slot.bottom, "20%");
        assert_eq!(slot.image, "hero.png");
    }

    #[test]
    fn clear_empties_images_but_keeps_slots() {
        let mut resources = Resources::new();
        resources.set_image("background", "forest.png");
        resources.clear();
        assert_eq!(resources.slots().len(), 1);
        assert_eq!(resources.slots()[0].image, "");
        resources.set_image("background", "clear");
        assert_eq!(resources.slots()[0].image, "");
    }

    #[test]
    fn encoding_round_trips() {
        let mut resources = Resources::new();
        resources.set_file("intro.txt");
        resources.set_image("background", "forest.png");
        resources.transform_image("background", "scaleX(2)");
        let decoded = Resources::decode(&resources.encode()).expect("decode passes");
        assert_eq!(decoded, resources);
    }

    #[test]
    fn empty_encoding_decodes_to_default() {
        let decoded = Resources::decode("").expect("decode passes");
        assert_eq!(decoded, Resources::new());
    }
}
