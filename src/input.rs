use bevy::{
    input::{
        ButtonState,
        keyboard::{Key, KeyboardInput},
    },
    prelude::{DetectChangesMut, MessageReader, ResMut, Resource},
};
use bevy_log::debug;

/// An immutable snapshot of the typed text, taken when the debounce settles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextState(String);

impl TextState {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits on line breaks, keeping empty lines so every line keeps its
    /// vertical slot.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.split('\n')
    }

    /// True when there is nothing but whitespace to render.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for TextState {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// The three mutations the input buffer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEdit {
    Insert(char),
    Newline,
    DeleteLast,
}

impl TextEdit {
    /// Maps a logical key to an edit. Printable single characters insert,
    /// Enter inserts a line break, Backspace deletes; everything else is ignored.
    pub fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_control() => Some(Self::Insert(c)),
                    _ => None,
                }
            }
            Key::Space => Some(Self::Insert(' ')),
            Key::Enter => Some(Self::Newline),
            Key::Backspace => Some(Self::DeleteLast),
            _ => None,
        }
    }

    /// Only key presses (including auto-repeat) produce edits.
    pub fn from_keyboard(event: &KeyboardInput) -> Option<Self> {
        if event.state != ButtonState::Pressed {
            return None;
        }
        Self::from_key(&event.logical_key)
    }
}

/// Accumulates key edits into the current text.
#[derive(Resource, Debug, Default, Clone)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_char(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn append_newline(&mut self) {
        self.text.push('\n');
    }

    /// Removes the final character. Returns false (and does nothing) when empty.
    pub fn delete_last(&mut self) -> bool {
        self.text.pop().is_some()
    }

    /// Applies an edit and reports whether the text changed.
    pub fn apply(&mut self, edit: TextEdit) -> bool {
        match edit {
            TextEdit::Insert(c) => {
                self.append_char(c);
                true
            }
            TextEdit::Newline => {
                self.append_newline();
                true
            }
            TextEdit::DeleteLast => self.delete_last(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn snapshot(&self) -> TextState {
        TextState::new(self.text.clone())
    }
}

/// Feeds keyboard presses into the [`InputBuffer`]. The resource is only
/// marked changed when an edit actually changed the text, so a Backspace on
/// empty input does not restart the debounce.
pub fn keyboard_input_system(
    mut keyboard: MessageReader<KeyboardInput>,
    mut buffer: ResMut<InputBuffer>,
) {
    for event in keyboard.read() {
        let Some(edit) = TextEdit::from_keyboard(event) else {
            continue;
        };
        if buffer.bypass_change_detection().apply(edit) {
            debug!("Applied {:?}; buffer is now {:?}", edit, buffer.as_str());
            buffer.set_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(edits: &[TextEdit]) -> String {
        let mut expected: Vec<char> = Vec::new();
        for edit in edits {
            match edit {
                TextEdit::Insert(c) => expected.push(*c),
                TextEdit::Newline => expected.push('\n'),
                TextEdit::DeleteLast => {
                    expected.pop();
                }
            }
        }
        expected.into_iter().collect()
    }

    #[test]
    fn buffer_matches_folded_edits() {
        let edits = [
            TextEdit::DeleteLast,
            TextEdit::Insert('H'),
            TextEdit::Insert('i'),
            TextEdit::Newline,
            TextEdit::Insert('é'),
            TextEdit::DeleteLast,
            TextEdit::DeleteLast,
            TextEdit::Insert('!'),
            TextEdit::DeleteLast,
            TextEdit::DeleteLast,
            TextEdit::DeleteLast,
            TextEdit::DeleteLast,
            TextEdit::Insert('x'),
        ];
        let mut buffer = InputBuffer::new();
        for (i, edit) in edits.iter().enumerate() {
            buffer.apply(*edit);
            assert_eq!(buffer.as_str(), fold(&edits[..=i]), "after edit {i}");
        }
        assert_eq!(buffer.as_str(), "x");
    }

    #[test]
    fn delete_on_empty_is_a_no_op() {
        let mut buffer = InputBuffer::new();
        assert!(!buffer.apply(TextEdit::DeleteLast));
        assert!(buffer.is_empty());
    }

    #[test]
    fn delete_removes_a_whole_multibyte_char() {
        let mut buffer = InputBuffer::new();
        buffer.append_char('a');
        buffer.append_char('ß');
        assert!(buffer.delete_last());
        assert_eq!(buffer.as_str(), "a");
    }

    #[test]
    fn key_mapping() {
        assert_eq!(
            TextEdit::from_key(&Key::Character("a".into())),
            Some(TextEdit::Insert('a'))
        );
        assert_eq!(TextEdit::from_key(&Key::Space), Some(TextEdit::Insert(' ')));
        assert_eq!(TextEdit::from_key(&Key::Enter), Some(TextEdit::Newline));
        assert_eq!(TextEdit::from_key(&Key::Backspace), Some(TextEdit::DeleteLast));
        assert_eq!(TextEdit::from_key(&Key::Character("ab".into())), None);
        assert_eq!(TextEdit::from_key(&Key::Tab), None);
        assert_eq!(TextEdit::from_key(&Key::Shift), None);
    }

    #[test]
    fn text_state_lines_keep_empty_lines() {
        let state = TextState::from("AB\n\nC");
        assert_eq!(state.lines().collect::<Vec<_>>(), vec!["AB", "", "C"]);
        assert!(!state.is_blank());
        assert!(TextState::from(" \n ").is_blank());
        assert!(TextState::default().is_blank());
    }
}
