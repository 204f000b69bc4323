// Text inputs and the small forms built from them.

use crossterm::event::KeyCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextInput {
    pub value: String,
    /// Cursor position in chars.
    cursor: usize,
    pub masked: bool,
}

impl TextInput {
    pub fn new(value: impl Into<String>, masked: bool) -> Self {
        let v = value.into();
        Self {
            cursor: v.chars().count(),
            value: v,
            masked,
        }
    }

    pub fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.set("");
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    /// Returns true when the key was consumed.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let at = self.byte_index(self.cursor - 1);
                    self.value.remove(at);
                    self.cursor -= 1;
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.len() {
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.len();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Field {
    pub label: &'static str,
    pub input: TextInput,
}

/// Labelled inputs in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Form {
    pub fields: Vec<Field>,
}

impl Form {
    pub fn new(fields: &[(&'static str, &str, bool)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(label, value, masked)| Field {
                    label: *label,
                    input: TextInput::new(*value, *masked),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn value(&self, idx: usize) -> &str {
        self.fields
            .get(idx)
            .map(|f| f.input.value.as_str())
            .unwrap_or("")
    }

    pub fn input_mut(&mut self, idx: usize) -> Option<&mut TextInput> {
        self.fields.get_mut(idx).map(|f| &mut f.input)
    }

    pub fn set(&mut self, idx: usize, value: impl Into<String>) {
        if let Some(input) = self.input_mut(idx) {
            input.set(value);
        }
    }

    /// Clear masked fields (after a failed or finished submission).
    pub fn clear_secrets(&mut self) {
        for f in &mut self.fields {
            if f.input.masked {
                f.input.clear();
            }
        }
    }
}
