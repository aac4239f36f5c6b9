use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Yellow,
    Red,
}

/// Completion report of a flow. The binary decides how to draw it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub color: Color,
    pub text: Vec<String>,
    pub centered: bool,
}

impl Message {
    pub fn new(title: impl Into<String>, color: Color) -> Self {
        Self {
            title: title.into(),
            color,
            text: Vec::new(),
            centered: false,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.text.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
