//! Modal forms: a column of labelled fields edited in place.

use crossterm::event::{KeyCode, KeyEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  /// Text shown masked.
  Secret,
  /// One of a fixed set of values, cycled with ←/→ or space.
  Choice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
  pub label: &'static str,
  pub kind:  FieldKind,
  pub value: String,
}

impl Field {
  pub fn text(label: &'static str, value: impl Into<String>) -> Self {
    Self {
      label,
      kind: FieldKind::Text,
      value: value.into(),
    }
  }

  pub fn secret(label: &'static str) -> Self {
    Self {
      label,
      kind: FieldKind::Secret,
      value: String::new(),
    }
  }

  /// A choice field starting at `selected`, or at the first option when
  /// `selected` is not one of them.
  pub fn choice(label: &'static str, options: Vec<String>, selected: &str) -> Self {
    let value = if options.iter().any(|o| o == selected) {
      selected.to_owned()
    } else {
      options.first().cloned().unwrap_or_default()
    };
    Self {
      label,
      kind: FieldKind::Choice(options),
      value,
    }
  }

  /// The value as it should be rendered.
  pub fn display(&self) -> String {
    match &self.kind {
      FieldKind::Text => self.value.clone(),
      FieldKind::Secret => "•".repeat(self.value.chars().count()),
      FieldKind::Choice(_) => format!("‹ {} ›", self.value),
    }
  }

  fn cycle(&mut self, forward: bool) {
    let FieldKind::Choice(options) = &self.kind else {
      return;
    };
    if options.is_empty() {
      return;
    }
    let at = options.iter().position(|o| *o == self.value).unwrap_or(0);
    let next = if forward {
      (at + 1) % options.len()
    } else {
      (at + options.len() - 1) % options.len()
    };
    self.value = options[next].clone();
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
  Continue,
  Submit,
  Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
  pub title:  String,
  pub fields: Vec<Field>,
  pub focus:  usize,
  /// Shown under the fields; set when a submit is refused.
  pub error:  Option<String>,
}

impl Form {
  pub fn new(title: impl Into<String>, fields: Vec<Field>) -> Self {
    Self {
      title: title.into(),
      fields,
      focus: 0,
      error: None,
    }
  }

  /// Value of the field labelled `label`, or `""`.
  pub fn value(&self, label: &str) -> &str {
    self
      .fields
      .iter()
      .find(|f| f.label == label)
      .map_or("", |f| f.value.as_str())
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
    let count = self.fields.len();
    match key.code {
      KeyCode::Esc => return FormAction::Cancel,
      KeyCode::Enter => return FormAction::Submit,
      KeyCode::Tab | KeyCode::Down if count > 0 => self.focus = (self.focus + 1) % count,
      KeyCode::BackTab | KeyCode::Up if count > 0 => self.focus = (self.focus + count - 1) % count,
      code => {
        let Some(field) = self.fields.get_mut(self.focus) else {
          return FormAction::Continue;
        };
        match (&field.kind, code) {
          (FieldKind::Choice(_), KeyCode::Right | KeyCode::Char(' ')) => field.cycle(true),
          (FieldKind::Choice(_), KeyCode::Left) => field.cycle(false),
          (FieldKind::Choice(_), _) => {}
          (_, KeyCode::Char(c)) => field.value.push(c),
          (_, KeyCode::Backspace) => {
            field.value.pop();
          }
          _ => {}
        }
      }
    }
    FormAction::Continue
  }
}
