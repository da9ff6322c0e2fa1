//! Sign-in screen.

use ratatui::{Frame, layout::Rect};

use crate::form::Form;

pub fn draw(f: &mut Frame, area: Rect, form: &Form) { super::draw_form(f, area, form); }
