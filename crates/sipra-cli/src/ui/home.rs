//! Home screen: who is signed in and what they may do.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};
use sipra_console::{Snapshot, Stage, view::role_label};

const NONE: &str = "—";

fn row(label: &str, value: impl Into<String>) -> Line<'static> {
  Line::from(vec![
    Span::styled(format!("{label:<14}"), Style::default().fg(Color::Cyan)),
    Span::raw(value.into()),
  ])
}

fn access(can_write: bool) -> &'static str { if can_write { "read and write" } else { "read only" } }

pub fn draw(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
  let user = snapshot.session.user();
  let profile = &snapshot.profile;
  let area_state = &snapshot.area;

  let profile_line = if profile.loading {
    "loading…".to_owned()
  } else {
    match &profile.profile {
      Stage::Ready(p) => p.full_name.clone().unwrap_or_else(|| NONE.to_owned()),
      Stage::Failed(e) => format!("{NONE} (lookup failed: {e})"),
      _ => NONE.to_owned(),
    }
  };
  let area_line = if area_state.loading {
    "loading…".to_owned()
  } else {
    area_state
      .area()
      .map_or_else(|| NONE.to_owned(), |a| format!("{} ({})", a.name, a.code))
  };

  let lines = vec![
    Line::styled(
      "Welcome to SIPRA",
      Style::default().add_modifier(Modifier::BOLD),
    ),
    Line::raw(""),
    row("User id", user.map_or_else(|| NONE.to_owned(), |u| u.id.to_string())),
    row(
      "Email",
      user
        .and_then(|u| u.email.clone())
        .unwrap_or_else(|| NONE.to_owned()),
    ),
    row("Name", profile_line),
    row("Role", role_label(profile.role())),
    row("Area", area_line),
    row("Area role", role_label(area_state.role())),
    Line::raw(""),
    row("Events", access(snapshot.events_access().can_write())),
    row("Registros", access(snapshot.registros_access().can_write())),
  ];

  let block = Block::default()
    .title(" Home ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  f.render_widget(Paragraph::new(lines).block(block), area);
}
