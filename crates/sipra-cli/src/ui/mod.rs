//! TUI rendering for every screen.

pub mod home;
pub mod login;
pub mod records;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Flex, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph},
};
use sipra_console::{GuardDecision, Route};
use sipra_core::{auth::AuthService, data::DataService};

use crate::{app::App, form::Form};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<B: AuthService + DataService + 'static>(f: &mut Frame, app: &App<B>) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header<B>(f: &mut Frame, area: Rect, app: &App<B>) {
  let nav = if app.snapshot.session.session.is_some() {
    " sipra  [1] home  [2] events  [3] registros  [o] sign out  [q] quit"
  } else {
    " sipra"
  };
  let left = Span::styled(
    nav,
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );

  let who = app
    .snapshot
    .session
    .user()
    .and_then(|u| u.email.clone())
    .unwrap_or_default();
  let date = Local::now().format("%Y-%m-%d").to_string();
  let right = Span::styled(format!("{who}  {date} "), Style::default().fg(Color::Gray));

  let pad = area
    .width
    .saturating_sub(left.width() as u16)
    .saturating_sub(right.width() as u16);

  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::DarkGray)),
    area,
  );
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body<B: AuthService + DataService + 'static>(f: &mut Frame, area: Rect, app: &App<B>) {
  match app.decision() {
    // Redirects are followed on the next tick; show the placeholder meanwhile.
    GuardDecision::Loading | GuardDecision::Redirect { .. } => {
      draw_placeholder(f, area, "Loading session…")
    }
    GuardDecision::Render => match app.route {
      Route::Login => login::draw(f, area, &app.login),
      Route::Home => home::draw(f, area, &app.snapshot),
      Route::Events => records::draw(f, area, &app.events),
      Route::Registros => records::draw(f, area, &app.registros),
      Route::NotFound => draw_placeholder(f, area, "Nothing here. Press 1 to go home."),
    },
  }
}

fn draw_placeholder(f: &mut Frame, area: Rect, text: &str) {
  let [row] = Layout::vertical([Constraint::Length(1)])
    .flex(Flex::Center)
    .areas(area);
  f.render_widget(
    Paragraph::new(text)
      .centered()
      .style(Style::default().fg(Color::DarkGray)),
    row,
  );
}

// ─── Forms ────────────────────────────────────────────────────────────────────

/// A `width`×`height` rectangle centred in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
    .flex(Flex::Center)
    .areas(area);
  let [cell] = Layout::horizontal([Constraint::Length(width.min(area.width))])
    .flex(Flex::Center)
    .areas(row);
  cell
}

/// Draw `form` as a popup over `area`.
pub fn draw_form(f: &mut Frame, area: Rect, form: &Form) {
  let label_width = form
    .fields
    .iter()
    .map(|field| field.label.len())
    .max()
    .unwrap_or(0);

  let mut lines: Vec<Line> = form
    .fields
    .iter()
    .enumerate()
    .map(|(i, field)| {
      let focused = i == form.focus;
      let marker = if focused { "›" } else { " " };
      let value_style = if focused {
        Style::default()
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default()
      };
      let cursor = if focused && !matches!(field.kind, crate::form::FieldKind::Choice(_)) {
        "_"
      } else {
        ""
      };
      Line::from(vec![
        Span::styled(
          format!("{marker} {:<label_width$}  ", field.label),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("{}{cursor}", field.display()), value_style),
      ])
    })
    .collect();

  lines.push(Line::raw(""));
  match &form.error {
    Some(error) => lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red))),
    None => lines.push(Line::styled(
      "Tab next  ←/→ choose  Enter submit  Esc cancel",
      Style::default().fg(Color::DarkGray),
    )),
  }

  let popup = centered(area, 64, lines.len() as u16 + 2);
  let block = Block::default()
    .title(format!(" {} ", form.title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));
  f.render_widget(Clear, popup);
  f.render_widget(Paragraph::new(lines).block(block), popup);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<B: AuthService + DataService + 'static>(f: &mut Frame, area: Rect, app: &App<B>) {
  let (mode_label, hints, message) = match (app.decision(), app.route) {
    (GuardDecision::Render, Route::Login) => ("LOGIN", "Tab next field  Enter sign in  Ctrl-C quit", None),
    (GuardDecision::Render, Route::Home) => ("HOME", "r reload profile and area", None),
    (GuardDecision::Render, Route::Events) => (
      "EVENTS",
      "↑↓/jk move  / filter  n new  e edit  c close  d delete  r refresh",
      app.events.message(),
    ),
    (GuardDecision::Render, Route::Registros) => (
      "REGISTROS",
      "↑↓/jk move  / filter  n new  e edit  c close  r refresh",
      app.registros.message(),
    ),
    _ => ("…", "q quit", None),
  };

  let status = message
    .or((!app.status.is_empty()).then_some(app.status.as_str()))
    .unwrap_or(hints);

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(format!("  {status}"), Style::default().fg(Color::Gray));

  f.render_widget(
    Paragraph::new(Line::from(vec![mode_span, hint_span])).style(Style::default().bg(Color::Black)),
    area,
  );
}
