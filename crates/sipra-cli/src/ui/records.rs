//! Events and registros lists.

use ratatui::{
  Frame,
  layout::{Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::Line,
  widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState},
};
use sipra_core::data::DataService;

use crate::{
  app::{ListScreen, Modal},
  kinds::{ConsoleKind, format_when},
};

/// Render a record list, its filter summary and any open modal.
pub fn draw<K: ConsoleKind, B: DataService>(f: &mut Frame, area: Rect, screen: &ListScreen<K, B>) {
  let view = &screen.view;
  let count = view.items().len();
  let title = if view.loading() {
    format!(" {} (loading…) ", K::LABEL)
  } else {
    format!(" {} ({count}) ", K::LABEL)
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let [filter_area, table_area] = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
  f.render_widget(
    Paragraph::new(filter_summary::<K, B>(screen)).style(Style::default().fg(Color::Yellow)),
    filter_area,
  );

  if !view.is_ready() {
    f.render_widget(
      Paragraph::new("No active area for this account.").style(Style::default().fg(Color::DarkGray)),
      table_area,
    );
  } else {
    draw_table::<K, B>(f, table_area, screen);
  }

  match &screen.modal {
    Some(Modal::Form { form, .. }) => super::draw_form(f, area, form),
    Some(Modal::Confirm(prompt)) => draw_confirm(f, area, &prompt.question()),
    None => {}
  }
}

fn draw_table<K: ConsoleKind, B: DataService>(f: &mut Frame, area: Rect, screen: &ListScreen<K, B>) {
  let header = Row::new(K::HEADERS.iter().copied()).style(
    Style::default()
      .fg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let rows = screen.view.items().iter().map(|item| Row::new(K::cells(item)));
  let widths = K::HEADERS.iter().enumerate().map(|(i, _)| match i {
    1 => Constraint::Fill(1),
    0 => Constraint::Length(17),
    _ => Constraint::Length(12),
  });

  let mut state = TableState::default();
  state.select((!screen.view.items().is_empty()).then_some(screen.cursor));

  f.render_stateful_widget(
    Table::new(rows, widths).header(header).row_highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    area,
    &mut state,
  );
}

fn filter_summary<K: ConsoleKind, B: DataService>(screen: &ListScreen<K, B>) -> String {
  let filter = screen.view.filter();
  let mut parts = Vec::new();
  if let Some(status) = filter.status {
    parts.push(format!("status = {status}"));
  }
  if let Some(text) = &filter.kind_contains {
    parts.push(format!("{} ~ {text:?}", K::KIND_LABEL.to_lowercase()));
  }
  match (filter.range.from, filter.range.to) {
    (None, None) => {}
    (from, to) => parts.push(format!(
      "{} … {}",
      from.map(format_when).unwrap_or_default(),
      to.map(format_when).unwrap_or_default()
    )),
  }
  if parts.is_empty() {
    "no filters".to_owned()
  } else {
    parts.join(", ")
  }
}

fn draw_confirm(f: &mut Frame, area: Rect, question: &str) {
  let popup = super::centered(area, question.chars().count() as u16 + 4, 5);
  let block = Block::default()
    .title(" Confirm ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let lines = vec![
    Line::raw(question.to_owned()),
    Line::raw(""),
    Line::styled("y delete  n keep", Style::default().fg(Color::DarkGray)),
  ];
  f.render_widget(Clear, popup);
  f.render_widget(Paragraph::new(lines).block(block), popup);
}
