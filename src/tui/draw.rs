// Rendering. Pure functions of `App`; nothing here mutates state.

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::input::Form;
use super::{Action, App, FocusTarget, Modal, Notice, Screen, ROLE_FIELD};
use crate::wizard::Step;

const WINDOW_TITLE: &str = "Project Manager Setup";

pub(super) fn draw(area: Rect, f: &mut ratatui::Frame<'_>, app: &App) {
    let window_area = centered_window(area, 100, 30);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title(WINDOW_TITLE);
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    let screen = app.screen();
    let content_area = if let Screen::Setup(step) = screen {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(0)].as_ref())
            .split(rows[0]);
        draw_stepper(f, cols[0], step);
        cols[1]
    } else {
        rows[0]
    };

    draw_content(f, content_area, app, screen);
    draw_buttons(f, rows[1], app);

    match &app.modal {
        Some(Modal::ConfirmQuit) => draw_confirm_quit(f, window_area),
        Some(Modal::Message { title, body }) => draw_message_modal(f, window_area, title, body),
        None => {}
    }
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60).min(area.width);
    let h = height.min(area.height.saturating_sub(2)).max(20).min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn draw_stepper(f: &mut ratatui::Frame<'_>, area: Rect, current: Step) {
    let mut lines = vec![Line::from(""), Line::from(" Setup progress"), Line::from("")];
    for step in Step::ALL {
        let (marker, style) = if step.index() < current.index() || current.is_terminal() {
            ("[x]", Style::default().fg(Color::Green))
        } else if step == current {
            ("[>]", Style::default().add_modifier(Modifier::BOLD))
        } else {
            ("[ ]", Style::default().fg(Color::DarkGray))
        };
        lines.push(Line::from(Span::styled(
            format!(" {} {}", marker, step.title()),
            style,
        )));
    }
    let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn page_title(app: &App, screen: Screen) -> &'static str {
    match screen {
        Screen::Loading => {
            if app.session_view.is_loading() {
                "Loading"
            } else {
                "Redirecting"
            }
        }
        Screen::Setup(Step::CheckEngine) => "MySQL Status Check",
        Screen::Setup(Step::Connect) => "Connect to MySQL",
        Screen::Setup(Step::CreateDatabase) => "Setup Database",
        Screen::Setup(Step::CreateOwner) => "Create Owner Account",
        Screen::Setup(Step::ImportData) => "Import Existing Data",
        Screen::Setup(Step::Complete) => "Setup Completed Successfully",
        Screen::Login => "Login",
        Screen::Dashboard => "Project Management System",
        Screen::CreateUser => "Create New User",
        Screen::NotFound => "Page Not Found",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn form_lines(form: &Form, focus: FocusTarget) -> Vec<Line<'static>> {
    form.fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let focused = focus == FocusTarget::Field(i);
            let style = if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!(
                    "{} {}: {}",
                    if focused { ">" } else { " " },
                    field.label,
                    field.input.display()
                ),
                style,
            ))
        })
        .collect()
}

fn content_lines(app: &App, screen: Screen) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    match screen {
        Screen::Loading => {
            lines.push(Line::from("Please wait..."));
        }
        Screen::Setup(Step::CheckEngine) => {
            let status = app.wizard_view.engine_status();
            let checking = app.pending == Some(Action::RefreshEngine) || !app.engine_checked;
            let installed = if checking {
                "Unknown"
            } else {
                yes_no(status.installed)
            };
            let running = if checking || !status.installed {
                "Unknown"
            } else {
                yes_no(status.running)
            };
            lines.push(Line::from(format!("MySQL Installed: {}", installed)));
            lines.push(Line::from(format!("MySQL Service Running: {}", running)));
            lines.push(Line::from(""));
            if checking {
                lines.push(Line::from("Checking MySQL status..."));
            } else if !status.installed {
                lines.push(Line::from("MySQL Not Installed"));
                lines.push(Line::from(
                    "Install MySQL Server on this machine, then press Refresh.",
                ));
            } else if !status.running {
                lines.push(Line::from("MySQL Service Not Running"));
                lines.push(Line::from("Start the MySQL service, then press Refresh."));
            }
        }
        Screen::Setup(Step::Connect) => {
            lines.push(Line::from(
                "Enter the credentials of a MySQL account allowed to create databases.",
            ));
            lines.push(Line::from(""));
            lines.extend(form_lines(&app.connection, app.focus));
        }
        Screen::Setup(Step::CreateDatabase) => {
            if let Some(c) = app.wizard_view.credentials() {
                lines.push(Line::from(format!(
                    "Connected to {}:{} as {}",
                    c.host, c.port, c.user
                )));
            }
            lines.push(Line::from(
                "The database will be created (if missing) and the schema set up.",
            ));
            lines.push(Line::from(""));
            lines.extend(form_lines(&app.database, app.focus));
        }
        Screen::Setup(Step::CreateOwner) => {
            lines.push(Line::from(
                "The owner account has full access, including user management.",
            ));
            lines.push(Line::from(""));
            lines.extend(form_lines(&app.owner, app.focus));
        }
        Screen::Setup(Step::ImportData) => {
            lines.push(Line::from(
                "Optionally import data from an existing installation (.sql export).",
            ));
            lines.push(Line::from(""));
            lines.extend(form_lines(&app.import, app.focus));
            lines.push(Line::from(""));
            lines.push(Line::from("Enter the path to the file, or choose Skip."));
        }
        Screen::Setup(Step::Complete) => {
            lines.push(Line::from(
                "You can now log in with your owner account and start managing your projects.",
            ));
        }
        Screen::Login => {
            lines.push(Line::from("Project Management System"));
            lines.push(Line::from(""));
            if !app.session_view.configured {
                lines.push(Line::from(Span::styled(
                    "Database configuration not found. Run setup first.",
                    Style::default().fg(Color::Yellow),
                )));
                lines.push(Line::from(""));
            }
            lines.extend(form_lines(&app.login, app.focus));
        }
        Screen::Dashboard => {
            if let Some(user) = &app.session_view.user {
                lines.push(Line::from(format!("Welcome back, {}!", user.username)));
                lines.push(Line::from(format!("Role: {}", user.role)));
            }
            if let Some(db) = &app.session_view.database {
                lines.push(Line::from(format!("Database: {}", db)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Projects"));
            lines.push(Line::from(Span::styled(
                "No projects yet",
                Style::default().fg(Color::DarkGray),
            )));
        }
        Screen::CreateUser => {
            lines.push(Line::from("Add a new user to the system."));
            lines.push(Line::from(""));
            lines.extend(form_lines(&app.new_user, app.focus));
            let focused = app.focus == FocusTarget::Field(ROLE_FIELD);
            let style = if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "{} Role: < {} >",
                    if focused { ">" } else { " " },
                    app.new_user_role
                ),
                style,
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("Left/Right changes the role."));
        }
        Screen::NotFound => {
            lines.push(Line::from("404"));
            lines.push(Line::from("The page you are looking for does not exist."));
        }
    }
    lines
}

fn draw_content(f: &mut ratatui::Frame<'_>, area: Rect, app: &App, screen: Screen) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(area.inner(&Margin {
            vertical: 1,
            horizontal: 2,
        }));

    let title = Paragraph::new(Line::from(Span::styled(
        page_title(app, screen),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    f.render_widget(title, rows[0]);

    let body = Paragraph::new(Text::from(content_lines(app, screen))).wrap(Wrap { trim: false });
    f.render_widget(body, rows[1]);

    if let Some(notice) = &app.notice {
        let (text, color) = match notice {
            Notice::Info(m) => (m.as_str(), Color::Green),
            Notice::Error(m) => (m.as_str(), Color::Red),
        };
        let p = Paragraph::new(Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(color),
        )))
        .wrap(Wrap { trim: true });
        f.render_widget(p, rows[2]);
    }
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (i, action) in app.buttons().into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let label = if app.pending == Some(action) {
            action.busy_label()
        } else {
            action.label()
        };
        spans.push(button_text(
            label,
            app.focus == FocusTarget::Button(i),
            app.action_enabled(action),
        ));
    }
    let p = Paragraph::new(Text::from(Line::from(spans))).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn modal_area(window_area: Rect, width: u16, height: u16) -> Rect {
    let modal_w = width.min(window_area.width.saturating_sub(4)).max(40);
    let modal_h = height.min(window_area.height.saturating_sub(4)).max(7);
    Rect {
        x: window_area.x + (window_area.width.saturating_sub(modal_w)) / 2,
        y: window_area.y + (window_area.height.saturating_sub(modal_h)) / 2,
        width: modal_w,
        height: modal_h,
    }
}

fn modal_buttons_row(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    }
}

fn draw_confirm_quit(f: &mut ratatui::Frame<'_>, window_area: Rect) {
    let area = modal_area(window_area, 56, 7);
    f.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL).title("Quit?");
    let body = Paragraph::new(Text::from(vec![
        Line::from("Any step in progress will be left unfinished."),
        Line::from(""),
        Line::from(""),
    ]))
    .block(block)
    .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    let line = Line::from(vec![
        Span::styled("[ Yes, quit (Enter) ]", Style::default()),
        Span::raw(" "),
        Span::styled(
            "[ No (Esc) ]",
            Style::default().add_modifier(Modifier::REVERSED),
        ),
    ]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, modal_buttons_row(area));
}

fn draw_message_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, title: &str, body: &str) {
    let area = modal_area(window_area, 70, 10);
    f.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let p = Paragraph::new(Text::from(body.to_string()))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    let ok = Span::styled("[ OK ]", Style::default().add_modifier(Modifier::REVERSED));
    let p = Paragraph::new(Text::from(Line::from(vec![ok]))).alignment(Alignment::Right);
    f.render_widget(p, modal_buttons_row(area));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 120, 40);
        let w = centered_window(area, 100, 30);
        assert_eq!((w.x, w.y, w.width, w.height), (10, 5, 100, 30));

        let small = Rect::new(0, 0, 50, 15);
        let w = centered_window(small, 100, 30);
        assert!(w.width <= 50 && w.height <= 15);
    }

    #[test]
    fn disabled_buttons_are_never_highlighted() {
        let span = button_text("Next", true, false);
        assert_eq!(span.content, "[ Next ]");
        assert!(!span.style.add_modifier.contains(Modifier::REVERSED));
        assert_eq!(span.style.fg, Some(Color::DarkGray));

        let span = button_text("Next", true, true);
        assert!(span.style.add_modifier.contains(Modifier::REVERSED));
    }
}
