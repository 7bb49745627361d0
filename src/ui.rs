use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, CommitsMode};
use crate::dialog::Dialog;
use crate::keymap;
use crate::layout::{MIN_HEIGHT, MIN_WIDTH};
use crate::pane::{PaneId, PaneModel};
use crate::parse::{BranchEntry, CommitEntry, FileEntry, ReflogEntry, StashEntry};

const ACCENT: Color = Color::Green;
const BORDER_INACTIVE: Color = Color::DarkGray;
const DIM: Color = Color::DarkGray;
const SELECTION_BG: Color = Color::Rgb(40, 60, 90);
const HASH: Color = Color::Yellow;
const ADDED: Color = Color::Green;
const REMOVED: Color = Color::Red;
const HUNK: Color = Color::Cyan;
const ERROR: Color = Color::Red;

const TAB_WIDTH: usize = 4;
const DEFAULT_BRANCH: &str = "master";

pub fn display_width(s: &str) -> usize {
    s.chars()
        .map(|ch| {
            if ch == '\t' {
                TAB_WIDTH
            } else {
                UnicodeWidthChar::width(ch).unwrap_or(0)
            }
        })
        .sum()
}

pub fn truncate_to_width(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut wsum = 0usize;
    for ch in s.chars() {
        let w = if ch == '\t' {
            TAB_WIDTH
        } else {
            UnicodeWidthChar::width(ch).unwrap_or(0)
        };
        if wsum + w > width {
            break;
        }
        out.push(ch);
        wsum += w;
    }
    out
}

fn expand_tabs(s: &str) -> String {
    s.replace('\t', &" ".repeat(TAB_WIDTH))
}

fn pane_block<'a>(title: Line<'a>, focused: bool) -> Block<'a> {
    let border = if focused { ACCENT } else { BORDER_INACTIVE };
    Block::default()
        .borders(Borders::ALL)
        .border_set(ratatui::symbols::border::ROUNDED)
        .border_style(Style::default().fg(border))
        .title(title)
}

fn plain_title(pane: PaneId) -> Line<'static> {
    Line::from(format!(" {} ", pane.title()))
}

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    if app.layout.is_too_small() {
        let msg = format!("Terminal too small (min {MIN_WIDTH}x{MIN_HEIGHT})");
        let y = area.y + area.height / 2;
        let y = y.min(area.bottom().saturating_sub(1));
        let row = Rect::new(area.x, y, area.width, area.height.min(1));
        f.render_widget(Paragraph::new(truncate_to_width(&msg, area.width as usize)), row);
        return;
    }

    let rect = |pane: PaneId| app.layout.pane_rect(pane).intersection(area);

    draw_status(f, app, rect(PaneId::Status));
    draw_list(
        f,
        rect(PaneId::Files),
        plain_title(PaneId::Files),
        &app.files,
        "(no changed files)",
        file_line,
    );
    draw_list(
        f,
        rect(PaneId::Branches),
        plain_title(PaneId::Branches),
        &app.branches,
        "(no branches)",
        branch_line,
    );
    let commits_title = commits_title(app.commits_mode);
    match app.commits_mode {
        CommitsMode::Commits => draw_list(
            f,
            rect(PaneId::Commits),
            commits_title,
            &app.commits,
            "(no commits)",
            commit_line,
        ),
        CommitsMode::Reflog => draw_list(
            f,
            rect(PaneId::Commits),
            commits_title,
            &app.reflog,
            "(no reflog)",
            reflog_line,
        ),
    }
    draw_list(
        f,
        rect(PaneId::Stash),
        plain_title(PaneId::Stash),
        &app.stash,
        "(no stash entries)",
        stash_line,
    );
    draw_text(f, rect(PaneId::Main), PaneId::Main, &app.main, "", diff_style);
    draw_text(
        f,
        rect(PaneId::CommandLog),
        PaneId::CommandLog,
        &app.command_log,
        "(no commands executed)",
        |_| Style::default(),
    );
    draw_info_bar(f, app, app.layout.info_bar_rect().intersection(area));

    if let Some(dialog) = &app.dialog {
        draw_dialog(f, dialog, area);
    }
}

fn draw_status(f: &mut Frame, app: &App, rect: Rect) {
    let branch = if app.branch_name.is_empty() {
        DEFAULT_BRANCH
    } else {
        app.branch_name.as_str()
    };
    let line = Line::from(vec![
        Span::styled(app.repo_name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" → "),
        Span::styled(branch.to_string(), Style::default().fg(ACCENT)),
    ]);
    let block = pane_block(plain_title(PaneId::Status), false);
    f.render_widget(Paragraph::new(line).block(block), rect);
}

fn commits_title(mode: CommitsMode) -> Line<'static> {
    let active = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
    let inactive = Style::default().fg(DIM);
    let (commits, reflog) = match mode {
        CommitsMode::Commits => (active, inactive),
        CommitsMode::Reflog => (inactive, active),
    };
    Line::from(vec![
        Span::raw(" "),
        Span::styled("Commits", commits),
        Span::raw(" | "),
        Span::styled("Reflog", reflog),
        Span::raw(" "),
    ])
}

fn draw_list<T>(
    f: &mut Frame,
    rect: Rect,
    title: Line<'static>,
    model: &PaneModel<T>,
    empty: &str,
    render: fn(&T) -> Line<'static>,
) {
    let block = pane_block(title, model.is_focused());
    if model.is_empty() {
        let text = Span::styled(empty.to_string(), Style::default().fg(DIM));
        let placeholder = Paragraph::new(text).block(block);
        f.render_widget(placeholder, rect);
        return;
    }

    let items: Vec<ListItem> = model
        .items()
        .iter()
        .map(|item| ListItem::new(render(item)))
        .collect();
    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(SELECTION_BG)
            .add_modifier(Modifier::BOLD),
    );
    let selected = if model.is_focused() { model.cursor() } else { None };
    let mut state = ListState::default()
        .with_offset(model.scroll_offset())
        .with_selected(selected);
    f.render_stateful_widget(list, rect, &mut state);
}

fn draw_text(
    f: &mut Frame,
    rect: Rect,
    pane: PaneId,
    model: &PaneModel<String>,
    empty: &str,
    style_for: fn(&str) -> Style,
) {
    let block = pane_block(plain_title(pane), model.is_focused());
    let inner = rect.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let lines: Vec<Line> = if model.is_empty() {
        vec![Line::from(Span::styled(empty.to_string(), Style::default().fg(DIM)))]
    } else {
        model
            .items()
            .iter()
            .skip(model.scroll_offset())
            .take(inner.height as usize)
            .map(|l| {
                let text = truncate_to_width(&expand_tabs(l), inner.width as usize);
                Line::from(Span::styled(text, style_for(l)))
            })
            .collect()
    };
    f.render_widget(Paragraph::new(lines).block(block), rect);
}

fn diff_style(line: &str) -> Style {
    if line.starts_with("diff --git") || line.starts_with("commit ") {
        Style::default().fg(HASH).add_modifier(Modifier::BOLD)
    } else if line.starts_with("+++") || line.starts_with("---") {
        Style::default().add_modifier(Modifier::BOLD)
    } else if line.starts_with("@@") {
        Style::default().fg(HUNK)
    } else if line.starts_with('+') {
        Style::default().fg(ADDED)
    } else if line.starts_with('-') {
        Style::default().fg(REMOVED)
    } else {
        Style::default()
    }
}

fn file_line(entry: &FileEntry) -> Line<'static> {
    let color = if entry.staged { ADDED } else { REMOVED };
    let path = match &entry.renamed_from {
        Some(from) => format!("{from} → {}", entry.path),
        None => entry.path.clone(),
    };
    Line::from(vec![
        Span::styled(format!("{} ", entry.status), Style::default().fg(color)),
        Span::raw(path),
    ])
}

fn branch_line(branch: &BranchEntry) -> Line<'static> {
    let (marker, style) = if branch.is_current {
        ("* ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
    } else {
        ("  ", Style::default())
    };
    let mut spans = vec![Span::styled(format!("{marker}{}", branch.name), style)];
    if let Some(track) = &branch.track {
        spans.push(Span::styled(format!(" {track}"), Style::default().fg(HASH)));
    }
    Line::from(spans)
}

fn commit_line(commit: &CommitEntry) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{} ", commit.hash), Style::default().fg(HASH)),
        Span::raw(commit.message.clone()),
    ])
}

fn reflog_line(entry: &ReflogEntry) -> Line<'static> {
    let subject = if entry.action.is_empty() {
        entry.message.clone()
    } else {
        format!("{}: {}", entry.action, entry.message)
    };
    Line::from(vec![
        Span::styled(format!("{} ", entry.hash), Style::default().fg(HASH)),
        Span::styled(format!("{} ", entry.selector), Style::default().fg(DIM)),
        Span::raw(subject),
    ])
}

fn stash_line(entry: &StashEntry) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{} ", entry.stash_ref), Style::default().fg(HASH)),
        Span::raw(entry.message.clone()),
    ])
}

fn draw_info_bar(f: &mut Frame, app: &App, rect: Rect) {
    let left = match (&app.status_message, &app.last_command) {
        (Some((msg, _)), _) => Span::styled(msg.clone(), Style::default().fg(ACCENT)),
        (None, Some(cmd)) => Span::styled(format!("$ {cmd}"), Style::default().fg(DIM)),
        (None, None) => Span::styled("gitzen", Style::default().fg(DIM)),
    };
    let help = keymap::help(app.focus);

    let width = rect.width as usize;
    let left_width = display_width(&left.content).min(width);
    let help = truncate_to_width(&help, width.saturating_sub(left_width + 3));
    let line = Line::from(vec![
        left,
        Span::styled("  ", Style::default()),
        Span::styled(help, Style::default().fg(DIM)),
    ]);
    f.render_widget(Paragraph::new(line), rect);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width - w) / 2;
    let y = area.y + (area.height - h) / 2;
    Rect::new(x, y, w, h)
}

fn draw_dialog(f: &mut Frame, dialog: &Dialog, area: Rect) {
    let width = area.width.saturating_sub(4).min(70);
    let inner_width = width.saturating_sub(4).max(1) as usize;

    let (border, body, hint): (Color, Vec<Line>, &str) = match dialog {
        Dialog::Commit { .. } | Dialog::CreateBranch { .. } => {
            (ACCENT, Vec::new(), "enter: submit | esc: cancel")
        }
        Dialog::Confirm { .. } => (HASH, Vec::new(), "y/enter: confirm | n/esc: cancel"),
        Dialog::Error { message } => (
            ERROR,
            message.lines().map(|l| Line::raw(l.to_string())).collect(),
            "enter/esc: close",
        ),
    };
    let body_rows: usize = body
        .iter()
        .map(|l| (l.width().max(1)).div_ceil(inner_width))
        .sum::<usize>()
        .max(1);
    let height = (body_rows as u16).saturating_add(4).min(area.height.saturating_sub(2).max(5));

    let modal = centered(area, width, height);
    f.render_widget(Clear, modal);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(ratatui::symbols::border::ROUNDED)
        .border_style(Style::default().fg(border))
        .title(format!(" {} ", dialog.title()));
    f.render_widget(block, modal);

    let inner = modal.inner(Margin {
        vertical: 1,
        horizontal: 2,
    });
    if inner.height == 0 {
        return;
    }
    let body_rect = Rect::new(inner.x, inner.y, inner.width, inner.height.saturating_sub(1).max(1));
    let hint_rect = Rect::new(inner.x, inner.bottom().saturating_sub(1), inner.width, 1);

    if let Some(input) = dialog.input() {
        let visible = truncate_to_width(input.value(), inner.width as usize);
        f.render_widget(Paragraph::new(visible), body_rect);

        let before: String = input.value().chars().take(input.cursor()).collect();
        let cursor_x = inner
            .x
            .saturating_add(display_width(&before) as u16)
            .min(inner.right().saturating_sub(1));
        f.set_cursor_position((cursor_x, inner.y));
    } else if !body.is_empty() {
        f.render_widget(Paragraph::new(body).wrap(Wrap { trim: false }), body_rect);
    }

    if inner.height >= 2 {
        f.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(DIM))),
            hint_rect,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Event;
    use crate::config::Config;
    use crate::dispatch::Outcome;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};

    fn render(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app(width: u16, height: u16) -> App {
        let mut app = App::new("demo".to_string(), &Config::default());
        app.update(Event::Resize { width, height });
        app
    }

    #[test]
    fn test_too_small_message() {
        let app = app(50, 12);
        let screen = render(&app, 50, 12);
        assert!(screen.contains("Terminal too small (min 60x15)"));
        assert!(!screen.contains("Files"));
    }

    #[test]
    fn test_empty_repository_placeholders() {
        let app = app(120, 40);
        let screen = render(&app, 120, 40);
        assert!(screen.contains("demo → master"));
        assert!(screen.contains("(no changed files)"));
        assert!(screen.contains("(no commits)"));
        assert!(screen.contains("(no stash entries)"));
        assert!(screen.contains("(no commands executed)"));
        assert!(screen.contains("Commits | Reflog"));
    }

    #[test]
    fn test_lists_and_diff_render() {
        let mut app = app(120, 40);
        app.update(Event::Outcome(Outcome::BranchLoaded("main".to_string())));
        app.update(Event::Outcome(Outcome::StatusLoaded(vec![FileEntry {
            path: "src/lib.rs".to_string(),
            status: 'M',
            staged: true,
            renamed_from: None,
        }])));
        let generation = app.diff_generation();
        app.update(Event::Outcome(Outcome::DiffLoaded {
            generation,
            text: "@@ -1 +1 @@\n-old\n+new".to_string(),
        }));

        let screen = render(&app, 120, 40);
        assert!(screen.contains("demo → main"));
        assert!(screen.contains("M src/lib.rs"));
        assert!(screen.contains("+new"));
    }

    #[test]
    fn test_error_dialog_overlay() {
        let mut app = app(100, 30);
        app.update(Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
        app.update(Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        let screen = render(&app, 100, 30);
        assert!(screen.contains("Commit message is empty"));
        assert!(screen.contains("enter/esc: close"));
    }

    #[test]
    fn test_truncate_to_width_handles_wide_chars() {
        assert_eq!(truncate_to_width("日本語", 4), "日本");
        assert_eq!(truncate_to_width("abc", 10), "abc");
        assert_eq!(display_width("a\tb"), 6);
    }
}
