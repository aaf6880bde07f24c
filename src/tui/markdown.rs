//! Markdown → ratatui `Text` for assistant replies.
//!
//! Walks `pulldown_cmark` events and emits styled lines: headings, emphasis,
//! inline code, fenced code blocks (highlighted with syntect when the
//! language is known), lists, task items, blockquotes, links, rules and
//! GFM tables.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use unicode_width::UnicodeWidthStr;

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";
const TAB: &str = "    ";

/// Renders `content` with `base_fg` as the color of plain text.
pub fn render(content: &str, base_fg: Color) -> Text<'static> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_TABLES);

    let mut renderer = Renderer::new(base_fg);
    for event in Parser::new_ext(content, options) {
        renderer.event(event);
    }
    renderer.text
}

fn border() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn expand_tabs(s: &str) -> String {
    s.replace('\t', TAB)
}

/// Cells collected while inside a table; flushed as aligned lines at the end.
#[derive(Default)]
struct TableBuffer {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    has_header: bool,
}

struct Renderer {
    text: Text<'static>,
    base_fg: Color,
    /// Nested inline styles; each entry is already patched onto its parent.
    styles: Vec<Style>,
    /// Drawn at the start of every new line (blockquote and code gutters).
    gutters: Vec<Span<'static>>,
    /// One entry per open list: `None` for bullets, `Some(next)` for numbers.
    lists: Vec<Option<u64>>,
    highlighter: Option<HighlightLines<'static>>,
    in_code: bool,
    link: Option<String>,
    table: Option<TableBuffer>,
    /// A block just ended; the next one starts after a blank line.
    pending_gap: bool,
}

impl Renderer {
    fn new(base_fg: Color) -> Self {
        Self {
            text: Text::default(),
            base_fg,
            styles: Vec::new(),
            gutters: Vec::new(),
            lists: Vec::new(),
            highlighter: None,
            in_code: false,
            link: None,
            table: None,
            pending_gap: false,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.base_fg))
    }

    fn push_style(&mut self, overlay: Style) {
        self.styles.push(self.style().patch(overlay));
    }

    fn new_line(&mut self, line: Line<'static>) {
        let mut spans = self.gutters.clone();
        spans.extend(line.spans);
        self.text.lines.push(Line::from(spans));
    }

    fn span(&mut self, span: Span<'static>) {
        if let Some(table) = &mut self.table {
            table.cell.push_str(&span.content);
            return;
        }
        match self.text.lines.last_mut() {
            Some(line) => line.push_span(span),
            None => self.new_line(Line::from(span)),
        }
    }

    fn gap(&mut self) {
        if self.pending_gap {
            self.new_line(Line::default());
            self.pending_gap = false;
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(text),
            Event::Code(code) => self.span(Span::styled(
                code.to_string(),
                Style::default().fg(Color::White).bg(Color::DarkGray),
            )),
            Event::SoftBreak => self.span(Span::raw(" ")),
            Event::HardBreak => self.new_line(Line::default()),
            Event::Rule => {
                self.gap();
                self.new_line(Line::from(Span::styled("─".repeat(40), border())));
                self.pending_gap = true;
            }
            Event::TaskListMarker(done) => {
                self.span(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.gap();
                self.new_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.gap();
                let style = heading_style(self.base_fg, level);
                self.new_line(Line::from(Span::styled(
                    format!("{} ", "#".repeat(level as usize)),
                    style,
                )));
                self.push_style(style);
            }
            Tag::BlockQuote(_) => {
                self.gap();
                self.gutters.push(Span::styled("│ ", border()));
                self.push_style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => self.open_code(kind),
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.gap();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}- "),
                };
                self.new_line(Line::from(Span::styled(marker, border())));
            }
            Tag::Table(_) => {
                self.gap();
                self.table = Some(TableBuffer::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    table.cell.clear();
                }
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.to_string());
                self.push_style(link_style());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.pending_gap = true,
            TagEnd::Heading(_) | TagEnd::BlockQuote(_) => {
                if matches!(tag, TagEnd::BlockQuote(_)) {
                    self.gutters.pop();
                }
                self.styles.pop();
                self.pending_gap = true;
            }
            TagEnd::CodeBlock => {
                self.highlighter = None;
                self.in_code = false;
                self.gutters.pop();
                self.new_line(Line::from(Span::styled("╰──", border())));
                self.pending_gap = true;
            }
            TagEnd::List(_) => {
                self.lists.pop();
                self.pending_gap = true;
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    if matches!(tag, TagEnd::TableHead) {
                        table.has_header = true;
                    }
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.flush_table(table);
                }
                self.pending_gap = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(url) = self.link.take() {
                    self.span(Span::raw(" ("));
                    self.span(Span::styled(url, link_style()));
                    self.span(Span::raw(")"));
                }
            }
            _ => {}
        }
    }

    fn open_code(&mut self, kind: CodeBlockKind<'_>) {
        if !self.text.lines.is_empty() {
            self.new_line(Line::default());
        }
        self.pending_gap = false;

        let lang = match &kind {
            CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
            CodeBlockKind::Indented => "",
        };
        let top = if lang.is_empty() {
            Line::from(Span::styled("╭──", border()))
        } else {
            Line::from(vec![
                Span::styled("╭── ", border()),
                Span::styled(lang.to_string(), border().add_modifier(Modifier::BOLD)),
                Span::styled(" ──", border()),
            ])
        };
        self.new_line(top);
        self.gutters.push(Span::styled("│ ", border()));

        self.in_code = true;
        if !lang.is_empty()
            && let Some(syntax) = SYNTAXES.find_syntax_by_token(lang)
            && let Some(theme) = THEMES.themes.get(CODE_THEME)
        {
            self.highlighter = Some(HighlightLines::new(syntax, theme));
        }
    }

    fn text(&mut self, text: CowStr<'_>) {
        if let Some(mut highlighter) = self.highlighter.take() {
            for line in LinesWithEndings::from(&text) {
                let spans = match highlighter.highlight_line(line, &SYNTAXES) {
                    Ok(ranges) => ranges
                        .into_iter()
                        .map(|(style, fragment)| {
                            let fg = Color::Rgb(
                                style.foreground.r,
                                style.foreground.g,
                                style.foreground.b,
                            );
                            Span::styled(
                                expand_tabs(fragment.trim_end_matches('\n')),
                                Style::default().fg(fg),
                            )
                        })
                        .filter(|span| !span.content.is_empty())
                        .collect(),
                    Err(_) => vec![Span::raw(expand_tabs(line.trim_end_matches('\n')))],
                };
                self.new_line(Line::from(spans));
            }
            self.highlighter = Some(highlighter);
            return;
        }

        if self.in_code {
            let style = Style::default().fg(Color::White);
            for line in text.lines() {
                self.new_line(Line::from(Span::styled(expand_tabs(line), style)));
            }
            return;
        }

        let style = self.style();
        self.span(Span::styled(expand_tabs(&text), style));
    }

    fn flush_table(&mut self, table: TableBuffer) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let base = Style::default().fg(self.base_fg);
        for (r, row) in table.rows.iter().enumerate() {
            let is_header = table.has_header && r == 0;
            let style = if is_header {
                base.add_modifier(Modifier::BOLD)
            } else {
                base
            };

            let mut spans = Vec::new();
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" │ ", border()));
                }
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(cell.width());
                spans.push(Span::styled(format!("{cell}{}", " ".repeat(pad)), style));
            }
            self.new_line(Line::from(spans));

            if is_header {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.new_line(Line::from(Span::styled(rule.join("─┼─"), border())));
            }
        }
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED)
}

fn heading_style(base_fg: Color, level: HeadingLevel) -> Style {
    let modifier = match level {
        HeadingLevel::H1 => Modifier::BOLD | Modifier::UNDERLINED,
        HeadingLevel::H2 => Modifier::BOLD,
        _ => Modifier::BOLD | Modifier::ITALIC,
    };
    Style::default().fg(base_fg).add_modifier(modifier)
}
