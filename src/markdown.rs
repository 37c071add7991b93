//! Card rendering for finished analyses, and colored terminal output for
//! the markdown those cards are written in.

use std::io::Write;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::analyzer::AnalyzedTask;
use crate::error::Result;
use crate::pipeline::ContentSource;

/// Render an analysed task as a markdown card
pub fn render_card(analyzed: &AnalyzedTask) -> String {
    let task = &analyzed.task;
    let analysis = &analyzed.analysis;
    let mut card = format!("## {}\n\n", task.subject());

    let mut meta = vec![format!("line {}", task.line_number)];
    meta.extend(task.tags.iter().map(|tag| format!("#{}", tag)));
    card.push_str(&format!("*{}*\n\n", meta.join(" · ")));

    card.push_str(&format!("**Context:** {}\n\n", analysis.context));
    card.push_str(&format!("{}\n\n", analysis.description));

    card.push_str("### Next steps\n\n");
    for (i, step) in analysis.next_steps.iter().enumerate() {
        card.push_str(&format!("{}. {}\n", i + 1, step));
    }

    card.push_str("\n### Search\n\n");
    for query in &analysis.suggested_search_queries {
        card.push_str(&format!("- `{}`\n", query));
    }

    if !analyzed.sources.is_empty() {
        card.push_str("\n### Sources\n\n");
        for source in &analyzed.sources {
            let label = source.title.as_deref().unwrap_or(&source.url);
            let via = match (source.source, source.strategy) {
                (ContentSource::Cache, _) => "cached".to_string(),
                (ContentSource::RawContent, Some(strategy)) => format!("{}, unsummarised", strategy),
                (_, Some(strategy)) => strategy.to_string(),
                (_, None) => "unknown".to_string(),
            };
            card.push_str(&format!("- [{}]({}) ({})\n", label, source.url, via));
        }
    }
    card
}

/// Print markdown to stdout with colors and styling
pub fn format_markdown(markdown: &str) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    write_markdown(&mut stdout, markdown)
}

/// Write markdown to any color-capable writer
pub fn write_markdown<W: WriteColor>(out: &mut W, markdown: &str) -> Result<()> {
    let parser = Parser::new_ext(markdown, Options::all());
    let mut format_state = FormatState::new();

    for event in parser {
        format_state.handle_event(out, event)?;
    }
    out.reset()?;
    Ok(())
}

/// Tracks the current formatting state
struct FormatState {
    list_stack: Vec<Option<u64>>,
    format_stack: Vec<ColorSpec>,
}

impl FormatState {
    fn new() -> Self {
        Self {
            list_stack: Vec::new(),
            format_stack: Vec::new(),
        }
    }

    fn handle_event<W: WriteColor>(&mut self, out: &mut W, event: Event) -> Result<()> {
        match event {
            Event::Start(tag) => self.handle_start(out, tag),
            Event::End(tag_end) => self.handle_end(out, tag_end),
            Event::Text(text) => Ok(write!(out, "{}", text)?),
            Event::Code(code) => self.write_inline_code(out, &code),
            Event::SoftBreak | Event::HardBreak => Ok(writeln!(out)?),
            _ => Ok(()),
        }
    }

    fn push_style<W: WriteColor>(&mut self, out: &mut W, spec: ColorSpec) -> Result<()> {
        out.set_color(&spec)?;
        self.format_stack.push(spec);
        Ok(())
    }

    fn pop_style<W: WriteColor>(&mut self, out: &mut W) -> Result<()> {
        self.format_stack.pop();
        match self.format_stack.last() {
            Some(spec) => out.set_color(spec)?,
            None => out.reset()?,
        }
        Ok(())
    }

    fn handle_start<W: WriteColor>(&mut self, out: &mut W, tag: Tag) -> Result<()> {
        match tag {
            Tag::Heading { level, .. } => {
                let color = match level {
                    HeadingLevel::H1 => Color::Rgb(255, 99, 71),
                    HeadingLevel::H2 => Color::Rgb(70, 130, 180),
                    _ => Color::Cyan,
                };
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(color)).set_bold(true);
                if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
                    writeln!(out)?;
                }
                self.push_style(out, spec)?;
            }
            Tag::Strong => {
                let mut spec = ColorSpec::new();
                spec.set_bold(true);
                self.push_style(out, spec)?;
            }
            Tag::Emphasis => {
                let mut spec = ColorSpec::new();
                spec.set_italic(true).set_dimmed(true);
                self.push_style(out, spec)?;
            }
            Tag::BlockQuote(_) => {
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(Color::Yellow));
                self.push_style(out, spec)?;
                write!(out, "  │ ")?;
            }
            Tag::CodeBlock(kind) => {
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(Color::Green));
                writeln!(out)?;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let mut lang_spec = ColorSpec::new();
                        lang_spec.set_fg(Some(Color::Blue)).set_italic(true);
                        out.set_color(&lang_spec)?;
                        writeln!(out, "[{}]", lang)?;
                    }
                }
                self.push_style(out, spec)?;
            }
            Tag::List(start) => self.list_stack.push(start),
            Tag::Item => {
                let indent = "  ".repeat(self.list_stack.len().saturating_sub(1));
                match self.list_stack.last_mut() {
                    Some(Some(number)) => {
                        write!(out, "{}{:2}. ", indent, number)?;
                        *number += 1;
                    }
                    _ => write!(out, "{}• ", indent)?,
                }
            }
            Tag::Link { .. } => {
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(Color::Blue)).set_underline(true);
                self.push_style(out, spec)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_end<W: WriteColor>(&mut self, out: &mut W, tag_end: TagEnd) -> Result<()> {
        match tag_end {
            TagEnd::Heading(_) => {
                self.pop_style(out)?;
                writeln!(out)?;
            }
            TagEnd::Paragraph => {
                writeln!(out)?;
                if self.list_stack.is_empty() {
                    writeln!(out)?;
                }
            }
            TagEnd::Strong | TagEnd::Emphasis | TagEnd::Link => self.pop_style(out)?,
            TagEnd::BlockQuote(_) | TagEnd::CodeBlock => {
                self.pop_style(out)?;
                writeln!(out)?;
            }
            TagEnd::List(_) => {
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    writeln!(out)?;
                }
            }
            TagEnd::Item => writeln!(out)?,
            _ => {}
        }
        Ok(())
    }

    fn write_inline_code<W: WriteColor>(&self, out: &mut W, code: &str) -> Result<()> {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", code)?;
        match self.format_stack.last() {
            Some(spec) => out.set_color(spec)?,
            None => out.reset()?,
        }
        Ok(())
    }
}
