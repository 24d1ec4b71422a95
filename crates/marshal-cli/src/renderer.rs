//! Terminal rendering of the markdown produced by `marshal-core` Display
//! implementations.

use std::io::{self, Write};

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

/// Renders markdown with termimad, or passes it through untouched when color
/// is disabled.
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Render markdown text to stdout.
    pub fn render(&self, markdown: &str) -> Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_to(&mut out, markdown)?;
        out.flush()?;
        Ok(())
    }

    /// Writes `markdown` to `out`. Headers keep their `#` markers so plan
    /// ids stay greppable in rich mode.
    fn write_to<W: Write>(&self, out: &mut W, markdown: &str) -> io::Result<()> {
        if !self.rich_enabled {
            return out.write_all(markdown.as_bytes());
        }

        for line in markdown.lines() {
            if line.starts_with('#') {
                writeln!(out, "\x1b[34m{line}\x1b[0m")?;
            } else {
                writeln!(out, "{}", self.skin.inline(line))?;
            }
        }
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(renderer: &TerminalRenderer, markdown: &str) -> String {
        let mut out = Vec::new();
        renderer.write_to(&mut out, markdown).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_output_is_verbatim() {
        let renderer = TerminalRenderer::new(false);
        let markdown = "# 3. deploy (ERROR)\n\n- State: ERROR\n";
        assert_eq!(rendered(&renderer, markdown), markdown);
    }

    #[test]
    fn test_rich_output_colors_headers() {
        let renderer = TerminalRenderer::default();
        let output = rendered(&renderer, "# 3. deploy (ERROR)\n- State: ERROR");
        assert!(output.starts_with("\x1b[34m# 3. deploy (ERROR)\x1b[0m\n"));
        assert!(output.contains("State: ERROR"));
    }
}
