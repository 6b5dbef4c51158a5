//! # Scrollback Viewport
//!
//! A fixed-height window onto a growing block of text. The execution bridges
//! keep the whole scrollback in one string and hand it to the viewport after
//! every change; the viewport only tracks the line split and the offset.

/// Window of `height` lines starting at `offset`.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    lines: Vec<String>,
    offset: usize,
    width: u16,
    height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Replace the content. A trailing `\r` on a line is dropped; for a line
    /// containing bare `\r` (progress bars) only the text after the last
    /// one is kept.
    pub fn set_content(&mut self, content: &str) {
        self.lines = content
            .split('\n')
            .map(|line| {
                let line = line.strip_suffix('\r').unwrap_or(line);
                match line.rfind('\r') {
                    Some(pos) => line[pos + 1..].to_string(),
                    None => line.to_string(),
                }
            })
            .collect();
        self.clamp();
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.clamp();
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height as usize)
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    pub fn goto_top(&mut self) {
        self.offset = 0;
    }

    pub fn goto_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    pub fn line_up(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn line_down(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.line_up(self.height.max(1) as usize);
    }

    pub fn page_down(&mut self) {
        self.line_down(self.height.max(1) as usize);
    }

    pub fn half_page_up(&mut self) {
        self.line_up((self.height as usize / 2).max(1));
    }

    pub fn half_page_down(&mut self) {
        self.line_down((self.height as usize / 2).max(1));
    }

    /// Fraction of the content above the bottom of the window, 0.0..=1.0.
    pub fn scroll_percent(&self) -> f64 {
        let max = self.max_offset();
        if max == 0 {
            return 1.0;
        }
        self.offset as f64 / max as f64
    }

    /// The visible lines, exactly `height` of them (blank-filled).
    pub fn visible_lines(&self) -> Vec<&str> {
        let height = self.height as usize;
        let mut out: Vec<&str> = self
            .lines
            .iter()
            .skip(self.offset)
            .take(height)
            .map(String::as_str)
            .collect();
        out.resize(height, "");
        out
    }

    pub fn view(&self) -> String {
        self.visible_lines().join("\n")
    }
}
