use super::{Prettyfier, SinkMode, TextSink};

impl Prettyfier {
    pub fn new(tab: &str, space: &str, newline: &str) -> Self {
        Self {
            tab: tab.to_string(),
            space: space.to_string(),
            newline: newline.to_string(),
        }
    }
}

impl Default for Prettyfier {
    fn default() -> Self {
        Self::new("\t", " ", "\n")
    }
}

impl TextSink {
    /// A pretty-printing sink with the default glyphs.
    pub fn pretty() -> Self {
        Self::with(Prettyfier::default())
    }

    pub fn with(prettyfier: Prettyfier) -> Self {
        Self {
            segments: Vec::new(),
            mode: SinkMode::Pretty(prettyfier),
            lines: 0,
        }
    }

    /// A minifying sink. `max_lines` caps the comment and blank lines emitted when
    /// `retain_comments` is set; structural line breaks are always kept.
    pub fn minified(retain_comments: bool, max_lines: usize) -> Self {
        Self {
            segments: Vec::new(),
            mode: SinkMode::Minified {
                retain_comments,
                max_lines,
            },
            lines: 0,
        }
    }

    /// Append a literal.
    pub fn append(&mut self, literal: &str) {
        self.segments.push(literal.to_string());
    }

    /// A structural line break, always emitted.
    pub fn line_break(&mut self) {
        match &self.mode {
            SinkMode::Pretty(p) => {
                let glyph = p.newline.clone();
                self.segments.push(glyph);
            }
            SinkMode::Minified { .. } => self.segments.push("\n".to_string()),
        }
    }

    /// A decorative line break (blank separation); dropped when minifying.
    pub fn soft_break(&mut self) {
        if let SinkMode::Pretty(p) = &self.mode {
            let glyph = p.newline.clone();
            self.segments.push(glyph);
        }
    }

    /// Count one emitted comment line against the minified cap.
    pub fn note_comment_line(&mut self) {
        self.lines += 1;
    }

    /// Whether comment output is currently allowed.
    pub fn keeps_comments(&self) -> bool {
        match &self.mode {
            SinkMode::Pretty(_) => true,
            SinkMode::Minified {
                retain_comments,
                max_lines,
            } => *retain_comments && self.lines < *max_lines,
        }
    }

    pub fn indent(&mut self, depth: usize) {
        if let SinkMode::Pretty(p) = &self.mode {
            let glyph = p.tab.repeat(depth);
            self.segments.push(glyph);
        }
    }

    /// The spacing around operators; dropped when minifying.
    pub fn space(&mut self) {
        if let SinkMode::Pretty(p) = &self.mode {
            let glyph = p.space.clone();
            self.segments.push(glyph);
        }
    }

    /// Reverse the order of the appended segments.
    pub fn reverse(&mut self) {
        self.segments.reverse();
    }

    /// The accumulated output.
    pub fn data(&self) -> String {
        self.segments.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl PartialEq for TextSink {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}
