//! Text between tags: paragraphs, automatic line breaks and trimming.

use tagloom_rules::RuleFlags;

use super::Resolver;
use crate::{Tag, TagId};

/// Bytes treated as whitespace by trimming and paragraph handling.
const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\n' | b'\r' | b'\t')
}

/// Blank lines that end an automatic paragraph.
const PARAGRAPH_BREAKS: [&str; 2] = ["\n\n", "\r\n\r\n"];

impl Resolver<'_> {
    /// Length of the whitespace run starting at `pos`, not going past `limit`.
    pub(super) fn whitespace_len(&self, pos: usize, limit: usize) -> usize {
        let limit = limit.min(self.text.len());
        if pos >= limit {
            return 0;
        }
        self.text.as_bytes()[pos..limit]
            .iter()
            .take_while(|&&byte| is_whitespace(byte))
            .count()
    }

    /// Start of the whitespace run ending at `pos`, not going before the cursor.
    pub(super) fn trailing_whitespace_start(&self, pos: usize) -> usize {
        let bytes = self.text.as_bytes();
        let mut start = pos.min(bytes.len());
        while start > self.pos && is_whitespace(bytes[start - 1]) {
            start -= 1;
        }
        start
    }

    /// Emit the text between the cursor and `catchup`.
    ///
    /// With `trim`, trailing whitespace becomes an ignored span. With
    /// `close_paragraph`, the context's paragraph (if the context creates
    /// paragraphs) is closed after the text and trailing whitespace is left
    /// outside of it.
    pub(super) fn output_text(&mut self, catchup: usize, trim: bool, close_paragraph: bool) {
        let close_paragraph =
            close_paragraph && self.context.flags.contains(RuleFlags::CREATE_PARAGRAPHS);
        let catchup = catchup.min(self.text.len());

        if self.pos >= catchup {
            if close_paragraph {
                let _ = self.writer.close_paragraph();
            }
            return;
        }

        if self.context.flags.contains(RuleFlags::IGNORE_TEXT) {
            self.writer.ignored(self.pos, &self.text[self.pos..catchup]);
            self.pos = catchup;
            if close_paragraph {
                let _ = self.writer.close_paragraph();
            }
            return;
        }

        let text_end = if trim || close_paragraph {
            self.trailing_whitespace_start(catchup)
        } else {
            catchup
        };

        if self.context.flags.contains(RuleFlags::CREATE_PARAGRAPHS) {
            if !self.writer.in_paragraph() {
                self.output_whitespace(text_end);
                if text_end > self.pos {
                    let _ = self.writer.open_paragraph(self.pos);
                }
            }

            while let Some(pb) = self.paragraph_break_before(text_end) {
                self.output_text(pb, false, true);
                self.output_paragraph_start(text_end);
            }
        }

        if text_end > self.pos {
            self.emit_text(self.pos, text_end);
        }

        if close_paragraph {
            let _ = self.writer.close_paragraph();
        }

        if text_end < catchup {
            let trailing = &self.text[text_end..catchup];
            if trim {
                self.writer.ignored(text_end, trailing);
            } else {
                self.writer.text(text_end, trailing);
            }
        }
        self.pos = catchup;
    }

    /// Position of the next blank line after the cursor, if it starts before `limit`.
    fn paragraph_break_before(&self, limit: usize) -> Option<usize> {
        let rest = &self.text[self.pos..];
        PARAGRAPH_BREAKS
            .into_iter()
            .filter_map(|separator| rest.find(separator))
            .min()
            .map(|offset| self.pos + offset)
            .filter(|&pb| pb < limit)
    }

    /// Emit the whitespace after the cursor, up to `limit`, as text.
    fn output_whitespace(&mut self, limit: usize) {
        let len = self.whitespace_len(self.pos, limit);
        if len > 0 {
            self.writer.text(self.pos, &self.text[self.pos..self.pos + len]);
            self.pos += len;
        }
    }

    /// Open a paragraph unless one is open or the context has none.
    ///
    /// Whitespace up to `limit` stays outside the paragraph. Nothing is opened
    /// at the end of the text.
    pub(super) fn output_paragraph_start(&mut self, limit: usize) {
        if self.writer.in_paragraph() || !self.context.flags.contains(RuleFlags::CREATE_PARAGRAPHS)
        {
            return;
        }
        self.output_whitespace(limit);
        if self.pos < self.text.len() {
            let _ = self.writer.open_paragraph(self.pos);
        }
    }

    /// Emit `text[start..end]` as text, with automatic line breaks if enabled.
    fn emit_text(&mut self, start: usize, end: usize) {
        let text = &self.text[start..end];
        if !self.context.flags.auto_br() {
            self.writer.text(start, text);
            return;
        }

        let mut from = 0;
        for (offset, _) in text.match_indices('\n') {
            // A CRLF pair gets its break before the carriage return.
            let line_end = if text[from..offset].ends_with('\r') {
                offset - 1
            } else {
                offset
            };
            self.writer.text(start + from, &text[from..line_end]);
            let _ = self.writer.line_break(start + line_end);
            from = line_end;
        }
        self.writer.text(start + from, &text[from..]);
    }

    /// Consume whitespace after the cursor as an ignored span, stopping before
    /// the next pending tag.
    pub(super) fn ignore_whitespace_after(&mut self) {
        let text_len = self.text.len();
        let limit = self.next_tag().map_or(text_len, Tag::pos);
        let len = self.whitespace_len(self.pos, limit);
        if len > 0 {
            self.writer.ignored(self.pos, &self.text[self.pos..self.pos + len]);
            self.pos += len;
        }
    }

    pub(super) fn output_ignore_tag(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, end) = (tag.pos(), tag.end());
        self.output_text(pos, false, false);
        self.writer.ignored(pos, &self.text[pos..end]);
        self.pos = end;
        self.is_rich = true;
    }

    pub(super) fn output_line_break(&mut self, id: TagId) {
        if self.context.flags.contains(RuleFlags::PREVENT_BR) {
            return;
        }
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, end) = (tag.pos(), tag.end());
        self.output_text(pos, false, false);
        let _ = self.writer.line_break(pos);
        self.writer.ignored(pos, &self.text[pos..end]);
        self.pos = end;
        self.is_rich = true;
    }

    /// Emit the span of a verbatim tag as text under the tag's own flags.
    pub(super) fn output_verbatim(&mut self, id: TagId) {
        let Some(tag) = self.tags.get(id) else {
            return;
        };
        let (pos, end, flags) = (tag.pos(), tag.end(), tag.flags());
        self.output_text(pos, false, false);

        let saved = std::mem::replace(&mut self.context.flags, flags);
        self.output_text(end, false, false);
        self.context.flags = saved;
        self.is_rich = true;
    }
}

#[cfg(test)]
mod tests {
    use tagloom_rules::RuleTable;

    use super::*;

    #[test]
    fn whitespace_scanning_respects_limits() {
        let rules = RuleTable::default();
        let mut resolver = Resolver::new("a \n\t b  ", &rules);
        assert_eq!(resolver.whitespace_len(1, 8), 4);
        assert_eq!(resolver.whitespace_len(1, 3), 2);
        assert_eq!(resolver.whitespace_len(0, 8), 0);
        assert_eq!(resolver.whitespace_len(9, 8), 0);

        assert_eq!(resolver.trailing_whitespace_start(8), 6);
        resolver.pos = 7;
        assert_eq!(resolver.trailing_whitespace_start(8), 7);
    }
}
