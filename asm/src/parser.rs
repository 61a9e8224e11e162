use crate::error::Error;

/// One preprocessed source line. Tokens hold at most a label, an operation
/// and an operand; the trailing `;` comment is kept for the listing.
#[derive(Debug, Clone)]
pub struct Line {
    pub number: usize,
    pub tokens: Vec<String>,
    pub comment: String,
}

impl Line {
    pub fn source(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Split raw text into lines, strip comments and tokenize. Blank lines are
/// dropped; anything non-ASCII is fatal.
pub fn preprocess(text: &str) -> Result<Vec<Line>, Error> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        if !raw.is_ascii() {
            return Err(Error::NonAscii(number));
        }
        let (command, comment) = match raw.split_once(';') {
            Some((c, r)) => (c.trim(), r.trim()),
            None => (raw.trim(), ""),
        };
        if command.is_empty() && comment.is_empty() {
            continue;
        }
        lines.push(Line {
            number,
            tokens: command.split_whitespace().map(str::to_string).collect(),
            comment: comment.to_string(),
        });
    }
    Ok(lines)
}
