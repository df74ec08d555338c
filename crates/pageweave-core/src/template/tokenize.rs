//! Directive scanning for the template parser
//!
//! Splits template text into `<? ... ?>` directive tokens using a
//! forward-only state machine. Text between tokens is literal and is sliced
//! out by the parser using token positions.

use super::ast::Location;

/// Directive flavour, decided by the bytes right after `<?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectiveKind {
    /// `<?= expr ?>`
    Echo,
    /// `<?! expr ?>`
    Raw,
    /// `<?php statement ?>`
    Statement,
    /// Anything else after `<?` (e.g. `<?xml`)
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind<'a> {
    /// A complete directive; `content` excludes the opening tag and `?>`
    Directive {
        kind: DirectiveKind,
        content: &'a str,
    },
    /// `<?` preceded by an odd number of backslashes: literal text
    Escaped,
    /// `<?` with no closing `?>` before end of input
    Unterminated,
}

/// A single `<?...?>` token with position and classification
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind<'a>,
    /// Absolute byte position of `<?`
    pub start: usize,
    /// Total length in bytes including `<?` and `?>`
    pub length: usize,
    /// Number of backslashes immediately before `<?`
    /// Odd count = escaped (literal), even = real directive
    pub backslash_count: usize,
    /// Where `<?` sits in the source
    pub location: Location,
}

/// Lexical mode inside a directive
///
/// Quotes and comments are tracked so that a `?>` inside a string literal or a
/// block comment does not close the directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lex {
    Code,
    Str { quote: u8 },
    StrEscape { quote: u8 },
    LineComment,
    BlockComment,
}

/// Scanner state
///
/// ```text
/// Normal ──<?──> InDirective ──?>──> [Yield Token] → Normal
///   │  │                │ EOF
///   │  └─\<?─> [Yield Escaped] → Normal
///   └─ \ counts         └──────────> [Yield Unterminated] → Done
/// ```
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScanState {
    Normal {
        backslash_count: usize,
    },
    InDirective {
        start: usize,
        content_start: usize,
        backslash_count: usize,
        kind: DirectiveKind,
        lex: Lex,
        location: Location,
    },
    Done,
}

/// Iterator over directive tokens in a template string
pub(crate) struct TokenStream<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    state: ScanState,
    line: usize,
    line_start: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            state: ScanState::Normal { backslash_count: 0 },
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn location_at(&self, pos: usize) -> Location {
        let column = self.text[self.line_start..pos].chars().count() + 1;
        Location::new(self.line, column)
    }

    fn advance_newline(&mut self) {
        self.line += 1;
        self.line_start = self.pos + 1;
    }

    /// Classify the directive opened at `pos` (pointing at `<`)
    ///
    /// Returns the kind and where the directive content begins.
    fn classify(&self, pos: usize) -> (DirectiveKind, usize) {
        let after = pos + 2;
        match self.bytes.get(after) {
            Some(b'=') => (DirectiveKind::Echo, after + 1),
            Some(b'!') => (DirectiveKind::Raw, after + 1),
            _ => {
                let rest = &self.bytes[after..];
                let is_php = rest.len() > 3
                    && rest[..3].eq_ignore_ascii_case(b"php")
                    && rest[3].is_ascii_whitespace();
                if is_php {
                    (DirectiveKind::Statement, after + 3)
                } else {
                    (DirectiveKind::Unknown, after)
                }
            }
        }
    }

    fn process_normal(&mut self, byte: u8, backslash_count: usize) -> Option<Token<'a>> {
        if byte == b'\\' {
            self.state = ScanState::Normal {
                backslash_count: backslash_count + 1,
            };
            self.pos += 1;
        } else if byte == b'<' && self.peek(1) == Some(b'?') && backslash_count % 2 == 1 {
            let token = Token {
                kind: TokenKind::Escaped,
                start: self.pos,
                length: 2,
                backslash_count,
                location: self.location_at(self.pos),
            };
            self.pos += 2;
            self.state = ScanState::Normal { backslash_count: 0 };
            return Some(token);
        } else if byte == b'<' && self.peek(1) == Some(b'?') {
            let (kind, content_start) = self.classify(self.pos);
            self.state = ScanState::InDirective {
                start: self.pos,
                content_start,
                backslash_count,
                kind,
                lex: Lex::Code,
                location: self.location_at(self.pos),
            };
            self.pos = content_start;
        } else {
            if byte == b'\n' {
                self.advance_newline();
            }
            self.state = ScanState::Normal { backslash_count: 0 };
            self.pos += 1;
        }
        None
    }

    /// Advance one step inside a directive
    ///
    /// Returns the next lexical mode, and `true` when positioned on the
    /// closing `?>` (which is left unconsumed).
    fn process_directive(&mut self, byte: u8, lex: Lex) -> (Lex, bool) {
        let closes = byte == b'?' && self.peek(1) == Some(b'>');
        let next = match lex {
            Lex::Code => {
                if closes {
                    return (Lex::Code, true);
                }
                match byte {
                    b'"' | b'\'' => Lex::Str { quote: byte },
                    b'#' => Lex::LineComment,
                    b'/' if self.peek(1) == Some(b'/') => {
                        self.pos += 1;
                        Lex::LineComment
                    }
                    b'/' if self.peek(1) == Some(b'*') => {
                        self.pos += 1;
                        Lex::BlockComment
                    }
                    _ => Lex::Code,
                }
            }
            Lex::Str { quote } => match byte {
                b'\\' => Lex::StrEscape { quote },
                b if b == quote => Lex::Code,
                _ => lex,
            },
            Lex::StrEscape { quote } => Lex::Str { quote },
            Lex::LineComment => {
                if closes {
                    return (Lex::Code, true);
                }
                if byte == b'\n' { Lex::Code } else { lex }
            }
            Lex::BlockComment => {
                if byte == b'*' && self.peek(1) == Some(b'/') {
                    self.pos += 1;
                    Lex::Code
                } else {
                    lex
                }
            }
        };
        if byte == b'\n' {
            self.advance_newline();
        }
        self.pos += 1;
        (next, false)
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            if self.pos >= self.bytes.len() {
                return match std::mem::replace(&mut self.state, ScanState::Done) {
                    ScanState::InDirective {
                        start,
                        backslash_count,
                        location,
                        ..
                    } => Some(Token {
                        kind: TokenKind::Unterminated,
                        start,
                        length: self.bytes.len() - start,
                        backslash_count,
                        location,
                    }),
                    _ => None,
                };
            }

            let byte = self.bytes[self.pos];
            match self.state.clone() {
                ScanState::Normal { backslash_count } => {
                    if let Some(token) = self.process_normal(byte, backslash_count) {
                        return Some(token);
                    }
                }
                ScanState::InDirective {
                    start,
                    content_start,
                    backslash_count,
                    kind,
                    lex,
                    location,
                } => {
                    let (lex, closed) = self.process_directive(byte, lex);
                    if closed {
                        let content = &self.text[content_start..self.pos];
                        let end = self.pos + 2;
                        self.pos = end;
                        self.state = ScanState::Normal { backslash_count: 0 };
                        return Some(Token {
                            kind: TokenKind::Directive { kind, content },
                            start,
                            length: end - start,
                            backslash_count,
                            location,
                        });
                    }
                    self.state = ScanState::InDirective {
                        start,
                        content_start,
                        backslash_count,
                        kind,
                        lex,
                        location,
                    };
                }
                ScanState::Done => return None,
            }
        }
    }
}
