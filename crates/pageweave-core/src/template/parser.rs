//! Directive tree construction
//!
//! Walks the scanner's tokens once, keeping a stack of open blocks
//! (`foreach`, `if`). Literal text between tokens is sliced from the source.
//! `elseif` opens an implicit nested conditional inside the current else
//! branch; a single `endif` closes the whole chain.

use super::ast::{Escape, Expr, Location, Node, Template};
use crate::config::consts::DEFAULT_MAX_BLOCK_DEPTH;
use super::error::TemplateError;
use super::expr::{ExprParser, Tok};
use super::tokenize::{DirectiveKind, TokenKind, TokenStream};

#[derive(Debug)]
enum Frame {
    Root,
    Loop {
        sequence: Expr,
        item: String,
        key: Option<String>,
        at: Location,
    },
    Cond {
        predicate: Expr,
        /// `Some` once `else`/`elseif` was seen; block nodes are then the else branch
        then_branch: Option<Vec<Node>>,
        /// Opened by `elseif`; closed together with its parent by `endif`
        chained: bool,
        at: Location,
    },
}

impl Frame {
    fn describe(&self) -> &'static str {
        match self {
            Frame::Root => "template",
            Frame::Loop { .. } => "foreach",
            Frame::Cond { .. } => "if",
        }
    }

    fn location(&self) -> Option<Location> {
        match self {
            Frame::Root => None,
            Frame::Loop { at, .. } | Frame::Cond { at, .. } => Some(*at),
        }
    }
}

#[derive(Debug)]
struct Block {
    frame: Frame,
    nodes: Vec<Node>,
}

/// What a statement directive asks the tree builder to do
enum Statement {
    Emit(Node),
    Open(Frame),
    ElseIf(Expr),
    Else,
    EndIf,
    EndForeach,
    Nothing,
}

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest allowed `foreach`/`if` nesting; each `elseif` counts as one level
    pub max_block_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_block_depth: DEFAULT_MAX_BLOCK_DEPTH,
        }
    }
}

struct TreeBuilder {
    stack: Vec<Block>,
    max_depth: usize,
}

impl TreeBuilder {
    fn new(options: &ParseOptions) -> Self {
        Self {
            stack: vec![Block {
                frame: Frame::Root,
                nodes: Vec::new(),
            }],
            max_depth: options.max_block_depth,
        }
    }

    fn top(&mut self) -> &mut Block {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let nodes = &mut self.top().nodes;
        if let Some(Node::Literal(existing)) = nodes.last_mut() {
            existing.push_str(text);
        } else {
            nodes.push(Node::Literal(text.to_string()));
        }
    }

    fn push_node(&mut self, node: Node) {
        self.top().nodes.push(node);
    }

    fn open(&mut self, frame: Frame, at: Location) -> Result<(), TemplateError> {
        // the root block is not a nesting level
        if self.stack.len() > self.max_depth {
            return Err(TemplateError::Parse {
                message: format!(
                    "`{}` nests blocks deeper than the limit of {}",
                    frame.describe(),
                    self.max_depth
                ),
                location: at,
            });
        }
        self.stack.push(Block {
            frame,
            nodes: Vec::new(),
        });
        Ok(())
    }

    fn mismatch(&self, directive: &str, at: Location) -> TemplateError {
        let open = self.stack.last().map(|block| &block.frame);
        let message = match open.and_then(|frame| frame.location().map(|loc| (frame, loc))) {
            Some((frame, loc)) => format!(
                "`{}` does not match the open `{}` from {}",
                directive,
                frame.describe(),
                loc
            ),
            None => format!("`{}` without a matching opening directive", directive),
        };
        TemplateError::Parse {
            message,
            location: at,
        }
    }

    /// Move the current if-block into its else branch
    fn enter_else(&mut self, directive: &str, at: Location) -> Result<(), TemplateError> {
        if !matches!(self.stack.last().map(|b| &b.frame), Some(Frame::Cond { .. })) {
            return Err(self.mismatch(directive, at));
        }
        let block = self.top();
        match &mut block.frame {
            Frame::Cond { then_branch, .. } if then_branch.is_none() => {
                *then_branch = Some(std::mem::take(&mut block.nodes));
                Ok(())
            }
            _ => Err(TemplateError::Parse {
                message: format!("`{}` after `else`", directive),
                location: at,
            }),
        }
    }

    fn end_if(&mut self, at: Location) -> Result<(), TemplateError> {
        loop {
            if !matches!(self.stack.last().map(|b| &b.frame), Some(Frame::Cond { .. })) {
                return Err(self.mismatch("endif", at));
            }
            let Some(Block { frame, nodes }) = self.stack.pop() else {
                return Err(self.mismatch("endif", at));
            };
            let Frame::Cond {
                predicate,
                then_branch,
                chained,
                at: opened,
            } = frame
            else {
                return Err(self.mismatch("endif", at));
            };
            let (then_branch, else_branch) = match then_branch {
                Some(then_nodes) => (then_nodes, Some(nodes)),
                None => (nodes, None),
            };
            self.push_node(Node::Conditional {
                predicate,
                then_branch,
                else_branch,
                at: opened,
            });
            if !chained {
                return Ok(());
            }
        }
    }

    fn end_foreach(&mut self, at: Location) -> Result<(), TemplateError> {
        if !matches!(self.stack.last().map(|b| &b.frame), Some(Frame::Loop { .. })) {
            return Err(self.mismatch("endforeach", at));
        }
        if let Some(Block {
            frame:
                Frame::Loop {
                    sequence,
                    item,
                    key,
                    at: opened,
                },
            nodes,
        }) = self.stack.pop()
        {
            self.push_node(Node::Loop {
                sequence,
                item,
                key,
                body: nodes,
                at: opened,
            });
        }
        Ok(())
    }

    fn apply(&mut self, statement: Statement, at: Location) -> Result<(), TemplateError> {
        match statement {
            Statement::Emit(node) => self.push_node(node),
            Statement::Open(frame) => self.open(frame, at)?,
            Statement::ElseIf(predicate) => {
                self.enter_else("elseif", at)?;
                self.open(
                    Frame::Cond {
                        predicate,
                        then_branch: None,
                        chained: true,
                        at,
                    },
                    at,
                )?;
            }
            Statement::Else => self.enter_else("else", at)?,
            Statement::EndIf => self.end_if(at)?,
            Statement::EndForeach => self.end_foreach(at)?,
            Statement::Nothing => {}
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Template, TemplateError> {
        if self.stack.len() > 1 {
            let frame = &self.stack[self.stack.len() - 1].frame;
            let location = frame.location().unwrap_or_default();
            return Err(TemplateError::Parse {
                message: format!("`{}` is never closed", frame.describe()),
                location,
            });
        }
        let root = self.stack.pop().map(|block| block.nodes).unwrap_or_default();
        Ok(Template { nodes: root })
    }
}

/// `include("id")` or `include("id", [...])` spanning the whole directive
fn parse_include(parser: &mut ExprParser, at: Location) -> Result<Node, TemplateError> {
    parser.expect_keyword("include")?;
    parser.expect(&Tok::LParen)?;
    let target = parser.parse_expr()?;
    let bindings = if parser.eat(&Tok::Comma) {
        Some(parser.parse_expr()?)
    } else {
        None
    };
    parser.expect(&Tok::RParen)?;
    parser.finish()?;
    Ok(Node::Include {
        target,
        bindings,
        at,
    })
}

fn starts_include(parser: &ExprParser) -> bool {
    matches!(parser.peek(), Some(Tok::Ident(name)) if name == "include")
        && parser.peek_at(1) == Some(&Tok::LParen)
}

/// `<?= expr ?>` / `<?! expr ?>`
fn parse_output(content: &str, escape: Escape, at: Location) -> Result<Node, TemplateError> {
    let mut parser = ExprParser::new(content, at)?;
    if parser.is_empty() {
        return Err(parser.error("empty output directive"));
    }
    if starts_include(&parser) {
        return parse_include(&mut parser, at);
    }
    let expr = parser.parse_expr()?;
    parser.finish()?;
    Ok(Node::Output { expr, escape, at })
}

/// `foreach (expr as $item)` / `foreach (expr as $key => $item)`
fn parse_foreach(parser: &mut ExprParser, at: Location) -> Result<Frame, TemplateError> {
    let parenthesized = parser.eat(&Tok::LParen);
    let sequence = parser.parse_expr()?;
    parser.expect_keyword("as")?;
    let first = parser.expect_variable()?;
    let (key, item) = if parser.eat(&Tok::FatArrow) {
        (Some(first), parser.expect_variable()?)
    } else {
        (None, first)
    };
    if parenthesized {
        parser.expect(&Tok::RParen)?;
    }
    parser.finish()?;
    Ok(Frame::Loop {
        sequence,
        item,
        key,
        at,
    })
}

fn parse_condition(parser: &mut ExprParser) -> Result<Expr, TemplateError> {
    let predicate = parser.parse_expr()?;
    parser.finish()?;
    Ok(predicate)
}

/// `<?php ... ?>`
fn parse_statement(content: &str, at: Location) -> Result<Statement, TemplateError> {
    let mut parser = ExprParser::new(content, at)?;
    if parser.is_empty() {
        // comment-only directive
        return Ok(Statement::Nothing);
    }
    if starts_include(&parser) {
        return parse_include(&mut parser, at).map(Statement::Emit);
    }

    let keyword = match parser.peek() {
        Some(Tok::Ident(name)) => name.clone(),
        Some(_) => return Err(parser.error(format!("expected a statement, found `{}`", content.trim()))),
        None => return Ok(Statement::Nothing),
    };
    parser.expect_keyword(&keyword)?;

    let statement = match keyword.as_str() {
        "foreach" => Statement::Open(parse_foreach(&mut parser, at)?),
        "if" => Statement::Open(Frame::Cond {
            predicate: parse_condition(&mut parser)?,
            then_branch: None,
            chained: false,
            at,
        }),
        "elseif" => Statement::ElseIf(parse_condition(&mut parser)?),
        "else" if parser.eat_keyword("if") => Statement::ElseIf(parse_condition(&mut parser)?),
        "else" => {
            parser.finish()?;
            Statement::Else
        }
        "endif" => {
            parser.finish()?;
            Statement::EndIf
        }
        "endforeach" => {
            parser.finish()?;
            Statement::EndForeach
        }
        "echo" | "print" => {
            let expr = parser.parse_expr()?;
            parser.finish()?;
            Statement::Emit(Node::Output {
                expr,
                escape: Escape::Html,
                at,
            })
        }
        other => return Err(parser.error(format!("unknown statement `{}`", other))),
    };
    Ok(statement)
}

/// Parse template text into a directive tree
///
/// Pure: the same text always yields a structurally identical tree.
///
/// # Errors
///
/// Returns [`TemplateError::Parse`] for unterminated or unknown directives,
/// malformed expressions, and unbalanced `foreach`/`if` blocks. The location
/// is where the offending directive starts.
pub fn parse(text: &str) -> Result<Template, TemplateError> {
    parse_with(text, &ParseOptions::default())
}

/// [`parse`] with explicit limits
///
/// Blocks nested deeper than `options.max_block_depth` are a
/// [`TemplateError::Parse`] located at the directive that opens them.
pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Template, TemplateError> {
    let mut builder = TreeBuilder::new(options);
    let mut cursor = 0;

    for token in TokenStream::new(text) {
        let literal_end = token.start - token.backslash_count;
        builder.push_literal(&text[cursor..literal_end]);
        builder.push_literal(&"\\".repeat(token.backslash_count / 2));
        cursor = token.start + token.length;

        match token.kind {
            TokenKind::Escaped => builder.push_literal("<?"),
            TokenKind::Unterminated => {
                return Err(TemplateError::Parse {
                    message: "unterminated directive: missing `?>`".to_string(),
                    location: token.location,
                });
            }
            TokenKind::Directive { kind, content } => match kind {
                DirectiveKind::Echo => builder.push_node(parse_output(content, Escape::Html, token.location)?),
                DirectiveKind::Raw => builder.push_node(parse_output(content, Escape::Raw, token.location)?),
                DirectiveKind::Statement => {
                    let statement = parse_statement(content, token.location)?;
                    builder.apply(statement, token.location)?;
                }
                DirectiveKind::Unknown => {
                    let word: String = content
                        .chars()
                        .take_while(|c| !c.is_whitespace())
                        .collect();
                    return Err(TemplateError::Parse {
                        message: format!(
                            "unknown directive `<?{}`; expected `<?=`, `<?!` or `<?php`",
                            word
                        ),
                        location: token.location,
                    });
                }
            },
        }
    }

    builder.push_literal(&text[cursor..]);
    builder.finish()
}
