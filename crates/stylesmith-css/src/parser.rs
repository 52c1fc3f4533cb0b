//! Whitespace-preserving stylesheet parser
//!
//! The parser keeps every byte of the input in either a node field or a raw,
//! so [`crate::stringify`] on an untouched tree returns the input unchanged.

use std::mem;
use std::sync::Arc;

use crate::error::CssSyntaxError;
use crate::node::{
    AtRule, AtRuleRaws, BlockRaws, Comment, CommentRaws, Declaration, DeclarationRaws, Input,
    Node, Position, RawValue, RootRaws, Rule, Source, Stylesheet,
};

type Result<T> = std::result::Result<T, CssSyntaxError>;

/// Parse `input` into a tree
pub fn parse(input: Arc<Input>) -> Result<Stylesheet> {
    Parser::new(input).parse()
}

/// Children of a block plus the raws collected while reading them
struct Body {
    nodes: Vec<Node>,
    after: String,
    semicolon: bool,
}

struct Parser {
    input: Arc<Input>,
    pos: usize,
    line_starts: Vec<usize>,
}

impl Parser {
    fn new(input: Arc<Input>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(input.css.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            input,
            pos: 0,
            line_starts,
        }
    }

    fn parse(mut self) -> Result<Stylesheet> {
        let body = self.body(None)?;
        let end = self.input.css.len().saturating_sub(1);
        Ok(Stylesheet {
            nodes: body.nodes,
            raws: RootRaws {
                after: body.after,
                semicolon: body.semicolon,
            },
            source: Some(self.source(0, end)),
        })
    }

    fn css(&self) -> &str {
        &self.input.css
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.css().as_bytes().get(self.pos + ahead).copied()
    }

    fn error(&self, reason: &str, offset: usize) -> CssSyntaxError {
        CssSyntaxError::new(reason, Arc::clone(&self.input), offset)
    }

    fn position(&self, offset: usize) -> Position {
        // Inclusive end offsets point one byte before the next token, which
        // may land inside a multibyte character
        let offset = self.input.char_start(offset);
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self.css()[line_start..offset].chars().count() + 1;
        Position {
            offset,
            line,
            column,
        }
    }

    /// Source spanning `start..=end`
    fn source(&self, start: usize, end: usize) -> Source {
        Source {
            input: Arc::clone(&self.input),
            start: self.position(start),
            end: Some(self.position(end.max(start))),
        }
    }

    /// Read nodes until the closing `}` of the block opened at `open`, or
    /// until the end of input at the top level.
    fn body(&mut self, open: Option<usize>) -> Result<Body> {
        let mut nodes = Vec::new();
        let mut spaces = String::new();
        let mut semicolon = false;

        loop {
            let start = self.pos;
            let rest = &self.css()[start..];
            let skipped = rest.len() - rest.trim_start().len();
            spaces.push_str(&rest[..skipped]);
            self.pos += skipped;

            match self.peek(0) {
                None => {
                    if let Some(open) = open {
                        return Err(self.error("Unclosed block", open));
                    }
                    return Ok(Body {
                        nodes,
                        after: spaces,
                        semicolon,
                    });
                }
                Some(b'}') => {
                    if open.is_none() {
                        return Err(self.error("Unexpected }", self.pos));
                    }
                    self.pos += 1;
                    return Ok(Body {
                        nodes,
                        after: spaces,
                        semicolon,
                    });
                }
                Some(b';') => {
                    spaces.push(';');
                    self.pos += 1;
                }
                Some(b'/') if self.peek(1) == Some(b'*') => {
                    let mut comment = self.comment()?;
                    comment.raws.before = Some(mem::take(&mut spaces));
                    nodes.push(Node::Comment(comment));
                }
                Some(b'@') => {
                    let (mut at_rule, terminated) = self.at_rule()?;
                    at_rule.raws.before = Some(mem::take(&mut spaces));
                    semicolon = terminated;
                    nodes.push(Node::AtRule(at_rule));
                }
                Some(_) => {
                    let (mut node, terminated) = self.rule_or_decl()?;
                    node.set_raw_before(Some(mem::take(&mut spaces)));
                    semicolon = terminated;
                    nodes.push(node);
                }
            }
        }
    }

    fn comment(&mut self) -> Result<Comment> {
        let start = self.pos;
        let Some(close) = self.css()[start + 2..].find("*/") else {
            return Err(self.error("Unclosed comment", start));
        };
        let end = start + 2 + close + 2;
        let inner = &self.css()[start + 2..end - 2];

        let (text, left, right) = if inner.trim().is_empty() {
            (String::new(), inner.to_string(), String::new())
        } else {
            let trimmed = inner.trim_start();
            let left = &inner[..inner.len() - trimmed.len()];
            let text = trimmed.trim_end();
            let right = &trimmed[text.len()..];
            (text.to_string(), left.to_string(), right.to_string())
        };

        let comment = Comment {
            text,
            raws: CommentRaws {
                before: None,
                left: Some(left),
                right: Some(right),
            },
            source: Some(self.source(start, end - 1)),
        };
        self.pos = end;
        Ok(comment)
    }

    /// Returns the at-rule and whether it was closed by `;`
    fn at_rule(&mut self) -> Result<(AtRule, bool)> {
        let start = self.pos;
        let bytes = self.css().as_bytes();
        let mut name_end = start + 1;
        while name_end < bytes.len() && !is_name_end(bytes[name_end]) {
            name_end += 1;
        }
        if name_end == start + 1 {
            return Err(self.error("At-rule without name", start));
        }
        let name = self.css()[start + 1..name_end].to_string();

        let stop = self.scan(name_end, b";{}")?;
        let raw = &self.css()[name_end..stop];
        let rest = raw.trim_start();
        let after_name = &raw[..raw.len() - rest.len()];
        let params = rest.trim_end();
        let between = &rest[params.len()..];

        let mut at_rule = AtRule {
            name,
            params: params.to_string(),
            nodes: None,
            raws: AtRuleRaws {
                before: None,
                after_name: Some(after_name.to_string()),
                between: Some(between.to_string()),
                after: None,
                semicolon: false,
            },
            source: None,
        };

        match self.css().as_bytes().get(stop) {
            Some(b'{') => {
                self.pos = stop + 1;
                let body = self.body(Some(stop))?;
                at_rule.nodes = Some(body.nodes);
                at_rule.raws.after = Some(body.after);
                at_rule.raws.semicolon = body.semicolon;
                at_rule.source = Some(self.source(start, self.pos - 1));
                Ok((at_rule, false))
            }
            Some(b';') => {
                self.pos = stop + 1;
                at_rule.source = Some(self.source(start, stop));
                Ok((at_rule, true))
            }
            // `}` of the parent block, or end of input
            _ => {
                self.pos = stop;
                at_rule.source = Some(self.source(start, stop.saturating_sub(1)));
                Ok((at_rule, false))
            }
        }
    }

    /// Returns the node and whether it was closed by `;`
    fn rule_or_decl(&mut self) -> Result<(Node, bool)> {
        let start = self.pos;
        let stop = self.scan(start, b";{}")?;

        if self.css().as_bytes().get(stop) == Some(&b'{') {
            let raw = &self.css()[start..stop];
            let selector = raw.trim_end();
            let between = raw[selector.len()..].to_string();
            let selector = selector.to_string();

            self.pos = stop + 1;
            let body = self.body(Some(stop))?;
            let rule = Rule {
                selector,
                nodes: body.nodes,
                raws: BlockRaws {
                    before: None,
                    between: Some(between),
                    after: Some(body.after),
                    semicolon: body.semicolon,
                },
                source: Some(self.source(start, self.pos - 1)),
            };
            return Ok((Node::Rule(rule), false));
        }

        let terminated = self.css().as_bytes().get(stop) == Some(&b';');
        // Trailing whitespace before `}` belongs to the parent block
        let end = if terminated {
            stop
        } else {
            start + self.css()[start..stop].trim_end().len()
        };

        let colon = self.scan(start, b":;{}")?;
        if colon >= end || self.css().as_bytes().get(colon) != Some(&b':') {
            return Err(self.error("Unknown word", start));
        }
        let prop = self.css()[start..colon].trim_end();
        if prop.is_empty() {
            return Err(self.error("Unknown word", start));
        }
        let prop_end = start + prop.len();

        let value_region = &self.css()[colon + 1..end];
        let value_start = colon + 1 + (value_region.len() - value_region.trim_start().len());
        let between = self.css()[prop_end..value_start].to_string();
        let raw_value = &self.css()[value_start..end];

        let mut decl = Declaration {
            prop: prop.to_string(),
            value: String::new(),
            important: false,
            raws: DeclarationRaws {
                before: None,
                between: Some(between),
                important: None,
                value: None,
            },
            source: Some(self.source(start, end.saturating_sub(1))),
        };

        let mut value_text = raw_value;
        let trimmed = raw_value.trim_end();
        if let Some(bang) = trimmed.rfind('!') {
            if trimmed[bang + 1..].trim().eq_ignore_ascii_case("important") {
                let head = raw_value[..bang].trim_end();
                let suffix = &raw_value[head.len()..];
                decl.important = true;
                if suffix != " !important" {
                    decl.raws.important = Some(suffix.to_string());
                }
                value_text = head;
            }
        }

        let value = value_text.trim_end();
        decl.value = value.to_string();
        if value != value_text {
            decl.raws.value = Some(RawValue {
                value: value.to_string(),
                raw: value_text.to_string(),
            });
        }

        self.pos = if terminated { stop + 1 } else { end };
        Ok((Node::Decl(decl), terminated))
    }

    /// Offset of the first byte in `stops` outside strings, comments and
    /// parentheses, or the end of input.
    fn scan(&self, from: usize, stops: &[u8]) -> Result<usize> {
        let bytes = self.css().as_bytes();
        let mut parens: Vec<usize> = Vec::new();
        let mut i = from;

        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(i)?;
                    continue;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    match self.css()[i + 2..].find("*/") {
                        Some(close) => i += 2 + close + 2,
                        None => return Err(self.error("Unclosed comment", i)),
                    }
                    continue;
                }
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'(' => parens.push(i),
                b')' => {
                    parens.pop();
                }
                b if parens.is_empty() && stops.contains(&b) => return Ok(i),
                _ => {}
            }
            i += 1;
        }

        if let Some(&open) = parens.first() {
            return Err(self.error("Unclosed bracket", open));
        }
        Ok(bytes.len())
    }

    /// Offset just past the string starting at `start`
    fn skip_string(&self, start: usize) -> Result<usize> {
        let bytes = self.css().as_bytes();
        let quote = bytes[start];
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b if b == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(self.error("Unclosed string", start))
    }
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b';' | b'(' | b'"' | b'\'' | b'/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stringifier::stringify;

    fn parse_str(css: &str) -> Result<Stylesheet> {
        parse(Arc::new(Input {
            css: css.to_string(),
            file: None,
        }))
    }

    #[test]
    fn test_round_trips_input() {
        let inputs = [
            "a { color: black }",
            "a{color:black;}\n",
            "@import \"b.css\";\n\n/* note */\na {\n  color: red !important;\n  margin : 0 ;\n}\n",
            "@media (min-width: 10px) {\n  a { background: url(data:image/png;base64,AA==) }\n}",
            "a { content: \"}\" ; }  ",
            "/**/a{}",
            "a { color: red ! IMPORTANT }",
        ];
        for css in inputs {
            let root = parse_str(css).unwrap();
            assert_eq!(stringify(&root), css);
        }
    }

    #[test]
    fn test_declaration_fields() {
        let root = parse_str("a {\n  color : red  !important;\n}").unwrap();
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected a rule");
        };
        assert_eq!(rule.selector, "a");
        assert!(rule.raws.semicolon);
        let Node::Decl(decl) = &rule.nodes[0] else {
            panic!("expected a declaration");
        };
        assert_eq!(decl.prop, "color");
        assert_eq!(decl.value, "red");
        assert!(decl.important);
        assert_eq!(decl.raws.between.as_deref(), Some(" : "));
        assert_eq!(decl.raws.important.as_deref(), Some("  !important"));
    }

    #[test]
    fn test_positions() {
        let root = parse_str("a {\n  color: red\n}").unwrap();
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected a rule");
        };
        let start = rule.nodes[0].source().unwrap().start;
        assert_eq!((start.line, start.column), (2, 3));
    }

    #[test]
    fn test_multibyte_end_positions() {
        let css = "a { font-family: 微软雅黑 }";
        let root = parse_str(css).unwrap();
        assert_eq!(stringify(&root), css);
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected a rule");
        };
        let end = rule.nodes[0].source().unwrap().end.unwrap();
        assert_eq!((end.line, end.column, end.offset), (1, 21, 26));

        let css = "a { color: red }\u{00A0}";
        let root = parse_str(css).unwrap();
        assert_eq!(stringify(&root), css);
        assert_eq!(root.raws.after, "\u{00A0}");
        let end = root.source.as_ref().unwrap().end.unwrap();
        assert_eq!((end.column, end.offset), (17, 16));

        let root = parse_str("@layer 層").unwrap();
        assert_eq!(stringify(&root), "@layer 層");
    }

    #[test]
    fn test_statement_at_rule() {
        let root = parse_str("@charset \"utf-8\";").unwrap();
        let Node::AtRule(at_rule) = &root.nodes[0] else {
            panic!("expected an at-rule");
        };
        assert_eq!(at_rule.name, "charset");
        assert_eq!(at_rule.params, "\"utf-8\"");
        assert!(at_rule.nodes.is_none());
        assert!(root.raws.semicolon);
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            ("a {", "Unclosed block", 1, 3),
            ("a { color: red }}", "Unexpected }", 1, 17),
            ("/* open", "Unclosed comment", 1, 1),
            ("a { content: \"x }", "Unclosed string", 1, 14),
            ("a {\n  color\n}", "Unknown word", 2, 3),
        ];
        for (css, reason, line, column) in cases {
            let err = parse_str(css).unwrap_err();
            assert_eq!(err.reason, reason, "{}", css);
            assert_eq!((err.line, err.column), (line, column), "{}", css);
        }
    }
}
