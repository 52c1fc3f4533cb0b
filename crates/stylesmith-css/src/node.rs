//! Stylesheet AST
//!
//! Every node keeps the whitespace that surrounded it in the input (its
//! "raws"), so an untouched tree stringifies back to the exact input text.
//! Raws are `Option`s: `None` means the node was built by a transformer and
//! the stringifier should pick a sensible default.

use std::path::PathBuf;
use std::sync::Arc;

/// A position in an input (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// Byte offset from the start of the input
    pub offset: usize,
    pub line: usize,
    /// Counted in characters, not bytes
    pub column: usize,
}

/// The text a tree was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub css: String,
    /// Absolute path of the input, when known
    pub file: Option<PathBuf>,
}

impl Input {
    /// Start of the character containing byte `offset`, clamped to the input
    pub fn char_start(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.css.len());
        while !self.css.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}

/// Where a node came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub input: Arc<Input>,
    pub start: Position,
    pub end: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationRaws {
    pub before: Option<String>,
    /// Everything between the property and the value, colon included
    pub between: Option<String>,
    /// The `!important` suffix as written, when it differs from ` !important`
    pub important: Option<String>,
    pub value: Option<RawValue>,
}

/// A value as written, kept while the parsed value is unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    /// The parsed value this raw text belongs to
    pub value: String,
    pub raw: String,
}

/// `prop: value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub prop: String,
    pub value: String,
    pub important: bool,
    pub raws: DeclarationRaws,
    pub source: Option<Source>,
}

impl Declaration {
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            value: value.into(),
            important: false,
            raws: DeclarationRaws::default(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRaws {
    pub before: Option<String>,
    /// Between the selector and `{`
    pub between: Option<String>,
    /// Between the last child and `}`
    pub after: Option<String>,
    /// Whether the last child was followed by `;`
    pub semicolon: bool,
}

/// `selector { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    pub nodes: Vec<Node>,
    pub raws: BlockRaws,
    pub source: Option<Source>,
}

impl Rule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            nodes: Vec::new(),
            raws: BlockRaws::default(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtRuleRaws {
    pub before: Option<String>,
    /// Between the name and the params
    pub after_name: Option<String>,
    /// Between the params and `{` or `;`
    pub between: Option<String>,
    pub after: Option<String>,
    pub semicolon: bool,
}

/// `@name params;` or `@name params { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    /// `None` for statement at-rules such as `@import`
    pub nodes: Option<Vec<Node>>,
    pub raws: AtRuleRaws,
    pub source: Option<Source>,
}

impl AtRule {
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            nodes: None,
            raws: AtRuleRaws::default(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentRaws {
    pub before: Option<String>,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// `/* text */`, with `text` trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub raws: CommentRaws,
    pub source: Option<Source>,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raws: CommentRaws::default(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(Rule),
    AtRule(AtRule),
    Decl(Declaration),
    Comment(Comment),
}

impl Node {
    pub fn source(&self) -> Option<&Source> {
        match self {
            Node::Rule(n) => n.source.as_ref(),
            Node::AtRule(n) => n.source.as_ref(),
            Node::Decl(n) => n.source.as_ref(),
            Node::Comment(n) => n.source.as_ref(),
        }
    }

    pub fn raw_before(&self) -> Option<&str> {
        match self {
            Node::Rule(n) => n.raws.before.as_deref(),
            Node::AtRule(n) => n.raws.before.as_deref(),
            Node::Decl(n) => n.raws.before.as_deref(),
            Node::Comment(n) => n.raws.before.as_deref(),
        }
    }

    pub fn set_raw_before(&mut self, before: Option<String>) {
        match self {
            Node::Rule(n) => n.raws.before = before,
            Node::AtRule(n) => n.raws.before = before,
            Node::Decl(n) => n.raws.before = before,
            Node::Comment(n) => n.raws.before = before,
        }
    }

    /// Children, for container nodes
    pub fn nodes(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Rule(n) => Some(&n.nodes),
            Node::AtRule(n) => n.nodes.as_ref(),
            Node::Decl(_) | Node::Comment(_) => None,
        }
    }

    pub fn nodes_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Rule(n) => Some(&mut n.nodes),
            Node::AtRule(n) => n.nodes.as_mut(),
            Node::Decl(_) | Node::Comment(_) => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Node::Comment(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootRaws {
    /// Trailing text after the last node
    pub after: String,
    pub semicolon: bool,
}

/// A parsed stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
    pub raws: RootRaws,
    pub source: Option<Source>,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Stylesheet {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            raws: RootRaws::default(),
            source: None,
        }
    }

    /// The input this tree was parsed from
    pub fn input(&self) -> Option<&Arc<Input>> {
        self.source.as_ref().map(|s| &s.input)
    }

    /// Visit every node, parents before children
    pub fn walk<F: FnMut(&Node)>(&self, mut f: F) {
        fn visit<F: FnMut(&Node)>(nodes: &[Node], f: &mut F) {
            for node in nodes {
                f(node);
                if let Some(children) = node.nodes() {
                    visit(children, f);
                }
            }
        }
        visit(&self.nodes, &mut f);
    }

    /// Visit every declaration
    pub fn walk_decls<F: FnMut(&Declaration)>(&self, mut f: F) {
        self.walk(|node| {
            if let Node::Decl(decl) = node {
                f(decl);
            }
        });
    }

    /// Visit every declaration mutably
    pub fn walk_decls_mut<F: FnMut(&mut Declaration)>(&mut self, mut f: F) {
        self.each_container_mut(|nodes| {
            for node in nodes.iter_mut() {
                if let Node::Decl(decl) = node {
                    f(decl);
                }
            }
        });
    }

    /// Call `f` with the child list of the root and of every container
    ///
    /// `f` may insert, remove or replace children. Containers are visited
    /// parents first, so children inserted by `f` are visited too.
    pub fn each_container_mut<F: FnMut(&mut Vec<Node>)>(&mut self, mut f: F) {
        fn visit<F: FnMut(&mut Vec<Node>)>(nodes: &mut Vec<Node>, f: &mut F) {
            f(nodes);
            for node in nodes.iter_mut() {
                if let Some(children) = node.nodes_mut() {
                    visit(children, f);
                }
            }
        }
        visit(&mut self.nodes, &mut f);
    }

    /// Remove top-level `/*# sourceMappingURL=... */` comments
    pub fn remove_source_map_annotations(&mut self) {
        self.nodes.retain(|node| match node {
            Node::Comment(comment) => !comment.text.starts_with("# sourceMappingURL="),
            _ => true,
        });
    }
}
