//! Turning a tree back into text
//!
//! Raws recorded by the parser are written back as-is. Nodes created by
//! transformers have no raws, so they get the defaults below.

use crate::node::{AtRule, Comment, Declaration, Node, Rule, Source, Stylesheet};

const INDENT: &str = "    ";

/// Which end of a node a fragment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

/// Stringify a whole tree
pub fn stringify(root: &Stylesheet) -> String {
    let mut out = String::new();
    stringify_with(root, |text, _| out.push_str(text));
    out
}

/// Stringify a tree, handing each fragment to `builder`
///
/// Fragments that open (or close) a node come with that node's source, so
/// callers can record where each node landed in the output.
pub fn stringify_with<F>(root: &Stylesheet, builder: F)
where
    F: FnMut(&str, Option<(&Source, Edge)>),
{
    let mut stringifier = Stringifier { builder };
    stringifier.body(&root.nodes, root.raws.semicolon, 0);
    if !root.raws.after.is_empty() {
        stringifier.text(&root.raws.after);
    }
}

struct Stringifier<F> {
    builder: F,
}

impl<F> Stringifier<F>
where
    F: FnMut(&str, Option<(&Source, Edge)>),
{
    fn text(&mut self, text: &str) {
        (self.builder)(text, None);
    }

    fn node_text(&mut self, text: &str, source: Option<&Source>, edge: Edge) {
        (self.builder)(text, source.map(|s| (s, edge)));
    }

    fn body(&mut self, nodes: &[Node], semicolon: bool, depth: usize) {
        // The last node that may take a semicolon
        let last = nodes.iter().rposition(|n| !n.is_comment()).unwrap_or(0);

        for (i, child) in nodes.iter().enumerate() {
            let before = match child.raw_before() {
                Some(before) => before.to_string(),
                None => default_before(depth, i),
            };
            if !before.is_empty() {
                self.text(&before);
            }
            self.node(child, last != i || semicolon, depth);
        }
    }

    fn node(&mut self, node: &Node, semicolon: bool, depth: usize) {
        match node {
            Node::Decl(decl) => self.decl(decl, semicolon),
            Node::Rule(rule) => self.rule(rule, depth),
            Node::AtRule(at_rule) => self.at_rule(at_rule, semicolon, depth),
            Node::Comment(comment) => self.comment(comment),
        }
    }

    fn decl(&mut self, decl: &Declaration, semicolon: bool) {
        let mut text = decl.prop.clone();
        text.push_str(decl.raws.between.as_deref().unwrap_or(": "));
        match &decl.raws.value {
            Some(raw) if raw.value == decl.value => text.push_str(&raw.raw),
            _ => text.push_str(&decl.value),
        }
        if decl.important {
            text.push_str(decl.raws.important.as_deref().unwrap_or(" !important"));
        }
        if semicolon {
            text.push(';');
        }
        self.node_text(&text, decl.source.as_ref(), Edge::Start);
    }

    fn rule(&mut self, rule: &Rule, depth: usize) {
        let between = rule.raws.between.as_deref().unwrap_or(" ");
        self.block(
            &format!("{}{}", rule.selector, between),
            &rule.nodes,
            rule.raws.after.as_deref(),
            rule.raws.semicolon,
            rule.source.as_ref(),
            depth,
        );
    }

    fn at_rule(&mut self, at_rule: &AtRule, semicolon: bool, depth: usize) {
        let mut start = format!("@{}", at_rule.name);
        match &at_rule.raws.after_name {
            Some(after_name) => start.push_str(after_name),
            None if !at_rule.params.is_empty() => start.push(' '),
            None => {}
        }
        start.push_str(&at_rule.params);

        match &at_rule.nodes {
            Some(nodes) => {
                start.push_str(at_rule.raws.between.as_deref().unwrap_or(" "));
                self.block(
                    &start,
                    nodes,
                    at_rule.raws.after.as_deref(),
                    at_rule.raws.semicolon,
                    at_rule.source.as_ref(),
                    depth,
                );
            }
            None => {
                start.push_str(at_rule.raws.between.as_deref().unwrap_or(""));
                if semicolon {
                    start.push(';');
                }
                self.node_text(&start, at_rule.source.as_ref(), Edge::Start);
            }
        }
    }

    fn block(
        &mut self,
        start: &str,
        nodes: &[Node],
        after: Option<&str>,
        semicolon: bool,
        source: Option<&Source>,
        depth: usize,
    ) {
        self.node_text(&format!("{}{{", start), source, Edge::Start);
        let after = if nodes.is_empty() {
            after.unwrap_or("").to_string()
        } else {
            self.body(nodes, semicolon, depth + 1);
            match after {
                Some(after) => after.to_string(),
                None => format!("\n{}", INDENT.repeat(depth)),
            }
        };
        if !after.is_empty() {
            self.text(&after);
        }
        self.node_text("}", source, Edge::End);
    }

    fn comment(&mut self, comment: &Comment) {
        let left = comment.raws.left.as_deref().unwrap_or(" ");
        let right = comment.raws.right.as_deref().unwrap_or(" ");
        let text = format!("/*{}{}{}*/", left, comment.text, right);
        self.node_text(&text, comment.source.as_ref(), Edge::Start);
    }
}

fn default_before(depth: usize, index: usize) -> String {
    if depth == 0 {
        if index == 0 { String::new() } else { "\n".to_string() }
    } else {
        format!("\n{}", INDENT.repeat(depth))
    }
}
