use super::{CodeElement, ElementKind};
use crate::error::{CoreError, Result};
use tree_sitter::{Language, Node, Parser, Point};

/// Python structure analyzer built on tree-sitter.
///
/// Each call to [`CodeParser::parse`] builds a fresh parser and tree; nothing
/// is cached between calls.
pub struct CodeParser {
    language: Language,
}

/// A node waiting to be visited, with the class whose body directly holds it.
struct Visit<'tree> {
    node: Node<'tree>,
    owner: Option<String>,
    decorators: Vec<String>,
}

impl<'tree> Visit<'tree> {
    fn plain(node: Node<'tree>) -> Self {
        Self {
            node,
            owner: None,
            decorators: Vec::new(),
        }
    }
}

impl CodeParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::language(),
        }
    }

    /// Parse `source` into a line-ordered list of functions, classes and methods.
    ///
    /// `origin` names the source in parse failures (usually the file path).
    pub fn parse(&self, origin: &str, source: &str) -> Result<Vec<CodeElement>> {
        let mut parser = Parser::new();
        parser
            .set_language(self.language)
            .map_err(|e| CoreError::parse_failure(origin, e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| CoreError::parse_failure(origin, "parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(CoreError::parse_failure(origin, describe_error(root)));
        }

        let mut elements = self.collect_elements(root, source);
        // Stable: a class keeps its place ahead of anything sharing its first line.
        elements.sort_by_key(|e| e.start_line);
        Ok(elements)
    }

    /// Single top-down walk. Class bodies hand their direct children an
    /// owner, so a function knows it is a method when it is visited and is
    /// never emitted twice.
    fn collect_elements(&self, root: Node, source: &str) -> Vec<CodeElement> {
        let mut elements = Vec::new();
        let mut stack = vec![Visit::plain(root)];

        while let Some(visit) = stack.pop() {
            let node = visit.node;
            match node.kind() {
                "decorated_definition" => {
                    let decorators = node_children(node)
                        .into_iter()
                        .filter(|child| child.kind() == "decorator")
                        .map(|decorator| decorator_name(decorator, source))
                        .collect();
                    if let Some(definition) = node.child_by_field_name("definition") {
                        stack.push(Visit {
                            node: definition,
                            owner: visit.owner,
                            decorators,
                        });
                    }
                }
                "class_definition" => {
                    let name = field_text(node, "name", source);
                    let body = node.child_by_field_name("body");
                    elements.push(CodeElement {
                        name: name.clone(),
                        kind: ElementKind::Class,
                        start_line: start_line(node),
                        end_line: end_line(node),
                        docstring: body.and_then(|b| docstring(b, source)),
                        decorators: visit.decorators,
                        parent_class: None,
                    });
                    if let Some(body) = body {
                        for child in node_children(body).into_iter().rev() {
                            stack.push(Visit {
                                node: child,
                                owner: Some(name.clone()),
                                decorators: Vec::new(),
                            });
                        }
                    }
                }
                "function_definition" => {
                    let is_async = node.child(0).map_or(false, |c| c.kind() == "async");
                    let kind = match (visit.owner.is_some(), is_async) {
                        (true, true) => ElementKind::AsyncMethod,
                        (true, false) => ElementKind::Method,
                        (false, true) => ElementKind::AsyncFunction,
                        (false, false) => ElementKind::Function,
                    };
                    let body = node.child_by_field_name("body");
                    elements.push(CodeElement {
                        name: field_text(node, "name", source),
                        kind,
                        start_line: start_line(node),
                        end_line: end_line(node),
                        docstring: body.and_then(|b| docstring(b, source)),
                        decorators: visit.decorators,
                        parent_class: visit.owner,
                    });
                    if let Some(body) = body {
                        for child in node_children(body).into_iter().rev() {
                            stack.push(Visit::plain(child));
                        }
                    }
                }
                _ => {
                    for child in node_children(node).into_iter().rev() {
                        stack.push(Visit::plain(child));
                    }
                }
            }
        }

        elements
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

fn node_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children
}

fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.start_byte()..node.end_byte()]
}

fn field_text(node: Node, field: &str, source: &str) -> String {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default()
}

fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Last line holding code of the node. Comments trailing the final
/// statement are not part of the span, and a node whose end sits at
/// column 0 ends on the line before.
fn end_line(node: Node) -> usize {
    let start = node.start_position();
    let end = code_end(node).end_position();
    if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    }
}

/// Innermost node whose end is the end of the code inside `node`, skipping
/// trailing comments. Descends only through children that close their
/// parent, so delimiters such as `)` are never cut off.
fn code_end(node: Node) -> Node {
    let children = node_children(node);
    match children.last() {
        Some(last) if last.end_byte() == node.end_byte() => children
            .iter()
            .rev()
            .find(|child| child.kind() != "comment")
            .map_or(node, |child| code_end(*child)),
        _ => node,
    }
}

/// Reduce a decorator to a dotted name; calls resolve to the called expression.
fn decorator_name(decorator: Node, source: &str) -> String {
    match decorator.named_child(0) {
        Some(expression) => expression_name(expression, source),
        None => node_text(decorator, source).trim_start_matches('@').trim().to_string(),
    }
}

fn expression_name(node: Node, source: &str) -> String {
    match node.kind() {
        "identifier" => node_text(node, source).to_string(),
        "attribute" => {
            let object = node
                .child_by_field_name("object")
                .map(|n| expression_name(n, source))
                .unwrap_or_default();
            format!("{}.{}", object, field_text(node, "attribute", source))
        }
        "call" => node
            .child_by_field_name("function")
            .map(|n| expression_name(n, source))
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

/// Docstring of a function/class body: its first statement, when that is a
/// plain string literal, cleaned of indentation.
fn docstring(body: Node, source: &str) -> Option<String> {
    let first = node_children(body)
        .into_iter()
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }

    let literal = first.named_child(0)?;
    let raw = match literal.kind() {
        "string" => string_value(node_text(literal, source))?,
        "concatenated_string" => node_children(literal)
            .into_iter()
            .filter(|part| part.kind() == "string")
            .map(|part| string_value(node_text(part, source)))
            .collect::<Option<Vec<_>>>()?
            .concat(),
        _ => return None,
    };

    Some(clean_doc(&raw))
}

/// Value of a string literal token. Byte and formatted strings yield `None`.
fn string_value(literal: &str) -> Option<String> {
    let quote_at = literal.find(|c| c == '"' || c == '\'')?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }

    let body = &literal[quote_at..];
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < quote_len * 2 {
        return None;
    }
    let inner = &body[quote_len..body.len() - quote_len];

    if prefix.contains('r') {
        Some(inner.to_string())
    } else {
        Some(unescape(inner))
    }
}

/// Decode backslash escapes. `\N{...}` and unknown escapes stay as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '\\' | '\'' | '"' => out.push(escape),
            // Line continuation.
            '\n' => {}
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                match hex_char(&digits, width) {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(width - 1);
                    }
                    None => {
                        out.push('\\');
                        out.push(escape);
                    }
                }
            }
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn hex_char(digits: &str, width: usize) -> Option<char> {
    if digits.len() != width || !digits.chars().all(|d| d.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// Strip docstring indentation: the first line loses its leading
/// whitespace, the rest lose their common margin, and blank lines at either
/// end are dropped.
fn clean_doc(doc: &str) -> String {
    let lines: Vec<String> = doc.split('\n').map(expand_tabs).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim_start().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min();

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim_start());
        } else {
            let cut = margin.unwrap_or(0).min(line.len());
            // Whitespace is ASCII after tab expansion, so `cut` is a char boundary
            // unless the line is shorter than the margin and holds non-space text.
            cleaned.push(line.get(cut..).unwrap_or_else(|| line.trim_start()));
        }
    }

    while cleaned.last().map_or(false, |l| l.is_empty()) {
        cleaned.pop();
    }
    let leading = cleaned.iter().take_while(|l| l.is_empty()).count();

    cleaned[leading..].join("\n")
}

fn expand_tabs(line: &str) -> String {
    const TAB: usize = 8;
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB - column % TAB;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Locate the first syntax error or missing token and describe it.
fn describe_error(root: Node) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return format!("missing '{}' {}", node.kind(), at(node.start_position()));
        }
        if node.is_error() {
            return format!("invalid syntax {}", at(node.start_position()));
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    "invalid syntax".to_string()
}

fn at(point: Point) -> String {
    format!("at line {}, column {}", point.row + 1, point.column + 1)
}
