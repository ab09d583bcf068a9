//! Parser for the textual operation-graph format.
//!
//! ```text
//! ; comments start with a semicolon
//! func exp_core(x: binary32 in [-0.5, 0.5]) -> binary32 {
//!     %c = const 1.5 : binary32
//!     %t = table [1.0, 2.0, 4.0] : binary32
//!     %i = nearestint %x : int32
//!     %l = tableload %t, %i : binary32
//!     %p = fma %x, %c, %l : binary32 @poly
//!     %k = cmp.lt %x, %c : bool
//!     if %k {
//!         return %p
//!     } else {
//!         return %l
//!     }
//! }
//! ```

use super::format::Format;
use super::graph::{ConstValue, FunctionArg, FunctionDef, NodeId, OpGraph, OpKind, Specifier};
use crate::core::error::{CodegenError, CodegenResult};
use hashbrown::HashMap;

/// Graph plus the functions defined over it.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub graph: OpGraph,
    pub functions: Vec<FunctionDef>,
}

pub fn parse_module(text: &str) -> CodegenResult<ParsedModule> {
    Parser::new(text).parse()
}

enum BlockEnd {
    Close,
    Else,
}

struct Parser<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
    graph: OpGraph,
    functions: Vec<FunctionDef>,
    // Per-function value names.
    values: HashMap<&'a str, NodeId>,
}

fn parse_error(line: usize, reason: impl Into<String>) -> CodegenError {
    CodegenError::Parse { line, reason: reason.into() }
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                let line = match line.find(';') {
                    Some(comment) => &line[..comment],
                    None => line,
                };
                (idx + 1, line.trim())
            })
            .filter(|(_, line)| !line.is_empty())
            .collect();
        Self {
            lines,
            pos: 0,
            graph: OpGraph::new(),
            functions: Vec::new(),
            values: HashMap::new(),
        }
    }

    fn parse(mut self) -> CodegenResult<ParsedModule> {
        while let Some((line_no, line)) = self.next_line() {
            let header = line
                .strip_prefix("func ")
                .ok_or_else(|| parse_error(line_no, format!("expected 'func', found '{line}'")))?;
            self.parse_function(line_no, header)?;
        }
        Ok(ParsedModule {
            graph: self.graph,
            functions: self.functions,
        })
    }

    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.pos).copied();
        self.pos += 1;
        line
    }

    fn parse_function(&mut self, line_no: usize, header: &'a str) -> CodegenResult<()> {
        let open = header
            .find('(')
            .ok_or_else(|| parse_error(line_no, "missing '(' in function header"))?;
        let close = header
            .rfind(')')
            .ok_or_else(|| parse_error(line_no, "missing ')' in function header"))?;
        let name = header[..open].trim();
        if name.is_empty() {
            return Err(parse_error(line_no, "missing function name"));
        }
        let tail = header[close + 1..].trim();
        let result = tail
            .strip_prefix("->")
            .and_then(|rest| rest.trim().strip_suffix('{'))
            .ok_or_else(|| parse_error(line_no, "expected '-> format {' after arguments"))?;
        let result = parse_format(line_no, result)?;

        self.values.clear();
        let mut args = Vec::new();
        for arg in split_top_level(&header[open + 1..close]) {
            let (arg_name, rest) = arg
                .split_once(':')
                .ok_or_else(|| parse_error(line_no, format!("argument '{arg}' has no format")))?;
            let arg_name = arg_name.trim();
            let (format, range) = match rest.split_once(" in ") {
                Some((format, range)) => (format, Some(parse_range(line_no, range)?)),
                None => (rest, None),
            };
            let format = parse_format(line_no, format)?;
            let node = self.graph.variable(arg_name, format.clone());
            self.values.insert(arg_name, node);
            args.push(FunctionArg {
                name: arg_name.to_string(),
                format,
                node,
                range,
            });
        }

        let (stmts, end) = self.parse_block()?;
        if matches!(end, BlockEnd::Else) {
            return Err(parse_error(line_no, "'else' outside of an if block"));
        }
        let body = self.sequence(stmts);
        log::debug!("parsed function {} ({} nodes)", name, self.graph.len());
        self.functions.push(FunctionDef {
            name: name.to_string(),
            args,
            result,
            body,
        });
        Ok(())
    }

    fn sequence(&mut self, stmts: Vec<NodeId>) -> NodeId {
        if stmts.len() == 1 {
            stmts[0]
        } else {
            self.graph.op(OpKind::Statement, &stmts, Format::Void)
        }
    }

    fn parse_block(&mut self) -> CodegenResult<(Vec<NodeId>, BlockEnd)> {
        let mut stmts = Vec::new();
        loop {
            let Some((line_no, line)) = self.next_line() else {
                let last = self.lines.last().map(|(n, _)| *n).unwrap_or(0);
                return Err(parse_error(last, "unterminated block"));
            };
            if line == "}" {
                return Ok((stmts, BlockEnd::Close));
            }
            if line == "} else {" {
                return Ok((stmts, BlockEnd::Else));
            }
            if let Some(value) = line.strip_prefix("return ") {
                let value = self.lookup(line_no, value.trim())?;
                stmts.push(self.graph.op(OpKind::Return, &[value], Format::Void));
            } else if let Some(cond) = line.strip_prefix("if ") {
                let cond = cond
                    .strip_suffix('{')
                    .ok_or_else(|| parse_error(line_no, "expected '{' after condition"))?;
                let cond = self.lookup(line_no, cond.trim())?;
                let (then_stmts, end) = self.parse_block()?;
                let then_node = self.sequence(then_stmts);
                let mut operands = vec![cond, then_node];
                if matches!(end, BlockEnd::Else) {
                    let (else_stmts, end) = self.parse_block()?;
                    if matches!(end, BlockEnd::Else) {
                        return Err(parse_error(line_no, "chained 'else' is not supported"));
                    }
                    operands.push(self.sequence(else_stmts));
                }
                stmts.push(self.graph.op(OpKind::ConditionBlock, &operands, Format::Void));
            } else if line.starts_with('%') {
                self.parse_assignment(line_no, line)?;
            } else {
                return Err(parse_error(line_no, format!("unexpected '{line}'")));
            }
        }
    }

    fn parse_assignment(&mut self, line_no: usize, line: &'a str) -> CodegenResult<()> {
        let (target, rhs) = line
            .split_once('=')
            .ok_or_else(|| parse_error(line_no, "expected '='"))?;
        let target = target
            .trim()
            .strip_prefix('%')
            .ok_or_else(|| parse_error(line_no, "value names start with '%'"))?;
        if self.values.contains_key(target) {
            return Err(parse_error(line_no, format!("value %{target} defined twice")));
        }

        let (rhs, tag) = match rhs.rsplit_once('@') {
            Some((rhs, tag)) => (rhs, Some(tag.trim())),
            None => (rhs, None),
        };
        let (expr, format) = rhs
            .rsplit_once(':')
            .ok_or_else(|| parse_error(line_no, "expected ': format'"))?;
        let format = parse_format(line_no, format)?;
        let expr = expr.trim();
        let (op, args) = match expr.split_once(char::is_whitespace) {
            Some((op, args)) => (op, args.trim()),
            None => (expr, ""),
        };

        let node = match op {
            "const" => {
                let value = parse_value(line_no, args, &format)?;
                self.graph.constant(value, format)
            }
            "table" => {
                let inner = args
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| parse_error(line_no, "table values must be in brackets"))?;
                let values = inner
                    .split(',')
                    .map(|v| parse_value(line_no, v, &format))
                    .collect::<CodegenResult<Vec<_>>>()?;
                self.graph.table(values, format)
            }
            _ => {
                let (kind, spec) = match op.split_once('.') {
                    Some((kind, spec)) => (kind, Some(spec)),
                    None => (op, None),
                };
                let kind = OpKind::from_name(kind)
                    .filter(|k| !k.info().is_leaf && !k.info().is_statement)
                    .ok_or_else(|| parse_error(line_no, format!("unknown operation '{kind}'")))?;
                let specifier = match spec {
                    Some(spec) => Specifier::from_name(spec)
                        .ok_or_else(|| parse_error(line_no, format!("unknown specifier '{spec}'")))?,
                    None => Specifier::None,
                };
                let operands = if args.is_empty() {
                    Vec::new()
                } else {
                    args.split(',')
                        .map(|a| self.lookup(line_no, a.trim()))
                        .collect::<CodegenResult<Vec<_>>>()?
                };
                if let Some(arity) = kind.info().arity {
                    if operands.len() != arity {
                        return Err(parse_error(
                            line_no,
                            format!("'{kind}' takes {arity} operand(s), got {}", operands.len()),
                        ));
                    }
                }
                self.graph.op_with(kind, specifier, &operands, format)
            }
        };
        if let Some(tag) = tag {
            self.graph.tagged(node, tag);
        }
        self.values.insert(target, node);
        Ok(())
    }

    fn lookup(&self, line_no: usize, name: &str) -> CodegenResult<NodeId> {
        let key = name
            .strip_prefix('%')
            .ok_or_else(|| parse_error(line_no, format!("expected a %value, found '{name}'")))?;
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| parse_error(line_no, format!("undefined value %{key}")))
    }
}

fn parse_format(line_no: usize, text: &str) -> CodegenResult<Format> {
    Format::parse(text).ok_or_else(|| parse_error(line_no, format!("unknown format '{}'", text.trim())))
}

fn parse_value(line_no: usize, text: &str, format: &Format) -> CodegenResult<ConstValue> {
    let text = text.trim();
    let bad = || parse_error(line_no, format!("invalid {format} literal '{text}'"));
    match format {
        Format::Bool => match text {
            "true" | "1" => Ok(ConstValue::Bool(true)),
            "false" | "0" => Ok(ConstValue::Bool(false)),
            _ => Err(bad()),
        },
        f if f.is_float() || f.is_fixed() || f.is_vector() => {
            text.parse().map(ConstValue::Float).map_err(|_| bad())
        }
        _ => {
            let parsed = match text.strip_prefix("0x") {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => text.parse(),
            };
            parsed.map(ConstValue::Int).map_err(|_| bad())
        }
    }
}

fn parse_range(line_no: usize, text: &str) -> CodegenResult<(f64, f64)> {
    let bad = || parse_error(line_no, format!("invalid interval '{}'", text.trim()));
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(bad)?;
    let (lo, hi) = inner.split_once(',').ok_or_else(bad)?;
    let lo: f64 = lo.trim().parse().map_err(|_| bad())?;
    let hi: f64 = hi.trim().parse().map_err(|_| bad())?;
    if lo > hi {
        return Err(bad());
    }
    Ok((lo, hi))
}

/// Split on commas that are not inside brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph::Payload;

    #[test]
    fn test_parse_simple_function() {
        let module = parse_module(
            "; add a constant\n\
             func f(x: binary32) -> binary32 {\n\
                 %c = const 1.5 : binary32\n\
                 %y = add %x, %c : binary32 @sum\n\
                 return %y\n\
             }\n",
        )
        .unwrap();
        assert_eq!(module.functions.len(), 1);
        let func = &module.functions[0];
        assert_eq!(func.name, "f");
        assert_eq!(func.args[0].format, Format::Binary32);
        let ret = module.graph.node(func.body);
        assert_eq!(ret.kind, OpKind::Return);
        let sum = module.graph.node(ret.operands[0]);
        assert_eq!(sum.kind, OpKind::Addition);
        assert_eq!(sum.tag.as_deref(), Some("sum"));
        assert_eq!(
            module.graph.node(sum.operands[1]).payload,
            Payload::Constant(ConstValue::Float(1.5))
        );
    }

    #[test]
    fn test_parse_ranges_and_specifiers() {
        let module = parse_module(
            "func g(x: binary64 in [-0.5, 0.5], n: int32) -> bool {\n\
                 %k = cmp.ge %x, %x : bool\n\
                 return %k\n\
             }\n",
        )
        .unwrap();
        let func = &module.functions[0];
        assert_eq!(func.args[0].range, Some((-0.5, 0.5)));
        assert_eq!(func.args[1].range, None);
        let ret = module.graph.node(func.body);
        let cmp = module.graph.node(ret.operands[0]);
        assert_eq!(cmp.specifier, Specifier::GreaterOrEqual);
    }

    #[test]
    fn test_parse_if_else() {
        let module = parse_module(
            "func h(x: int32) -> int32 {\n\
                 %z = const 0 : int32\n\
                 %k = cmp.lt %x, %z : bool\n\
                 if %k {\n\
                     return %z\n\
                 } else {\n\
                     return %x\n\
                 }\n\
             }\n",
        )
        .unwrap();
        let body = module.graph.node(module.functions[0].body);
        assert_eq!(body.kind, OpKind::ConditionBlock);
        assert_eq!(body.operands.len(), 3);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_module("func f(x: binary32) -> binary32 {\n  %y = frob %x : binary32\n}\n")
            .unwrap_err();
        assert_eq!(
            err,
            CodegenError::Parse { line: 2, reason: "unknown operation 'frob'".to_string() }
        );

        let err = parse_module("func f(x: binary32) -> binary32 {\n  return %y\n}\n").unwrap_err();
        assert!(matches!(err, CodegenError::Parse { line: 2, .. }));

        let err = parse_module("func f(x: binary32) -> binary32 {\n  return %x\n").unwrap_err();
        assert!(matches!(err, CodegenError::Parse { .. }));
    }

    #[test]
    fn test_parse_rejects_fixed_point_wider_than_64_bits() {
        let err = parse_module(
            "func f(x: ufix1.70) -> ufix1.70 {\n  %c = const 0.5 : ufix1.70\n  return %c\n}\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, CodegenError::Parse { line: 1, ref reason } if reason.contains("ufix1.70")),
            "{err}"
        );
    }

    #[test]
    fn test_parse_arity_is_checked() {
        let err = parse_module("func f(x: binary32) -> binary32 {\n  %y = add %x : binary32\n}\n")
            .unwrap_err();
        assert!(err.to_string().contains("takes 2 operand(s)"));
    }
}
