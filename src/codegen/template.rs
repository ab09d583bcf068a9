//! Code templates instantiated by instruction-selection rules.
//!
//! A template turns the code of a node's operands into the code of the node.
//! Templates nest: an argument may itself be a template applied to the same
//! operands, which is how compound intrinsic sequences such as
//! `_mm_cvtss_f32(_mm_add_ss(_mm_set_ss(a), _mm_set_ss(b)))` are written.

use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::Format;

/// Side effects a template may need from the code being generated.
pub trait TemplateContext {
    fn require_header(&mut self, header: &str);
    fn require_library(&mut self, library: &str);
    /// Store `code` into a fresh temporary of `format` and return its name.
    fn materialize(&mut self, code: &str, format: &Format) -> CodegenResult<String>;
    fn type_name(&self, format: &Format) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateShape {
    /// `name(a, b, ...)`
    Call(String),
    /// `(a op b op ...)`
    Infix(String),
    /// `(op a)`
    Prefix(String),
    /// Free text with `{0}`..`{9}`, `{r}` (result), `{t}` (result type),
    /// `{w}` (result width) placeholders; `{{`/`}}` are literal braces.
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Operand(usize),
    Result,
    Literal(String),
    Nested(Box<Template>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    shape: TemplateShape,
    /// Argument list; when absent the node operands are used in order.
    args: Option<Vec<TemplateArg>>,
    headers: Vec<String>,
    libraries: Vec<String>,
    /// Format of this template's value when nested in another one.
    output: Option<Format>,
    materialize: bool,
    writes_result: bool,
}

impl Template {
    fn with_shape(shape: TemplateShape) -> Self {
        Self {
            shape,
            args: None,
            headers: Vec::new(),
            libraries: Vec::new(),
            output: None,
            materialize: false,
            writes_result: false,
        }
    }

    pub fn call(name: &str) -> Self {
        Self::with_shape(TemplateShape::Call(name.to_string()))
    }

    pub fn infix(op: &str) -> Self {
        Self::with_shape(TemplateShape::Infix(op.to_string()))
    }

    pub fn prefix(op: &str) -> Self {
        Self::with_shape(TemplateShape::Prefix(op.to_string()))
    }

    pub fn pattern(text: &str) -> Self {
        Self::with_shape(TemplateShape::Pattern(text.to_string()))
    }

    pub fn args(mut self, args: Vec<TemplateArg>) -> Self {
        self.args = Some(args);
        self
    }

    /// Nested template as an argument.
    pub fn nest(template: Template) -> TemplateArg {
        TemplateArg::Nested(Box::new(template))
    }

    /// Apply this template to the results of `inner`.
    pub fn of(self, inner: Vec<Template>) -> Self {
        self.args(inner.into_iter().map(Self::nest).collect())
    }

    pub fn header(mut self, header: &str) -> Self {
        self.headers.push(header.to_string());
        self
    }

    pub fn library(mut self, library: &str) -> Self {
        self.libraries.push(library.to_string());
        self
    }

    pub fn output(mut self, format: Format) -> Self {
        self.output = Some(format);
        self
    }

    /// The value must live in a named temporary.
    pub fn materialized(mut self) -> Self {
        self.materialize = true;
        self
    }

    /// The code is a statement storing into `{r}` rather than an expression.
    pub fn writes_result(mut self) -> Self {
        self.writes_result = true;
        self
    }

    pub fn shape(&self) -> &TemplateShape {
        &self.shape
    }

    pub fn is_materialized(&self) -> bool {
        self.materialize
    }

    pub fn is_writing_result(&self) -> bool {
        self.writes_result
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Instantiate on the code of the node operands. `result` names the
    /// destination for templates that write their own result.
    pub fn instantiate(
        &self,
        operands: &[String],
        result: Option<&str>,
        format: &Format,
        ctx: &mut dyn TemplateContext,
    ) -> CodegenResult<String> {
        for header in &self.headers {
            ctx.require_header(header);
        }
        for library in &self.libraries {
            ctx.require_library(library);
        }
        let args = self.expand_args(operands, result, ctx)?;
        let code = match &self.shape {
            TemplateShape::Call(name) => format!("{}({})", name, args.join(", ")),
            TemplateShape::Infix(op) => {
                if args.len() < 2 {
                    return Err(CodegenError::Template {
                        reason: format!("infix '{}' needs two operands, got {}", op, args.len()),
                    });
                }
                format!("({})", args.join(&format!(" {op} ")))
            }
            TemplateShape::Prefix(op) => {
                if args.len() != 1 {
                    return Err(CodegenError::Template {
                        reason: format!("prefix '{}' needs one operand, got {}", op, args.len()),
                    });
                }
                format!("({}{})", op, args[0])
            }
            TemplateShape::Pattern(text) => substitute(text, &args, result, format, &*ctx)?,
        };
        log::trace!("Instantiated {:?} as {}", self.shape, code);
        if self.materialize && !self.writes_result {
            return ctx.materialize(&code, self.output.as_ref().unwrap_or(format));
        }
        Ok(code)
    }

    fn expand_args(
        &self,
        operands: &[String],
        result: Option<&str>,
        ctx: &mut dyn TemplateContext,
    ) -> CodegenResult<Vec<String>> {
        let Some(args) = &self.args else {
            return Ok(operands.to_vec());
        };
        let mut expanded = Vec::with_capacity(args.len());
        for arg in args {
            let code = match arg {
                TemplateArg::Operand(index) => operand(operands, *index)?,
                TemplateArg::Result => result_name(result)?,
                TemplateArg::Literal(text) => text.clone(),
                TemplateArg::Nested(inner) => {
                    let inner_format = inner.output.clone().unwrap_or(Format::Void);
                    inner.instantiate(operands, result, &inner_format, ctx)?
                }
            };
            expanded.push(code);
        }
        Ok(expanded)
    }
}

fn operand(operands: &[String], index: usize) -> CodegenResult<String> {
    operands.get(index).cloned().ok_or_else(|| CodegenError::Template {
        reason: format!("operand index {} out of range ({} operands)", index, operands.len()),
    })
}

fn result_name(result: Option<&str>) -> CodegenResult<String> {
    result.map(str::to_string).ok_or_else(|| CodegenError::Template {
        reason: "result placeholder used without a destination".to_string(),
    })
}

fn substitute(
    text: &str,
    args: &[String],
    result: Option<&str>,
    format: &Format,
    ctx: &dyn TemplateContext,
) -> CodegenResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => {
                            return Err(CodegenError::Template {
                                reason: format!("unterminated placeholder in '{text}'"),
                            })
                        }
                    }
                }
                match key.as_str() {
                    "r" => out.push_str(&result_name(result)?),
                    "t" => out.push_str(&ctx.type_name(format)),
                    "w" => out.push_str(&format.bit_size().to_string()),
                    index => {
                        let index: usize = index.parse().map_err(|_| CodegenError::Template {
                            reason: format!("unknown placeholder '{{{index}}}'"),
                        })?;
                        out.push_str(&operand(args, index)?);
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingContext {
        headers: Vec<String>,
        libraries: Vec<String>,
        temporaries: Vec<String>,
    }

    impl TemplateContext for RecordingContext {
        fn require_header(&mut self, header: &str) {
            self.headers.push(header.to_string());
        }

        fn require_library(&mut self, library: &str) {
            self.libraries.push(library.to_string());
        }

        fn materialize(&mut self, code: &str, _format: &Format) -> CodegenResult<String> {
            let name = format!("tmp{}", self.temporaries.len());
            self.temporaries.push(format!("{name} = {code}"));
            Ok(name)
        }

        fn type_name(&self, format: &Format) -> String {
            format.c_name()
        }
    }

    fn ops(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_basic_shapes() {
        let mut ctx = RecordingContext::default();
        let f32 = Format::Binary32;
        let add = Template::infix("+");
        assert_eq!(add.instantiate(&ops(&["a", "b"]), None, &f32, &mut ctx).unwrap(), "(a + b)");
        let neg = Template::prefix("-");
        assert_eq!(neg.instantiate(&ops(&["a"]), None, &f32, &mut ctx).unwrap(), "(-a)");
        let fma = Template::call("fmaf").header("math.h").library("m");
        assert_eq!(
            fma.instantiate(&ops(&["a", "b", "c"]), None, &f32, &mut ctx).unwrap(),
            "fmaf(a, b, c)"
        );
        assert_eq!(ctx.headers, ["math.h"]);
        assert_eq!(ctx.libraries, ["m"]);
    }

    #[test]
    fn test_compound_intrinsic() {
        let mut ctx = RecordingContext::default();
        let set = |i| {
            Template::call("_mm_set_ss")
                .args(vec![TemplateArg::Operand(i)])
                .output(Format::Register(crate::ir::RegisterFormat::M128V1Float32))
        };
        let add = Template::call("_mm_cvtss_f32")
            .of(vec![Template::call("_mm_add_ss").args(vec![
                Template::nest(set(0)),
                Template::nest(set(1)),
            ])])
            .header("xmmintrin.h");
        let code = add
            .instantiate(&ops(&["x", "y"]), None, &Format::Binary32, &mut ctx)
            .unwrap();
        assert_eq!(code, "_mm_cvtss_f32(_mm_add_ss(_mm_set_ss(x), _mm_set_ss(y)))");
    }

    #[test]
    fn test_pattern_placeholders() {
        let mut ctx = RecordingContext::default();
        let cast = Template::pattern("(({t}) {0})");
        assert_eq!(
            cast.instantiate(&ops(&["x"]), None, &Format::INT32, &mut ctx).unwrap(),
            "((int32_t) x)"
        );
        let width = Template::pattern("resize({0}, {w})");
        assert_eq!(
            width.instantiate(&ops(&["s"]), None, &Format::LogicVector(12), &mut ctx).unwrap(),
            "resize(s, 12)"
        );
        let braces = Template::pattern("{{ {r} = {1}; }}");
        assert_eq!(
            braces
                .instantiate(&ops(&["a", "b"]), Some("out"), &Format::INT32, &mut ctx)
                .unwrap(),
            "{ out = b; }"
        );
    }

    #[test]
    fn test_out_of_range_operand() {
        let mut ctx = RecordingContext::default();
        let bad = Template::pattern("{0} + {2}");
        let err = bad.instantiate(&ops(&["a", "b"]), None, &Format::INT32, &mut ctx).unwrap_err();
        assert!(matches!(err, CodegenError::Template { .. }));

        let infix = Template::infix("*");
        assert!(infix.instantiate(&ops(&["a"]), None, &Format::INT32, &mut ctx).is_err());

        let result = Template::pattern("{r}");
        assert!(result.instantiate(&[], None, &Format::INT32, &mut ctx).is_err());
    }

    #[test]
    fn test_materialized_template() {
        let mut ctx = RecordingContext::default();
        let select = Template::pattern("{1} when {0} else {2}").materialized();
        let code = select
            .instantiate(&ops(&["c", "a", "b"]), None, &Format::LogicVector(4), &mut ctx)
            .unwrap();
        assert_eq!(code, "tmp0");
        assert_eq!(ctx.temporaries, ["tmp0 = a when c else b"]);
    }

    #[test]
    fn test_literal_args() {
        let mut ctx = RecordingContext::default();
        let round = Template::call("_mm_round_ss").args(vec![
            TemplateArg::Operand(0),
            TemplateArg::Operand(0),
            TemplateArg::Literal("_MM_FROUND_TO_NEAREST_INT".to_string()),
        ]);
        assert_eq!(
            round.instantiate(&ops(&["v"]), None, &Format::Binary32, &mut ctx).unwrap(),
            "_mm_round_ss(v, v, _MM_FROUND_TO_NEAREST_INT)"
        );
    }
}
