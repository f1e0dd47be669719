//! Template rendering against the merged configuration.
//!
//! Templates are Tera (Jinja-style) files. Rendering is strict: a reference
//! to a variable the context does not define fails with
//! [`HelmgenError::UndefinedReference`] instead of rendering as empty, so a
//! value missing from every layer cannot slip into a generated file.
//!
//! Tera alone only enforces this when a value is printed; `{% if %}` and
//! `{% for %}` treat a missing path as false or empty. Every parsed template
//! is therefore checked against the context before rendering. Loop and
//! `set` variables are local. Two forms may name missing paths on purpose:
//! the `defined`/`undefined` tests and an expression whose first filter is
//! `default`.
//!
//! Filters registered on top of Tera's builtins:
//!
//! | Filter | Effect |
//! |--------|--------|
//! | `base64encode` | standard base64 of a string or number |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tera::ast::{Expr, ExprVal, FunctionCall, Node};
use tera::{Context, Tera, Value};
use toml::Table;
use tracing::{debug, info};

use crate::error::HelmgenError;
use crate::tree::get_path;

const UNDEFINED_MARKER: &str = "not found in context";

/// `{{ secret.password | base64encode }}`
///
/// Numbers are encoded from their decimal text, since digit-only values
/// reach the context as integers.
pub fn base64encode(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let input = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(tera::Error::msg(format!(
                "base64encode expects a string, got {other}"
            )));
        }
    };
    Ok(Value::String(STANDARD.encode(input)))
}

/// A rendered template and where its output goes.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub template: PathBuf,
    pub output: PathBuf,
    pub text: String,
}

impl Rendered {
    pub fn write(&self) -> Result<(), HelmgenError> {
        std::fs::write(&self.output, &self.text).map_err(|e| HelmgenError::IoError {
            path: self.output.clone(),
            source: e,
        })?;
        info!(output = %self.output.display(), "wrote");
        Ok(())
    }
}

pub struct TemplateRenderer {
    tera: Tera,
    extension: String,
    generated_suffix: String,
}

impl TemplateRenderer {
    /// `extension` is the template extension (without the dot) stripped when
    /// naming outputs; `generated_suffix` marks generated YAML files.
    pub fn new(extension: &str, generated_suffix: &str) -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("base64encode", base64encode);
        Self {
            tera,
            extension: extension.to_string(),
            generated_suffix: generated_suffix.to_string(),
        }
    }

    /// Render template `source`, registered under `name`, with `context`.
    pub fn render_str(
        &mut self,
        name: &Path,
        source: &str,
        context: &Table,
    ) -> Result<String, HelmgenError> {
        let key = name.to_string_lossy().into_owned();
        self.tera
            .add_raw_template(&key, source)
            .map_err(|e| classify(name, &e))?;
        let template = self.tera.get_template(&key).map_err(|e| classify(name, &e))?;
        let missing = unresolved(&template.ast, context);
        if !missing.is_empty() {
            return Err(HelmgenError::UndefinedReference {
                template: name.to_path_buf(),
                detail: format!("`{}` not defined in any layer", missing.join("`, `")),
            });
        }
        let ctx = Context::from_serialize(context).map_err(|e| classify(name, &e))?;
        self.tera.render(&key, &ctx).map_err(|e| classify(name, &e))
    }

    /// Read and render the template at `path`.
    pub fn render_file(&mut self, path: &Path, context: &Table) -> Result<Rendered, HelmgenError> {
        info!(template = %path.display(), "rendering template");
        let source = std::fs::read_to_string(path).map_err(|e| HelmgenError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = self.render_str(path, &source, context)?;
        Ok(Rendered {
            template: path.to_path_buf(),
            output: self.output_path(path),
            text,
        })
    }

    /// Output path for a template, next to it.
    ///
    /// The template extension is stripped. A remaining `yaml`/`yml`
    /// extension is replaced by `.<generated_suffix>.yaml`, so
    /// `secrets.yaml.j2` becomes `secrets.generated.yaml`; other names are
    /// used as stripped (`app.conf.j2` → `app.conf`).
    pub fn output_path(&self, template: &Path) -> PathBuf {
        let name = template
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = format!(".{}", self.extension);

        let out_name = match name.strip_suffix(suffix.as_str()) {
            Some(stripped) if !stripped.is_empty() => {
                let stripped_path = Path::new(stripped);
                match stripped_path.extension().and_then(|e| e.to_str()) {
                    Some("yaml" | "yml") => {
                        let stem = stripped_path
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        format!("{stem}.{}.yaml", self.generated_suffix)
                    }
                    _ => stripped.to_string(),
                }
            }
            _ => format!("{name}.{}", self.generated_suffix),
        };
        template.with_file_name(out_name)
    }
}

/// Context paths referenced by `nodes` that `context` does not define, in
/// template order.
fn unresolved(nodes: &[Node], context: &Table) -> Vec<String> {
    let mut check = ReferenceCheck {
        context,
        locals: Vec::new(),
        globals: Vec::new(),
        missing: Vec::new(),
    };
    check.nodes(nodes);
    check.missing
}

struct ReferenceCheck<'a> {
    context: &'a Table,
    /// Loop and block-scoped `set` names currently in scope.
    locals: Vec<String>,
    /// `set_global` names, visible for the rest of the template.
    globals: Vec<String>,
    missing: Vec<String>,
}

impl ReferenceCheck<'_> {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::VariableBlock(_, expr) => self.expr(expr),
            Node::Set(_, set) => {
                self.expr(&set.value);
                if set.global {
                    self.globals.push(set.key.clone());
                } else {
                    self.locals.push(set.key.clone());
                }
            }
            Node::FilterSection(_, section, _) => {
                self.call(&section.filter);
                self.nodes(&section.body);
            }
            Node::Block(_, block, _) => self.nodes(&block.body),
            Node::Forloop(_, forloop, _) => {
                self.expr(&forloop.container);
                let scope = self.locals.len();
                self.locals.extend(forloop.key.iter().cloned());
                self.locals.push(forloop.value.clone());
                self.locals.push("loop".into());
                self.nodes(&forloop.body);
                self.locals.truncate(scope);
                if let Some(body) = &forloop.empty_body {
                    self.nodes(body);
                }
            }
            Node::If(branches, _) => {
                for (_, condition, body) in &branches.conditions {
                    self.expr(condition);
                    self.nodes(body);
                }
                if let Some((_, body)) = &branches.otherwise {
                    self.nodes(body);
                }
            }
            _ => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if !expr.has_default_filter() {
            self.value(&expr.val);
        }
        for filter in &expr.filters {
            self.call(filter);
        }
    }

    fn call(&mut self, call: &FunctionCall) {
        for arg in call.args.values() {
            self.expr(arg);
        }
    }

    fn value(&mut self, val: &ExprVal) {
        match val {
            ExprVal::Ident(ident) => self.ident(ident),
            ExprVal::Math(math) => {
                self.expr(&math.lhs);
                self.expr(&math.rhs);
            }
            ExprVal::Logic(logic) => {
                self.expr(&logic.lhs);
                self.expr(&logic.rhs);
            }
            ExprVal::In(within) => {
                self.expr(&within.lhs);
                self.expr(&within.rhs);
            }
            ExprVal::Test(test) => {
                if !matches!(test.name.as_str(), "defined" | "undefined") {
                    self.ident(&test.ident);
                }
                for arg in &test.args {
                    self.expr(arg);
                }
            }
            ExprVal::MacroCall(call) => {
                for arg in call.args.values() {
                    self.expr(arg);
                }
            }
            ExprVal::FunctionCall(call) => self.call(call),
            ExprVal::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprVal::StringConcat(concat) => {
                for part in &concat.values {
                    self.value(part);
                }
            }
            _ => {}
        }
    }

    fn ident(&mut self, ident: &str) {
        // Bracket indexing is resolved by Tera at render time; only the
        // dotted part before it is checked here.
        let mut segments = Vec::new();
        for segment in ident.split('.') {
            match segment.split_once('[') {
                Some((name, _)) => {
                    segments.push(name);
                    break;
                }
                None => segments.push(segment),
            }
        }

        let Some(head) = segments.first() else {
            return;
        };
        if head.starts_with("__tera")
            || self.locals.iter().chain(&self.globals).any(|name| name == head)
        {
            return;
        }
        if get_path(self.context, &segments).is_none() && !self.missing.iter().any(|m| m == ident)
        {
            debug!(reference = ident, "undefined template reference");
            self.missing.push(ident.to_string());
        }
    }
}

/// Map a Tera error to the crate taxonomy, keeping the whole cause chain.
fn classify(template: &Path, err: &tera::Error) -> HelmgenError {
    let mut messages = vec![err.to_string()];
    let mut cause = std::error::Error::source(err);
    while let Some(e) = cause {
        messages.push(e.to_string());
        cause = std::error::Error::source(e);
    }
    let detail = messages.join(": ");

    if messages.iter().any(|m| m.contains(UNDEFINED_MARKER)) {
        HelmgenError::UndefinedReference {
            template: template.to_path_buf(),
            detail,
        }
    } else {
        HelmgenError::Render {
            template: template.to_path_buf(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> Table {
        "replicas = 3\n[db]\nhost = \"h1\"\n[secret]\npassword = 1234\ntoken = \"s3cr3t\"\n"
            .parse()
            .unwrap()
    }

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new("j2", "generated")
    }

    #[test]
    fn substitutes_nested_values() {
        let out = renderer()
            .render_str(
                Path::new("t.yaml.j2"),
                "host: {{ db.host }}\nreplicas: {{ replicas }}\n",
                &context(),
            )
            .unwrap();
        assert_eq!(out, "host: h1\nreplicas: 3\n");
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let err = renderer()
            .render_str(Path::new("t.yaml.j2"), "{{ missing.path }}", &context())
            .unwrap_err();
        match err {
            HelmgenError::UndefinedReference { template, detail } => {
                assert_eq!(template, PathBuf::from("t.yaml.j2"));
                assert!(detail.contains("missing.path"));
            }
            other => panic!("expected UndefinedReference, got {other:?}"),
        }
    }

    #[test]
    fn undefined_leaf_under_existing_table() {
        let err = renderer()
            .render_str(Path::new("t.j2"), "{{ db.user }}", &context())
            .unwrap_err();
        assert!(matches!(err, HelmgenError::UndefinedReference { .. }));
    }

    #[test]
    fn undefined_path_in_condition_is_an_error() {
        let err = renderer()
            .render_str(
                Path::new("t.yaml.j2"),
                "{% if db.enabled %}on{% else %}off{% endif %}|{% if missing.path %}x{% endif %}",
                &context(),
            )
            .unwrap_err();
        match err {
            HelmgenError::UndefinedReference { detail, .. } => {
                assert!(detail.contains("db.enabled"));
                assert!(detail.contains("missing.path"));
            }
            other => panic!("expected UndefinedReference, got {other:?}"),
        }
    }

    #[test]
    fn undefined_loop_container_is_an_error() {
        let err = renderer()
            .render_str(
                Path::new("t.j2"),
                "{% for h in db.replicas %}{{ h }}{% endfor %}",
                &context(),
            )
            .unwrap_err();
        assert!(matches!(err, HelmgenError::UndefinedReference { .. }));
    }

    #[test]
    fn loop_and_set_variables_are_local() {
        let ctx: Table = "hosts = [\"h1\", \"h2\"]\n".parse().unwrap();
        let out = renderer()
            .render_str(
                Path::new("t.j2"),
                "{% set sep = \",\" %}{% for h in hosts %}{{ h }}{% if not loop.last %}{{ sep }}{% endif %}{% endfor %}|{{ hosts.0 }}",
                &ctx,
            )
            .unwrap();
        assert_eq!(out, "h1,h2|h1");
    }

    #[test]
    fn defined_test_and_default_filter_allow_missing_paths() {
        let out = renderer()
            .render_str(
                Path::new("t.j2"),
                "{% if db.user is defined %}u{% else %}none{% endif %}|{{ db.user | default(value=\"app\") }}",
                &context(),
            )
            .unwrap();
        assert_eq!(out, "none|app");
    }

    #[test]
    fn defined_condition_renders() {
        let out = renderer()
            .render_str(
                Path::new("t.j2"),
                "{% if db.host == \"h1\" and replicas > 2 %}big{% endif %}",
                &context(),
            )
            .unwrap();
        assert_eq!(out, "big");
    }

    #[test]
    fn syntax_error_is_render_error() {
        let err = renderer()
            .render_str(Path::new("t.j2"), "{{ db.host ", &context())
            .unwrap_err();
        assert!(matches!(err, HelmgenError::Render { .. }));
    }

    #[test]
    fn base64_filter_encodes_strings() {
        let out = renderer()
            .render_str(Path::new("t.j2"), "{{ secret.token | base64encode }}", &context())
            .unwrap();
        assert_eq!(out, STANDARD.encode("s3cr3t"));
    }

    #[test]
    fn base64_filter_encodes_coerced_numbers() {
        let out = renderer()
            .render_str(
                Path::new("t.j2"),
                "{{ secret.password | base64encode }}",
                &context(),
            )
            .unwrap();
        assert_eq!(out, "MTIzNA==");
    }

    #[test]
    fn base64_filter_rejects_tables() {
        let err = renderer()
            .render_str(Path::new("t.j2"), "{{ db | base64encode }}", &context())
            .unwrap_err();
        assert!(matches!(err, HelmgenError::Render { .. }));
    }

    #[test]
    fn no_html_escaping() {
        let ctx: Table = "url = \"a&b<c>\"\n".parse().unwrap();
        let out = renderer()
            .render_str(Path::new("index.html"), "{{ url }}", &ctx)
            .unwrap();
        assert_eq!(out, "a&b<c>");
    }

    #[test]
    fn output_path_for_yaml_template() {
        let r = renderer();
        assert_eq!(
            r.output_path(Path::new("chart/secrets.yaml.j2")),
            PathBuf::from("chart/secrets.generated.yaml")
        );
        assert_eq!(
            r.output_path(Path::new("values.yml.j2")),
            PathBuf::from("values.generated.yaml")
        );
    }

    #[test]
    fn output_path_for_other_templates() {
        let r = renderer();
        assert_eq!(
            r.output_path(Path::new("conf/app.conf.j2")),
            PathBuf::from("conf/app.conf")
        );
    }

    #[test]
    fn output_path_never_overwrites_template() {
        let r = renderer();
        assert_eq!(
            r.output_path(Path::new("odd.txt")),
            PathBuf::from("odd.txt.generated")
        );
    }

    #[test]
    fn render_file_and_write() {
        let dir = TempDir::new().unwrap();
        let tpl = dir.path().join("values.yaml.j2");
        fs::write(&tpl, "replicas: {{ replicas }}\n").unwrap();

        let rendered = renderer().render_file(&tpl, &context()).unwrap();
        assert_eq!(rendered.output, dir.path().join("values.generated.yaml"));
        rendered.write().unwrap();
        let written = fs::read_to_string(dir.path().join("values.generated.yaml")).unwrap();
        assert_eq!(written, "replicas: 3\n");
    }

    #[test]
    fn render_file_missing_template() {
        let dir = TempDir::new().unwrap();
        let err = renderer()
            .render_file(&dir.path().join("nope.j2"), &context())
            .unwrap_err();
        assert!(matches!(err, HelmgenError::IoError { .. }));
    }
}
