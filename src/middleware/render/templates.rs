//! Template discovery and compilation.
//!
//! Every file under the template directory whose extension is on the
//! allowlist becomes a template named by its slash-separated relative path
//! with the extension stripped: `admin/index.html` → `admin/index`.
//!
//! A compiled [`Environment`] owns its parsed templates behind `Arc`s, so
//! cloning it per request shares the parse trees and copies only the global
//! function table that layouts overwrite.

use std::fs;
use std::path::Path;

use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment, Error as TemplateError, ErrorKind, Value};
use tracing::debug;
use walkdir::WalkDir;

use super::options::RenderOptions;
use crate::error::Error;

/// Parses every template under `options.directory`.
///
/// Fails on the first template that does not parse. A missing directory is
/// not an error and yields an empty set.
pub fn compile(options: &RenderOptions) -> Result<Environment<'static>, Error> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::Html);

    if let Some(delims) = &options.delims {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters(delims.left.clone(), delims.right.clone())
            .build()?;
        env.set_syntax(syntax);
    }

    for funcs in &options.funcs {
        for (name, func) in funcs.iter() {
            env.add_global(name.to_owned(), func.clone());
        }
    }
    env.add_function("yield", || -> Result<Value, TemplateError> {
        Err(TemplateError::new(ErrorKind::InvalidOperation, "yield called with no layout defined"))
    });
    env.add_function("current", || Value::from(""));

    let dir = &options.directory;
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "template directory not found, no templates compiled");
        return Ok(env);
    }

    // Mounted config volumes present every file as a symlink.
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else { continue };
        let Some(name) = template_name(rel, &options.extensions) else { continue };

        let source = fs::read_to_string(entry.path())?;
        env.add_template_owned(name.clone(), source)?;
        debug!(template = %name, path = %entry.path().display(), "compiled template");
    }

    Ok(env)
}

/// Everything from the first dot of the file name, dot included.
pub(crate) fn template_ext(file_name: &str) -> &str {
    file_name.find('.').map_or("", |i| &file_name[i..])
}

/// The logical name for `rel`, or `None` if its extension is not allowed.
fn template_name(rel: &Path, extensions: &[String]) -> Option<String> {
    let file_name = rel.file_name()?.to_str()?;
    let ext = template_ext(file_name);
    if !extensions.iter().any(|allowed| allowed == ext) {
        return None;
    }

    let mut segments = rel.parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    segments.push(&file_name[..file_name.len() - ext.len()]);
    Some(segments.join("/"))
}

/// Renders the template called `name`.
///
/// A missing template reports `"<name>" is undefined` rather than the
/// engine's own wording so callers see the same text whether the template was
/// requested directly or through a layout's `yield()`.
pub(crate) fn execute(env: &Environment<'_>, name: &str, ctx: &Value) -> Result<String, TemplateError> {
    let template = env.get_template(name).map_err(|err| match err.kind() {
        ErrorKind::TemplateNotFound => {
            TemplateError::new(ErrorKind::TemplateNotFound, format!("{name:?} is undefined"))
        }
        _ => err,
    })?;
    template.render(ctx)
}
