//! Script conversion
//!
//! Ties the pieces together for one conversion: a fresh sandbox, the `ctx`
//! argument, the `main` call and the rendering of its result.

use kiln_core::{ConvertRequest, Template, TemplateData};
use tracing::{debug, debug_span};

use crate::args::build_args;
use crate::error::Result;
use crate::invoke::invoke;
use crate::modules::{TraceSink, TracingSink};
use crate::render::render_artifact;
use crate::sandbox::{SANDBOX_NAME, create_sandbox_with};

/// Convert a configuration script into a configuration artifact
///
/// The script is the template's when one is supplied, otherwise the
/// request's inline configuration (named after `repo.config`). Script
/// output written with `print` is traced for the repository.
///
/// # Returns
/// - `Ok(Some(artifact))` on success
/// - `Ok(None)` if the artifact exceeds the size ceiling
///
/// # Example
/// ```no_run
/// use kiln_core::{Build, ConfigFile, ConvertRequest, Repository, TemplateData};
/// use kiln_lua::parser::parse_script;
///
/// let req = ConvertRequest::new(
///     Repository::new("octocat", "demo").with_config(".kiln.lua"),
///     Build::default(),
///     ConfigFile::new(r#"
///         function main(ctx)
///             return { kind = "pipeline", name = ctx.repo.name }
///         end
///     "#),
/// );
///
/// let artifact = parse_script(&req, None, &TemplateData::new())?;
/// assert_eq!(artifact.as_deref(), Some("kind: pipeline\nname: demo\n"));
/// # Ok::<(), kiln_lua::ConvertError>(())
/// ```
pub fn parse_script(
    req: &ConvertRequest,
    template: Option<&Template>,
    data: &TemplateData,
) -> Result<Option<String>> {
    let sink = TracingSink::new(&req.repo.namespace, &req.repo.name);
    parse_script_with(req, template, data, sink)
}

/// Same as [`parse_script`], writing script output into a custom sink
pub fn parse_script_with<S: TraceSink + 'static>(
    req: &ConvertRequest,
    template: Option<&Template>,
    data: &TemplateData,
    sink: S,
) -> Result<Option<String>> {
    let (source, file_name) = match template {
        Some(template) => (template.data.as_bytes(), template.name.as_str()),
        None => (req.config.data.as_bytes(), req.repo.config.as_str()),
    };

    let span = debug_span!(
        "convert",
        sandbox = SANDBOX_NAME,
        namespace = %req.repo.namespace,
        name = %req.repo.name,
        file = file_name,
    );
    let _enter = span.enter();

    let lua = create_sandbox_with(sink)?;
    let args = build_args(&lua, &req.repo, &req.build, data)?;
    let value = invoke(&lua, source, file_name, args)?;
    let artifact = render_artifact(&value)?;

    match &artifact {
        Some(artifact) => debug!(bytes = artifact.len(), "script converted"),
        None => debug!("script output dropped"),
    }
    Ok(artifact)
}
