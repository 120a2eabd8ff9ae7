//! Converter plugin
//!
//! The CI host asks every registered converter to turn a fetched
//! configuration into the pipeline format. A converter that does not handle
//! the request answers `Ok(None)` and the host keeps the original file.

use kiln_core::{ConfigFile, ConvertRequest, Template, TemplateData};
use tracing::debug;

use crate::config::ConverterConfig;
use crate::error::Result;
use crate::parser::parse_script;

/// Trait for configuration converters
pub trait Converter: Send + Sync {
    /// Convert the request's configuration file
    ///
    /// # Returns
    /// - `Ok(Some(config))` with the converted configuration
    /// - `Ok(None)` if this converter does not handle the request
    fn convert(&self, req: &ConvertRequest) -> Result<Option<ConfigFile>>;
}

/// Converter for configuration scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptConverter {
    config: ConverterConfig,
}

impl ScriptConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert a template referenced by the repository
    ///
    /// The template's script replaces the request's inline configuration and
    /// `data` is exposed to it as `ctx.input`.
    pub fn convert_template(
        &self,
        req: &ConvertRequest,
        template: &Template,
        data: &TemplateData,
    ) -> Result<Option<ConfigFile>> {
        if !self.config.enabled || !self.config.is_script(&template.name) {
            debug!(template = %template.name, "template is not a script, skipping");
            return Ok(None);
        }

        let artifact = parse_script(req, Some(template), data)?;
        Ok(artifact.map(ConfigFile::new))
    }
}

impl Converter for ScriptConverter {
    fn convert(&self, req: &ConvertRequest) -> Result<Option<ConfigFile>> {
        if !self.config.enabled {
            return Ok(None);
        }

        if !self.config.is_script(&req.repo.config) {
            debug!(config = %req.repo.config, "configuration is not a script, skipping");
            return Ok(None);
        }

        let artifact = parse_script(req, None, &TemplateData::new())?;
        Ok(artifact.map(ConfigFile::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use kiln_core::{Build, Repository};

    const SCRIPT: &str = r#"function main(ctx) return { kind = "pipeline", name = ctx.repo.name } end"#;

    fn request(config_path: &str, source: &str) -> ConvertRequest {
        ConvertRequest::new(
            Repository::new("octocat", "demo").with_config(config_path),
            Build::default(),
            ConfigFile::new(source),
        )
    }

    #[test]
    fn test_converts_scripts() {
        let converter = ScriptConverter::default();
        let config = converter.convert(&request(".kiln.lua", SCRIPT)).unwrap();
        assert_eq!(config, Some(ConfigFile::new("kind: pipeline\nname: demo\n")));
    }

    #[test]
    fn test_skips_other_files() {
        let converter = ScriptConverter::default();
        let config = converter
            .convert(&request(".kiln.yml", "kind: pipeline"))
            .unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_disabled() {
        let converter = ScriptConverter::new(ConverterConfig::new(false));
        assert!(converter.convert(&request(".kiln.lua", SCRIPT)).unwrap().is_none());
    }

    #[test]
    fn test_errors_are_surfaced() {
        let converter = ScriptConverter::default();
        let err = converter.convert(&request(".kiln.lua", "x = 1")).unwrap_err();
        assert!(matches!(err, ConvertError::MainMissing));
    }

    #[test]
    fn test_template() {
        let converter = ScriptConverter::default();
        let template = Template::new("go.script", SCRIPT);
        let config = converter
            .convert_template(&request(".kiln.yml", ""), &template, &TemplateData::new())
            .unwrap();
        assert_eq!(config, Some(ConfigFile::new("kind: pipeline\nname: demo\n")));
    }

    #[test]
    fn test_template_not_a_script() {
        let converter = ScriptConverter::default();
        let template = Template::new("go.yml", "kind: pipeline");
        let config = converter
            .convert_template(&request(".kiln.yml", ""), &template, &TemplateData::new())
            .unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_converter_as_trait_object() {
        let converters: Vec<Box<dyn Converter>> = vec![Box::new(ScriptConverter::default())];
        let config = converters[0].convert(&request("ci.kiln", SCRIPT)).unwrap();
        assert!(config.is_some());
    }
}
