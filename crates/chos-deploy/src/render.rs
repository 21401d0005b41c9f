//! Template rendering for staged artifacts
//!
//! Templates are embedded in the binary and rendered with Tera. The context
//! is built from a [`RunConfig`] and a fixed list of device codenames; Tera
//! rejects any substitution point outside that context, so a typo in a
//! template surfaces as an error instead of an empty string.

use crate::error::{DeployError, Result};
use chos_common::defaults::{
    INFRA_CONFIG_PATH, LAMBDA_SPOT_FUNCTION_FILENAME, SHELL_SCRIPT_FILENAME,
};
use chos_common::{Device, RunConfig};
use tera::{Context, Tera};
use tracing::debug;

const INFRA_CONFIG_TEMPLATE: &str = include_str!("../templates/main.tf.tera");
const BUILD_SCRIPT_TEMPLATE: &str = include_str!("../templates/chos.sh.tera");
const SPOT_FUNCTION_TEMPLATE: &str = include_str!("../templates/lambda_spot_function.py.tera");

/// Embedded templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Template {
    /// Terraform configuration
    InfraConfig,
    /// Unattended build script run on the spot instance
    BuildScript,
    /// Spot-fleet trigger function
    SpotFunction,
}

impl Template {
    pub const ALL: [Template; 3] = [
        Template::InfraConfig,
        Template::BuildScript,
        Template::SpotFunction,
    ];

    /// Staged path relative to the workspace root
    pub fn target_path(self) -> &'static str {
        match self {
            Template::InfraConfig => INFRA_CONFIG_PATH,
            Template::BuildScript => SHELL_SCRIPT_FILENAME,
            Template::SpotFunction => LAMBDA_SPOT_FUNCTION_FILENAME,
        }
    }

    fn source(self) -> &'static str {
        match self {
            Template::InfraConfig => INFRA_CONFIG_TEMPLATE,
            Template::BuildScript => BUILD_SCRIPT_TEMPLATE,
            Template::SpotFunction => SPOT_FUNCTION_TEMPLATE,
        }
    }
}

/// Rendered payload and the path it is staged at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub target_path: &'static str,
    pub bytes: Vec<u8>,
}

impl RenderedArtifact {
    pub fn as_str(&self) -> &str {
        // Rendered from UTF-8 templates, so this cannot fail
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }
}

/// Everything a run stages before invoking the provisioning tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub infra_config: RenderedArtifact,
    pub build_script: RenderedArtifact,
    pub spot_function: RenderedArtifact,
}

/// Renders embedded templates against a run configuration
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Parse every embedded template
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        for template in Template::ALL {
            tera.add_raw_template(&template.to_string(), template.source())
                .map_err(|e| DeployError::template(template.to_string(), e))?;
        }
        Ok(Self { tera })
    }

    /// Render one embedded template
    pub fn render(&self, template: Template, config: &RunConfig) -> Result<RenderedArtifact> {
        let name = template.to_string();
        let rendered = self
            .tera
            .render(&name, &template_context(config))
            .map_err(|e| DeployError::template(&name, e))?;

        debug!(template = %name, bytes = rendered.len(), "Rendered template");

        Ok(RenderedArtifact {
            target_path: template.target_path(),
            bytes: rendered.into_bytes(),
        })
    }

    /// Render all three staged artifacts
    pub fn render_bundle(&self, config: &RunConfig) -> Result<ArtifactBundle> {
        Ok(ArtifactBundle {
            infra_config: self.render(Template::InfraConfig, config)?,
            build_script: self.render(Template::BuildScript, config)?,
            spot_function: self.render(Template::SpotFunction, config)?,
        })
    }
}

/// Render an ad-hoc template with the same context the embedded ones get
pub fn render_str(name: &str, source: &str, config: &RunConfig) -> Result<Vec<u8>> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, source)
        .map_err(|e| DeployError::template(name, e))?;
    let rendered = tera
        .render(name, &template_context(config))
        .map_err(|e| DeployError::template(name, e))?;
    Ok(rendered.into_bytes())
}

/// The complete set of substitution points a template may use
fn template_context(config: &RunConfig) -> Context {
    let mut context = Context::new();
    context.insert("name", &config.name);
    context.insert("region", &config.region);
    context.insert("device", config.device.as_str());
    context.insert("ami", &config.ami);
    context.insert("ssh_key", config.ssh_key.as_deref().unwrap_or_default());
    context.insert("spot_price", &config.spot_price);
    context.insert("prevent_shutdown", &config.prevent_shutdown);
    context.insert("devices", &Device::names());
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new("testenv", "us-east-1", Device::Marlin)
    }

    #[test]
    fn test_embedded_templates_parse() {
        assert!(Renderer::new().is_ok());
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let renderer = Renderer::new().unwrap();
        let configs = [
            config(),
            RunConfig::new("other-env", "eu-west-2", Device::Sailfish)
                .with_ssh_key("builder")
                .with_spot_price("1.10")
                .with_prevent_shutdown(true),
        ];
        for config in &configs {
            for template in Template::ALL {
                let first = renderer.render(template, config).unwrap();
                let second = renderer.render(template, config).unwrap();
                assert_eq!(first, second, "{template} differs between renders");
            }
            // A fresh renderer must agree as well
            let other = Renderer::new().unwrap();
            assert_eq!(
                renderer.render_bundle(config).unwrap(),
                other.render_bundle(config).unwrap()
            );
        }
    }

    #[test]
    fn test_unknown_substitution_point_fails() {
        let err = render_str("broken", "bucket = \"{{ bucket_name }}\"", &config()).unwrap_err();
        assert!(matches!(err, DeployError::Template { ref template, .. } if template == "broken"));
    }

    #[test]
    fn test_unknown_nested_field_fails() {
        let err = render_str("nested", "{{ name.first }}", &config()).unwrap_err();
        assert!(matches!(err, DeployError::Template { .. }));
    }

    #[test]
    fn test_syntax_error_fails() {
        let err = render_str("syntax", "{% if name %}unterminated", &config()).unwrap_err();
        assert!(matches!(err, DeployError::Template { .. }));
    }

    #[test]
    fn test_every_context_field_resolves() {
        let source = "{{ name }} {{ region }} {{ device }} {{ ami }} {{ ssh_key }} \
                      {{ spot_price }} {{ prevent_shutdown }} {{ devices | join(sep=\",\") }}";
        let rendered = render_str("all", source, &config().with_ssh_key("key")).unwrap();
        assert_eq!(
            String::from_utf8(rendered).unwrap(),
            "testenv us-east-1 marlin ami-0def3275 key .80 false marlin,sailfish"
        );
    }

    #[test]
    fn test_infra_config_uses_name_and_region() {
        let renderer = Renderer::new().unwrap();
        let tf = renderer
            .render(Template::InfraConfig, &RunConfig::new("demo", "eu-west-1", Device::Sailfish))
            .unwrap();
        let text = tf.as_str();
        assert_eq!(tf.target_path, "config/main.tf");
        assert!(text.contains("bucket = \"demo\""));
        assert!(text.contains("region = \"eu-west-1\""));
        assert!(text.contains("\"demo-release\""));
        assert!(text.contains("\"demo-spot-fleet-role\""));
        assert!(text.contains("${path.module}/../lambda_spot.zip"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn test_spot_function_substitutions() {
        let renderer = Renderer::new().unwrap();
        let config = RunConfig::new("demo", "us-west-2", Device::Sailfish)
            .with_ami("ami-11111111")
            .with_ssh_key("builder")
            .with_spot_price("1.50");
        let rendered = renderer.render(Template::SpotFunction, &config).unwrap();
        let text = rendered.as_str();

        assert_eq!(rendered.target_path, "lambda_spot_function.py");
        assert!(text.contains("DEVICE = 'sailfish'"));
        assert!(text.contains("AMI_ID = 'ami-11111111'"));
        assert!(text.contains("SSH_KEY_NAME = 'builder'"));
        assert!(text.contains("SPOT_PRICE = '1.50'"));
        assert!(text.contains("SRC_PATH = 's3://demo-script/chos.sh'"));
        // Raw block passes cloud-config braces through untouched
        assert!(text.contains("output : {{ all : '| tee -a /var/log/cloud-init-output.log' }}"));
    }

    #[test]
    fn test_missing_ssh_key_renders_empty() {
        let renderer = Renderer::new().unwrap();
        let rendered = renderer.render(Template::SpotFunction, &config()).unwrap();
        assert!(rendered.as_str().contains("SSH_KEY_NAME = ''"));
    }

    #[test]
    fn test_build_script_shutdown_toggle() {
        let renderer = Renderer::new().unwrap();

        let default = renderer.render(Template::BuildScript, &config()).unwrap();
        assert!(default.as_str().contains("sudo shutdown -h now"));

        let kept = renderer
            .render(Template::BuildScript, &config().with_prevent_shutdown(true))
            .unwrap();
        assert!(!kept.as_str().contains("sudo shutdown -h now"));
        assert!(kept.as_str().contains("Shutdown prevented"));
    }

    #[test]
    fn test_build_script_substitutions() {
        let renderer = Renderer::new().unwrap();
        let rendered = renderer.render(Template::BuildScript, &config()).unwrap();
        let text = rendered.as_str();

        assert!(text.starts_with("#!/bin/bash"));
        assert!(text.contains("AWS_KEYS_BUCKET='testenv-keys'"));
        assert!(text.contains("sns publish --region us-east-1"));
        assert!(text.contains("Devices: marlin sailfish"));
    }

    #[test]
    fn test_build_script_keeps_vendor_patch() {
        let renderer = Renderer::new().unwrap();
        let rendered = renderer.render(Template::BuildScript, &config()).unwrap();
        let text = rendered.as_str();

        assert!(text.contains("sudo apt-get --assume-yes install fuseext2"));
        assert!(text.contains("patch -p1 <<'ENDDEBUGFSPATCH'"));
        assert!(text.contains("+  USE_DEBUGFS=false"));
        assert!(text.contains("aws_setup_chos_dir() {"));
        assert!(text.contains("unofficial_sailfish_releasekey_hash=$(fdpe_hash"));
        assert!(text.contains(
            "AWS_SNS_ARN='$(aws --region us-east-1 sns list-topics --query 'Topics[0].TopicArn' \
             --output text | cut -d\":\" -f1,2,3,4,5):testenv'"
        ));
    }

    #[test]
    fn test_spot_function_lists_both_instance_types_with_key() {
        let renderer = Renderer::new().unwrap();
        let config = config().with_ssh_key("builder");
        let rendered = renderer.render(Template::SpotFunction, &config).unwrap();
        let text = rendered.as_str();

        assert!(text.contains("'InstanceType': 'c5.4xlarge',"));
        assert!(text.contains("'InstanceType': 'c4.4xlarge',"));
        assert_eq!(text.matches("'KeyName': SSH_KEY_NAME,").count(), 2);
    }
}
