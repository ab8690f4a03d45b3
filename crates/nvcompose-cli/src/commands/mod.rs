//! Invocation assembly and outcome reporting

use anyhow::Result;
use nvcompose_core::{MergeSummary, WrapperConfig};
use nvcompose_runtime::{Invocation, Outcome, Wrapper};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Build the invocation from parsed arguments and configuration
///
/// A template, when given, takes the place of the base file.
pub fn invocation(
    file: Option<PathBuf>,
    template: Option<PathBuf>,
    output: Option<PathBuf>,
    generate_only: bool,
    args: Vec<String>,
    config: &WrapperConfig,
) -> Invocation {
    let is_template = template.is_some();
    let file = template
        .or(file)
        .unwrap_or_else(|| default_compose_file(&config.compose.default_file));
    debug!(file = %file.display(), template = is_template, args = ?args, "Resolved invocation");

    Invocation {
        file,
        template: is_template,
        output,
        generate_only,
        args,
    }
}

/// Run the wrapper and report the outcome, returning the exit code
pub async fn run(invocation: Invocation, config: &WrapperConfig) -> Result<i32> {
    let wrapper = Wrapper::from_config(config)?;
    let outcome = wrapper.run(&invocation).await?;

    match &outcome {
        Outcome::Generated {
            path: Some(path),
            summary,
            ..
        } => {
            println!("Generated {}", path.display());
            println!("{}", describe(summary));
        }
        Outcome::Generated {
            path: None,
            yaml,
            summary,
        } => {
            // stdout carries the YAML itself
            print!("{}", yaml);
            eprintln!("{}", describe(summary));
        }
        Outcome::Completed(code) => {
            debug!(code = code, "docker-compose finished");
        }
    }

    Ok(outcome.exit_code())
}

/// One-line report of what the merge changed
fn describe(summary: &MergeSummary) -> String {
    let mut report = format!(
        "Added {} device(s) and {} volume(s) to {} service(s)",
        summary.devices_added, summary.volumes_added, summary.services_updated
    );
    if !summary.volumes_declared.is_empty() {
        report.push_str(&format!(
            "; declared external volume(s): {}",
            summary.volumes_declared.join(", ")
        ));
    }
    report
}

/// The configured default file, or its `.yaml` sibling when only that exists
fn default_compose_file(configured: &Path) -> PathBuf {
    if configured.exists() {
        return configured.to_path_buf();
    }
    let alternate = configured.with_extension("yaml");
    if configured.extension().map_or(false, |ext| ext == "yml") && alternate.exists() {
        return alternate;
    }
    configured.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file_wins() {
        let config = WrapperConfig::default();
        let inv = invocation(
            Some(PathBuf::from("gpu.yml")),
            None,
            None,
            false,
            vec!["up".to_string()],
            &config,
        );
        assert_eq!(inv.file, PathBuf::from("gpu.yml"));
        assert_eq!(inv.args, vec!["up"]);
        assert!(!inv.template);
    }

    #[test]
    fn test_template_replaces_base_file() {
        let config = WrapperConfig::default();
        let inv = invocation(
            None,
            Some(PathBuf::from("gpu.yml.jinja")),
            None,
            true,
            Vec::new(),
            &config,
        );
        assert_eq!(inv.file, PathBuf::from("gpu.yml.jinja"));
        assert!(inv.template);
        assert!(inv.generate_only);
    }

    #[test]
    fn test_describe_summary() {
        let summary = MergeSummary {
            services_updated: 2,
            devices_added: 6,
            volumes_added: 2,
            volumes_declared: vec!["nvidia_driver_375.26".to_string()],
        };
        assert_eq!(
            describe(&summary),
            "Added 6 device(s) and 2 volume(s) to 2 service(s); \
             declared external volume(s): nvidia_driver_375.26"
        );
        assert_eq!(
            describe(&MergeSummary::default()),
            "Added 0 device(s) and 0 volume(s) to 0 service(s)"
        );
    }

    #[test]
    fn test_default_file_prefers_yaml_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("docker-compose.yml");
        let alternate = dir.path().join("docker-compose.yaml");

        assert_eq!(default_compose_file(&configured), configured);

        std::fs::write(&alternate, "app:\n  image: nginx\n").unwrap();
        assert_eq!(default_compose_file(&configured), alternate);

        std::fs::write(&configured, "app:\n  image: nginx\n").unwrap();
        assert_eq!(default_compose_file(&configured), configured);
    }
}
