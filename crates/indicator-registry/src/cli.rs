//! Command-line argument parsing with clap.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicator_core::{document_to_yaml, load_patches, process_document, DocumentError};

use crate::config::{parse_bind_addr, parse_ttl, RegistryConfig};
use crate::error::{RegistryError, RegistryResult};

/// Indicator registry - stores indicator documents and their alert status.
#[derive(Parser, Debug, Clone)]
#[command(name = "indicator-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the registry HTTP server.
    Serve(ServeArgs),

    /// Patch and validate a document without a server.
    ///
    /// Prints the canonical document on success. Patch failures are
    /// reported as warnings.
    Validate(ValidateArgs),
}

/// Arguments for the serve command.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// YAML configuration file.
    #[arg(short, long, env = "INDICATOR_REGISTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(short, long, env = "INDICATOR_REGISTRY_BIND")]
    pub bind: Option<String>,

    /// How long a registration stays visible (e.g. 30m, 2h).
    #[arg(long, env = "INDICATOR_REGISTRY_TTL")]
    pub ttl: Option<String>,

    /// Patch files or directories (comma-separated).
    #[arg(short, long, env = "INDICATOR_REGISTRY_PATCHES", value_delimiter = ',')]
    pub patches: Vec<PathBuf>,
}

impl ServeArgs {
    /// Builds the server configuration: defaults, then the config file, then
    /// flags.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] for an unreadable file or an invalid
    /// value.
    pub fn to_config(&self) -> RegistryResult<RegistryConfig> {
        let mut config = RegistryConfig::default();
        if let Some(path) = &self.config {
            config = config.with_yaml_file(path)?;
        }
        if let Some(bind) = &self.bind {
            config.bind_addr = parse_bind_addr(bind)?;
        }
        if let Some(ttl) = &self.ttl {
            config.document_ttl = parse_ttl(ttl)?;
        }
        if !self.patches.is_empty() {
            config.patch_paths.clone_from(&self.patches);
        }
        Ok(config)
    }
}

/// Output format for validated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Canonical YAML in the document's own schema.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Arguments for the validate command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Document to validate.
    pub document: PathBuf,

    /// Patch file or directory to apply first (repeatable).
    #[arg(short, long = "patch")]
    pub patches: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

impl ValidateArgs {
    /// Runs validation, writing the document to `out` and diagnostics to `err`.
    ///
    /// Returns `false` if the document is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if an input file cannot be read or output cannot be
    /// written.
    pub fn execute(&self, out: &mut impl Write, err: &mut impl Write) -> RegistryResult<bool> {
        let raw = fs::read(&self.document).map_err(|e| {
            RegistryError::Config(format!("failed to read {}: {e}", self.document.display()))
        })?;
        let patches = load_patches(&self.patches).map_err(|e| RegistryError::Config(e.to_string()))?;

        let processed = match process_document(&patches, &raw) {
            Ok(processed) => processed,
            Err(invalid) => {
                write_errors(err, &invalid)?;
                return Ok(false);
            }
        };

        for warning in &processed.errors {
            writeln!(err, "warning: {warning}").map_err(io_error)?;
        }

        let rendered = match self.output {
            OutputFormat::Yaml => document_to_yaml(&processed.document)
                .map_err(|e| RegistryError::Internal(e.to_string()))?,
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(&processed.document)
                    .map_err(|e| RegistryError::Internal(e.to_string()))?;
                json.push('\n');
                json
            }
        };
        out.write_all(rendered.as_bytes()).map_err(io_error)?;
        Ok(true)
    }
}

fn write_errors(err: &mut impl Write, invalid: &DocumentError) -> RegistryResult<()> {
    writeln!(err, "validation failed:").map_err(io_error)?;
    for message in invalid.messages() {
        writeln!(err, "  - {message}").map_err(io_error)?;
    }
    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn io_error(e: std::io::Error) -> RegistryError {
    RegistryError::Internal(format!("write failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const DOCUMENT: &str = r"---
apiVersion: indicatorprotocol.io/v1
kind: IndicatorDocument
metadata:
  labels:
    deployment: test-deployment
spec:
  product:
    name: testing
    version: 123
  indicators:
  - name: test_indicator
    promql: test_expr
    thresholds:
    - level: warning
      operator: gt
      value: 500
";

    fn run(args: &ValidateArgs) -> (bool, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let valid = args.execute(&mut out, &mut err).unwrap();
        (
            valid,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "indicator-registry",
            "serve",
            "--bind",
            "127.0.0.1:9000",
            "--ttl",
            "30m",
            "--patches",
            "a.yml,b.yml",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.document_ttl, Duration::from_secs(1800));
        assert_eq!(
            config.patch_paths,
            vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")]
        );
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yml");
        fs::write(&path, "bind_addr: 127.0.0.1:7000\ndocument_ttl: 5m\n").unwrap();

        let args = ServeArgs {
            config: Some(path),
            ttl: Some("1h".to_string()),
            ..ServeArgs::default()
        };
        let config = args.to_config().unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.document_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn rejects_invalid_ttl_flag() {
        let args = ServeArgs {
            ttl: Some("0".to_string()),
            ..ServeArgs::default()
        };
        assert!(matches!(args.to_config(), Err(RegistryError::Config(_))));
    }

    #[test]
    fn parses_validate_flags() {
        let cli = Cli::try_parse_from([
            "indicator-registry",
            "validate",
            "doc.yml",
            "--patch",
            "one.yml",
            "--patch",
            "patches",
            "--output",
            "json",
        ])
        .unwrap();

        let Commands::Validate(args) = cli.command else {
            panic!("expected validate command");
        };
        assert_eq!(args.document, PathBuf::from("doc.yml"));
        assert_eq!(args.patches.len(), 2);
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn validate_prints_patched_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("doc.yml");
        let patch = dir.path().join("patch.yml");
        fs::write(&document, DOCUMENT).unwrap();
        fs::write(
            &patch,
            r"
apiVersion: indicatorprotocol.io/v1
operations:
- type: replace
  path: /spec/indicators/0/promql
  value: patched_expr
- type: remove
  path: /spec/indicators/5
",
        )
        .unwrap();

        let args = ValidateArgs {
            document,
            patches: vec![patch],
            output: OutputFormat::Json,
        };
        let (valid, out, err) = run(&args);

        assert!(valid);
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["indicators"][0]["promql"], "patched_expr");
        assert!(err.starts_with("warning: "));
    }

    #[test]
    fn validate_emits_yaml_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("doc.yml");
        fs::write(&document, DOCUMENT).unwrap();

        let args = ValidateArgs {
            document,
            patches: Vec::new(),
            output: OutputFormat::default(),
        };
        let (valid, out, err) = run(&args);

        assert!(valid);
        assert!(out.contains("apiVersion: indicatorprotocol.io/v1"));
        assert!(err.is_empty());
    }

    #[test]
    fn validate_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("doc.yml");
        fs::write(&document, "apiVersion: v0\nindicators: []\n").unwrap();

        let args = ValidateArgs {
            document,
            patches: Vec::new(),
            output: OutputFormat::Yaml,
        };
        let (valid, out, err) = run(&args);

        assert!(!valid);
        assert!(out.is_empty());
        assert!(err.contains("product name is required"));
    }

    #[test]
    fn validate_fails_on_missing_file() {
        let args = ValidateArgs {
            document: PathBuf::from("/nonexistent/doc.yml"),
            patches: Vec::new(),
            output: OutputFormat::Yaml,
        };
        let mut sink = Vec::new();
        let mut err = Vec::new();
        assert!(args.execute(&mut sink, &mut err).is_err());
    }
}
