//! Writes the gateway's OpenAPI document.
//!
//! `export-openapi [--json | --yaml] [PATH]`. Without a flag the format
//! follows the file extension (`.json` for JSON, YAML otherwise); without a
//! path the document goes to stdout.

use std::{env, fs, path::Path};

use anyhow::{bail, Context, Result};
use gate_daemon::server::docs::ApiDoc;
use utoipa::OpenApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    format: Format,
    output: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut format = None;
    let mut output = None;
    for arg in args {
        match arg.as_str() {
            "--json" => format = Some(Format::Json),
            "--yaml" => format = Some(Format::Yaml),
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if output.is_some() => bail!("more than one output path given"),
            _ => output = Some(arg),
        }
    }

    let format = format.unwrap_or_else(|| match output.as_deref().map(Path::new) {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => Format::Json,
        _ => Format::Yaml,
    });
    Ok(Args { format, output })
}

fn render(format: Format) -> Result<String> {
    let openapi = ApiDoc::openapi();
    match format {
        Format::Json => openapi
            .to_pretty_json()
            .context("failed to serialise OpenAPI as JSON"),
        Format::Yaml => openapi
            .to_yaml()
            .context("failed to serialise OpenAPI as YAML"),
    }
}

fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let document = render(args.format)?;

    if let Some(path) = args.output {
        let path = Path::new(&path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory for {}", path.display())
                })?;
            }
        }
        fs::write(path, document)
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        println!("{document}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn format_follows_flag_then_extension() {
        assert_eq!(
            args(&[]).unwrap(),
            Args {
                format: Format::Yaml,
                output: None
            }
        );
        assert_eq!(args(&["--json"]).unwrap().format, Format::Json);
        assert_eq!(args(&["docs/openapi.json"]).unwrap().format, Format::Json);
        assert_eq!(args(&["docs/openapi.yaml"]).unwrap().format, Format::Yaml);
        assert_eq!(
            args(&["--yaml", "docs/openapi.json"]).unwrap().format,
            Format::Yaml
        );
    }

    #[test]
    fn rejects_unknown_options_and_extra_paths() {
        assert!(args(&["--xml"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }

    #[test]
    fn json_output_lists_gateway_paths() {
        let json = render(Format::Json).unwrap();
        assert!(json.trim_start().starts_with('{'));
        assert!(json.contains("\"/query\""));

        let yaml = render(Format::Yaml).unwrap();
        assert!(yaml.contains("/query:"));
    }
}
