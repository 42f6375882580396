use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use stratus_core::parser::{self, ParsedFile};
use stratus_core::resource::Resource;
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use stratus_provider_aws::endpoints::ENDPOINT_SERVICES;
use stratus_provider_aws::{
    Config, DATA_SOURCES, RESOURCES, data_source_definition, resource_definition,
};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Inspect the Stratus AWS provider and validate fixtures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered resource types
    Resources,
    /// List registered data sources
    DataSources,
    /// List services accepted in the provider `endpoints` block
    Endpoints,
    /// Print the schema of a resource type or data source
    Schema {
        /// Type name (e.g., aws_ec2_client_vpn_endpoint)
        name: String,

        /// Look up a data source instead of a resource type
        #[arg(long)]
        data: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Validate a fixture file against the registered schemas
    Validate {
        /// Path to the fixture file
        file: PathBuf,

        /// Print the provider configuration built from the `provider "aws"` block
        #[arg(long)]
        show_config: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resources => run_list(RESOURCES.names()),
        Commands::DataSources => run_list(DATA_SOURCES.names()),
        Commands::Endpoints => run_list(ENDPOINT_SERVICES.names()),
        Commands::Schema { name, data, json } => run_schema(&name, data, json),
        Commands::Validate { file, show_config } => run_validate(&file, show_config),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_list<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), String> {
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn lookup_schema(name: &str, data: bool) -> Result<ResourceSchema, String> {
    let schema = if data {
        data_source_definition(name).map(|d| d.schema)
    } else {
        resource_definition(name).map(|d| d.schema)
    };
    schema.ok_or_else(|| {
        let kind = if data { "data source" } else { "resource type" };
        format!("Unknown {}: {}", kind, name)
    })
}

fn run_schema(name: &str, data: bool, as_json: bool) -> Result<(), String> {
    let schema = lookup_schema(name, data)?;
    if as_json {
        let out = serde_json::to_string_pretty(&schema_json(&schema))
            .map_err(|e| format!("Failed to serialize schema: {}", e))?;
        println!("{}", out);
    } else {
        print!("{}", render_schema(&schema));
    }
    Ok(())
}

fn sorted_attributes(attributes: &HashMap<String, AttributeSchema>) -> Vec<&AttributeSchema> {
    let mut attrs: Vec<&AttributeSchema> = attributes.values().collect();
    attrs.sort_by(|a, b| a.name.cmp(&b.name));
    attrs
}

/// Short type name, e.g. `list(block)` or `enum(udp, tcp)`
fn type_name(attr_type: &AttributeType) -> String {
    match attr_type {
        AttributeType::String => "string".to_string(),
        AttributeType::Int => "int".to_string(),
        AttributeType::Bool => "bool".to_string(),
        AttributeType::Enum(values) => format!("enum({})", values.join(", ")),
        AttributeType::Custom { name, .. } => name.clone(),
        AttributeType::List(inner) => format!("list({})", type_name(inner)),
        AttributeType::Set(inner) => format!("set({})", type_name(inner)),
        AttributeType::Map(inner) => format!("map({})", type_name(inner)),
        AttributeType::Block(_) => "block".to_string(),
    }
}

fn flags(attr: &AttributeSchema) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if attr.required {
        flags.push("required");
    } else if attr.is_read_only() {
        flags.push("computed");
    } else if attr.computed {
        flags.push("optional+computed");
    } else {
        flags.push("optional");
    }
    if attr.force_new {
        flags.push("force-new");
    }
    if attr.sensitive {
        flags.push("sensitive");
    }
    if attr.write_only {
        flags.push("write-only");
    }
    flags
}

fn render_schema(schema: &ResourceSchema) -> String {
    let mut out = format!("{}\n", schema.resource_type.bold());
    if let Some(description) = &schema.description {
        out.push_str(&format!("  {}\n", description.dimmed()));
    }
    out.push('\n');
    render_attributes(&schema.attributes, 1, &mut out);
    out
}

fn render_attributes(attributes: &HashMap<String, AttributeSchema>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for attr in sorted_attributes(attributes) {
        let mut line = format!(
            "{}{} {} [{}]",
            indent,
            attr.name.cyan(),
            type_name(&attr.attr_type),
            flags(attr).join(", ")
        );
        if let Some(default) = &attr.default {
            line.push_str(&format!(" default={}", default));
        }
        out.push_str(&line);
        out.push('\n');
        if let Some(block) = attr.attr_type.block() {
            render_attributes(&block.attributes, depth + 1, out);
        }
    }
}

fn schema_json(schema: &ResourceSchema) -> serde_json::Value {
    json!({
        "type": schema.resource_type,
        "description": schema.description,
        "attributes": attributes_json(&schema.attributes),
    })
}

fn attributes_json(attributes: &HashMap<String, AttributeSchema>) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for attr in sorted_attributes(attributes) {
        let mut entry = json!({
            "type": type_name(&attr.attr_type),
            "required": attr.required,
            "optional": attr.optional,
            "computed": attr.computed,
            "force_new": attr.force_new,
            "sensitive": attr.sensitive,
            "write_only": attr.write_only,
        });
        if let Some(description) = &attr.description {
            entry["description"] = json!(description);
        }
        if let Some(default) = &attr.default {
            entry["default"] = json!(default.to_string());
        }
        if let Some(max) = attr.max_items {
            entry["max_items"] = json!(max);
        }
        if let Some(min) = attr.min_items {
            entry["min_items"] = json!(min);
        }
        if let Some(block) = attr.attr_type.block() {
            entry["block"] = attributes_json(&block.attributes);
        }
        out.insert(attr.name.clone(), entry);
    }
    serde_json::Value::Object(out)
}

fn read_fixture(file: &Path) -> Result<ParsedFile, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let parsed = parser::parse(&content).map_err(|e| format!("Parse error: {}", e))?;
    log::debug!(
        "Parsed {} resources and {} providers from {}",
        parsed.resources.len(),
        parsed.providers.len(),
        file.display()
    );
    Ok(parsed)
}

/// Every schema problem in the file, one line each
fn validate_resources(resources: &[Resource]) -> Vec<String> {
    let mut problems = Vec::new();
    for resource in resources {
        let address = resource.id.address();
        match lookup_schema(&resource.id.resource_type, resource.is_data_source()) {
            Ok(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    problems.extend(errors.into_iter().map(|e| format!("{}: {}", address, e)));
                }
            }
            Err(e) => problems.push(format!("{}: {}", address, e)),
        }
    }
    problems
}

fn provider_config(parsed: &ParsedFile) -> Result<Option<Config>, String> {
    let Some(provider) = parsed.provider("aws") else {
        return Ok(None);
    };
    Config::from_attributes(&provider.attributes)
        .map(Some)
        .map_err(|diags| format!("provider \"aws\":\n{}", diags))
}

fn run_validate(file: &Path, show_config: bool) -> Result<(), String> {
    let parsed = read_fixture(file)?;

    println!("{}", "Validating...".cyan());

    let mut problems = validate_resources(&parsed.resources);
    let config = match provider_config(&parsed) {
        Ok(config) => config,
        Err(e) => {
            problems.push(e);
            None
        }
    };
    if let Err(e) = parsed.dependency_order() {
        problems.push(e.to_string());
    }

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            parsed.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &parsed.resources {
        println!("  • {}", resource.id.address());
    }

    if show_config {
        match config {
            Some(config) => {
                let out = serde_json::to_string_pretty(&config)
                    .map_err(|e| format!("Failed to serialize config: {}", e))?;
                println!("{}", out);
            }
            None => println!("{}", "No provider \"aws\" block.".yellow()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use stratus_acctest::fixtures::{Certificate, ClientVpnFixture};

    use super::*;

    fn fixture_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn client_vpn_fixtures_validate() {
        let fixture = ClientVpnFixture::new(Certificate::placeholder());
        for config in [
            fixture.basic(),
            fixture.with_log_group(),
            fixture.with_microsoft_ad(),
            fixture.with_routes(),
            fixture.tags(),
        ] {
            let file = fixture_file(&config);
            run_validate(file.path(), false).unwrap();
        }
    }

    #[test]
    fn validate_reports_every_problem() {
        let file = fixture_file(
            r#"
resource "aws_vpc" "test" {
  cidr_block = "10.0.0.0/99"
}

resource "aws_nope" "test" {}

data "aws_availability_zones" "available" {
  state = "gone"
}
"#,
        );
        let err = run_validate(file.path(), false).unwrap_err();
        assert!(err.contains("aws_vpc.test"));
        assert!(err.contains("Unknown resource type: aws_nope"));
        assert!(err.contains("data.aws_availability_zones.available"));
    }

    #[test]
    fn validate_builds_provider_config() {
        let file = fixture_file(
            r#"
provider "aws" {
  region = "eu-west-1"

  default_tags {
    tags = {
      Team = "network"
    }
  }
}
"#,
        );
        let parsed = read_fixture(file.path()).unwrap();
        let config = provider_config(&parsed).unwrap().unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert!(config.default_tags.is_some());
        run_validate(file.path(), true).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = run_validate(Path::new("/nonexistent/fixture.tf"), false).unwrap_err();
        assert!(err.starts_with("Failed to read"));
    }

    #[test]
    fn schema_lookup_and_rendering() {
        let schema = lookup_schema("aws_ec2_client_vpn_endpoint", false).unwrap();
        let rendered = render_schema(&schema);
        assert!(rendered.contains("client_cidr_block"));
        assert!(rendered.contains("force-new"));

        let json = schema_json(&schema);
        assert_eq!(json["attributes"]["transport_protocol"]["type"], "enum(udp, tcp)");
        assert_eq!(json["attributes"]["route"]["type"], "set(block)");
        assert!(json["attributes"]["route"]["block"]["destination_network_cidr"].is_object());

        assert!(lookup_schema("aws_availability_zones", true).is_ok());
        assert!(lookup_schema("aws_availability_zones", false).is_err());
    }

    #[test]
    fn type_names() {
        assert_eq!(type_name(&AttributeType::List(Box::new(AttributeType::String))), "list(string)");
        assert_eq!(type_name(&AttributeType::Map(Box::new(AttributeType::String))), "map(string)");
        assert_eq!(type_name(&AttributeType::enum_of(&["a", "b"])), "enum(a, b)");
    }
}
