use clap::Args;
use console::style;
use nexus_codegen::{CONFIG_FILENAME, generate_domain};
use nexus_common::{Endpoint, EndpointManifest};
use std::path::PathBuf;

use crate::cli::run_cli_async;
use crate::common::load_config;

const HEADERS: [&str; 6] = ["ROLE", "METHOD", "PATH", "OPERATION", "TAG", "CURSOR"];

#[derive(Args, Debug, Clone)]
pub struct EndpointsArgs {
    #[arg(value_name = "DOMAIN", help = "Configured domain to describe")]
    pub domain: String,
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        default_value = CONFIG_FILENAME,
        help = "Path to the generator configuration"
    )]
    pub config: PathBuf,
    #[arg(long, help = "Print the endpoint manifest as JSON")]
    pub json: bool,
}

pub async fn run(args: EndpointsArgs) -> i32 {
    run_cli_async(move || async move { run_inner(&args) }).await
}

fn run_inner(args: &EndpointsArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let manifest = generate_domain(&config, &args.domain)
        .map_err(|err| err.to_string())?
        .manifest;

    if args.json {
        let json = manifest.to_json().map_err(|err| err.to_string())?;
        print!("{json}");
    } else {
        print!("{}", render_table(&manifest));
    }
    Ok(())
}

fn row(endpoint: &Endpoint) -> [String; 6] {
    [
        endpoint.role.to_string(),
        endpoint.method.to_string(),
        endpoint.path.clone(),
        endpoint.key.operation.clone(),
        endpoint.key.tag.clone(),
        endpoint.cursor_param.clone().unwrap_or_else(|| "-".into()),
    ]
}

/// Left-aligned columns, one endpoint per line, in manifest order.
fn render_table(manifest: &EndpointManifest) -> String {
    let rows: Vec<[String; 6]> = manifest.endpoints.iter().map(row).collect();
    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = style(line(&HEADERS.map(String::from)[..])).bold().to_string();
    out.push('\n');
    for cells in &rows {
        out.push_str(&line(&cells[..]));
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{} endpoint(s) in domain `{}`\n",
        rows.len(),
        manifest.domain
    ));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nexus_common::{EndpointKey, EndpointRole, HttpMethod};

    fn endpoint(operation: &str, method: HttpMethod, path: &str, cursor: Option<&str>) -> Endpoint {
        Endpoint {
            key: EndpointKey::new("tasks", "tasks", operation),
            method,
            path: path.into(),
            role: match (method, cursor) {
                (HttpMethod::Get, Some(_)) => EndpointRole::InfiniteQuery,
                (HttpMethod::Get, None) => EndpointRole::Query,
                _ => EndpointRole::Mutation,
            },
            params: Vec::new(),
            has_body: false,
            cursor_param: cursor.map(Into::into),
            cursor_field: cursor.map(Into::into),
        }
    }

    #[test]
    fn test_table_columns_align() {
        console::set_colors_enabled(false);
        let manifest = EndpointManifest {
            domain: "tasks".into(),
            endpoints: vec![
                endpoint("listTasks", HttpMethod::Get, "/tasks", Some("nextPageToken")),
                endpoint("deleteTask", HttpMethod::Delete, "/tasks/{taskId}", None),
            ],
        };
        let table = render_table(&manifest);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("ROLE            METHOD  PATH"));
        assert_eq!(
            lines[1],
            "infinite-query  GET     /tasks           listTasks   tasks  nextPageToken"
        );
        assert_eq!(
            lines[2],
            "mutation        DELETE  /tasks/{taskId}  deleteTask  tasks  -"
        );
        assert_eq!(lines[4], "2 endpoint(s) in domain `tasks`");
    }
}
