mod client;
mod config;
mod query;
mod render;

use crate::client::{ApiClient, ApiError, ResponseData};
use crate::config::{Credential, OutputFormat};
use crate::query::{ItemKind, ListFilter, ListFlags, Query};
use crate::render::{Direction, OutputMode};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use std::io::{self, Write};

#[derive(Parser)]
#[command(
    name = "meshctl",
    version,
    about = "CLI for querying nodes, ports and interfaces in a data mesh"
)]
struct Cli {
    #[arg(
        long,
        short = 'j',
        global = true,
        help = "Print output as JSON for this invocation"
    )]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access token and output preferences
    Config {
        #[arg(long, short = 'e', help = "Email used to log in (prompted if omitted)")]
        email: Option<String>,
        #[arg(long, short = 'p', help = "Password used to log in (prompted if omitted)")]
        password: Option<String>,
        #[arg(
            long,
            value_name = "URL",
            default_value = config::DEFAULT_HOST,
            help = "Base URL of the mesh API"
        )]
        host: String,
    },
    /// Inspect nodes running in the mesh
    #[command(subcommand)]
    Node(NodeCommand),
    /// Inspect ports on nodes running in the mesh
    #[command(subcommand)]
    Port(PortCommand),
    /// Inspect interfaces running in the mesh
    #[command(subcommand)]
    Interface(InterfaceCommand),
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum NodeCommand {
    /// List nodes in the mesh
    Ls(ListArgs),
    /// Search for a specific node
    Search(SearchArgs),
    /// Show the total number of nodes in the mesh
    Total,
    /// View the descendants of a node
    Descendants(LineageArgs),
    /// View the ancestors of a node
    Ancestors(LineageArgs),
    /// Create a new node in the mesh
    Create(CreateArgs),
    /// Delete a node from the mesh
    Delete {
        #[arg(value_name = "NODE_ID")]
        id: String,
    },
}

#[derive(Subcommand)]
enum PortCommand {
    /// List ports in the mesh
    Ls(ListArgs),
    /// Search for a specific port
    Search(SearchArgs),
    /// Show the total number of ports in the mesh
    Total,
    /// Delete a port from a node in the mesh
    Delete {
        #[arg(long = "node", value_name = "NODE_ID")]
        node_id: String,
        #[arg(long, value_name = "PORT_NUMBER")]
        number: u32,
    },
}

#[derive(Subcommand)]
enum InterfaceCommand {
    /// List interfaces in the mesh
    Ls {
        #[command(flatten)]
        filters: ListArgs,
        #[arg(long, help = "Include schema definition functions in the table")]
        include_schema: bool,
    },
    /// Show the total number of interfaces in the mesh
    Total,
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    #[arg(long, short = 'a', help = "List every item in the collection")]
    all: bool,
    #[arg(long, help = "List items by state, e.g. --state active")]
    state: Option<String>,
    #[arg(
        long = "type",
        value_name = "TYPE",
        help = "List items by type, e.g. --type operational"
    )]
    item_type: Option<String>,
    #[arg(
        long,
        value_name = "NODE_ID",
        help = "List the interfaces available on a node"
    )]
    interface: Option<String>,
    #[arg(
        long,
        value_name = "DAYS",
        help = "List items provisioned within the last DAYS days"
    )]
    age: Option<u32>,
}

impl ListArgs {
    fn flags(&self) -> ListFlags {
        ListFlags {
            all: self.all,
            state: self.state.clone(),
            item_type: self.item_type.clone(),
            interface: self.interface.clone(),
            age: self.age,
        }
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SearchArgs {
    #[arg(long, short = 'n', help = "Name of the item you're searching for")]
    name: Option<String>,
    #[arg(long, help = "ID of the item you're searching for")]
    id: Option<String>,
}

#[derive(Args, Debug)]
struct LineageArgs {
    #[arg(value_name = "NODE_ID")]
    id: String,
    #[arg(long, help = "Print the lineage as a tree")]
    tree: bool,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long, short = 'n', help = "Name of the node you're creating")]
    name: String,
    #[arg(long, help = "Domain of the node you're creating")]
    domain: String,
    #[arg(
        long,
        value_parser = ["aws", "azure", "gcp"],
        help = "Cloud provider that the node is hosted on"
    )]
    cloud: String,
    #[arg(long, default_value = "Created by meshctl")]
    description: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config {
            email,
            password,
            host,
        } => run_config(host, email, password, cli.json),
        Commands::Node(command) => match command {
            NodeCommand::Ls(args) => run_ls(ItemKind::Node, &args, cli.json, false),
            NodeCommand::Search(args) => run_search(ItemKind::Node, &args, cli.json),
            NodeCommand::Total => run_total(ItemKind::Node),
            NodeCommand::Descendants(args) => run_lineage(&args, Direction::Descendants, cli.json),
            NodeCommand::Ancestors(args) => run_lineage(&args, Direction::Ancestors, cli.json),
            NodeCommand::Create(args) => run_create(&args),
            NodeCommand::Delete { id } => run_delete_node(&id),
        },
        Commands::Port(command) => match command {
            PortCommand::Ls(args) => run_ls(ItemKind::Port, &args, cli.json, false),
            PortCommand::Search(args) => run_search(ItemKind::Port, &args, cli.json),
            PortCommand::Total => run_total(ItemKind::Port),
            PortCommand::Delete { node_id, number } => run_delete_port(&node_id, number),
        },
        Commands::Interface(command) => match command {
            InterfaceCommand::Ls {
                filters,
                include_schema,
            } => run_ls(ItemKind::Interface, &filters, cli.json, include_schema),
            InterfaceCommand::Total => run_total(ItemKind::Interface),
        },
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut io::stdout())
                }
                CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut io::stdout())
                }
            }
            Ok(())
        }
    }
}

fn run_config(
    host: String,
    email: Option<String>,
    password: Option<String>,
    json_default: bool,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt("Password")?,
    };

    let access_token = client::login(&host, &email, &password)?;
    let credential = Credential {
        host,
        access_token,
        output_format: if json_default {
            OutputFormat::Json
        } else {
            OutputFormat::Default
        },
    };
    let path = config::save(&credential)?;
    println!("Saved credentials to {}", path.display());
    Ok(())
}

fn run_ls(kind: ItemKind, args: &ListArgs, json_flag: bool, include_schema: bool) -> Result<()> {
    let Some(filter) = ListFilter::resolve(&args.flags())? else {
        println!(
            "Hmm, I'm not sure what you want me to do. Try `meshctl {0} ls --all` to view all {0}s, or `meshctl {0} ls --help` for more options.",
            kind.singular()
        );
        return Ok(());
    };
    filter.validate(kind)?;

    let (credential, api) = connect()?;
    let mode = render::resolve_mode(json_flag, credential.output_format);
    let now = query::reference_now();
    let effective_kind = if filter.targets_interfaces() {
        ItemKind::Interface
    } else {
        kind
    };
    let rows = fetch_rows(&api, &filter.into_query(kind, now))?;
    render::print_items(effective_kind, &rows, mode, include_schema, now)
}

fn run_search(kind: ItemKind, args: &SearchArgs, json_flag: bool) -> Result<()> {
    let query = match (&args.name, &args.id) {
        (Some(name), None) => query::search_by_name(kind, name),
        (None, Some(id)) => query::search_by_id(kind, id),
        _ => unreachable!("clap enforces exactly one of --name/--id"),
    };

    let (credential, api) = connect()?;
    let mode = render::resolve_mode(json_flag, credential.output_format);
    let now = query::reference_now();
    let rows = fetch_rows(&api, &query)?;
    render::print_items(kind, &rows, mode, false, now)
}

fn run_total(kind: ItemKind) -> Result<()> {
    let (_credential, api) = connect()?;
    let rows = fetch_rows(&api, &query::fetch_all(kind))?;
    render::print_total(kind, rows.len());
    Ok(())
}

fn run_lineage(args: &LineageArgs, direction: Direction, json_flag: bool) -> Result<()> {
    let (credential, api) = connect()?;
    let mode = render::resolve_mode(json_flag, credential.output_format);
    let edges = fetch_rows(&api, &query::lineage(&args.id))?;
    let Some(root_name) = node_name(&api, &args.id)? else {
        println!("No node with id `{}` was found. Use `meshctl node ls` to find the right id.", args.id);
        return Ok(());
    };
    render::print_lineage(&edges, &root_name, direction, args.tree, mode)
}

fn run_create(args: &CreateArgs) -> Result<()> {
    let (_credential, api) = connect()?;
    let record = json!({
        "name": args.name,
        "domain": args.domain,
        "description": args.description,
        "node_cloud_provider": args.cloud,
    });
    let response = api.create(ItemKind::Node.collection(), &record)?;
    if response.status != 201 {
        return Err(write_rejected(response));
    }
    println!("Node successfully created.");
    let rows = fetch_rows(&api, &query::search_by_name(ItemKind::Node, &args.name))?;
    render::print_items(
        ItemKind::Node,
        &rows,
        OutputMode::Table,
        false,
        query::reference_now(),
    )
}

fn run_delete_node(id: &str) -> Result<()> {
    let (_credential, api) = connect()?;
    let name = node_name(&api, id)?
        .ok_or_else(|| anyhow!("no node with id `{id}` was found"))?;
    if !confirm(&format!(
        "Are you sure you want to delete {} (ID: {id})?",
        name.to_uppercase()
    ))? {
        println!("Node deletion cancelled.");
        return Ok(());
    }
    let response = api.delete(
        ItemKind::Node.collection(),
        &[("id".to_string(), format!("eq.{id}"))],
    )?;
    if response.status != 204 {
        return Err(write_rejected(response));
    }
    println!("Node {id} deleted.");
    Ok(())
}

fn run_delete_port(node_id: &str, number: u32) -> Result<()> {
    let (_credential, api) = connect()?;
    let name = node_name(&api, node_id)?
        .ok_or_else(|| anyhow!("no node with id `{node_id}` was found"))?;
    if !confirm(&format!(
        "Are you sure you want to delete port {number} on the {} node?",
        name.to_uppercase()
    ))? {
        println!("Port deletion cancelled.");
        return Ok(());
    }
    let response = api.delete(
        ItemKind::Port.collection(),
        &[
            ("node_id".to_string(), format!("eq.{node_id}")),
            ("port_number".to_string(), format!("eq.{number}")),
        ],
    )?;
    if response.status != 204 {
        return Err(write_rejected(response));
    }
    println!("Port {number} on node {node_id} deleted.");
    Ok(())
}

fn connect() -> Result<(Credential, ApiClient)> {
    let credential = config::load()?;
    let api = ApiClient::from_credential(&credential)?;
    Ok((credential, api))
}

/// Runs a read query and decodes the result set. Any non-200 status on a
/// read means the stored token no longer works.
fn fetch_rows(api: &ApiClient, query: &Query) -> Result<Vec<Value>> {
    let response = api.get(query.collection, &query.params)?;
    if response.status != 200 {
        return Err(ApiError::TokenRejected(response.status).into());
    }
    match response.json {
        Some(Value::Array(rows)) => Ok(rows),
        _ => bail!("unexpected response shape from `{}`", query.collection),
    }
}

/// Resolves a node's display name by id; `None` when the node doesn't exist.
fn node_name(api: &ApiClient, id: &str) -> Result<Option<String>> {
    let rows = fetch_rows(api, &query::search_by_id(ItemKind::Node, id))?;
    Ok(rows
        .first()
        .and_then(|node| node.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn write_rejected(response: ResponseData) -> anyhow::Error {
    let message = response
        .json
        .as_ref()
        .and_then(|payload| payload.get("message"))
        .and_then(Value::as_str)
        .unwrap_or(&response.body)
        .to_string();
    ApiError::WriteRejected {
        status: response.status,
        message,
    }
    .into()
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush().context("flushing prompt")?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("reading input")?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} (y/n): ");
    io::stdout().flush().context("flushing prompt")?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("reading input")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
