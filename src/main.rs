use anyhow::Context;
use bearerctl::{
    config::Settings, ApiClient, KeyringTokenStore, MultipartForm, RequestError, TokenStore,
};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::{path::PathBuf, process::ExitCode};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bearerctl", version, about = "Send requests to an API using a stored bearer token")]
struct Cli {
    /// Base URL of the API. Defaults to $BEARERCTL_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the stored bearer token.
    #[command(subcommand)]
    Token(TokenCommand),
    #[command(flatten)]
    Request(RequestCommand),
}

#[derive(Subcommand, Debug)]
enum RequestCommand {
    /// Send a GET request.
    Get {
        endpoint: String,
        /// Query parameter as key=value. May be repeated.
        #[arg(long = "query", short, value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Send the stored token along. Authenticated reads take no query.
        #[arg(long, conflicts_with = "query")]
        auth: bool,
    },
    /// Send a JSON body with POST.
    Post { endpoint: String, body: String },
    /// Send a JSON body with PUT.
    Put { endpoint: String, body: String },
    /// Send a DELETE request.
    Delete { endpoint: String },
    /// Upload a file as a multipart form.
    Upload {
        endpoint: String,
        file: PathBuf,
        /// Form field the file is sent under.
        #[arg(long, default_value = "file")]
        field: String,
        /// MIME type of the file.
        #[arg(long)]
        mime: Option<String>,
        /// Use PUT instead of POST.
        #[arg(long)]
        put: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Store a token, replacing the current one.
    Set { token: String },
    /// Remove the stored token.
    Clear,
    /// Report whether a token is stored.
    Show,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

/// Turns repeated `--query key=value` pairs into a JSON object of strings.
fn query_object(pairs: Vec<(String, String)>) -> Option<Value> {
    if pairs.is_empty() {
        return None;
    }
    let map = pairs
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect::<Map<_, _>>();
    Some(Value::Object(map))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bearerctl=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::from_env();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let tokens = KeyringTokenStore::new(&settings.keyring_service);

    let command = match cli.command {
        Command::Token(command) => return manage_token(&tokens, command),
        Command::Request(command) => command,
    };

    let client = ApiClient::with_reqwest(tokens).with_base_url(settings.base_url);
    let log_failure = |err: &RequestError| error!(%err, "request failed");
    let on_error = Some(&log_failure as &bearerctl::ErrorObserver<'_>);

    let response = match command {
        RequestCommand::Get {
            endpoint,
            query,
            auth,
        } => {
            if auth {
                client.get_with_token(&endpoint, on_error).await?
            } else {
                let query = query_object(query);
                client.get(&endpoint, query.as_ref(), on_error).await?
            }
        }
        RequestCommand::Post { endpoint, body } => {
            let body: Value = serde_json::from_str(&body).context("body is not valid JSON")?;
            client.post(&endpoint, &body, on_error).await?
        }
        RequestCommand::Put { endpoint, body } => {
            let body: Value = serde_json::from_str(&body).context("body is not valid JSON")?;
            client.put(&endpoint, &body, on_error).await?
        }
        RequestCommand::Delete { endpoint } => client.delete(&endpoint, on_error).await?,
        RequestCommand::Upload {
            endpoint,
            file,
            field,
            mime,
            put,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("unable to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| field.clone());
            let form = MultipartForm::new().file_bytes(field, bytes, file_name, mime.as_deref());

            if put {
                client.put_with_file(&endpoint, form, on_error).await?
            } else {
                client.post_with_file(&endpoint, form, on_error).await?
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn manage_token(tokens: &KeyringTokenStore, command: TokenCommand) -> anyhow::Result<()> {
    match command {
        TokenCommand::Set { token } => {
            tokens.store(&token)?;
            println!("Token stored under `{}`.", tokens.service());
        }
        TokenCommand::Clear => {
            tokens.clear()?;
            println!("Token removed.");
        }
        TokenCommand::Show => match tokens.token()? {
            Some(_) => println!("A token is stored under `{}`.", tokens.service()),
            None => println!("No token is stored under `{}`.", tokens.service()),
        },
    }
    Ok(())
}
