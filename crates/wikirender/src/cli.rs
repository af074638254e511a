//! Command-line options and subcommands.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use serde_json::json;
use std::path::PathBuf;
use wikirender::config::{
    ConfigError, ConfigSetup, CorsPolicy, EndpointRegistration, LayeredConfigOptions,
    ServiceConfiguration,
};

/// Inspect and check the rendering service configuration.
#[derive(Parser, Debug)]
#[command(name = "wikirender", version)]
pub struct Cli {
    /// Load a single wikirender.json5 file instead of the layered stack
    #[arg(long, conflicts_with_all = ["cwd", "runtime"])]
    config: Option<PathBuf>,
    /// Working directory used to discover local config layers
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Extra config files applied after every other layer
    #[arg(long)]
    runtime: Vec<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Print the effective configuration as JSON
    Show,
    /// Fail unless the configuration has an endpoint and a valid listen address
    Check,
    /// Print the endpoint a prefix or domain resolves to
    Resolve {
        /// Endpoint prefix (e.g. enwiki) or domain
        name: String,
    },
}

/// Options applied on top of the loaded configuration.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Register an endpoint, as URI,DOMAIN[,PREFIX]
    #[arg(long = "endpoint", value_parser = parse_endpoint)]
    endpoints: Vec<EndpointRegistration>,
    /// Do not verify SSL certificates of the API endpoints
    #[arg(long)]
    insecure: bool,
    /// CORS policy: false, * or an origin
    #[arg(long, value_parser = parse_cors)]
    cors: Option<CorsPolicy>,
    /// Listener port, range-checked by `check`
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,
    /// Listener interface address
    #[arg(long)]
    interface: Option<String>,
    /// Default proxy for the API endpoints
    #[arg(long)]
    proxy: Option<String>,
    /// Enable debug mode of the service
    #[arg(long)]
    debug: bool,
}

impl ConfigSetup for Overrides {
    fn setup(&self, config: &mut ServiceConfiguration) -> Result<(), ConfigError> {
        for endpoint in &self.endpoints {
            config.register(endpoint.clone())?;
        }
        if self.insecure {
            config.require_valid_ssl = false;
        }
        if let Some(cors) = &self.cors {
            config.cors_policy = cors.clone();
        }
        if let Some(port) = self.port {
            config.server_port = Some(port);
        }
        if let Some(interface) = &self.interface {
            config.server_interface = Some(interface.clone());
        }
        if let Some(proxy) = &self.proxy {
            config.default_proxy_uri = Some(proxy.clone());
        }
        if self.debug {
            config.debug = true;
        }
        Ok(())
    }
}

fn parse_endpoint(value: &str) -> Result<EndpointRegistration, String> {
    let mut parts = value.splitn(3, ',').map(str::trim);
    let (Some(uri), Some(domain)) = (parts.next(), parts.next()) else {
        return Err("expected URI,DOMAIN[,PREFIX]".to_string());
    };
    let prefix = parts.next().unwrap_or_default();
    Ok(EndpointRegistration::new(uri, domain).with_prefix(prefix))
}

fn parse_cors(value: &str) -> Result<CorsPolicy, String> {
    match value {
        "false" => Ok(CorsPolicy::Disabled),
        "true" => Ok(CorsPolicy::AnyOrigin),
        "" => Err("expected false, * or an origin".to_string()),
        origin => Ok(CorsPolicy::from(origin)),
    }
}

/// Load the configuration selected by the options and apply overrides.
fn load(cli: &Cli) -> anyhow::Result<ServiceConfiguration> {
    let base = if let Some(path) = cli.config.as_ref() {
        ServiceConfiguration::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        let cwd = match cli.cwd.clone() {
            Some(cwd) => cwd,
            None => std::env::current_dir().context("cwd")?,
        };
        info!("loading layered config from cwd: {}", cwd.display());
        let options = cli
            .runtime
            .iter()
            .fold(LayeredConfigOptions::new(&cwd), |options, path| {
                options.with_runtime_path(path)
            });
        let layered = ServiceConfiguration::load_layered_with_options(options)
            .context("failed to load layered config")?;
        debug!("layered config loaded (layers={})", layered.layers.len());
        layered.config
    };
    base.with_setup(&cli.overrides)
        .context("failed to apply command-line overrides")
}

/// Run the selected subcommand and return what should be printed.
pub fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = load(cli)?;
    match &cli.command {
        Command::Show => serde_json::to_string_pretty(&config).context("encode config"),
        Command::Check => check(&config),
        Command::Resolve { name } => resolve(&config, name),
    }
}

fn check(config: &ServiceConfiguration) -> anyhow::Result<String> {
    config.ensure_usable()?;
    let listen = config.listen_addr()?;
    let endpoint = config
        .default_endpoint()
        .map(|endpoint| endpoint.prefix.as_deref().unwrap_or(&endpoint.domain))
        .unwrap_or_default();
    let cors = config.cors_policy.header_value().unwrap_or("disabled");
    let ssl = if config.require_valid_ssl {
        "required"
    } else {
        "not verified"
    };
    Ok(format!(
        "endpoints: {} (default: {endpoint})\nlisten: {listen}\ncors: {cors}\nssl: {ssl}",
        config.endpoints().len()
    ))
}

fn resolve(config: &ServiceConfiguration, name: &str) -> anyhow::Result<String> {
    let Some(endpoint) = config.resolve(name) else {
        bail!("no endpoint registered or predefined for `{name}`");
    };
    let output = json!({
        "uri": endpoint.uri,
        "domain": endpoint.domain,
        "prefix": endpoint.prefix,
        "proxy": config.proxy_for(&endpoint),
    });
    serde_json::to_string_pretty(&output).context("encode endpoint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn cli_with_config(contents: &str, args: &[&str]) -> (TempDir, Cli) {
        let temp = TempDir::new().expect("tmp");
        let path = temp.path().join("wikirender.json5");
        fs::write(&path, contents).expect("write");
        let path = path.to_string_lossy().to_string();
        let mut argv = vec!["wikirender", "--config", path.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("parse");
        (temp, cli)
    }

    #[test]
    fn endpoint_argument_parses_optional_prefix() {
        let endpoint = parse_endpoint("http://localhost/api.php, fr.example.org, fr_example")
            .expect("endpoint");
        assert_eq!(endpoint.prefix.as_deref(), Some("fr_example"));

        let endpoint = parse_endpoint("http://localhost/api.php,fr.example.org").expect("endpoint");
        assert_eq!(endpoint.prefix, None);

        assert!(parse_endpoint("http://localhost/api.php").is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let (_temp, cli) = cli_with_config(
            "{ require_valid_ssl: true }",
            &[
                "--insecure",
                "--cors",
                "false",
                "--endpoint",
                "http://localhost/api.php,fr.example.org,fr_example",
                "show",
            ],
        );
        let config = load(&cli).expect("config");
        assert!(!config.require_valid_ssl);
        assert_eq!(config.cors_policy, CorsPolicy::Disabled);
        assert_eq!(config.endpoints()[0].prefix.as_deref(), Some("fr_example"));
    }

    #[test]
    fn check_rejects_config_without_endpoints() {
        let (_temp, cli) = cli_with_config("{}", &["check"]);
        let err = run(&cli).unwrap_err();
        assert!(format!("{err}").contains("no usable endpoint"));
    }

    #[test]
    fn check_reports_bad_port_at_use() {
        let (_temp, cli) = cli_with_config(
            r#"{ endpoints: [ { uri: "http://localhost/api.php", domain: "a.org" } ] }"#,
            &["--port", "70000", "check"],
        );
        let err = run(&cli).unwrap_err();
        assert!(format!("{err}").contains("port out of range"));
    }

    #[test]
    fn negative_port_parses_and_fails_at_check() {
        let (_temp, cli) = cli_with_config(
            r#"{ endpoints: [ { uri: "http://localhost/api.php", domain: "a.org" } ] }"#,
            &["--port", "-1", "check"],
        );
        let err = run(&cli).unwrap_err();
        assert!(format!("{err}").contains("port out of range"));
    }

    #[test]
    fn check_summarizes_usable_config() {
        let (_temp, cli) = cli_with_config(
            r#"{
                endpoints: [ { uri: "http://localhost/api.php", domain: "a.org", prefix: "a" } ],
                cors_policy: false,
            }"#,
            &["--interface", "127.0.0.1", "check"],
        );
        let output = run(&cli).expect("check");
        assert_eq!(
            output,
            "endpoints: 1 (default: a)\nlisten: 127.0.0.1:8000\ncors: disabled\nssl: required"
        );
    }

    #[test]
    fn duplicate_override_prefix_is_rejected() {
        let (_temp, cli) = cli_with_config(
            r#"{ endpoints: [ { uri: "http://a/api.php", domain: "a.org", prefix: "a" } ] }"#,
            &["--endpoint", "http://b/api.php,b.org,a", "show"],
        );
        let err = load(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("already registered"));
    }

    #[test]
    fn resolve_prints_predefined_wiki_with_proxy() {
        let (_temp, cli) = cli_with_config(
            r#"{ default_proxy_uri: "http://proxy:8080" }"#,
            &["resolve", "enwiki"],
        );
        let output = run(&cli).expect("resolve");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["uri"], "https://en.wikipedia.org/w/api.php");
        assert_eq!(value["proxy"], "http://proxy:8080");
    }

    #[test]
    fn config_conflicts_with_layer_options() {
        let result = Cli::try_parse_from([
            "wikirender",
            "--config",
            "a.json5",
            "--runtime",
            "b.json5",
            "show",
        ]);
        assert!(result.is_err());
    }
}
