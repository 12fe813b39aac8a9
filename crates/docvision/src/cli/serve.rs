//! The `docvision serve` command: run one or all services.

use anyhow::Context;
use clap::{Args, ValueEnum};
use docvision_core::{Config, Docvision};
use futures_util::future::try_join_all;

use crate::server::{self, Service};

/// Which service(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    /// POST /classify
    Classification,
    /// POST /parse
    Parsing,
    /// POST /match
    Matching,
    /// All three, each on its own port
    All,
}

impl ServiceArg {
    fn services(self) -> Vec<Service> {
        match self {
            ServiceArg::Classification => vec![Service::Classification],
            ServiceArg::Parsing => vec![Service::Parsing],
            ServiceArg::Matching => vec![Service::Matching],
            ServiceArg::All => Service::ALL.to_vec(),
        }
    }
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Service to run
    #[arg(short, long, value_enum, default_value = "all")]
    pub service: ServiceArg,

    /// Port override (single service only)
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    pub host: Option<String>,

    /// LLM provider: openai, anthropic or ollama
    #[arg(long, env = "DOCVISION_PROVIDER")]
    pub provider: Option<String>,

    /// Model name (provider-specific)
    #[arg(long, env = "DOCVISION_MODEL")]
    pub model: Option<String>,

    /// Documents analyzed concurrently per request
    #[arg(long)]
    pub parallel: Option<usize>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    let services = args.service.services();
    apply_overrides(&args, &services, &mut config)?;

    let docvision = Docvision::new(config, args.model.as_deref())
        .context("Failed to set up the LLM provider")?;
    let analyzer = docvision.analyzer().clone();
    let server_config = docvision.config().server.clone();

    if !analyzer.is_available().await {
        tracing::warn!(
            "Provider {} is not reachable yet; requests will fail until it is",
            analyzer.provider_name()
        );
    }

    let addrs: Vec<(Service, String)> = services
        .iter()
        .map(|&service| {
            let port = service.port(&server_config);
            (service, format!("{}:{port}", server_config.host))
        })
        .collect();

    try_join_all(
        addrs
            .iter()
            .map(|(service, addr)| server::start(*service, addr, analyzer.clone(), &server_config)),
    )
    .await?;

    Ok(())
}

fn apply_overrides(
    args: &ServeArgs,
    services: &[Service],
    config: &mut Config,
) -> anyhow::Result<()> {
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(parallel) = args.parallel {
        config.analysis.parallel = parallel;
    }
    if let Some(port) = args.port {
        match services {
            [Service::Classification] => config.server.classification_port = port,
            [Service::Parsing] => config.server.parsing_port = port,
            [Service::Matching] => config.server.matching_port = port,
            _ => anyhow::bail!(
                "--port applies to a single service; set ports in the config file for --service all"
            ),
        }
    }
    config.check()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(service: ServiceArg) -> ServeArgs {
        ServeArgs {
            service,
            port: None,
            host: None,
            provider: None,
            model: None,
            parallel: None,
        }
    }

    #[test]
    fn test_all_expands_to_three_services() {
        assert_eq!(ServiceArg::All.services().len(), 3);
        assert_eq!(ServiceArg::Parsing.services(), vec![Service::Parsing]);
    }

    #[test]
    fn test_port_override_single_service() {
        let mut config = Config::default();
        let mut a = args(ServiceArg::Parsing);
        a.port = Some(8080);
        a.provider = Some("ollama".to_string());
        apply_overrides(&a, &a.service.services(), &mut config).unwrap();
        assert_eq!(config.server.parsing_port, 8080);
        assert_eq!(config.server.classification_port, 3001);
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_port_override_rejected_for_all() {
        let mut config = Config::default();
        let mut a = args(ServiceArg::All);
        a.port = Some(8080);
        assert!(apply_overrides(&a, &a.service.services(), &mut config).is_err());
    }

    #[test]
    fn test_overrides_are_validated() {
        let mut config = Config::default();
        let mut a = args(ServiceArg::Classification);
        a.provider = Some("carrier-pigeon".to_string());
        assert!(apply_overrides(&a, &a.service.services(), &mut config).is_err());

        let mut config = Config::default();
        let mut a = args(ServiceArg::Classification);
        a.port = Some(3002);
        // Collides with the parsing port
        assert!(apply_overrides(&a, &a.service.services(), &mut config).is_err());
    }
}
