use colored::Colorize;
use converge_cloud::{CloudClient, CloudConfig, CloudError, DatabaseService, TASK_BACKEND};
use converge_config::Settings;
use converge_core::{ConvergeConfig, ConvergeResult, Convergence, Converger};
use std::time::Duration;

/// Connection flags from the command line / environment
pub struct ConnectionArgs {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub region: Option<String>,
}

/// Timing flags that override the settings file
pub struct TimingOverrides {
    pub timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

/// Everything a command needs, built once per invocation
pub struct Context {
    pub client: CloudClient,
    pub settings: Settings,
    pub overrides: TimingOverrides,
    pub json: bool,
}

impl Context {
    pub fn new(
        settings: Settings,
        args: ConnectionArgs,
        overrides: TimingOverrides,
        json: bool,
    ) -> anyhow::Result<Self> {
        let endpoint = args
            .endpoint
            .or_else(|| settings.endpoint.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No API endpoint configured. Pass --endpoint, set CONVERGE_ENDPOINT, or add `endpoint:` to converge.yaml"
                )
            })?;
        let token = args
            .token
            .ok_or_else(|| anyhow::anyhow!("No API token. Pass --token or set CONVERGE_API_TOKEN"))?;

        let mut config = CloudConfig::new(endpoint, token)
            .with_request_timeout(Duration::from_secs(settings.poll_request_timeout_secs));
        if let Some(region) = args.region.or_else(|| settings.region.clone()) {
            config = config.with_region(region);
        }

        if matches!(overrides.timeout_secs, Some(0)) {
            anyhow::bail!("--timeout must be greater than 0");
        }
        if matches!(overrides.poll_interval_secs, Some(0)) {
            anyhow::bail!("--poll-interval must be greater than 0");
        }

        Ok(Self {
            client: CloudClient::new(config)?,
            settings,
            overrides,
            json,
        })
    }

    /// Timing for `action`: flags win over the settings file
    pub fn converge_config(&self, action: &str) -> ConvergeConfig {
        let mut config = self.settings.converge_config(action);
        if let Some(secs) = self.overrides.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.overrides.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        config
    }

    pub fn service(&self, action: &str) -> DatabaseService {
        let service = DatabaseService::new(Converger::new(self.converge_config(action)));
        match self.settings.status_map(TASK_BACKEND) {
            Some(extra) => service.with_status_map(&extra),
            None => service,
        }
    }
}

/// Print the outcome of a convergence run
pub fn report(
    result: ConvergeResult<Convergence, CloudError>,
    json: bool,
) -> anyhow::Result<()> {
    match result {
        Ok(done) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&done)?);
            } else {
                println!();
                println!("{}", format!("✓ {}", done).green().bold());
            }
            Ok(())
        }
        Err(e) if e.is_timeout() => {
            eprintln!(
                "{}",
                "⚠ Stopped waiting; the change may still be converging on the remote side."
                    .yellow()
            );
            Err(e.into())
        }
        Err(e) => {
            eprintln!("{}", format!("✗ {}", e).red().bold());
            Err(e.into())
        }
    }
}
