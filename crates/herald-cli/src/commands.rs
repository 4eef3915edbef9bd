use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use herald_browser::{Fetcher, HttpFetcher};
use herald_config::{ConfigLoader, HeraldConfig};
use herald_core::{HeraldError, Message, Result};
use herald_llm::{LlmClient, LlmProvider, MockProvider, OpenAiProvider};
use herald_runtime::actions::RunSubscription;
use herald_runtime::{
    CrawlCapabilities, CronTrigger, ProcessSandbox, RunnerOptions, ScheduleTz,
    SubscriptionCallback, SubscriptionRunner, Team, roles, synthesize,
};

/// 📣 Herald: trigger-driven autonomous agent runtime
#[derive(Parser, Debug)]
#[command(name = "herald", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to herald.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn a natural-language subscription request into a live subscription
    Run {
        /// e.g. "Every morning at 9, summarize the top stories on news.ycombinator.com"
        requirement: String,
        /// Timezone the parsed cron expression is evaluated in (UTC, local, +08:00)
        #[arg(long, default_value = "UTC")]
        tz: String,
        /// Exit after the subscription is created instead of serving it
        #[arg(long)]
        no_serve: bool,
    },
    /// Subscribe an existing crawler code blob to a cron schedule
    Watch {
        /// Cron expression (five fields, or six with seconds)
        #[arg(long)]
        cron: String,
        /// Page to crawl; repeat for several pages
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        /// File holding the generated code, one `# <url>` section per page
        #[arg(long)]
        code: PathBuf,
        /// What to do with the crawled data
        #[arg(long, default_value = "Summarize the content.")]
        process: String,
        #[arg(long, default_value = "UTC")]
        tz: String,
    },
    /// Print the upcoming fire instants of a cron expression
    Next {
        cron: String,
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
        #[arg(long, default_value = "UTC")]
        tz: String,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.into_config();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level.clone().unwrap_or_else(|| config.logging.level.clone())
        };
        init_logging(&log_level, &config.logging.format);

        match self.command {
            Commands::Run { requirement, tz, no_serve } => {
                Self::cmd_run(config, requirement, &tz, no_serve).await
            }
            Commands::Watch { cron, urls, code, process, tz } => {
                Self::cmd_watch(config, cron, urls, code, process, &tz).await
            }
            Commands::Next { cron, count, tz } => Self::cmd_next(&cron, count, &tz),
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Version => {
                println!("herald {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }

    async fn cmd_run(config: HeraldConfig, requirement: String, tz: &str, no_serve: bool) -> Result<()> {
        let timezone: ScheduleTz = tz.parse()?;
        let llm = build_llm(&config)?;
        let caps = build_capabilities(&config, llm.clone())?;
        let runner = build_runner(&config)?;

        println!("📣 Herald v{}", env!("CARGO_PKG_VERSION"));
        println!("   Model: {} ({})", llm.model(), llm.provider_name());
        println!();

        let run = RunSubscription::new(runner.clone(), caps.clone(), Arc::new(StdoutCallback))
            .with_timezone(timezone);
        let mut team = Team::new()
            .hire(roles::subscription_assistant(llm.clone(), run)?)
            .hire(roles::crawler_engineer(llm, Arc::clone(&caps.fetcher))?);

        for message in team.run(requirement).await? {
            println!("── {} ──", message.cause_by());
            println!("{message}");
            println!();
        }

        if runner.is_empty() {
            println!("No subscription was created.");
            return Ok(());
        }
        if no_serve {
            runner.shutdown().await;
            return Ok(());
        }
        serve(&runner).await;
        Ok(())
    }

    async fn cmd_watch(
        config: HeraldConfig,
        cron: String,
        urls: Vec<String>,
        code: PathBuf,
        process: String,
        tz: &str,
    ) -> Result<()> {
        let timezone: ScheduleTz = tz.parse()?;
        let trigger = CronTrigger::with_timezone(&cron, timezone)?;
        let blob = tokio::fs::read_to_string(&code).await?;

        let caps = build_capabilities(&config, build_llm(&config)?)?;
        let crawl = synthesize(&urls, &blob, &process, caps)?;
        let role = roles::sub_role(crawl)?;

        let runner = build_runner(&config)?;
        runner.subscribe(role, trigger, StdoutCallback)?;
        serve(&runner).await;
        Ok(())
    }

    fn cmd_next(cron: &str, count: usize, tz: &str) -> Result<()> {
        let timezone: ScheduleTz = tz.parse()?;
        let trigger = CronTrigger::with_timezone(cron, timezone)?;
        let instants = trigger.upcoming(Utc::now(), count);
        if instants.is_empty() {
            println!("'{cron}' never fires again.");
        }
        for instant in instants {
            println!("{}", format_instant(instant, timezone));
        }
        Ok(())
    }

    fn cmd_config(config: &HeraldConfig, json: bool) -> Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config)
                .map_err(|e| HeraldError::Config(format!("failed to render config: {e}")))?
        };
        println!("{rendered}");
        Ok(())
    }
}

fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_target(false)
            .init(),
    }
}

fn build_llm(config: &HeraldConfig) -> Result<LlmClient> {
    let llm = &config.llm;
    let provider: Arc<dyn LlmProvider> = match llm.provider.as_str() {
        "openai" => {
            // The client's own budget governs; keep the transport from hanging forever.
            let transport = Duration::from_secs(if llm.timeout_secs == 0 { 600 } else { llm.timeout_secs });
            let mut provider = OpenAiProvider::new(llm.api_key.clone(), transport)?;
            if let Some(url) = &llm.base_url {
                provider = provider.with_base_url(url.clone(), "openai-compatible");
            }
            Arc::new(provider)
        }
        "mock" => Arc::new(MockProvider::new("mock")),
        other => {
            return Err(HeraldError::Config(format!("unknown llm provider '{other}'")));
        }
    };
    let timeout = (llm.timeout_secs > 0).then(|| Duration::from_secs(llm.timeout_secs));
    Ok(LlmClient::new(provider, llm.model.clone())
        .with_max_tokens(llm.max_tokens)
        .with_temperature(llm.temperature)
        .with_timeout(timeout))
}

fn build_capabilities(config: &HeraldConfig, llm: LlmClient) -> Result<CrawlCapabilities> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        HttpFetcher::new(Duration::from_secs(config.browser.timeout_secs), &config.browser.user_agent)?
            .with_max_bytes(config.browser.max_bytes),
    );
    let sandbox = ProcessSandbox::from_config(&config.sandbox, &config.workspace);
    info!(root = %sandbox.root().display(), "generated parsers run in a separate process");
    Ok(CrawlCapabilities {
        fetcher,
        llm,
        sandbox: Arc::new(sandbox),
    })
}

fn build_runner(config: &HeraldConfig) -> Result<SubscriptionRunner> {
    Ok(SubscriptionRunner::new(RunnerOptions::from_config(&config.runner)?))
}

/// Serve subscriptions until they all end or Ctrl-C.
async fn serve(runner: &SubscriptionRunner) {
    for sub in runner.subscriptions() {
        println!("⏰ {} on {}", sub.role, sub.trigger);
    }
    println!("Press Ctrl-C to stop.");

    tokio::select! {
        _ = runner.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "could not listen for Ctrl-C");
            }
            info!("interrupt received");
        }
    }
    runner.shutdown().await;
}

fn format_instant(instant: DateTime<Utc>, tz: ScheduleTz) -> String {
    match tz {
        ScheduleTz::Utc => instant.to_rfc3339(),
        ScheduleTz::Local => instant.with_timezone(&Local).to_rfc3339(),
        ScheduleTz::Named(tz) => instant.with_timezone(&tz).to_rfc3339(),
        ScheduleTz::Fixed(offset) => instant.with_timezone(&offset).to_rfc3339(),
    }
}

/// Prints every delivered message.
struct StdoutCallback;

#[async_trait]
impl SubscriptionCallback for StdoutCallback {
    async fn call(&self, message: Message) -> Result<()> {
        println!("── {} ({}) ──", message.cause_by(), message.created_at().to_rfc3339());
        println!("{}", message.content());
        Ok(())
    }
}
