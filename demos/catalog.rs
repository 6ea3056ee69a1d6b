use clap::{CommandFactory, Parser};
use kubecatalog::{
    GlobalOptions, PlatformEnv, ResourceTargetSpec, build_catalog, context_value_completer, resolve,
    schema::{JsonSchemaProvider, KindNameConvention},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "kubecatalog",
    about = "List the resource kinds that can be imported from the current cluster"
)]
struct Cli {
    /// Provider schema document produced by `providers schema -json`.
    #[arg(long)]
    schema: std::path::PathBuf,

    /// Provider name to look up in the schema document.
    #[arg(long, default_value = "kubernetes")]
    provider: String,

    /// Prefix the provider puts in front of snake-cased kind names.
    #[arg(long, default_value = "kubernetes_")]
    prefix: String,

    /// Only show these resources; all of them must be importable.
    #[arg(long, value_delimiter = ',')]
    resources: Vec<String>,

    /// Context to use instead of KUBECTL_PLUGINS_GLOBAL_FLAG_CONTEXT or the current context.
    #[arg(long, add = context_value_completer())]
    context: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kubecatalog::clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut options = GlobalOptions::from_env()?;
    if cli.context.is_some() {
        options.context = cli.context;
    }
    let config = resolve(&options, &PlatformEnv::capture())?;
    println!(
        "context={} namespace={} server={}",
        config.context(),
        config.namespace(),
        config.server()
    );

    let provider = JsonSchemaProvider::new(cli.provider, cli.schema).with_convention(
        KindNameConvention::PrefixedSnakeCase { prefix: cli.prefix },
    );
    let catalog = build_catalog(&config, &provider, cli.verbose).await;

    let spec = if cli.resources.is_empty() {
        ResourceTargetSpec::AllResources
    } else {
        ResourceTargetSpec::AllOf(cli.resources)
    };
    for kind in catalog.select(&spec)? {
        println!(
            "{}\t{}\t{}\tnamespaced={}",
            kind.resource,
            kind.api_version(),
            kind.name,
            kind.namespaced
        );
    }

    Ok(())
}
