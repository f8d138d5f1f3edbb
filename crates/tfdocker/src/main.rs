use clap::Parser;
use tfdocker::{DockerProvider, PROVIDER_ADDRESS, logging};
use tfdocker_plugin::{ServeOptions, serve};

#[derive(Parser)]
#[command(name = "terraform-provider-docker")]
#[command(about = "Docker Engine・Swarm・Docker Hub を扱う Terraform プロバイダー", long_about = None)]
#[command(version)]
struct Cli {
    /// Terraform を親プロセスにせず起動し、TF_REATTACH_PROVIDERS を表示する
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout はハンドシェイクに使うので、ログは stderr に出力
    logging::init();

    // tonic と reqwest が同じ暗号プロバイダーを使うように先に登録する
    let _ = rustls::crypto::ring::default_provider().install_default();

    serve(
        DockerProvider::new(),
        ServeOptions {
            debug: cli.debug,
            provider_address: PROVIDER_ADDRESS.to_string(),
        },
    )
    .await?;

    Ok(())
}
