//! プロセスのエントリポイント。ハンドシェイク、gRPC サーバー、終了処理

use crate::error::Result;
use crate::generated::plugin::grpc_controller_server::GrpcControllerServer;
use crate::generated::tfplugin6::provider_server::ProviderServer;
use crate::handshake::{self, ServerCertificate};
use crate::resource::Provider;
use crate::server::{ControllerService, PluginService};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

/// [`serve`] のオプション
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Terraform を親にせず起動し、ハンドシェイク行の代わりに
    /// 再アタッチ情報を出力する
    pub debug: bool,
    /// 再アタッチ設定で使うレジストリアドレス
    /// （例: `registry.terraform.io/chronista-club/docker`）
    pub provider_address: String,
}

/// Terraform から終了されるまで `provider` をサーブする
pub async fn serve<P: Provider>(provider: P, options: ServeOptions) -> Result<()> {
    if !options.debug {
        handshake::check_magic_cookie()?;
        handshake::negotiate_protocol()?;
    }

    let listener = handshake::bind_listener().await?;
    let addr = listener.local_addr()?;
    let shutdown = Arc::new(Notify::new());

    let mut builder = Server::builder();
    let mut certificate: Option<ServerCertificate> = None;

    if !options.debug && std::env::var_os("PLUGIN_CLIENT_CERT").is_some() {
        let cert = handshake::generate_certificate()?;
        let identity = Identity::from_pem(&cert.cert_pem, &cert.key_pem);
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
        certificate = Some(cert);
        tracing::debug!("AutoMTLS enabled");
    }

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("plugin", tonic_health::ServingStatus::Serving)
        .await;

    let router = builder
        .add_service(health_service)
        .add_service(ProviderServer::new(PluginService::new(
            provider,
            shutdown.clone(),
        )))
        .add_service(GrpcControllerServer::new(ControllerService::new(
            shutdown.clone(),
        )));

    if options.debug {
        let reattach =
            handshake::reattach_config(&options.provider_address, addr, std::process::id());
        println!("Provider started. To attach Terraform CLI, set the TF_REATTACH_PROVIDERS environment variable with the following:\n");
        println!("\tTF_REATTACH_PROVIDERS='{}'\n", reattach);
    } else {
        println!("{}", handshake::handshake_line(addr, certificate.as_ref()));
    }
    std::io::stdout().flush()?;

    tracing::info!(%addr, "Provider server listening");

    let debug = options.debug;
    let signal = shutdown.clone();
    router
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            if debug {
                tokio::select! {
                    _ = signal.notified() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            } else {
                // 割り込みは Terraform が StopProvider で転送してくる。
                // 端末の SIGINT は Terraform 宛て
                tokio::spawn(async {
                    while tokio::signal::ctrl_c().await.is_ok() {
                        tracing::debug!("Ignoring interrupt signal");
                    }
                });
                signal.notified().await;
            }
        })
        .await?;

    tracing::info!("Provider server stopped");
    Ok(())
}
