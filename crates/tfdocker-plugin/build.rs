//! Terraform プラグインプロトコルのビルドスクリプト
//!
//! tfplugin6 と go-plugin コントローラーの proto を protox でコンパイルする
//! （ビルド環境に `protoc` は不要）。得たディスクリプタセットを tonic-build に
//! 渡してクライアントとサーバーを生成する。

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_dir = "proto";
    let protos = ["proto/tfplugin6.proto", "proto/grpc_controller.proto"];

    let descriptors = protox::compile(protos, [proto_dir])?;

    tonic_build::configure()
        // クライアントはプロセス内のサーバーテストで使う
        .build_client(true)
        .build_server(true)
        .compile_fds(descriptors)?;

    for proto in &protos {
        println!("cargo:rerun-if-changed={proto}");
    }

    Ok(())
}
