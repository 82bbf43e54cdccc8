// 主入口点 - 小红书视频上传命令行
// Main entry point for the Xiaohongshu uploader CLI

use clap::Parser;
use std::process::ExitCode;
use xhs_uploader::cli::Args;
use xhs_uploader::{init_tracing, AppConfig, UploadResult, XhsPublisher};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let config = AppConfig::from_env().with_sign_server(args.sign_server.clone());
    let publisher = XhsPublisher::from_config(config);

    match publisher.publish(args.to_options()).await {
        UploadResult::Success { data } => {
            match serde_json::to_string_pretty(&data) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", data),
            }
            ExitCode::SUCCESS
        }
        UploadResult::Failure { kind, error } => {
            println!("Upload failed ({:?}): {}", kind, error);
            ExitCode::FAILURE
        }
    }
}
