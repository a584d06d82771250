use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cosmosdemo_observability::init();

    let report = cosmosdemo_app::run_from_env().await;

    ExitCode::from(report.exit_status())
}
