use clap::Parser;

use shortener::cli::Cli;
use shortener::config::{StaticConfig, get_config, init_config_from};
use shortener::runtime::run_server;
use shortener::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    // 优先级：命令行参数 > ENV > config.toml > 默认值
    let mut config = StaticConfig::load(cli.config.as_deref());
    cli.apply(&mut config);
    init_config_from(config);

    let config = get_config();
    let _log_guard = init_logging(&config)?;

    run_server(config).await
}
