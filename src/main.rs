use clap::Parser;
use log::debug;
use tikv_jemallocator::Jemalloc;

use vidsearch::Opts;
use vidsearch::cli::SubCommandExtend;
use vidsearch::config::SubCommand;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    debug!("配置目录: {}", opts.conf_dir);
    std::fs::create_dir_all(opts.conf_dir.path())?;

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Build(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Info(config) => config.run(&opts).await,
    }
}
