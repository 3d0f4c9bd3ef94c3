use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, warn};
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, SearchOptions};
use crate::db::SqliteRepository;
use crate::extract::{FeatureExtractor, NpyExtractor};
use crate::service::{QueryService, SearchHit};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 查询描述符文件，为一维数组或 1 × D 矩阵
    pub query: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let repo = Arc::new(SqliteRepository::open(opts.conf_dir.database()).await?);
        let service = QueryService::new(repo, (&self.search).into());
        block_in_place(|| service.load(opts.conf_dir.index()))?;

        let bytes = tokio::fs::read(&self.query).await?;
        let descriptor = block_in_place(|| NpyExtractor::new(self.search.dim).extract(&bytes))?;
        debug!("查询描述符维度: {}", descriptor.dim());

        let outcome = service.search(&descriptor, self.search.count).await?;
        if let Some(e) = outcome.insufficient() {
            warn!("{}", e);
        }

        print_result(&outcome.hits, self)
    }
}

fn print_result(result: &[SearchHit], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for hit in result {
                println!("{:.4}\t{}\t{}", hit.distance, hit.window_index, hit.path);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
