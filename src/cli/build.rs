use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::db::SqliteRepository;
use crate::descriptor::check_dim;
use crate::kdtree::SpatialIndex;
use crate::pipeline::IndexingPipeline;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    /// 构建完成后重新加载索引，并与重新构建的结果逐个节点比较
    #[arg(long)]
    pub verify: bool,
    /// 描述符维度，与数据库中的描述符不一致时报错
    #[arg(long, value_name = "D")]
    pub dim: Option<usize>,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let repo = Arc::new(SqliteRepository::open(opts.conf_dir.database()).await?);
        let index = IndexingPipeline::new(repo).build_index().await?;
        if let Some(dim) = self.dim {
            check_dim(dim, index.dim())?;
        }

        block_in_place(|| index.save_atomic(opts.conf_dir.index(), opts.conf_dir.index_tmp()))?;
        info!("构建索引成功，共 {} 条记录，{} 个视频", index.len(), index.video_count());

        if self.verify {
            let loaded = block_in_place(|| SpatialIndex::load(opts.conf_dir.index(), self.dim))?;
            if !block_in_place(|| loaded.verify())? {
                bail!("索引校验失败: {}", opts.conf_dir.index().display());
            }
            info!("索引校验通过");
        }
        Ok(())
    }
}
