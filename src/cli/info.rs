use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::db::{Repository, SqliteRepository};
use crate::kdtree::SpatialIndex;

#[derive(Parser, Debug, Clone)]
pub struct InfoCommand {
    /// 同时校验索引文件的树结构
    #[arg(long)]
    pub verify: bool,
}

impl SubCommandExtend for InfoCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let repo = Arc::new(SqliteRepository::open(opts.conf_dir.database()).await?);
        let (videos, windows) = repo.count().await?;
        println!("配置目录      : {}", opts.conf_dir);
        println!("视频数量      : {}", videos);
        println!("窗口数量      : {}", windows);

        let path = opts.conf_dir.index();
        if !path.exists() {
            println!("索引          : 未构建");
            return Ok(());
        }

        let index = block_in_place(|| SpatialIndex::load(&path, None))?;
        println!("索引记录数量  : {}", index.len());
        println!("索引视频数量  : {}", index.video_count());
        println!("描述符维度    : {}", index.dim());
        println!("树深度        : {}", index.depth());
        if index.len() != windows {
            println!("索引与数据库不一致，需要重新执行 build");
        }
        if self.verify {
            let ok = block_in_place(|| index.verify())?;
            println!("树结构校验    : {}", if ok { "通过" } else { "失败" });
        }
        Ok(())
    }
}
