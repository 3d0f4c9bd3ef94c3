use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::config::{IngestOptions, Opts};
use crate::db::SqliteRepository;
use crate::error::Error;
use crate::extract::NpyExtractor;
use crate::pipeline::{IndexingPipeline, IngestOutcome};
use crate::utils::{pb_style, source_path, suffix_regex};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 描述符文件所在目录，也可以是单个文件
    ///
    /// 每个文件为一个视频的 N × D 描述符矩阵，视频源路径为文件路径去掉末尾的 `.npy`
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "npy")]
    pub suffix: String,
    /// 使用正则表达式改写视频源路径
    /// 例：`--replace '^/data/features' '/data/videos'`
    #[arg(short, long, num_args = 2, value_names = ["REGEX", "REPLACE"], verbatim_doc_comment)]
    pub replace: Option<Vec<String>>,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let replace = match self.replace.as_deref() {
            Some([re, rep]) => Some((Regex::new(re)?, rep.as_str())),
            _ => None,
        };

        let repo = Arc::new(SqliteRepository::open(opts.conf_dir.database()).await?);
        let pipeline = IndexingPipeline::new(repo)
            .window_size(self.ingest.window_size as usize)
            .expected_dim(self.ingest.dim);
        let extractor = NpyExtractor::new(self.ingest.dim);

        let entries = WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| re_suf.is_match(&entry.path().to_string_lossy()))
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();
        info!("找到 {} 个描述符文件", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
        let (mut added, mut skipped, mut failed) = (0, 0, 0);

        for entry in entries {
            let mut source = source_path(&entry);
            if let Some((re, rep)) = &replace {
                source = re.replace(&source, *rep).into_owned();
            }

            let result = match block_in_place(|| extractor.read_frames_file(&entry)) {
                Ok(frames) => pipeline.ingest(&source, &frames).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(IngestOutcome::Added { windows, .. }) => {
                    pb.set_message(format!("添加视频: {} ({} 个窗口)", source, windows));
                    added += 1;
                }
                Ok(IngestOutcome::Skipped(_)) => {
                    pb.set_message(format!("跳过视频: {}", source));
                    skipped += 1;
                }
                Err(
                    e @ (Error::EmptyInput
                    | Error::DimensionMismatch { .. }
                    | Error::Extraction(_)
                    | Error::Io(_)),
                ) => {
                    pb.println(format!("[ERR] {}: {}", entry.display(), e));
                    failed += 1;
                }
                Err(e) => return Err(e.into()),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!("添加 {} 个视频，跳过 {} 个，失败 {} 个", added, skipped, failed);
        Ok(())
    }
}
