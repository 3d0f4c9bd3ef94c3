use sqlx::{Executor, Result, Sqlite};

use super::{FrameRecord, FrameRow, VideoRecord};

/// 添加视频记录
pub async fn add_video<'c, E>(executor: E, path: &str) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO video (path)
        VALUES (?)
        RETURNING id
        "#,
    )
    .bind(path)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// 根据 ID 获取视频记录
pub async fn get_video<'c, E>(executor: E, id: i64) -> Result<Option<VideoRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT id, path FROM video WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 根据源路径获取视频记录
pub async fn get_video_by_path<'c, E>(executor: E, path: &str) -> Result<Option<VideoRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT id, path FROM video WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(executor)
    .await
}

/// 添加窗口描述符
pub async fn add_frame<'c, E>(executor: E, record: &FrameRecord) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO frame (video_id, window_index, dim, descriptor)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(record.video_id)
    .bind(record.window_index as i64)
    .bind(record.descriptor.dim() as i64)
    .bind(record.descriptor.to_le_bytes())
    .execute(executor)
    .await?;

    Ok(())
}

/// 按插入顺序获取全部窗口描述符
pub(crate) async fn get_frames<'c, E>(executor: E) -> Result<Vec<FrameRow>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT video_id, window_index, dim, descriptor FROM frame ORDER BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 获取最早入库的窗口描述符的维度，语料为空时返回 None
pub async fn get_corpus_dim<'c, E>(executor: E) -> Result<Option<i64>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT dim FROM frame ORDER BY id ASC LIMIT 1
        "#,
    )
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(dim,)| dim))
}

/// 查询数据库中的视频和窗口数量
pub async fn get_count<'c, E>(executor: E) -> Result<(i64, i64)>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM video), (SELECT COUNT(*) FROM frame)
        "#,
    )
    .fetch_one(executor)
    .await
}
