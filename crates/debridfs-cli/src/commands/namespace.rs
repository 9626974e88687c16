//! Browsing and editing commands.

use anyhow::anyhow;
use debridfs_namespace::NamespaceError;
use debridfs_remote::ContentStream;
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cli::{CatArgs, ListArgs, MoveArgs, OutputFormat, PathArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_entries;

pub(crate) async fn handle_ls(ctx: &AppContext, args: ListArgs, format: OutputFormat) -> CliResult<()> {
    let entries = ctx.engine.list(&ctx.cancel, &args.path).await?;
    print!("{}", render_entries(&entries, format)?);
    Ok(())
}

pub(crate) async fn handle_mv(ctx: &AppContext, args: MoveArgs) -> CliResult<()> {
    let object = match ctx.engine.new_object(&ctx.cancel, &args.source).await {
        Ok(object) => object,
        Err(NamespaceError::NotAFile { .. }) => {
            ctx.engine
                .dir_move(&ctx.cancel, &args.source, &args.destination)
                .await?;
            println!("moved {} -> {}", args.source, args.destination);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let destination = file_destination(ctx, &args.destination, object.name()).await;
    let moved = ctx
        .engine
        .move_object(&ctx.cancel, &object, &destination)
        .await?;
    println!("moved {} -> {}", object.remote(), moved.remote());
    Ok(())
}

/// Full destination path for a file move; folders keep the file's name.
pub(crate) async fn file_destination(ctx: &AppContext, destination: &str, name: &str) -> String {
    let trimmed = destination.trim_end_matches('/');
    let is_folder = trimmed.is_empty()
        || destination.ends_with('/')
        || ctx.engine.list(&ctx.cancel, trimmed).await.is_ok();
    match (is_folder, trimmed.is_empty()) {
        (true, true) => name.to_string(),
        (true, false) => format!("{trimmed}/{name}"),
        (false, _) => destination.to_string(),
    }
}

pub(crate) async fn handle_rm(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let object = match ctx.engine.new_object(&ctx.cancel, &args.path).await {
        Ok(object) => object,
        Err(NamespaceError::NotAFile { path }) => {
            return Err(CliError::validation(format!(
                "{path} is a folder; use rmdir or purge"
            )));
        }
        Err(err) => return Err(err.into()),
    };
    ctx.engine.remove(&ctx.cancel, &object).await?;
    println!("trashed {}", object.remote());
    Ok(())
}

pub(crate) async fn handle_mkdir(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let id = ctx.engine.mkdir(&ctx.cancel, &args.path).await?;
    println!("{id}");
    Ok(())
}

pub(crate) async fn handle_rmdir(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    ctx.engine.rmdir(&ctx.cancel, &args.path).await?;
    println!("removed {}", args.path);
    Ok(())
}

pub(crate) async fn handle_purge(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let trashed = ctx.engine.purge(&ctx.cancel, &args.path).await?;
    println!("trashed {trashed} files under {}", args.path);
    Ok(())
}

pub(crate) async fn handle_link(ctx: &AppContext, args: PathArgs) -> CliResult<()> {
    let url = ctx.engine.public_link(&ctx.cancel, &args.path).await?;
    println!("{url}");
    Ok(())
}

pub(crate) async fn handle_cat(ctx: &AppContext, args: CatArgs) -> CliResult<()> {
    let object = ctx.engine.new_object(&ctx.cancel, &args.path).await?;
    let stream = ctx.engine.open(&ctx.cancel, &object, args.range).await?;
    let mut stdout = tokio::io::stdout();
    copy_stream(stream, &mut stdout).await?;
    Ok(())
}

/// Drain `stream` into `writer`; returns the number of bytes written.
pub(crate) async fn copy_stream<W>(mut stream: ContentStream, writer: &mut W) -> CliResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0_u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|err| CliError::failure(anyhow::Error::new(err).context("reading content")))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|err| CliError::failure(anyhow!("failed to write output: {err}")))?;
        written += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
    }
    writer
        .flush()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to flush output: {err}")))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use debridfs_namespace::{NamespaceConfig, NamespaceEngine};
    use debridfs_remote::RetryPolicy;
    use debridfs_test_support::{FakeDebrid, FakeTorrent, RuleFileFixture};

    const RULES: &str = "/movies == (?i)(19|20)([0-9]{2} ?\\.?)\n/archive\n";

    fn film() -> FakeTorrent {
        FakeTorrent::new("T1", "Film.2019", "abcdef0123456789").file(1, "/film.mkv", 2048)
    }

    fn context(api: &Arc<FakeDebrid>, rules: &RuleFileFixture) -> anyhow::Result<AppContext> {
        let fast = RetryPolicy::new(1, Duration::ZERO);
        let config = NamespaceConfig::new(rules.path())
            .with_retry(fast)
            .with_recovery_poll(fast);
        let engine = NamespaceEngine::new(config, api.clone())?;
        Ok(AppContext::new(engine))
    }

    fn library() -> Arc<FakeDebrid> {
        let torrent = film();
        Arc::new(
            FakeDebrid::new()
                .with_download(&torrent.link(1), "film.mkv", 2048)
                .with_torrent(torrent.build()),
        )
    }

    #[tokio::test]
    async fn mv_into_existing_folder_keeps_the_name() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents(RULES)?;
        let api = library();
        let ctx = context(&api, &rules)?;

        handle_mv(
            &ctx,
            MoveArgs {
                source: "movies/Film.2019/film.mkv".into(),
                destination: "archive".into(),
            },
        )
        .await?;

        let key = film().mapping_key(1);
        assert_eq!(rules.lines_containing(&key)?, vec![format!("{key} -> /archive/")]);
        let moved = ctx.engine.new_object(&ctx.cancel, "archive/film.mkv").await?;
        assert_eq!(moved.mapping_key(), key);
        Ok(())
    }

    #[tokio::test]
    async fn mv_of_a_folder_moves_its_files() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents(RULES)?;
        let api = library();
        let ctx = context(&api, &rules)?;

        handle_mv(
            &ctx,
            MoveArgs {
                source: "movies/Film.2019".into(),
                destination: "archive/Film".into(),
            },
        )
        .await?;

        let key = film().mapping_key(1);
        assert_eq!(
            rules.lines_containing(&key)?,
            vec![format!("{key} -> /archive/Film/")]
        );
        let entries = ctx.engine.list(&ctx.cancel, "archive/Film").await?;
        assert_eq!(entries.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rm_of_the_last_file_deletes_the_job() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents(RULES)?;
        let api = library();
        let ctx = context(&api, &rules)?;

        handle_rm(
            &ctx,
            PathArgs {
                path: "movies/Film.2019/film.mkv".into(),
            },
        )
        .await?;

        assert_eq!(api.call_count("torrents.delete"), 1);
        assert!(api.torrent("T1").is_none());
        assert!(rules.lines_containing(&film().mapping_key(1))?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn folder_arguments_are_rejected_where_files_are_expected() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents(RULES)?;
        let api = library();
        let ctx = context(&api, &rules)?;

        let rm = handle_rm(
            &ctx,
            PathArgs {
                path: "movies".into(),
            },
        )
        .await;
        assert!(matches!(rm, Err(CliError::Validation(ref message)) if message.contains("rmdir")));

        let link = handle_link(
            &ctx,
            PathArgs {
                path: "movies/Film.2019".into(),
            },
        )
        .await;
        assert_eq!(link.err().map(|err| err.exit_code()), Some(2));

        let mkdir = handle_mkdir(
            &ctx,
            PathArgs {
                path: "fresh".into(),
            },
        )
        .await;
        assert_eq!(mkdir.err().map(|err| err.exit_code()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn opened_content_is_copied_out() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents(RULES)?;
        let api = library();
        let ctx = context(&api, &rules)?;

        let object = ctx
            .engine
            .new_object(&ctx.cancel, "movies/Film.2019/film.mkv")
            .await?;
        let stream = ctx.engine.open(&ctx.cancel, &object, None).await?;
        let mut sink = Vec::new();
        let written = copy_stream(stream, &mut sink).await?;

        assert_eq!(sink, b"content of film.mkv");
        assert_eq!(written, 19);
        Ok(())
    }
}
