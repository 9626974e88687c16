//! Refresh and rule-file commands.

use crate::cli::{OutputFormat, RefreshArgs};
use crate::client::{AppContext, CliResult};
use crate::output::{render_refresh, render_warnings};

pub(crate) async fn handle_refresh(
    ctx: &AppContext,
    args: RefreshArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let summary = ctx.engine.refresh(&ctx.cancel, args.force).await?;
    print!("{}", render_refresh(&summary, format)?);
    Ok(())
}

pub(crate) async fn handle_rules_check(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let warnings = ctx.engine.check_rules().await?;
    print!("{}", render_warnings(&warnings, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use debridfs_namespace::{NamespaceConfig, NamespaceEngine};
    use debridfs_test_support::{FakeDebrid, FakeTorrent, RuleFileFixture};

    #[tokio::test]
    async fn forced_refresh_refetches_and_check_reports() -> anyhow::Result<()> {
        let rules = RuleFileFixture::with_contents("/broken == (unclosed\n/default\n")?;
        let api = Arc::new(FakeDebrid::new().with_torrent(
            FakeTorrent::new("T1", "Album", "0011223344556677")
                .file(1, "/a.flac", 10)
                .build(),
        ));
        let engine = NamespaceEngine::new(NamespaceConfig::new(rules.path()), api.clone())?;
        let ctx = AppContext::new(engine);

        handle_refresh(&ctx, RefreshArgs { force: true }, OutputFormat::Json).await?;
        assert!(api.call_count("torrents.list") >= 1);

        handle_rules_check(&ctx, OutputFormat::Table).await?;
        let warnings = ctx.engine.check_rules().await?;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 1);
        Ok(())
    }
}
