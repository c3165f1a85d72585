use async_graphql::*;
use chrono::NaiveDate;

use crate::content::media::MediaFilter;
use crate::content::posts::{self, CalendarDay, PostFilter, PostView};
use crate::content::{characters, media, platforms, FileType, PostStatus};
use crate::db::models::{CharacterProfile, MediaContent, SocialPlatform};
use crate::state::DbPool;

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Character profiles, optionally only the ones that can be assigned
    async fn characters(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] active_only: bool,
    ) -> Result<Vec<CharacterProfile>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(characters::list_characters(&conn, active_only)?)
    }

    async fn platforms(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] active_only: bool,
    ) -> Result<Vec<SocialPlatform>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(platforms::list_platforms(&conn, active_only)?)
    }

    async fn media(
        &self,
        ctx: &Context<'_>,
        character_id: Option<String>,
        file_type: Option<FileType>,
    ) -> Result<Vec<MediaContent>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(media::list_media(
            &conn,
            &MediaFilter {
                character_id,
                file_type,
            },
        )?)
    }

    /// Scheduled posts with references resolved
    async fn scheduled_posts(
        &self,
        ctx: &Context<'_>,
        status: Option<PostStatus>,
        character_id: Option<String>,
    ) -> Result<Vec<PostView>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(posts::list_posts(
            &conn,
            &PostFilter {
                status,
                character_id,
            },
        )?)
    }

    /// Pending posts without a send time
    async fn needs_scheduling(&self, ctx: &Context<'_>) -> Result<Vec<PostView>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(posts::needs_scheduling(&conn)?)
    }

    /// Scheduled posts bucketed by UTC day, inclusive range
    async fn calendar(
        &self,
        ctx: &Context<'_>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarDay>> {
        let conn = ctx.data::<DbPool>()?.get()?;
        Ok(posts::calendar(&conn, from, to)?)
    }
}
