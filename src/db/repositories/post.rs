use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use std::collections::HashMap;

use crate::entities::{posts, prelude::*, users};

/// Public author info attached to every post in a listing.
#[derive(Debug, Clone)]
pub struct Author {
    pub username: String,
    pub image_file: String,
}

/// One page of posts, newest first, each paired with its author.
#[derive(Debug)]
pub struct PostPage {
    pub posts: Vec<(posts::Model, Author)>,
    pub total_pages: u64,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, author_id: i32, title: &str, content: &str) -> Result<posts::Model> {
        let active = posts::ActiveModel {
            title: Set(title.to_string()),
            content: Set(content.to_string()),
            date_posted: Set(chrono::Utc::now().to_rfc3339()),
            author_id: Set(author_id),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert post")?;

        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<posts::Model>> {
        let post = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post by ID")?;

        Ok(post)
    }

    /// Update title and content of an existing post. Returns `None` if the
    /// post does not exist.
    pub async fn update(
        &self,
        id: i32,
        title: &str,
        content: &str,
    ) -> Result<Option<posts::Model>> {
        let Some(post) = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post for update")?
        else {
            return Ok(None);
        };

        let mut active: posts::ActiveModel = post.into();
        active.title = Set(title.to_string());
        active.content = Set(content.to_string());
        let model = active.update(&self.conn).await?;

        Ok(Some(model))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Posts::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete post")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn page_recent(&self, page: u64, per_page: u64) -> Result<PostPage> {
        self.page(Posts::find(), page, per_page).await
    }

    pub async fn page_by_author(
        &self,
        author_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<PostPage> {
        self.page(
            Posts::find().filter(posts::Column::AuthorId.eq(author_id)),
            page,
            per_page,
        )
        .await
    }

    async fn page(
        &self,
        query: Select<posts::Entity>,
        page: u64,
        per_page: u64,
    ) -> Result<PostPage> {
        let paginator = query
            .order_by_desc(posts::Column::DatePosted)
            .paginate(&self.conn, per_page);

        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        // Batch-load the authors for the page instead of one query per post
        let author_ids: Vec<i32> = items.iter().map(|p| p.author_id).collect();
        let authors: HashMap<i32, Author> = Users::find()
            .filter(users::Column::Id.is_in(author_ids))
            .all(&self.conn)
            .await
            .context("Failed to query post authors")?
            .into_iter()
            .map(|u| {
                (
                    u.id,
                    Author {
                        username: u.username,
                        image_file: u.image_file,
                    },
                )
            })
            .collect();

        let posts = items
            .into_iter()
            .filter_map(|p| {
                let author = authors.get(&p.author_id).cloned()?;
                Some((p, author))
            })
            .collect();

        Ok(PostPage { posts, total_pages })
    }
}
