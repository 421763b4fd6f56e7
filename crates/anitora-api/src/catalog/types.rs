use serde::Deserialize;

use crate::traits::CatalogItem;

// ── Search / ranking / detail responses ─────────────────────────

#[derive(Debug, Deserialize)]
pub struct CatalogListResponse {
    pub data: Vec<CatalogListNode>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogListNode {
    pub node: CatalogNode,
}

#[derive(Debug, Deserialize)]
pub struct CatalogNode {
    pub id: i64,
    pub title: String,
    pub main_picture: Option<CatalogPicture>,
    pub synopsis: Option<String>,
    pub mean: Option<f32>,
    pub num_episodes: Option<u32>,
    pub status: Option<String>,
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogPicture {
    pub medium: Option<String>,
    pub large: Option<String>,
}

// ── Conversions to shared trait types ───────────────────────────

impl CatalogNode {
    pub fn into_item(self) -> CatalogItem {
        CatalogItem {
            id: self.id,
            title: self.title,
            // Prefer the large cover, matching what the UI renders.
            image_url: self
                .main_picture
                .and_then(|pic| pic.large.or(pic.medium)),
            synopsis: self.synopsis,
            score: self.mean,
            episode_count: self.num_episodes,
            status: self.status,
            rank: self.rank,
            popularity: self.popularity,
        }
    }
}
