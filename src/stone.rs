//! Stone catalogue and asset paths.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const IMAGE_ROOT: &str = "/assets/img";
pub const DEFAULT_IMAGE_PATH: &str = "/assets/img/no-image.png";
pub const DEFAULT_PROFILE_IMAGE_PATH: &str = "/assets/img/default-profile.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoneKind {
    Andesite,
    Basalt,
    Conglomerate,
    Gneiss,
    Granite,
    Limestone,
    Quartzite,
    Sandstone,
    Shale,
    Tuff,
}

impl StoneKind {
    pub const ALL: [StoneKind; 10] = [
        StoneKind::Andesite,
        StoneKind::Basalt,
        StoneKind::Conglomerate,
        StoneKind::Gneiss,
        StoneKind::Granite,
        StoneKind::Limestone,
        StoneKind::Quartzite,
        StoneKind::Sandstone,
        StoneKind::Shale,
        StoneKind::Tuff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoneKind::Andesite => "andesite",
            StoneKind::Basalt => "basalt",
            StoneKind::Conglomerate => "conglomerate",
            StoneKind::Gneiss => "gneiss",
            StoneKind::Granite => "granite",
            StoneKind::Limestone => "limestone",
            StoneKind::Quartzite => "quartzite",
            StoneKind::Sandstone => "sandstone",
            StoneKind::Shale => "shale",
            StoneKind::Tuff => "tuff",
        }
    }

    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn image_path(&self) -> String {
        format!("{}/{}.png", IMAGE_ROOT, self.as_str())
    }
}

impl fmt::Display for StoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stone kind '{0}'")]
pub struct UnknownStoneKind(pub String);

impl FromStr for StoneKind {
    type Err = UnknownStoneKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownStoneKind(s.to_string()))
    }
}

/// Image for a stone kind name; unknown or missing kinds get the placeholder
pub fn stone_image_path(kind: Option<&str>) -> String {
    kind.and_then(|name| name.parse::<StoneKind>().ok())
        .map(|kind| kind.image_path())
        .unwrap_or_else(|| DEFAULT_IMAGE_PATH.to_string())
}

/// Catalogue entries use the same images as the stones themselves
pub fn catalog_image_path(kind: Option<&str>) -> String {
    stone_image_path(kind)
}

pub fn profile_image_path(image_id: Option<&str>) -> String {
    match image_id.filter(|id| !id.is_empty()) {
        Some(id) => format!("{}/profiles/{}.png", IMAGE_ROOT, id),
        None => DEFAULT_PROFILE_IMAGE_PATH.to_string(),
    }
}

pub fn app_icon_path(name: &str) -> String {
    format!("{}/icons/{}.png", IMAGE_ROOT, name)
}

/// The stone currently being grown by this player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStone {
    pub id: String,
    pub kind: StoneKind,
    pub base_size: u32,
    pub name: String,
    /// Seconds this stone has been grown while some tab was primary
    pub total_elapsed: u64,
}

impl CurrentStone {
    pub fn new(kind: StoneKind) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            base_size: 1,
            name: kind.as_str().to_string(),
            total_elapsed: 0,
        }
    }

    pub fn random() -> Self {
        Self::new(StoneKind::random())
    }

    pub fn grow(&mut self, elapsed_secs: u64) {
        self.total_elapsed = self.total_elapsed.saturating_add(elapsed_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in StoneKind::ALL {
            assert_eq!(kind.as_str().parse::<StoneKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::json!(kind.as_str())
            );
        }
        assert_eq!(
            "marble".parse::<StoneKind>(),
            Err(UnknownStoneKind("marble".to_string()))
        );
    }

    #[test]
    fn test_image_paths() {
        assert_eq!(stone_image_path(Some("basalt")), "/assets/img/basalt.png");
        assert_eq!(stone_image_path(Some("marble")), DEFAULT_IMAGE_PATH);
        assert_eq!(stone_image_path(None), DEFAULT_IMAGE_PATH);
        assert_eq!(catalog_image_path(Some("tuff")), "/assets/img/tuff.png");
        assert_eq!(profile_image_path(Some("42")), "/assets/img/profiles/42.png");
        assert_eq!(profile_image_path(None), DEFAULT_PROFILE_IMAGE_PATH);
        assert_eq!(app_icon_path("shop"), "/assets/img/icons/shop.png");
    }

    #[test]
    fn test_new_stone_is_named_after_kind() {
        let stone = CurrentStone::random();
        assert_eq!(stone.name, stone.kind.as_str());
        assert_eq!(stone.base_size, 1);
        assert_eq!(stone.total_elapsed, 0);
        assert!(StoneKind::ALL.contains(&stone.kind));
    }
}
